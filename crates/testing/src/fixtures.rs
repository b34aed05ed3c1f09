//! Ready-made registries and sessions

use std::sync::Arc;

use labbind_core::ClientConfig;
use labbind_orm::models::aquarium;
use labbind_orm::{ModelRegistry, Session};
use serde_json::{Map, Value};

use crate::transport::MemoryTransport;
use crate::{TestError, TestResult};

/// Registry holding the Aquarium catalog
pub fn aquarium_registry() -> TestResult<Arc<ModelRegistry>> {
    let registry = ModelRegistry::new();
    aquarium::register_all(&registry)?;
    Ok(Arc::new(registry))
}

/// Session over `registry` and `transport` with the testing configuration
pub fn session(registry: Arc<ModelRegistry>, transport: Arc<MemoryTransport>) -> TestResult<Session> {
    Ok(Session::with_config(registry, transport, ClientConfig::testing())?)
}

/// Aquarium session over a fresh in-memory transport
pub fn aquarium_session() -> TestResult<(Session, Arc<MemoryTransport>)> {
    let transport = Arc::new(MemoryTransport::new());
    let session = session(aquarium_registry()?, Arc::clone(&transport))?;
    Ok((session, transport))
}

/// The attributes of a JSON object literal
pub fn object(value: Value) -> TestResult<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(TestError::Setup(format!("expected a JSON object, got {}", other))),
    }
}
