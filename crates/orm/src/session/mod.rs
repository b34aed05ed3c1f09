//! Session Binder - the connection context that lets records resolve relationships
//!
//! A session couples a [`ModelRegistry`] with a [`Transport`] and the client
//! configuration. Records loaded through a session are bound to it, and the
//! binding is pushed down through every relationship already resolved.

mod binder;
mod interface;

pub use interface::ModelInterface;

use std::fmt;
use std::sync::Arc;

use labbind_core::{AppConfigTrait, ClientConfig};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{ModelError, ModelResult};
use crate::marshaller::{DumpOptions, Marshaller};
use crate::model::{Cached, Record};
use crate::registry::ModelRegistry;
use crate::relationships::resolver::Resolved;
use crate::relationships::Cardinality;
use crate::schema::{EntityType, Loaded};
use crate::transport::Transport;

struct SessionInner {
    id: Uuid,
    registry: Arc<ModelRegistry>,
    transport: Arc<dyn Transport>,
    config: ClientConfig,
}

/// Cheaply cloneable handle; clones are the same session
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    pub fn new(registry: Arc<ModelRegistry>, transport: Arc<dyn Transport>) -> Self {
        Self::build(registry, transport, ClientConfig::new())
    }

    /// Session with an explicit configuration, validated first
    pub fn with_config(
        registry: Arc<ModelRegistry>,
        transport: Arc<dyn Transport>,
        config: ClientConfig,
    ) -> ModelResult<Self> {
        config.validate()?;
        Ok(Self::build(registry, transport, config))
    }

    fn build(registry: Arc<ModelRegistry>, transport: Arc<dyn Transport>, config: ClientConfig) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                id: Uuid::new_v4(),
                registry,
                transport,
                config,
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.inner.registry
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.inner.transport
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Whether both handles refer to the same session
    pub fn same_as(&self, other: &Session) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Marshaller over this session's registry, strict if the config says so
    pub fn marshaller(&self) -> Marshaller<'_> {
        Marshaller::new(&self.inner.registry).strict(self.inner.config.strict)
    }

    /// Load a payload as `type_name` and bind every resulting record
    pub fn load(&self, type_name: &str, payload: &Value) -> ModelResult<Loaded> {
        let entity = self.inner.registry.resolve(type_name)?;
        let loaded = self.marshaller().load(&entity, payload)?;
        Ok(match loaded {
            Loaded::One(mut record) => {
                record.bind(self);
                Loaded::One(record)
            }
            Loaded::Many(mut records) => {
                for record in &mut records {
                    record.bind(self);
                }
                Loaded::Many(records)
            }
        })
    }

    /// Entry points for one registered type
    pub fn model(&self, type_name: &str) -> ModelResult<ModelInterface<'_>> {
        let entity = self.inner.registry.resolve(type_name)?;
        Ok(ModelInterface::new(self, entity))
    }

    /// Dump options using the configured expansion depth
    pub fn dump_options(&self) -> DumpOptions {
        DumpOptions::default().depth(self.inner.config.dump_depth)
    }

    /// Turn resolver output into bound records of `target`
    pub(crate) fn materialize(
        &self,
        target: &Arc<EntityType>,
        cardinality: Cardinality,
        resolved: Resolved,
    ) -> ModelResult<Cached> {
        match cardinality {
            Cardinality::One => match resolved.into_one() {
                None | Some(Value::Null) => Ok(Cached::One(None)),
                Some(value) => {
                    let record = self.materialize_record(target, &value)?;
                    Ok(Cached::One(Some(Box::new(record))))
                }
            },
            Cardinality::Many => resolved
                .into_many()
                .iter()
                .map(|value| self.materialize_record(target, value))
                .collect::<ModelResult<Vec<_>>>()
                .map(Cached::Many),
        }
    }

    pub(crate) fn materialize_record(&self, target: &Arc<EntityType>, value: &Value) -> ModelResult<Record> {
        let mut record = self.marshaller().load_record(target, value)?;
        record.bind(self);
        Ok(record)
    }

    pub(crate) fn transport_error(&self, entity: &EntityType, err: crate::transport::TransportError) -> ModelError {
        tracing::warn!(session = %self.inner.id, entity = entity.name(), error = %err, "transport request failed");
        ModelError::transport(entity.context(), err)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.inner.id)
            .field("environment", &self.inner.config.environment)
            .field("models", &self.inner.registry.len())
            .finish()
    }
}
