//! # labbind-testing
//!
//! Utilities for testing code built on labbind-orm without a live service:
//!
//! - [`MemoryTransport`]: tables in memory, scripted responses, injected
//!   failures and a log of every call
//! - [`TestAssertions`]: JSON equality and containment checks
//! - [`fixtures`]: ready-made registries and sessions
//! - [`init_tracing`]: a test-friendly tracing subscriber
//!
//! ```rust
//! use labbind_testing::prelude::*;
//!
//! let transport = MemoryTransport::new().with_table("Sample", vec![json!({"id": 1, "name": "pGFP"})]);
//! assert_eq!(transport.rows("Sample").len(), 1);
//! ```

pub mod assertions;
pub mod fixtures;
pub mod transport;

pub use assertions::TestAssertions;
pub use transport::{MemoryTransport, TransportCall};

use labbind_orm::ModelError;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        assertions::TestAssertions,
        fixtures,
        init_tracing,
        transport::{MemoryTransport, TransportCall},
        TestError, TestResult,
    };

    pub use serde_json::{json, Value as JsonValue};
}

#[derive(thiserror::Error, Debug)]
pub enum TestError {
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Assertion failed: {message}")]
    Assertion { message: String },

    #[error("Test setup error: {0}")]
    Setup(String),
}

pub type TestResult<T> = Result<T, TestError>;

/// Install a fmt subscriber filtered by `RUST_LOG` (default `warn`), writing
/// through the test harness. Safe to call from every test.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_is_idempotent() {
        init_tracing();
        init_tracing();
    }

    #[test]
    fn test_error_display() {
        let err = TestError::Assertion {
            message: "rows differ".to_string(),
        };
        assert_eq!(err.to_string(), "Assertion failed: rows differ");
    }
}
