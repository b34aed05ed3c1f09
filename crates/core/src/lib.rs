//! # labbind-core
//!
//! Configuration shared by the labbind crates: the client configuration
//! consumed by sessions and transports, where each value came from, and the
//! validation errors raised while building it.

pub mod config;

pub use config::{AppConfigTrait, ClientConfig, ConfigSource, Environment};
pub use config::validation::ConfigError;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get crate version
pub fn version() -> &'static str {
    VERSION
}
