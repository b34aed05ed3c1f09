//! Marshaller - recursive JSON to record load and record to JSON dump
//!
//! Loading consults the schema of each type: relationship keys carrying a
//! nested object or array are loaded as target records and cached as already
//! resolved, declared fields are stored verbatim, and anything else is kept
//! as an extra attribute. Dumping only walks what is already cached.

mod dump;
mod load;

pub use dump::DumpOptions;

use crate::registry::ModelRegistry;

/// Load engine bound to a registry for resolving nested target types
#[derive(Debug, Clone, Copy)]
pub struct Marshaller<'r> {
    registry: Option<&'r ModelRegistry>,
    strict: bool,
}

impl<'r> Marshaller<'r> {
    pub fn new(registry: &'r ModelRegistry) -> Self {
        Self {
            registry: Some(registry),
            strict: false,
        }
    }

    /// Marshaller without a registry; flat payloads only
    pub fn detached() -> Self {
        Self {
            registry: None,
            strict: false,
        }
    }

    /// Enforce required fields on every type, not only on strict ones
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }
}
