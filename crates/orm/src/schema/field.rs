//! Field specifications

use serde::{Deserialize, Serialize};

/// How a declared field takes part in load and dump
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    /// Stored and emitted verbatim
    Scalar,
    /// Opaque JSON blob, stored and emitted verbatim; see `Record::json_field`
    Json,
    /// Loaded but never dumped (server-computed values)
    SkipDump,
    /// Dropped on load (secrets the remote service leaks, stale columns)
    SkipLoad,
}

impl FieldKind {
    pub fn is_loaded(self) -> bool {
        !matches!(self, FieldKind::SkipLoad)
    }

    pub fn is_dumped(self) -> bool {
        !matches!(self, FieldKind::SkipDump | FieldKind::SkipLoad)
    }
}

/// A declared field of an entity type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    pub required: bool,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
        }
    }

    pub fn scalar(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Scalar)
    }

    pub fn json(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Json)
    }

    pub fn skip_dump(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::SkipDump)
    }

    pub fn skip_load(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::SkipLoad)
    }

    /// Mark the field as required; enforced when the type (or the session) is strict
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}
