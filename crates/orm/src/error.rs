//! Error types for the mapping engine
//!
//! Every error names the entity type, the offending field or relationship and
//! the record involved, because relationships resolve lazily and a failure
//! can surface far away from the place where the relationship was declared.

use std::fmt;

use labbind_core::ConfigError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::transport::TransportError;

/// Result type alias for model operations
pub type ModelResult<T> = Result<T, ModelError>;

/// ORM error type alias
pub type OrmError = ModelError;

/// ORM result type alias
pub type OrmResult<T> = ModelResult<T>;

/// Boxed cause carried by resolution failures
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Identity of a record in diagnostics: the server id once known, the local
/// sequence number otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RecordId {
    Server(Value),
    Local(u64),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Server(id) => write!(f, "id={}", id),
            RecordId::Local(rid) => write!(f, "local#{}", rid),
        }
    }
}

/// Where an error happened
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorContext {
    pub entity: String,
    pub field: Option<String>,
    pub record: Option<RecordId>,
}

impl ErrorContext {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            field: None,
            record: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_record(mut self, record: RecordId) -> Self {
        self.record = Some(record);
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.entity)?;
        if let Some(ref field) = self.field {
            write!(f, ".{}", field)?;
        }
        if let Some(ref record) = self.record {
            write!(f, " ({})", record)?;
        }
        Ok(())
    }
}

/// Error types for mapping operations
#[derive(Debug, Error)]
pub enum ModelError {
    /// Registration or validation failure: missing required field, malformed spec
    #[error("Schema error on {context}: {message}")]
    Schema {
        context: ErrorContext,
        message: String,
    },

    /// A model or resolver name is not registered
    #[error("Lookup error on {context}: \"{name}\" is not registered")]
    Lookup { name: String, context: ErrorContext },

    /// Payload shape does not match what a field or relationship requires
    #[error("Marshal error on {context}: expected {expected}, found {found}")]
    Marshal {
        context: ErrorContext,
        expected: String,
        found: String,
    },

    /// Relationship access failed: no session, parameter builder failure,
    /// or transport failure
    #[error("Resolution error on {context}: {message}")]
    Resolution {
        context: ErrorContext,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Invalid client configuration
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),
}

impl ModelError {
    pub fn schema(context: ErrorContext, message: impl Into<String>) -> Self {
        ModelError::Schema {
            context,
            message: message.into(),
        }
    }

    pub fn lookup(name: impl Into<String>, context: ErrorContext) -> Self {
        ModelError::Lookup {
            name: name.into(),
            context,
        }
    }

    pub fn marshal(context: ErrorContext, expected: impl Into<String>, found: &Value) -> Self {
        ModelError::Marshal {
            context,
            expected: expected.into(),
            found: json_kind(found).to_string(),
        }
    }

    pub fn resolution(context: ErrorContext, message: impl Into<String>) -> Self {
        ModelError::Resolution {
            context,
            message: message.into(),
            source: None,
        }
    }

    /// Wrap an underlying failure, keeping it reachable through `source()`
    pub fn resolution_caused_by(
        context: ErrorContext,
        message: impl Into<String>,
        cause: impl Into<BoxError>,
    ) -> Self {
        ModelError::Resolution {
            context,
            message: message.into(),
            source: Some(cause.into()),
        }
    }

    pub fn transport(context: ErrorContext, err: TransportError) -> Self {
        Self::resolution_caused_by(context, "transport request failed", err)
    }

    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            ModelError::Schema { context, .. }
            | ModelError::Lookup { context, .. }
            | ModelError::Marshal { context, .. }
            | ModelError::Resolution { context, .. } => Some(context),
            ModelError::Configuration(_) => None,
        }
    }

    pub fn is_schema(&self) -> bool {
        matches!(self, ModelError::Schema { .. })
    }

    pub fn is_lookup(&self) -> bool {
        matches!(self, ModelError::Lookup { .. })
    }

    pub fn is_marshal(&self) -> bool {
        matches!(self, ModelError::Marshal { .. })
    }

    pub fn is_resolution(&self) -> bool {
        matches!(self, ModelError::Resolution { .. })
    }

    /// The transport failure behind a resolution error, if any
    pub fn transport_cause(&self) -> Option<&TransportError> {
        match self {
            ModelError::Resolution {
                source: Some(source),
                ..
            } => source.downcast_ref::<TransportError>(),
            _ => None,
        }
    }
}

/// Short name of a JSON value's shape, used in marshal errors
pub fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::error::Error as _;

    #[test]
    fn test_context_display() {
        let context = ErrorContext::new("Sample")
            .with_field("sample_type")
            .with_record(RecordId::Server(json!(12)));
        assert_eq!(context.to_string(), "Sample.sample_type (id=12)");

        let local = ErrorContext::new("Item").with_record(RecordId::Local(3));
        assert_eq!(local.to_string(), "Item (local#3)");
    }

    #[test]
    fn test_lookup_error_names_missing_type() {
        let err = ModelError::lookup("SampelType", ErrorContext::new("Sample").with_field("sample_type"));
        let message = err.to_string();
        assert!(message.contains("SampelType"));
        assert!(message.contains("Sample.sample_type"));
        assert!(err.is_lookup());
    }

    #[test]
    fn test_marshal_error_reports_shape() {
        let err = ModelError::marshal(
            ErrorContext::new("Item").with_field("sample"),
            "object",
            &json!(5),
        );
        assert_eq!(
            err.to_string(),
            "Marshal error on Item.sample: expected object, found number"
        );
    }

    #[test]
    fn test_resolution_error_preserves_transport_cause() {
        let err = ModelError::transport(
            ErrorContext::new("Job").with_field("operations"),
            TransportError::Unavailable("connection refused".to_string()),
        );

        assert!(err.is_resolution());
        assert!(err.source().is_some());
        assert!(matches!(
            err.transport_cause(),
            Some(TransportError::Unavailable(_))
        ));
    }
}
