//! Transport seam - the collaborator that actually talks to the remote service
//!
//! The mapping engine never issues HTTP itself. Sessions hand every query to
//! a [`Transport`], addressed by registered type names, and propagate
//! whatever outcome it reports.

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

/// Query criteria: field name to expected value. An array value means
/// "any of these values".
pub type Criteria = Map<String, Value>;

/// Transport failures. "Not found" is not one of them: `find` returns
/// `Ok(None)` and `query` an empty vector.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request to {endpoint} failed: {message}")]
    Request { endpoint: String, message: String },

    #[error("server responded with status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("could not decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("transport unavailable: {0}")]
    Unavailable(String),
}

/// Remote data access used by sessions and resolvers
#[async_trait]
pub trait Transport: Send + Sync {
    /// All records of `type_name` matching `criteria`
    async fn query(&self, type_name: &str, criteria: &Criteria) -> Result<Vec<Value>, TransportError>;

    /// A single record by server id
    async fn find(&self, type_name: &str, id: &Value) -> Result<Option<Value>, TransportError>;

    /// Persist a new record, returning the stored representation
    async fn create(&self, type_name: &str, payload: &Value) -> Result<Value, TransportError>;
}

/// Build criteria from `(field, value)` pairs
pub fn criteria<I, K, V>(pairs: I) -> Criteria
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(key, value)| (key.into(), value.into()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_criteria_builder() {
        let built = criteria([("sample_id", json!(4)), ("role", json!("input"))]);
        assert_eq!(Value::Object(built), json!({"sample_id": 4, "role": "input"}));
    }
}
