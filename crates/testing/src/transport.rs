//! In-memory transport
//!
//! Tables keyed by type name, queried with the same criteria semantics the
//! remote service uses: every criterion must match, and an array value
//! matches any of its elements. Every call is recorded so tests can assert
//! how many round trips an operation cost.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use labbind_orm::transport::{Criteria, Transport, TransportError};
use serde_json::Value;
use tracing::trace;

/// One recorded transport call
#[derive(Debug, Clone, PartialEq)]
pub enum TransportCall {
    Query { type_name: String, criteria: Criteria },
    Find { type_name: String, id: Value },
    Create { type_name: String, payload: Value },
}

impl TransportCall {
    pub fn type_name(&self) -> &str {
        match self {
            TransportCall::Query { type_name, .. }
            | TransportCall::Find { type_name, .. }
            | TransportCall::Create { type_name, .. } => type_name,
        }
    }
}

#[derive(Default)]
struct State {
    tables: HashMap<String, Vec<Value>>,
    scripted: HashMap<String, VecDeque<Vec<Value>>>,
    failures: HashMap<String, String>,
    calls: Vec<TransportCall>,
    next_id: i64,
}

/// [`Transport`] backed by in-memory tables
#[derive(Default)]
pub struct MemoryTransport {
    state: Mutex<State>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                next_id: 1000,
                ..State::default()
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Builder form of [`insert_all`](Self::insert_all)
    pub fn with_table(self, type_name: &str, rows: Vec<Value>) -> Self {
        self.insert_all(type_name, rows);
        self
    }

    pub fn insert(&self, type_name: &str, row: Value) {
        self.state().tables.entry(type_name.to_string()).or_default().push(row);
    }

    pub fn insert_all(&self, type_name: &str, rows: Vec<Value>) {
        self.state()
            .tables
            .entry(type_name.to_string())
            .or_default()
            .extend(rows);
    }

    /// Current rows of a table
    pub fn rows(&self, type_name: &str) -> Vec<Value> {
        self.state().tables.get(type_name).cloned().unwrap_or_default()
    }

    /// Answer the next queries on `type_name` with these responses, in order,
    /// before falling back to the table
    pub fn script_query(&self, type_name: &str, responses: Vec<Vec<Value>>) {
        self.state()
            .scripted
            .entry(type_name.to_string())
            .or_default()
            .extend(responses);
    }

    /// Fail every call on `type_name` with [`TransportError::Unavailable`]
    pub fn fail_on(&self, type_name: &str, message: &str) {
        self.state()
            .failures
            .insert(type_name.to_string(), message.to_string());
    }

    pub fn calls(&self) -> Vec<TransportCall> {
        self.state().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state().calls.len()
    }

    pub fn query_count(&self) -> usize {
        self.count(|call| matches!(call, TransportCall::Query { .. }))
    }

    pub fn find_count(&self) -> usize {
        self.count(|call| matches!(call, TransportCall::Find { .. }))
    }

    /// Calls addressed to one type
    pub fn calls_for(&self, type_name: &str) -> Vec<TransportCall> {
        self.state()
            .calls
            .iter()
            .filter(|call| call.type_name() == type_name)
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    fn count<F>(&self, predicate: F) -> usize
    where
        F: Fn(&TransportCall) -> bool,
    {
        self.state().calls.iter().filter(|call| predicate(call)).count()
    }

    fn check_failure(state: &State, type_name: &str) -> Result<(), TransportError> {
        match state.failures.get(type_name) {
            Some(message) => Err(TransportError::Unavailable(message.clone())),
            None => Ok(()),
        }
    }
}

/// Whether `row` satisfies every criterion
pub fn matches(row: &Value, criteria: &Criteria) -> bool {
    criteria.iter().all(|(key, expected)| {
        let actual = row.get(key).unwrap_or(&Value::Null);
        match expected {
            Value::Array(options) => options.iter().any(|option| option == actual),
            other => other == actual,
        }
    })
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn query(&self, type_name: &str, criteria: &Criteria) -> Result<Vec<Value>, TransportError> {
        let mut state = self.state();
        state.calls.push(TransportCall::Query {
            type_name: type_name.to_string(),
            criteria: criteria.clone(),
        });
        Self::check_failure(&state, type_name)?;

        if let Some(response) = state
            .scripted
            .get_mut(type_name)
            .and_then(VecDeque::pop_front)
        {
            trace!(type_name, rows = response.len(), "scripted query response");
            return Ok(response);
        }

        Ok(state
            .tables
            .get(type_name)
            .map(|rows| rows.iter().filter(|row| matches(row, criteria)).cloned().collect())
            .unwrap_or_default())
    }

    async fn find(&self, type_name: &str, id: &Value) -> Result<Option<Value>, TransportError> {
        let mut state = self.state();
        state.calls.push(TransportCall::Find {
            type_name: type_name.to_string(),
            id: id.clone(),
        });
        Self::check_failure(&state, type_name)?;

        Ok(state
            .tables
            .get(type_name)
            .and_then(|rows| rows.iter().find(|row| row.get("id") == Some(id)))
            .cloned())
    }

    async fn create(&self, type_name: &str, payload: &Value) -> Result<Value, TransportError> {
        let mut state = self.state();
        state.calls.push(TransportCall::Create {
            type_name: type_name.to_string(),
            payload: payload.clone(),
        });
        Self::check_failure(&state, type_name)?;

        let Value::Object(mut row) = payload.clone() else {
            return Err(TransportError::Status {
                status: 422,
                message: format!("{} payload must be an object", type_name),
            });
        };
        if row.get("id").map_or(true, Value::is_null) {
            state.next_id += 1;
            row.insert("id".to_string(), Value::from(state.next_id));
        }

        let row = Value::Object(row);
        state
            .tables
            .entry(type_name.to_string())
            .or_default()
            .push(row.clone());
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labbind_orm::criteria;
    use serde_json::json;

    fn transport() -> MemoryTransport {
        MemoryTransport::new().with_table(
            "Item",
            vec![
                json!({"id": 1, "sample_id": 4}),
                json!({"id": 2, "sample_id": 5}),
                json!({"id": 3, "sample_id": 4}),
            ],
        )
    }

    #[tokio::test]
    async fn test_query_filters_and_records_calls() {
        let transport = transport();
        let rows = transport
            .query("Item", &criteria([("sample_id", json!(4))]))
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);

        let rows = transport
            .query("Item", &criteria([("id", json!([2, 3, 9]))]))
            .await
            .unwrap();
        assert_eq!(rows, vec![json!({"id": 2, "sample_id": 5}), json!({"id": 3, "sample_id": 4})]);
        assert_eq!(transport.query_count(), 2);
    }

    #[tokio::test]
    async fn test_find_distinguishes_not_found() {
        let transport = transport();
        assert!(transport.find("Item", &json!(3)).await.unwrap().is_some());
        assert!(transport.find("Item", &json!(42)).await.unwrap().is_none());
        assert!(transport.find("Sample", &json!(1)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_scripted_responses_then_table() {
        let transport = transport();
        transport.script_query("Item", vec![vec![json!({"id": 77})]]);

        let first = transport.query("Item", &Criteria::new()).await.unwrap();
        assert_eq!(first, vec![json!({"id": 77})]);
        let second = transport.query("Item", &Criteria::new()).await.unwrap();
        assert_eq!(second.len(), 3);
    }

    #[tokio::test]
    async fn test_failures_and_create() {
        let transport = transport();
        let created = transport.create("Sample", &json!({"name": "pGFP"})).await.unwrap();
        assert_eq!(created["id"], json!(1001));
        assert_eq!(transport.rows("Sample").len(), 1);

        transport.fail_on("Sample", "connection reset");
        let err = transport.query("Sample", &Criteria::new()).await.unwrap_err();
        assert!(matches!(err, TransportError::Unavailable(_)));
        assert_eq!(transport.calls_for("Sample").len(), 2);
    }
}
