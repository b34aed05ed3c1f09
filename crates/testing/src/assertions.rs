//! JSON assertion helpers
//!
//! Failures come back as [`TestError::Assertion`] with both documents
//! pretty-printed, so tests can use `?` and still get a readable diff.

use serde_json::Value as JsonValue;

use crate::{TestError, TestResult};

/// Collection of test assertions
pub struct TestAssertions;

impl TestAssertions {
    /// Assert that two JSON values are equal
    pub fn assert_json_eq(actual: &JsonValue, expected: &JsonValue) -> TestResult<()> {
        if actual != expected {
            return Err(TestError::Assertion {
                message: format!(
                    "JSON assertion failed:\nExpected: {}\nActual: {}",
                    pretty(expected),
                    pretty(actual)
                ),
            });
        }
        Ok(())
    }

    /// Assert that `actual` contains every key and value of `expected`
    pub fn assert_json_contains(actual: &JsonValue, expected: &JsonValue) -> TestResult<()> {
        if !json_contains(actual, expected) {
            return Err(TestError::Assertion {
                message: format!(
                    "JSON does not contain expected values:\nExpected to contain: {}\nActual: {}",
                    pretty(expected),
                    pretty(actual)
                ),
            });
        }
        Ok(())
    }

    /// Assert that `actual` does not have `key` at its top level
    pub fn assert_json_lacks(actual: &JsonValue, key: &str) -> TestResult<()> {
        if actual.get(key).is_some() {
            return Err(TestError::Assertion {
                message: format!("JSON unexpectedly contains key '{}': {}", key, pretty(actual)),
            });
        }
        Ok(())
    }

    /// Assert that a collection has a specific length
    pub fn assert_length<T>(collection: &[T], expected_length: usize) -> TestResult<()>
    where
        T: std::fmt::Debug,
    {
        if collection.len() != expected_length {
            return Err(TestError::Assertion {
                message: format!(
                    "Expected collection length {}, got {}: {:?}",
                    expected_length,
                    collection.len(),
                    collection
                ),
            });
        }
        Ok(())
    }
}

fn pretty(value: &JsonValue) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}

fn json_contains(actual: &JsonValue, expected: &JsonValue) -> bool {
    match (actual, expected) {
        (JsonValue::Object(actual_map), JsonValue::Object(expected_map)) => {
            expected_map.iter().all(|(key, expected_value)| {
                actual_map
                    .get(key)
                    .map_or(false, |actual_value| json_contains(actual_value, expected_value))
            })
        }
        (JsonValue::Array(actual_arr), JsonValue::Array(expected_arr)) => expected_arr
            .iter()
            .all(|expected_item| actual_arr.iter().any(|actual_item| json_contains(actual_item, expected_item))),
        _ => actual == expected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_contains_nested() {
        let actual = json!({"id": 1, "items": [{"id": 4, "sample_id": 1}], "name": "pGFP"});
        assert!(TestAssertions::assert_json_contains(&actual, &json!({"items": [{"id": 4}]})).is_ok());
        assert!(TestAssertions::assert_json_contains(&actual, &json!({"items": [{"id": 5}]})).is_err());
    }

    #[test]
    fn test_json_eq_reports_both_documents() {
        let err = TestAssertions::assert_json_eq(&json!({"a": 1}), &json!({"a": 2})).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Expected"));
        assert!(message.contains("Actual"));
    }

    #[test]
    fn test_json_lacks() {
        assert!(TestAssertions::assert_json_lacks(&json!({"id": 1}), "items").is_ok());
        assert!(TestAssertions::assert_json_lacks(&json!({"items": []}), "items").is_err());
    }
}
