//! Free-form metadata objects attached to every entity.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Errors that can occur when converting JSON into [`Metadata`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MetadataError {
    /// The value is neither an object nor null.
    #[error("metadata must be an object or null")]
    NotAnObject,
}

/// A JSON object of caller-defined keys.
///
/// `null` is accepted wherever metadata is written and means "empty".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(Map<String, Value>);

impl Metadata {
    /// Create empty metadata.
    #[must_use]
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Convert an arbitrary JSON value, accepting only objects and `null`.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::NotAnObject`] for arrays, strings, numbers and booleans.
    pub fn from_value(value: Value) -> Result<Self, MetadataError> {
        match value {
            Value::Null => Ok(Self::new()),
            Value::Object(map) => Ok(Self(map)),
            _ => Err(MetadataError::NotAnObject),
        }
    }

    /// Shallow merge: every key of `other` overwrites the same key here.
    pub fn merge(&mut self, other: &Self) {
        for (key, value) in &other.0 {
            self.0.insert(key.clone(), value.clone());
        }
    }

    /// Set a single key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Look up a key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns `true` if there are no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Convert into a JSON value (always an object).
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Borrow as a JSON value for storage.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

impl TryFrom<Value> for Metadata {
    type Error = MetadataError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

impl From<Map<String, Value>> for Metadata {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_from_value_accepts_object_and_null() {
        assert!(Metadata::from_value(json!({"a": 1})).is_ok());
        assert_eq!(Metadata::from_value(Value::Null).unwrap(), Metadata::new());
    }

    #[test]
    fn test_from_value_rejects_other_json() {
        for value in [json!([1, 2]), json!("x"), json!(3), json!(true)] {
            assert_eq!(
                Metadata::from_value(value),
                Err(MetadataError::NotAnObject)
            );
        }
    }

    #[test]
    fn test_merge_incoming_keys_win() {
        let mut base = Metadata::from_value(json!({"brand": "A", "aisle": 4})).unwrap();
        let incoming = Metadata::from_value(json!({"brand": "B", "organic": true})).unwrap();

        base.merge(&incoming);

        assert_eq!(
            base.into_value(),
            json!({"brand": "B", "aisle": 4, "organic": true})
        );
    }

    #[test]
    fn test_merge_is_shallow() {
        let mut base = Metadata::from_value(json!({"nested": {"a": 1, "b": 2}})).unwrap();
        let incoming = Metadata::from_value(json!({"nested": {"c": 3}})).unwrap();

        base.merge(&incoming);

        assert_eq!(base.get("nested"), Some(&json!({"c": 3})));
    }

    #[test]
    fn test_insert_overwrites() {
        let mut meta = Metadata::new();
        meta.insert("transfer_notes", "first");
        meta.insert("transfer_notes", "second");
        assert_eq!(meta.get("transfer_notes"), Some(&json!("second")));
    }
}
