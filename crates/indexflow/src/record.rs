//! A single row of an index, or its enriched derivative.

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Ordered field map. Mutation always goes through [`Record::with_field`],
/// which returns a new record and leaves the original untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    /// An empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert a decoded JSON value into a record. Only objects qualify.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(Error::Decoding(format!(
                "expected a JSON object row, found {}",
                kind_of(&other)
            ))),
        }
    }

    /// The field's value, if present.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// The field's value when it is present and a string.
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    /// Whether `field` is present, even if `null`.
    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Field names in insertion order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Copy of this record with `field` set to `value`.
    pub fn with_field(&self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut map = self.0.clone();
        map.insert(field.into(), value.into());
        Self(map)
    }

    /// Decode into a typed value. Unknown fields are tolerated unless `T`
    /// opts into `deny_unknown_fields`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(Value::Object(self.0.clone())).map_err(Error::from)
    }

    /// Borrow the underlying JSON object.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Unwrap into the underlying JSON object.
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    /// Convert into a `serde_json::Value::Object`.
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

static NULL: Value = Value::Null;

/// `record["field"]`, yielding `null` for absent fields like `serde_json::Value`.
impl std::ops::Index<&str> for Record {
    type Output = Value;

    fn index(&self, field: &str) -> &Value {
        self.0.get(field).unwrap_or(&NULL)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_with_field_is_copy_on_write() {
        let original = Record::from_iter([("path", "/a"), ("title", "A")]);
        let enriched = original.with_field("doc", json!({"title": "A page"}));

        assert_eq!(original.len(), 2);
        assert!(!original.contains("doc"));
        assert_eq!(enriched.len(), 3);
        assert_eq!(enriched.get_str("path"), Some("/a"));
    }

    #[test]
    fn test_field_order_is_preserved() {
        let record = Record::from_value(json!({"z": 1, "a": 2, "m": 3})).unwrap();
        let record = record.with_field("b", 4);
        assert_eq!(record.fields().collect::<Vec<_>>(), vec!["z", "a", "m", "b"]);
    }

    #[test]
    fn test_from_value_rejects_non_objects() {
        assert!(matches!(
            Record::from_value(json!([1, 2])),
            Err(Error::Decoding(_))
        ));
        assert!(Record::from_value(json!("row")).is_err());
    }

    #[test]
    fn test_get_str_ignores_non_strings() {
        let record = Record::from_value(json!({"n": 3, "s": "x", "null": null})).unwrap();
        assert_eq!(record.get_str("n"), None);
        assert_eq!(record.get_str("null"), None);
        assert_eq!(record.get_str("s"), Some("x"));
        assert_eq!(record["n"], 3);
        assert_eq!(record["absent"], Value::Null);
    }

    #[test]
    fn test_decode_tolerates_unknown_fields() {
        #[derive(Deserialize)]
        struct Page {
            path: String,
        }
        let record = Record::from_value(json!({"path": "/p", "extra": true})).unwrap();
        let page: Page = record.decode().unwrap();
        assert_eq!(page.path, "/p");

        let bad = Record::from_value(json!({"other": 1})).unwrap();
        assert!(matches!(bad.decode::<Page>(), Err(Error::Decoding(_))));
    }
}
