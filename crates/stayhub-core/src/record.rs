//! Runtime record representation.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A field value as carried by records, patches and filters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit floating point.
    Float(f64),
    /// UTF-8 string.
    String(String),
}

impl Value {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Try to get as string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to get as f64, widening integers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Try to get as bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Name of the value's kind, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

/// A single entity record: identity plus named field values.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Record {
    /// Opaque record identifier. Empty until assigned on create.
    #[serde(default)]
    pub id: String,
    /// Field values keyed by field name.
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

impl Record {
    /// Create an empty record with the given id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field setter.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Parse a record from a JSON object.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Encode the record as JSON bytes.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Decode a record from JSON bytes.
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Get a field value. `id` resolves to the record identity.
    pub fn get(&self, field: &str) -> Option<Value> {
        if field == "id" {
            return if self.id.is_empty() {
                None
            } else {
                Some(Value::String(self.id.clone()))
            };
        }
        self.fields.get(field).cloned()
    }

    /// Get a non-null field value by reference.
    pub fn field(&self, field: &str) -> Option<&Value> {
        self.fields.get(field).filter(|v| !v.is_null())
    }

    /// Get a string field (or the id).
    pub fn get_str(&self, field: &str) -> Option<&str> {
        if field == "id" {
            return Some(self.id.as_str()).filter(|s| !s.is_empty());
        }
        self.fields.get(field).and_then(Value::as_str)
    }

    /// Get an integer field.
    pub fn get_i64(&self, field: &str) -> Option<i64> {
        self.fields.get(field).and_then(Value::as_i64)
    }

    /// Get a numeric field as f64.
    pub fn get_f64(&self, field: &str) -> Option<f64> {
        self.fields.get(field).and_then(Value::as_f64)
    }

    /// Set a field value.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    /// Check whether a field is present with a non-null value.
    pub fn has(&self, field: &str) -> bool {
        self.field(field).is_some()
    }

    /// Apply a patch: present fields overwrite, explicit nulls clear.
    pub fn merge(&mut self, patch: &Record) {
        for (name, value) in &patch.fields {
            if value.is_null() {
                self.fields.remove(name);
            } else {
                self.fields.insert(name.clone(), value.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_record() {
        let record =
            Record::from_json(r#"{"id":"a-1","name":"Pool","amount":2,"lat":12.5,"gone":null}"#)
                .unwrap();

        assert_eq!(record.id, "a-1");
        assert_eq!(record.get_str("name"), Some("Pool"));
        assert_eq!(record.get_i64("amount"), Some(2));
        assert_eq!(record.get_f64("lat"), Some(12.5));
        assert_eq!(record.get("gone"), Some(Value::Null));
        assert!(!record.has("gone"));
    }

    #[test]
    fn test_missing_id_defaults_empty() {
        let record = Record::from_json(r#"{"title":"Sea view"}"#).unwrap();
        assert!(record.id.is_empty());
        assert_eq!(record.get("id"), None);
    }

    #[test]
    fn test_merge_patch() {
        let mut record = Record::new("r1").with("status", "active").with("rating", 4);
        let patch = Record::default().with("status", "withdrawn").with("rating", Value::Null);

        record.merge(&patch);

        assert_eq!(record.get_str("status"), Some("withdrawn"));
        assert!(record.get("rating").is_none());
    }

    #[test]
    fn test_int_widens_to_float() {
        let record = Record::new("p").with("ratingStar", 4);
        assert_eq!(record.get_f64("ratingStar"), Some(4.0));
    }
}
