//! Opaque pagination cursors.

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::record::Value;

/// Position of the last record on a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cursor {
    /// Sort value of the last record, if it had one.
    #[serde(rename = "v", default)]
    pub value: Option<Value>,
    /// Id of the last record.
    pub id: String,
}

impl Cursor {
    /// Create a cursor.
    pub fn new(value: Option<Value>, id: impl Into<String>) -> Self {
        Self {
            value,
            id: id.into(),
        }
    }

    /// Encode as an opaque token (hex of the JSON form).
    pub fn encode(&self) -> Result<String, Error> {
        Ok(hex::encode(serde_json::to_vec(self)?))
    }

    /// Decode a token produced by [`encode`](Self::encode).
    ///
    /// Malformed tokens are reported as a schema violation on `cursor`.
    pub fn decode(entity: &str, token: &str) -> Result<Self, Error> {
        let invalid = || Error::schema(entity, vec!["cursor".to_string()]);
        let bytes = hex::decode(token).map_err(|_| invalid())?;
        serde_json::from_slice(&bytes).map_err(|_| invalid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_token() {
        let cursor = Cursor::new(Some(Value::Float(4.5)), "p-7");
        let token = cursor.encode().unwrap();
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(Cursor::decode("Property", &token).unwrap(), cursor);
    }

    #[test]
    fn test_invalid_cursor() {
        for token in ["zz", "", "7b7d"] {
            match Cursor::decode("Property", token) {
                Err(Error::SchemaViolation { fields, .. }) => assert_eq!(fields, ["cursor"]),
                other => panic!("unexpected {:?}", other),
            }
        }
    }
}
