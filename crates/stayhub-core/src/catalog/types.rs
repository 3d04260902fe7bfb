//! Core type definitions for the catalog.

use serde::Serialize;

use crate::record::Value;

/// Scalar data types used by the listing schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScalarType {
    /// Boolean value.
    Bool,
    /// 64-bit signed integer.
    Int,
    /// 64-bit floating point. Integers are accepted and widened.
    Float,
    /// UTF-8 string.
    String,
}

impl ScalarType {
    /// Check if this type is numeric.
    pub fn is_numeric(&self) -> bool {
        matches!(self, ScalarType::Int | ScalarType::Float)
    }

    /// Check whether a non-null value conforms to this type.
    pub fn accepts(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (ScalarType::Bool, Value::Bool(_))
                | (ScalarType::Int, Value::Int(_))
                | (ScalarType::Float, Value::Float(_))
                | (ScalarType::Float, Value::Int(_))
                | (ScalarType::String, Value::String(_))
        )
    }
}
