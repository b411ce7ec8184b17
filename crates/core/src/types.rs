//! Column type definitions.

use crate::value::Value;

/// Column types a table schema can declare.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DataType {
    /// Boolean type (true/false)
    Boolean,
    /// 64-bit signed integer
    Int64,
    /// 64-bit floating point number
    Float64,
    /// UTF-8 string
    String,
    /// Serialized JSON document
    Json,
    /// One of a fixed set of string labels
    Enum,
}

impl DataType {
    /// Returns whether `value` may be stored in a column of this type.
    ///
    /// Null is accepted by every type.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (DataType::Boolean, Value::Boolean(_)) => true,
            (DataType::Int64, Value::Int64(_)) => true,
            (DataType::Float64, Value::Float64(_) | Value::Int64(_)) => true,
            (DataType::String | DataType::Enum, Value::String(_)) => true,
            (DataType::Json, _) => true,
            _ => false,
        }
    }

    /// Returns whether values of this type can be ordered meaningfully.
    pub fn is_orderable(&self) -> bool {
        !matches!(self, DataType::Json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_accepts() {
        assert!(DataType::Int64.accepts(&Value::Int64(1)));
        assert!(DataType::Float64.accepts(&Value::Int64(1)));
        assert!(!DataType::Int64.accepts(&Value::Float64(1.5)));
        assert!(DataType::Enum.accepts(&Value::from("open")));
        assert!(DataType::Json.accepts(&Value::Array(vec![Value::Int64(1)])));
        assert!(DataType::Boolean.accepts(&Value::Null));
    }

    #[test]
    fn test_orderable() {
        assert!(DataType::String.is_orderable());
        assert!(!DataType::Json.is_orderable());
    }
}
