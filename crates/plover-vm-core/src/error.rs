//! VM error types

use crate::realm::Realm;
use crate::value::Value;
use thiserror::Error;

/// VM execution errors
#[derive(Debug, Error)]
pub enum VmError {
    /// Type error (e.g., calling non-function)
    #[error("TypeError: {0}")]
    TypeError(String),

    /// Range error (e.g., invalid array length)
    #[error("RangeError: {0}")]
    RangeError(String),

    /// Internal error
    #[error("InternalError: {0}")]
    InternalError(String),

    /// Native call depth exceeded
    #[error("RangeError: Maximum call stack size exceeded")]
    StackOverflow,

    /// Thrown JS exception
    #[error("Uncaught exception: {0}")]
    Exception(Box<ThrownValue>),
}

/// A thrown JavaScript value
#[derive(Debug)]
pub struct ThrownValue {
    /// The thrown value
    pub value: Value,
    /// The thrown value (as a string representation)
    pub message: String,
}

impl std::fmt::Display for ThrownValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl VmError {
    /// Create a type error
    pub fn type_error(msg: impl Into<String>) -> Self {
        Self::TypeError(msg.into())
    }

    /// Create a range error
    pub fn range_error(msg: impl Into<String>) -> Self {
        Self::RangeError(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::InternalError(msg.into())
    }

    /// Create an exception from a thrown JS value
    pub fn exception(value: Value) -> Self {
        let message = value.to_display_string();
        Self::Exception(Box::new(ThrownValue { value, message }))
    }

    /// Is this a `TypeError` raised by the engine
    pub fn is_type_error(&self) -> bool {
        matches!(self, Self::TypeError(_))
    }

    /// The JS value this error throws.
    ///
    /// Thrown values come back unchanged; engine errors are materialized as
    /// error objects of the matching constructor name.
    pub fn into_value(self, realm: &Realm) -> Value {
        match self {
            Self::Exception(thrown) => thrown.value,
            Self::TypeError(msg) => realm.create_error("TypeError", &msg),
            Self::RangeError(msg) => realm.create_error("RangeError", &msg),
            Self::StackOverflow => {
                realm.create_error("RangeError", "Maximum call stack size exceeded")
            }
            Self::InternalError(msg) => realm.create_error("InternalError", &msg),
        }
    }
}

/// Result type for VM operations
pub type VmResult<T> = std::result::Result<T, VmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exception_round_trips_value() {
        let realm = Realm::new();
        let err = VmError::exception(Value::number(7.0));
        assert_eq!(err.to_string(), "Uncaught exception: 7");
        assert_eq!(err.into_value(&realm), Value::number(7.0));
    }

    #[test]
    fn test_type_error_becomes_error_object() {
        let realm = Realm::new();
        let value = VmError::type_error("bad receiver").into_value(&realm);
        let obj = value.as_object().expect("error object");
        assert!(obj.is_error());
        assert_eq!(
            obj.get_own_data(&"name".into()),
            Some(Value::string("TypeError"))
        );
        assert_eq!(
            obj.get_own_data(&"message".into()),
            Some(Value::string("bad receiver"))
        );
    }
}
