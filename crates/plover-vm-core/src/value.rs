//! JavaScript values
//!
//! Primitives are stored inline; everything else is an `Rc<JsObject>`.
//! Object equality is reference identity.

use std::rc::Rc;

use crate::function::NativeFunction;
use crate::object::JsObject;
use crate::promise::JsPromise;

/// A JavaScript value
#[derive(Clone, Default)]
pub enum Value {
    /// `undefined`
    #[default]
    Undefined,
    /// `null`
    Null,
    /// Boolean primitive
    Boolean(bool),
    /// Number primitive
    Number(f64),
    /// String primitive
    String(Rc<str>),
    /// Any object, including functions, arrays and promises
    Object(Rc<JsObject>),
}

impl Value {
    /// `undefined`
    pub const fn undefined() -> Self {
        Self::Undefined
    }

    /// `null`
    pub const fn null() -> Self {
        Self::Null
    }

    /// Boolean value
    pub const fn boolean(b: bool) -> Self {
        Self::Boolean(b)
    }

    /// Number value
    pub const fn number(n: f64) -> Self {
        Self::Number(n)
    }

    /// Number value from an `i32`
    pub fn int32(n: i32) -> Self {
        Self::Number(f64::from(n))
    }

    /// String value
    pub fn string(s: &str) -> Self {
        Self::String(Rc::from(s))
    }

    /// Object value
    pub fn object(obj: Rc<JsObject>) -> Self {
        Self::Object(obj)
    }

    /// Is `undefined`
    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    /// Is `undefined` or `null`
    pub fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    /// Is an object
    pub fn is_object(&self) -> bool {
        matches!(self, Self::Object(_))
    }

    /// Is a callable object
    pub fn is_callable(&self) -> bool {
        self.as_function().is_some()
    }

    /// Is a constructor
    pub fn is_constructor(&self) -> bool {
        self.as_function().is_some_and(NativeFunction::is_constructor)
    }

    /// Is a promise object
    pub fn is_promise(&self) -> bool {
        self.as_promise().is_some()
    }

    /// Get as object
    pub fn as_object(&self) -> Option<&Rc<JsObject>> {
        match self {
            Self::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Get as native function
    pub fn as_function(&self) -> Option<&NativeFunction> {
        self.as_object().and_then(|obj| obj.as_function())
    }

    /// Get the promise slot of a promise object
    pub fn as_promise(&self) -> Option<&JsPromise> {
        self.as_object().and_then(|obj| obj.as_promise())
    }

    /// Get as number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Get as string slice
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// `typeof` result
    pub fn type_of(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "object",
            Self::Boolean(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Object(obj) if obj.as_function().is_some() => "function",
            Self::Object(_) => "object",
        }
    }

    /// SameValue comparison (ES2026 §7.2.10)
    pub fn same_value(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => {
                if a.is_nan() && b.is_nan() {
                    return true;
                }
                a == b && a.is_sign_negative() == b.is_sign_negative()
            }
            _ => self == other,
        }
    }

    /// Human readable rendering, used for error messages and `Debug`
    pub fn to_display_string(&self) -> String {
        match self {
            Self::Undefined => "undefined".to_string(),
            Self::Null => "null".to_string(),
            Self::Boolean(b) => b.to_string(),
            Self::Number(n) => format_number(*n),
            Self::String(s) => s.to_string(),
            Self::Object(obj) => obj.describe(),
        }
    }
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let sign = if n > 0.0 { "" } else { "-" };
        format!("{sign}Infinity")
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Strict equality (`===`), with objects compared by identity
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String(s) => write!(f, "{:?}", s),
            other => f.write_str(&other.to_display_string()),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::string(s)
    }
}

impl From<Rc<JsObject>> for Value {
    fn from(obj: Rc<JsObject>) -> Self {
        Self::Object(obj)
    }
}
