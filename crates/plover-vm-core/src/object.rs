//! JavaScript objects
//!
//! Objects own a property map plus, for arrays, a dense element vector.
//! Interior mutability is `RefCell`/`Cell`: objects never leave the thread
//! that created them. Operations that may run user code (getters, setters)
//! live in [`crate::operations`]; this module only manipulates own storage.

use rustc_hash::FxHashMap;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::function::NativeFunction;
use crate::promise::{JsPromise, PromiseState};
use crate::value::Value;

/// Property key (string or array index)
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    /// String property key
    String(Rc<str>),
    /// Integer index (for arrays)
    Index(u32),
}

impl PropertyKey {
    /// Create a string property key
    pub fn string(s: &str) -> Self {
        Self::String(Rc::from(s))
    }

    /// Create an index property key
    pub fn index(i: u32) -> Self {
        Self::Index(i)
    }

    fn is_length(&self) -> bool {
        matches!(self, Self::String(s) if &**s == "length")
    }
}

impl From<&str> for PropertyKey {
    fn from(s: &str) -> Self {
        Self::string(s)
    }
}

impl From<u32> for PropertyKey {
    fn from(i: u32) -> Self {
        Self::Index(i)
    }
}

impl std::fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Index(i) => write!(f, "{}", i),
        }
    }
}

/// Property attributes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PropertyAttributes {
    /// Property is writable
    pub writable: bool,
    /// Property is enumerable
    pub enumerable: bool,
    /// Property is configurable
    pub configurable: bool,
}

impl PropertyAttributes {
    /// Default data property attributes
    pub const fn data() -> Self {
        Self {
            writable: true,
            enumerable: true,
            configurable: true,
        }
    }

    /// Attributes of built-in methods: writable, configurable, not enumerable
    pub const fn builtin_method() -> Self {
        Self {
            writable: true,
            enumerable: false,
            configurable: true,
        }
    }

    /// Non-writable, non-enumerable, non-configurable
    pub const fn frozen() -> Self {
        Self {
            writable: false,
            enumerable: false,
            configurable: false,
        }
    }
}

/// Property descriptor
#[derive(Clone, Debug)]
pub enum PropertyDescriptor {
    /// Data property
    Data {
        /// The value
        value: Value,
        /// Attributes
        attributes: PropertyAttributes,
    },
    /// Accessor property
    Accessor {
        /// Getter function
        get: Option<Value>,
        /// Setter function
        set: Option<Value>,
        /// Attributes
        attributes: PropertyAttributes,
    },
}

impl PropertyDescriptor {
    /// Create a data property
    pub fn data(value: Value) -> Self {
        Self::Data {
            value,
            attributes: PropertyAttributes::data(),
        }
    }

    /// Create a data property with specific attributes
    pub fn data_with_attrs(value: Value, attributes: PropertyAttributes) -> Self {
        Self::Data { value, attributes }
    }

    /// Built-in method property (non-enumerable)
    pub fn builtin_method(value: Value) -> Self {
        Self::data_with_attrs(value, PropertyAttributes::builtin_method())
    }

    /// Create an accessor property
    pub fn accessor(get: Option<Value>, set: Option<Value>) -> Self {
        Self::Accessor {
            get,
            set,
            attributes: PropertyAttributes {
                writable: false,
                enumerable: true,
                configurable: true,
            },
        }
    }

    /// Get the value (for data properties)
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Data { value, .. } => Some(value),
            Self::Accessor { .. } => None,
        }
    }

    /// Check if writable
    pub fn is_writable(&self) -> bool {
        match self {
            Self::Data { attributes, .. } => attributes.writable,
            Self::Accessor { .. } => false,
        }
    }
}

/// Internal slots that distinguish exotic and built-in objects
pub enum ObjectKind {
    /// Plain object
    Ordinary,
    /// Array exotic object; indexed elements live in the element vector
    Array,
    /// Native function object
    Function(NativeFunction),
    /// Promise instance (`[[PromiseState]]` and reaction lists)
    Promise(JsPromise),
    /// Error instance (`[[ErrorData]]`)
    Error,
}

/// A JavaScript object
pub struct JsObject {
    kind: ObjectKind,
    /// Properties storage
    properties: RefCell<FxHashMap<PropertyKey, PropertyDescriptor>>,
    /// Array elements (arrays only)
    elements: RefCell<Vec<Value>>,
    /// Prototype (None for the root of the chain)
    prototype: RefCell<Option<Rc<JsObject>>>,
    extensible: Cell<bool>,
}

impl JsObject {
    /// Create a new empty object
    pub fn new(prototype: Option<Rc<JsObject>>) -> Self {
        Self::with_kind(ObjectKind::Ordinary, prototype)
    }

    /// Create an object carrying the given internal slots
    pub fn with_kind(kind: ObjectKind, prototype: Option<Rc<JsObject>>) -> Self {
        Self {
            kind,
            properties: RefCell::new(FxHashMap::default()),
            elements: RefCell::new(Vec::new()),
            prototype: RefCell::new(prototype),
            extensible: Cell::new(true),
        }
    }

    /// Create a new array holding `values`
    pub fn array(values: Vec<Value>, prototype: Option<Rc<JsObject>>) -> Self {
        let obj = Self::with_kind(ObjectKind::Array, prototype);
        *obj.elements.borrow_mut() = values;
        obj
    }

    /// Internal slots
    pub fn kind(&self) -> &ObjectKind {
        &self.kind
    }

    /// Get the native function slot
    pub fn as_function(&self) -> Option<&NativeFunction> {
        match &self.kind {
            ObjectKind::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Get the promise slot
    pub fn as_promise(&self) -> Option<&JsPromise> {
        match &self.kind {
            ObjectKind::Promise(p) => Some(p),
            _ => None,
        }
    }

    /// Check if object is an array
    pub fn is_array(&self) -> bool {
        matches!(self.kind, ObjectKind::Array)
    }

    /// Check if object carries `[[ErrorData]]`
    pub fn is_error(&self) -> bool {
        matches!(self.kind, ObjectKind::Error)
    }

    /// Get own property descriptor, without invoking accessors
    pub fn get_own_property(&self, key: &PropertyKey) -> Option<PropertyDescriptor> {
        if let Some(desc) = self.properties.borrow().get(key) {
            return Some(desc.clone());
        }

        if self.is_array() {
            if let PropertyKey::Index(i) = key {
                return self
                    .elements
                    .borrow()
                    .get(*i as usize)
                    .map(|v| PropertyDescriptor::data(v.clone()));
            }
            if key.is_length() {
                let len = self.array_length() as f64;
                return Some(PropertyDescriptor::data_with_attrs(
                    Value::number(len),
                    PropertyAttributes {
                        writable: true,
                        enumerable: false,
                        configurable: false,
                    },
                ));
            }
        }

        None
    }

    /// Own data value, `None` for missing or accessor properties
    pub fn get_own_data(&self, key: &PropertyKey) -> Option<Value> {
        self.get_own_property(key).and_then(|d| d.value().cloned())
    }

    /// Check if object has own property
    pub fn has_own(&self, key: &PropertyKey) -> bool {
        self.get_own_property(key).is_some()
    }

    /// Define a property with descriptor.
    ///
    /// Returns false when the object is not extensible and the key is new.
    pub fn define_property(&self, key: PropertyKey, desc: PropertyDescriptor) -> bool {
        if !self.extensible.get() && !self.has_own(&key) {
            return false;
        }

        if self.is_array() {
            if let PropertyKey::Index(i) = key {
                let idx = i as usize;
                let mut elements = self.elements.borrow_mut();
                if elements.len() <= idx {
                    elements.resize(idx + 1, Value::undefined());
                }
                match desc {
                    PropertyDescriptor::Data { value, .. } => {
                        elements[idx] = value;
                        drop(elements);
                        self.properties.borrow_mut().remove(&key);
                    }
                    accessor @ PropertyDescriptor::Accessor { .. } => {
                        drop(elements);
                        self.properties.borrow_mut().insert(key, accessor);
                    }
                }
                return true;
            }
            if key.is_length() {
                return match desc.value().and_then(Value::as_number) {
                    Some(len) => self.set_array_length(len),
                    None => false,
                };
            }
        }

        self.properties.borrow_mut().insert(key, desc);
        true
    }

    fn set_array_length(&self, len: f64) -> bool {
        if len < 0.0 || len.fract() != 0.0 || len > f64::from(u32::MAX) {
            return false;
        }
        let new_len = len as usize;
        let mut elements = self.elements.borrow_mut();
        if new_len > elements.len() && !self.extensible.get() {
            return false;
        }
        elements.resize(new_len, Value::undefined());
        drop(elements);
        self.properties
            .borrow_mut()
            .retain(|k, _| !matches!(k, PropertyKey::Index(i) if *i as usize >= new_len));
        true
    }

    /// Get prototype
    pub fn prototype(&self) -> Option<Rc<JsObject>> {
        self.prototype.borrow().clone()
    }

    /// Make the object non-extensible
    pub fn prevent_extensions(&self) {
        self.extensible.set(false);
    }

    /// Get array length (for arrays)
    pub fn array_length(&self) -> usize {
        self.elements.borrow().len()
    }

    /// Snapshot of the element vector (arrays only; accessor elements are
    /// not invoked and read as their placeholder)
    pub fn array_elements(&self) -> Vec<Value> {
        self.elements.borrow().clone()
    }

    /// Drop every property, element and prototype link.
    ///
    /// Intrinsics reference each other (`Promise.prototype.constructor`),
    /// so the realm clears them on teardown.
    pub fn clear(&self) {
        self.properties.borrow_mut().clear();
        self.elements.borrow_mut().clear();
        self.prototype.borrow_mut().take();
    }

    /// Short rendering used by `Value::to_display_string`
    pub fn describe(&self) -> String {
        match &self.kind {
            ObjectKind::Ordinary => "[object Object]".to_string(),
            ObjectKind::Array => {
                let parts: Vec<String> = self
                    .elements
                    .borrow()
                    .iter()
                    .map(Value::to_display_string)
                    .collect();
                format!("[{}]", parts.join(", "))
            }
            ObjectKind::Function(f) => format!("[Function: {}]", f.name()),
            ObjectKind::Promise(p) => match p.state() {
                PromiseState::Pending => "Promise { <pending> }".to_string(),
                PromiseState::Fulfilled(v) => {
                    format!("Promise {{ <fulfilled>: {} }}", v.to_display_string())
                }
                PromiseState::Rejected(v) => {
                    format!("Promise {{ <rejected>: {} }}", v.to_display_string())
                }
            },
            ObjectKind::Error => {
                let field = |name: &str| {
                    self.get_own_data(&PropertyKey::string(name))
                        .map(|v| v.to_display_string())
                        .unwrap_or_default()
                };
                format!("{}: {}", field("name"), field("message"))
            }
        }
    }
}

impl std::fmt::Debug for JsObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let props = self.properties.borrow();
        f.debug_struct("JsObject")
            .field("kind", &self.describe())
            .field("properties", &props.len())
            .field("is_array", &self.is_array())
            .finish()
    }
}
