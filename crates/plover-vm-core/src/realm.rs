//! Realm: the intrinsic objects native functions run against
//!
//! Initialization is two-stage: allocate the empty prototypes first so the
//! constructors can reference them, then populate properties once every
//! object exists.

use std::rc::Rc;

use crate::context::NativeContext;
use crate::error::VmResult;
use crate::function::NativeFunction;
use crate::intrinsics_impl;
use crate::object::{JsObject, ObjectKind, PropertyAttributes, PropertyDescriptor, PropertyKey};
use crate::value::Value;

const FUNCTION_META: PropertyAttributes = PropertyAttributes {
    writable: false,
    enumerable: false,
    configurable: true,
};

/// The intrinsics of one realm
pub struct Realm {
    /// `Object.prototype`: `[[Prototype]]` is `null`
    object_prototype: Rc<JsObject>,
    /// `Function.prototype`
    function_prototype: Rc<JsObject>,
    /// `Array.prototype`
    array_prototype: Rc<JsObject>,
    /// `Error.prototype`
    error_prototype: Rc<JsObject>,
    /// `TypeError.prototype`
    type_error_prototype: Rc<JsObject>,
    /// `RangeError.prototype`
    range_error_prototype: Rc<JsObject>,
    /// `AggregateError.prototype`
    aggregate_error_prototype: Rc<JsObject>,
    /// `Promise.prototype`
    promise_prototype: Rc<JsObject>,
    /// `%Promise%`
    promise_constructor: Rc<JsObject>,
}

impl Realm {
    /// Allocate and initialize a fresh set of intrinsics
    pub fn new() -> Self {
        let object_prototype = Rc::new(JsObject::new(None));
        let alloc = || Rc::new(JsObject::new(Some(object_prototype.clone())));

        let function_prototype = alloc();
        let array_prototype = alloc();
        let error_prototype = alloc();
        let promise_prototype = alloc();
        let error_subclass = || Rc::new(JsObject::new(Some(error_prototype.clone())));
        let type_error_prototype = error_subclass();
        let range_error_prototype = error_subclass();
        let aggregate_error_prototype = error_subclass();

        let promise_constructor =
            intrinsics_impl::promise::create_promise_constructor(function_prototype.clone());

        let realm = Self {
            object_prototype,
            function_prototype,
            array_prototype,
            error_prototype,
            type_error_prototype,
            range_error_prototype,
            aggregate_error_prototype,
            promise_prototype,
            promise_constructor,
        };

        realm.init_error_prototypes();
        intrinsics_impl::promise::init_promise_prototype(&realm);
        intrinsics_impl::promise::install_promise_statics(&realm);

        tracing::debug!("realm intrinsics initialized");
        realm
    }

    fn init_error_prototypes(&self) {
        for (proto, name) in [
            (&self.error_prototype, "Error"),
            (&self.type_error_prototype, "TypeError"),
            (&self.range_error_prototype, "RangeError"),
            (&self.aggregate_error_prototype, "AggregateError"),
        ] {
            proto.define_property(
                PropertyKey::string("name"),
                PropertyDescriptor::builtin_method(Value::string(name)),
            );
            proto.define_property(
                PropertyKey::string("message"),
                PropertyDescriptor::builtin_method(Value::string("")),
            );
        }
    }

    /// `Object.prototype`
    pub fn object_prototype(&self) -> &Rc<JsObject> {
        &self.object_prototype
    }

    /// `Function.prototype`
    pub fn function_prototype(&self) -> &Rc<JsObject> {
        &self.function_prototype
    }

    /// `Array.prototype`
    pub fn array_prototype(&self) -> &Rc<JsObject> {
        &self.array_prototype
    }

    /// `Promise.prototype`
    pub fn promise_prototype(&self) -> &Rc<JsObject> {
        &self.promise_prototype
    }

    /// `%Promise%`
    pub fn promise_constructor(&self) -> &Rc<JsObject> {
        &self.promise_constructor
    }

    /// `%Promise%` as a value
    pub fn promise_constructor_value(&self) -> Value {
        Value::object(self.promise_constructor.clone())
    }

    /// Is `value` this realm's `%Promise%`
    pub fn is_promise_constructor(&self, value: &Value) -> bool {
        value
            .as_object()
            .is_some_and(|obj| Rc::ptr_eq(obj, &self.promise_constructor))
    }

    /// Wrap a closure in a function object with `name` and `length`
    pub fn native_function<F>(&self, name: &str, length: u32, f: F) -> Value
    where
        F: Fn(&Value, &[Value], &mut NativeContext<'_>) -> VmResult<Value> + 'static,
    {
        Value::object(self.function_object(NativeFunction::new(name, length, f)))
    }

    pub(crate) fn function_object(&self, function: NativeFunction) -> Rc<JsObject> {
        function_object(function, self.function_prototype.clone())
    }

    /// Create an array with `Array.prototype` as its prototype
    pub fn create_array(&self, values: Vec<Value>) -> Rc<JsObject> {
        Rc::new(JsObject::array(values, Some(self.array_prototype.clone())))
    }

    /// Create a plain object with `Object.prototype` as its prototype
    pub fn create_object(&self) -> Rc<JsObject> {
        Rc::new(JsObject::new(Some(self.object_prototype.clone())))
    }

    /// Create an error instance of the named native error type
    pub fn create_error(&self, name: &str, message: &str) -> Value {
        let proto = match name {
            "TypeError" => &self.type_error_prototype,
            "RangeError" => &self.range_error_prototype,
            "AggregateError" => &self.aggregate_error_prototype,
            _ => &self.error_prototype,
        };
        let obj = Rc::new(JsObject::with_kind(ObjectKind::Error, Some(proto.clone())));
        obj.define_property(
            PropertyKey::string("name"),
            PropertyDescriptor::builtin_method(Value::string(name)),
        );
        obj.define_property(
            PropertyKey::string("message"),
            PropertyDescriptor::builtin_method(Value::string(message)),
        );
        Value::object(obj)
    }

    /// Create an `AggregateError` carrying `errors` as a non-enumerable array
    pub fn create_aggregate_error(&self, errors: Vec<Value>, message: &str) -> Value {
        let error = self.create_error("AggregateError", message);
        if let Some(obj) = error.as_object() {
            obj.define_property(
                PropertyKey::string("errors"),
                PropertyDescriptor::builtin_method(Value::object(self.create_array(errors))),
            );
        }
        error
    }
}

pub(crate) fn function_object(function: NativeFunction, prototype: Rc<JsObject>) -> Rc<JsObject> {
    let name = Value::string(function.name());
    let length = Value::number(f64::from(function.length()));
    let obj = Rc::new(JsObject::with_kind(
        ObjectKind::Function(function),
        Some(prototype),
    ));
    obj.define_property(
        PropertyKey::string("length"),
        PropertyDescriptor::data_with_attrs(length, FUNCTION_META),
    );
    obj.define_property(
        PropertyKey::string("name"),
        PropertyDescriptor::data_with_attrs(name, FUNCTION_META),
    );
    obj
}

impl Default for Realm {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Realm {
    fn drop(&mut self) {
        // Constructor and prototype point at each other.
        for obj in [
            &self.promise_constructor,
            &self.promise_prototype,
            &self.function_prototype,
            &self.array_prototype,
            &self.error_prototype,
            &self.type_error_prototype,
            &self.range_error_prototype,
            &self.aggregate_error_prototype,
            &self.object_prototype,
        ] {
            obj.clear();
        }
    }
}

impl std::fmt::Debug for Realm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Realm").finish_non_exhaustive()
    }
}
