//! Abstract operations on objects (ES2026 §7.3)
//!
//! These may run user code through accessors, so every one of them is
//! fallible and takes the native context.

use std::rc::Rc;

use crate::context::NativeContext;
use crate::error::{VmError, VmResult};
use crate::object::{JsObject, PropertyDescriptor, PropertyKey};
use crate::value::Value;

/// `Get(O, P)`: walks the prototype chain and invokes getters with `O` as receiver
pub fn get(ncx: &mut NativeContext<'_>, obj: &Rc<JsObject>, key: &PropertyKey) -> VmResult<Value> {
    let receiver = Value::object(obj.clone());
    let mut current = Some(obj.clone());
    while let Some(target) = current {
        match target.get_own_property(key) {
            Some(PropertyDescriptor::Data { value, .. }) => return Ok(value),
            Some(PropertyDescriptor::Accessor { get: Some(getter), .. }) => {
                return ncx.call_function(&getter, &receiver, &[]);
            }
            Some(PropertyDescriptor::Accessor { get: None, .. }) => return Ok(Value::undefined()),
            None => current = target.prototype(),
        }
    }
    Ok(Value::undefined())
}

/// `GetV(V, P)`: property read on an arbitrary value
pub fn get_value(ncx: &mut NativeContext<'_>, value: &Value, key: &PropertyKey) -> VmResult<Value> {
    match value {
        Value::Object(obj) => get(ncx, obj, key),
        Value::Undefined | Value::Null => Err(VmError::type_error(format!(
            "Cannot read properties of {} (reading '{}')",
            value.to_display_string(),
            key
        ))),
        _ => Ok(Value::undefined()),
    }
}

/// `CreateDataPropertyOrThrow(O, P, V)`
pub fn create_data_property_or_throw(
    obj: &Rc<JsObject>,
    key: PropertyKey,
    value: Value,
) -> VmResult<()> {
    if let Some(existing) = obj.get_own_property(&key) {
        let configurable = match existing {
            PropertyDescriptor::Data { attributes, .. }
            | PropertyDescriptor::Accessor { attributes, .. } => attributes.configurable,
        };
        if !configurable && !existing.is_writable() {
            return Err(VmError::type_error(format!("Cannot redefine property: {}", key)));
        }
    }
    if obj.define_property(key.clone(), PropertyDescriptor::data(value)) {
        Ok(())
    } else {
        Err(VmError::type_error(format!(
            "Cannot define property {}, object is not extensible",
            key
        )))
    }
}

/// `Invoke(V, P, args)`
pub fn invoke(
    ncx: &mut NativeContext<'_>,
    target: &Value,
    name: &str,
    args: &[Value],
) -> VmResult<Value> {
    let method = get_value(ncx, target, &PropertyKey::string(name))?;
    ncx.call_function(&method, target, args)
}

/// `LengthOfArrayLike(O)`: reads `length` once and clamps it to an index range
pub fn length_of_array_like(ncx: &mut NativeContext<'_>, obj: &Rc<JsObject>) -> VmResult<u32> {
    let len = get(ncx, obj, &PropertyKey::string("length"))?;
    let n = match len {
        Value::Number(n) => n,
        Value::Undefined | Value::Null => 0.0,
        Value::Boolean(b) => f64::from(u8::from(b)),
        Value::String(ref s) => s.trim().parse::<f64>().unwrap_or(f64::NAN),
        Value::Object(_) => {
            return Err(VmError::type_error("Cannot convert object to array length"));
        }
    };
    if n.is_nan() || n <= 0.0 {
        return Ok(0);
    }
    Ok(n.min(f64::from(u32::MAX)).trunc() as u32)
}

/// `SameValue(a, b)` on objects: both must be the same allocation
pub fn same_object(a: &Value, b: &Value) -> bool {
    match (a.as_object(), b.as_object()) {
        (Some(a), Some(b)) => Rc::ptr_eq(a, b),
        _ => false,
    }
}
