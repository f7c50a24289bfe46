//! Promise constructor and prototype methods (ES2026)
//!
//! ## Constructor statics:
//! - `Promise.resolve(value)` (§27.2.4.7)
//! - `Promise.reject(reason)` (§27.2.4.6)
//! - `Promise.all(items)` (§27.2.4.1)
//! - `Promise.race(items)` (§27.2.4.5)
//! - `Promise.allSettled(items)` (§27.2.4.2)
//! - `Promise.any(items)` (§27.2.4.3)
//! - `Promise.withResolvers()` (ES2024)
//!
//! ## Prototype methods:
//! - `Promise.prototype.then(onFulfilled, onRejected)` (§27.2.5.4)
//! - `Promise.prototype.catch(onRejected)` (§27.2.5.1)
//! - `Promise.prototype.finally(onFinally)` (§27.2.5.3)
//!
//! Combinator inputs must be arrays; see [`crate::combinator`].

use std::rc::Rc;

use crate::combinator::{self, CombinatorKind};
use crate::context::NativeContext;
use crate::error::{VmError, VmResult};
use crate::function::NativeFunction;
use crate::object::{JsObject, PropertyAttributes, PropertyDescriptor, PropertyKey};
use crate::operations;
use crate::promise::{
    create_resolving_functions, new_promise_capability, perform_then, promise_from_constructor,
    promise_resolve,
};
use crate::realm::{self, Realm};
use crate::value::Value;

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or_default()
}

// ============================================================================
// Promise constructor
// ============================================================================

/// Create the `%Promise%` function object.
///
/// `[[Call]]` throws; `[[Construct]]` runs the executor with fresh
/// resolving functions and turns an executor throw into a rejection.
pub fn create_promise_constructor(fn_proto: Rc<JsObject>) -> Rc<JsObject> {
    let function = NativeFunction::new("Promise", 1, |_this, _args, _ncx| {
        Err(VmError::type_error(
            "Promise constructor cannot be invoked without 'new'",
        ))
    })
    .with_construct(|new_target, args, ncx| {
        let executor = arg(args, 0);
        if !executor.is_callable() {
            return Err(VmError::type_error(format!(
                "Promise resolver {} is not a function",
                executor.to_display_string()
            )));
        }

        let promise = promise_from_constructor(ncx, new_target)?;
        let (resolve, reject) = create_resolving_functions(ncx.realm(), &promise);
        if let Err(err) = ncx.call_function(&executor, &Value::undefined(), &[resolve, reject.clone()]) {
            let reason = err.into_value(ncx.realm());
            ncx.call_function(&reject, &Value::undefined(), &[reason])?;
        }
        Ok(Value::object(promise))
    });
    realm::function_object(function, fn_proto)
}

fn define_method<F>(realm: &Realm, target: &Rc<JsObject>, name: &str, length: u32, f: F)
where
    F: Fn(&Value, &[Value], &mut NativeContext<'_>) -> VmResult<Value> + 'static,
{
    target.define_property(
        PropertyKey::string(name),
        PropertyDescriptor::builtin_method(realm.native_function(name, length, f)),
    );
}

// ============================================================================
// Promise.prototype methods
// ============================================================================

/// Install `constructor`, `then`, `catch`, `finally` on Promise.prototype
/// and link `Promise.prototype`.
pub fn init_promise_prototype(realm: &Realm) {
    let proto = realm.promise_prototype();
    let ctor = realm.promise_constructor();

    ctor.define_property(
        PropertyKey::string("prototype"),
        PropertyDescriptor::data_with_attrs(
            Value::object(proto.clone()),
            PropertyAttributes::frozen(),
        ),
    );
    proto.define_property(
        PropertyKey::string("constructor"),
        PropertyDescriptor::builtin_method(Value::object(ctor.clone())),
    );

    // Promise.prototype.then(onFulfilled, onRejected) (§27.2.5.4)
    define_method(realm, proto, "then", 2, |this_val, args, ncx| {
        let Some(promise) = this_val.as_object().filter(|obj| obj.as_promise().is_some()) else {
            return Err(VmError::type_error(
                "Method Promise.prototype.then called on incompatible receiver",
            ));
        };
        let promise = promise.clone();
        let ctor = ncx.realm().promise_constructor_value();
        let capability = new_promise_capability(ncx, &ctor)?;
        perform_then(ncx, &promise, arg(args, 0), arg(args, 1), Some(capability))
    });

    // Promise.prototype.catch(onRejected) (§27.2.5.1)
    define_method(realm, proto, "catch", 1, |this_val, args, ncx| {
        operations::invoke(ncx, this_val, "then", &[Value::undefined(), arg(args, 0)])
    });

    // Promise.prototype.finally(onFinally) (§27.2.5.3)
    define_method(realm, proto, "finally", 1, |this_val, args, ncx| {
        if !this_val.is_object() {
            return Err(VmError::type_error(
                "Method Promise.prototype.finally called on non-object",
            ));
        }
        let on_finally = arg(args, 0);
        if !on_finally.is_callable() {
            return operations::invoke(ncx, this_val, "then", &[on_finally.clone(), on_finally]);
        }

        let realm = ncx.realm();
        let then_finally = {
            let on_finally = on_finally.clone();
            realm.native_function("", 1, move |_this, args, ncx| {
                let value = arg(args, 0);
                let settled = run_on_finally(ncx, &on_finally)?;
                let value_thunk =
                    ncx.realm()
                        .native_function("", 0, move |_this, _args, _ncx| Ok(value.clone()));
                operations::invoke(ncx, &settled, "then", &[value_thunk])
            })
        };
        let catch_finally = realm.native_function("", 1, move |_this, args, ncx| {
            let reason = arg(args, 0);
            let settled = run_on_finally(ncx, &on_finally)?;
            let thrower = ncx.realm().native_function("", 0, move |_this, _args, _ncx| {
                Err(VmError::exception(reason.clone()))
            });
            operations::invoke(ncx, &settled, "then", &[thrower])
        });
        operations::invoke(ncx, this_val, "then", &[then_finally, catch_finally])
    });
}

/// Call `onFinally()` and coerce its result to a promise
fn run_on_finally(ncx: &mut NativeContext<'_>, on_finally: &Value) -> VmResult<Value> {
    let result = ncx.call_function(on_finally, &Value::undefined(), &[])?;
    let ctor = ncx.realm().promise_constructor_value();
    promise_resolve(ncx, &ctor, result)
}

// ============================================================================
// Promise constructor statics
// ============================================================================

/// Install static methods on the Promise constructor object.
pub fn install_promise_statics(realm: &Realm) {
    let ctor = realm.promise_constructor();

    // Promise.resolve(value) (§27.2.4.7)
    define_method(realm, ctor, "resolve", 1, |this_val, args, ncx| {
        combinator::require_intrinsic_constructor(ncx.realm(), this_val, "resolve")?;
        promise_resolve(ncx, this_val, arg(args, 0))
    });

    // Promise.reject(reason) (§27.2.4.6)
    define_method(realm, ctor, "reject", 1, |this_val, args, ncx| {
        combinator::require_intrinsic_constructor(ncx.realm(), this_val, "reject")?;
        let capability = new_promise_capability(ncx, this_val)?;
        ncx.call_function(&capability.reject, &Value::undefined(), &[arg(args, 0)])?;
        Ok(capability.promise)
    });

    for kind in [
        CombinatorKind::All,
        CombinatorKind::Race,
        CombinatorKind::AllSettled,
        CombinatorKind::Any,
    ] {
        define_method(realm, ctor, kind.name(), 1, move |this_val, args, ncx| {
            combinator::dispatch(ncx, kind, this_val, &arg(args, 0))
        });
    }

    // Promise.withResolvers() (ES2024)
    define_method(realm, ctor, "withResolvers", 0, |this_val, _args, ncx| {
        combinator::require_intrinsic_constructor(ncx.realm(), this_val, "withResolvers")?;
        let capability = new_promise_capability(ncx, this_val)?;
        let result = ncx.realm().create_object();
        operations::create_data_property_or_throw(&result, "promise".into(), capability.promise)?;
        operations::create_data_property_or_throw(&result, "resolve".into(), capability.resolve)?;
        operations::create_data_property_or_throw(&result, "reject".into(), capability.reject)?;
        Ok(Value::object(result))
    });
}
