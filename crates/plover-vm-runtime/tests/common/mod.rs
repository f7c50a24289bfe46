//! Shared helpers for runtime integration tests

#![allow(dead_code)]

use plover_vm_runtime::{Plover, PromiseState, Value};
use tracing_subscriber::filter::EnvFilter;

/// Install a test-friendly subscriber once; `RUST_LOG` selects the level
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A runtime with tracing installed
pub fn plover() -> Plover {
    init_tracing();
    Plover::new()
}

/// The fulfillment value, panicking on any other state
pub fn fulfilled(plover: &Plover, promise: &Value) -> Value {
    match plover.promise_state(promise) {
        Some(PromiseState::Fulfilled(value)) => value,
        other => panic!("expected fulfilled promise, got {other:?}"),
    }
}

/// The rejection reason, panicking on any other state
pub fn rejected(plover: &Plover, promise: &Value) -> Value {
    match plover.promise_state(promise) {
        Some(PromiseState::Rejected(reason)) => reason,
        other => panic!("expected rejected promise, got {other:?}"),
    }
}

/// Assert the promise is still pending
pub fn assert_pending(plover: &Plover, promise: &Value) {
    assert_eq!(plover.promise_state(promise), Some(PromiseState::Pending));
}

/// Elements of an array value
pub fn elements(value: &Value) -> Vec<Value> {
    value
        .as_object()
        .filter(|obj| obj.is_array())
        .map(|obj| obj.array_elements())
        .unwrap_or_else(|| panic!("expected array, got {value:?}"))
}

/// `error.name` of an error object
pub fn error_name(plover: &Plover, error: &Value) -> String {
    plover
        .get(error, "name")
        .ok()
        .and_then(|name| name.as_str().map(str::to_string))
        .unwrap_or_default()
}

/// A function that appends `label: <arg>` to `log`
pub fn logger(
    plover: &Plover,
    log: &std::rc::Rc<std::cell::RefCell<Vec<String>>>,
    label: &'static str,
) -> Value {
    let log = log.clone();
    plover.native_function(label, 1, move |_this, args, _ncx| {
        let arg = args.first().cloned().unwrap_or_default();
        log.borrow_mut()
            .push(format!("{label}: {}", arg.to_display_string()));
        Ok(Value::undefined())
    })
}
