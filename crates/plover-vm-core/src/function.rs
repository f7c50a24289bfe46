//! Native function objects
//!
//! Every callable in Plover is a Rust closure. Per-callback state (element
//! index, shared counters, capabilities) is captured by the closure itself.

use std::rc::Rc;

use crate::context::NativeContext;
use crate::error::VmResult;
use crate::value::Value;

/// Native function behavior: `(this, args, ncx) -> result`.
///
/// For `[[Construct]]` behaviors the first argument is `new.target`.
pub type NativeFn = Rc<dyn Fn(&Value, &[Value], &mut NativeContext<'_>) -> VmResult<Value>>;

/// The `[[Call]]` and optional `[[Construct]]` slots of a function object
#[derive(Clone)]
pub struct NativeFunction {
    name: Rc<str>,
    length: u32,
    call: NativeFn,
    construct: Option<NativeFn>,
}

impl NativeFunction {
    /// Create a plain (non-constructor) function
    pub fn new<F>(name: &str, length: u32, call: F) -> Self
    where
        F: Fn(&Value, &[Value], &mut NativeContext<'_>) -> VmResult<Value> + 'static,
    {
        Self {
            name: Rc::from(name),
            length,
            call: Rc::new(call),
            construct: None,
        }
    }

    /// Attach a `[[Construct]]` behavior
    pub fn with_construct<F>(mut self, construct: F) -> Self
    where
        F: Fn(&Value, &[Value], &mut NativeContext<'_>) -> VmResult<Value> + 'static,
    {
        self.construct = Some(Rc::new(construct));
        self
    }

    /// Function name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared parameter count
    pub fn length(&self) -> u32 {
        self.length
    }

    /// Has a `[[Construct]]` slot
    pub fn is_constructor(&self) -> bool {
        self.construct.is_some()
    }

    pub(crate) fn call_behavior(&self) -> NativeFn {
        Rc::clone(&self.call)
    }

    pub(crate) fn construct_behavior(&self) -> Option<NativeFn> {
        self.construct.clone()
    }
}

impl std::fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .field("length", &self.length)
            .field("constructor", &self.is_constructor())
            .finish()
    }
}
