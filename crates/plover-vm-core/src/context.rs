//! Native execution context
//!
//! `NativeContext` is what every native function receives: access to the
//! realm's intrinsics, the promise job queue, and the generic call and
//! construct mechanism.

use crate::error::{VmError, VmResult};
use crate::promise::JsPromiseJob;
use crate::realm::Realm;
use crate::value::Value;

/// Default limit on nested native calls
pub const DEFAULT_MAX_NATIVE_DEPTH: usize = 256;

/// Sink for promise jobs.
///
/// Implemented by the runtime's FIFO job queue. Enqueueing never runs the
/// job: reactions always execute on a later queue turn.
pub trait JsJobQueueTrait {
    /// Append a job to the queue
    fn enqueue(&self, job: JsPromiseJob);
}

/// Context passed to native functions
pub struct NativeContext<'a> {
    realm: &'a Realm,
    jobs: &'a dyn JsJobQueueTrait,
    depth: usize,
    max_depth: usize,
}

impl<'a> NativeContext<'a> {
    /// Create a context over a realm and a job queue
    pub fn new(realm: &'a Realm, jobs: &'a dyn JsJobQueueTrait) -> Self {
        Self {
            realm,
            jobs,
            depth: 0,
            max_depth: DEFAULT_MAX_NATIVE_DEPTH,
        }
    }

    /// Override the nested call limit
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// The realm whose intrinsics native functions use
    pub fn realm(&self) -> &'a Realm {
        self.realm
    }

    /// Current nested call depth
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Enqueue a promise job
    pub fn enqueue_js_job(&self, job: JsPromiseJob) {
        tracing::trace!(kind = ?job.kind, "enqueue promise job");
        self.jobs.enqueue(job);
    }

    /// `Call(F, V, args)` (ES2026 §7.3.14)
    pub fn call_function(&mut self, callee: &Value, this: &Value, args: &[Value]) -> VmResult<Value> {
        let Some(function) = callee.as_function() else {
            return Err(VmError::type_error(format!(
                "{} is not a function",
                callee.to_display_string()
            )));
        };
        let behavior = function.call_behavior();
        self.enter()?;
        let result = behavior(this, args, self);
        self.depth -= 1;
        result
    }

    /// `Construct(F, args, newTarget)` (ES2026 §7.3.15)
    pub fn construct(
        &mut self,
        callee: &Value,
        args: &[Value],
        new_target: Option<&Value>,
    ) -> VmResult<Value> {
        let Some(behavior) = callee.as_function().and_then(|f| f.construct_behavior()) else {
            return Err(VmError::type_error(format!(
                "{} is not a constructor",
                callee.to_display_string()
            )));
        };
        let new_target = new_target.unwrap_or(callee).clone();
        self.enter()?;
        let result = behavior(&new_target, args, self);
        self.depth -= 1;
        result
    }

    fn enter(&mut self) -> VmResult<()> {
        if self.depth >= self.max_depth {
            return Err(VmError::StackOverflow);
        }
        self.depth += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct VecQueue(RefCell<Vec<JsPromiseJob>>);

    impl JsJobQueueTrait for VecQueue {
        fn enqueue(&self, job: JsPromiseJob) {
            self.0.borrow_mut().push(job);
        }
    }

    #[test]
    fn test_call_non_function_is_type_error() {
        let realm = Realm::new();
        let queue = VecQueue::default();
        let mut ncx = NativeContext::new(&realm, &queue);
        let err = ncx
            .call_function(&Value::number(1.0), &Value::undefined(), &[])
            .unwrap_err();
        assert!(err.is_type_error());
    }

    #[test]
    fn test_recursion_limit() {
        let realm = Realm::new();
        let queue = VecQueue::default();
        let recurse = realm.native_function("recurse", 0, |this, _args, ncx| {
            ncx.call_function(this, this, &[])
        });
        let mut ncx = NativeContext::new(&realm, &queue).with_max_depth(8);
        let err = ncx.call_function(&recurse, &recurse, &[]).unwrap_err();
        assert!(matches!(err, VmError::StackOverflow));
        assert_eq!(ncx.depth(), 0);
    }
}
