//! Plover - the embeddable runtime
//!
//! Owns a realm and an event loop. Host code drives it by calling Promise
//! statics, scheduling settlements on the virtual clock, and running the
//! loop:
//!
//! ```ignore
//! let plover = Plover::new();
//! let a = plover.fulfill_at(3, Value::int32(1))?;
//! let b = plover.fulfill_at(1, Value::int32(2))?;
//! let all = plover.call_static("all", &[plover.create_array(vec![a, b])])?;
//! plover.run_until_idle()?;
//! assert!(matches!(plover.promise_state(&all), Some(PromiseState::Fulfilled(_))));
//! ```

use thiserror::Error;

use plover_vm_core::context::NativeContext;
use plover_vm_core::error::{VmError, VmResult};
use plover_vm_core::object::PropertyKey;
use plover_vm_core::operations;
use plover_vm_core::promise::{PromiseCapability, PromiseState, new_promise_capability};
use plover_vm_core::realm::Realm;
use plover_vm_core::value::Value;

use crate::builder::PloverBuilder;
use crate::config::RuntimeConfig;
use crate::event_loop::EventLoop;
use crate::timer::TimerId;

/// Errors surfaced to the embedder
#[derive(Debug, Error)]
pub enum PloverError {
    /// A JS-level error escaped to the host
    #[error(transparent)]
    Vm(#[from] VmError),

    /// A drain ran more jobs than the configured limit
    #[error("job drain exceeded {limit} jobs")]
    JobLimitExceeded {
        /// Configured `max_jobs_per_drain`
        limit: usize,
    },

    /// A timer was scheduled past the configured tick limit
    #[error("timer scheduled beyond tick {limit}")]
    TickLimitExceeded {
        /// Configured `max_ticks`
        limit: u64,
    },

    /// Invalid configuration
    #[error("invalid runtime configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// `Promise` has no such static method
    #[error("Promise.{0} is not a function")]
    UnknownStatic(String),
}

/// Embeddable Promise runtime
pub struct Plover {
    event_loop: EventLoop,
    realm: Realm,
}

impl Plover {
    /// Create a runtime with the default configuration
    pub fn new() -> Self {
        PloverBuilder::new().build()
    }

    pub(crate) fn with_config(config: RuntimeConfig) -> Self {
        tracing::debug!(?config, "creating runtime");
        Self {
            event_loop: EventLoop::new(config),
            realm: Realm::new(),
        }
    }

    /// The realm holding the intrinsics
    pub fn realm(&self) -> &Realm {
        &self.realm
    }

    /// The event loop
    pub fn event_loop(&self) -> &EventLoop {
        &self.event_loop
    }

    /// Active configuration
    pub fn config(&self) -> &RuntimeConfig {
        self.event_loop.config()
    }

    /// Current virtual tick
    pub fn current_tick(&self) -> u64 {
        self.event_loop.now()
    }

    /// Run `f` with a native context bound to this runtime
    pub fn with_context<R>(&self, f: impl FnOnce(&mut NativeContext<'_>) -> R) -> R {
        let mut ncx = self.event_loop.context(&self.realm);
        f(&mut ncx)
    }

    /// `%Promise%`
    pub fn promise_constructor(&self) -> Value {
        self.realm.promise_constructor_value()
    }

    /// Create an array value
    pub fn create_array(&self, values: Vec<Value>) -> Value {
        Value::object(self.realm.create_array(values))
    }

    /// Wrap a closure in a function object
    pub fn native_function<F>(&self, name: &str, length: u32, f: F) -> Value
    where
        F: Fn(&Value, &[Value], &mut NativeContext<'_>) -> VmResult<Value> + 'static,
    {
        self.realm.native_function(name, length, f)
    }

    /// Call `Promise[name](...args)` with `Promise` as the receiver
    pub fn call_static(&self, name: &str, args: &[Value]) -> Result<Value, PloverError> {
        let receiver = self.promise_constructor();
        self.call_static_with_receiver(name, &receiver, args)
    }

    /// Call a Promise static with an arbitrary receiver
    pub fn call_static_with_receiver(
        &self,
        name: &str,
        receiver: &Value,
        args: &[Value],
    ) -> Result<Value, PloverError> {
        let method = self
            .realm
            .promise_constructor()
            .get_own_data(&PropertyKey::string(name))
            .filter(Value::is_callable)
            .ok_or_else(|| PloverError::UnknownStatic(name.to_string()))?;
        Ok(self.with_context(|ncx| ncx.call_function(&method, receiver, args))?)
    }

    /// Call any function value
    pub fn call(&self, callee: &Value, this: &Value, args: &[Value]) -> Result<Value, PloverError> {
        Ok(self.with_context(|ncx| ncx.call_function(callee, this, args))?)
    }

    /// `new Promise(executor)`
    pub fn construct_promise(&self, executor: Value) -> Result<Value, PloverError> {
        let ctor = self.promise_constructor();
        Ok(self.with_context(|ncx| ncx.construct(&ctor, &[executor], None))?)
    }

    /// A fresh pending promise with its resolving functions
    pub fn with_resolvers(&self) -> Result<PromiseCapability, PloverError> {
        let ctor = self.promise_constructor();
        Ok(self.with_context(|ncx| new_promise_capability(ncx, &ctor))?)
    }

    /// `promise.then(onFulfilled, onRejected)`
    pub fn then(
        &self,
        promise: &Value,
        on_fulfilled: Value,
        on_rejected: Value,
    ) -> Result<Value, PloverError> {
        Ok(self.with_context(|ncx| {
            operations::invoke(ncx, promise, "then", &[on_fulfilled, on_rejected])
        })?)
    }

    /// `Get(value, key)`
    pub fn get(&self, value: &Value, key: impl Into<PropertyKey>) -> Result<Value, PloverError> {
        let key = key.into();
        Ok(self.with_context(|ncx| operations::get_value(ncx, value, &key))?)
    }

    /// Call `function(value)` when the clock reaches `tick`
    pub fn settle_at(&self, tick: u64, function: Value, value: Value) -> TimerId {
        let delay = tick.saturating_sub(self.current_tick());
        self.event_loop.set_timeout(delay, move |ncx| {
            ncx.call_function(&function, &Value::undefined(), &[value])?;
            Ok(())
        })
    }

    /// A promise that fulfills with `value` at `tick`
    pub fn fulfill_at(&self, tick: u64, value: Value) -> Result<Value, PloverError> {
        let capability = self.with_resolvers()?;
        self.settle_at(tick, capability.resolve, value);
        Ok(capability.promise)
    }

    /// A promise that rejects with `reason` at `tick`
    pub fn reject_at(&self, tick: u64, reason: Value) -> Result<Value, PloverError> {
        let capability = self.with_resolvers()?;
        self.settle_at(tick, capability.reject, reason);
        Ok(capability.promise)
    }

    /// Run all queued promise jobs
    pub fn drain_jobs(&self) -> Result<usize, PloverError> {
        self.event_loop.drain_jobs(&self.realm)
    }

    /// Fire timers due at or before `tick`, draining jobs after each
    pub fn run_until(&self, tick: u64) -> Result<(), PloverError> {
        self.event_loop.run_until(&self.realm, tick)
    }

    /// Run until no jobs and no timers remain
    pub fn run_until_idle(&self) -> Result<(), PloverError> {
        self.event_loop.run_until_idle(&self.realm)
    }

    /// State of a promise value; `None` for non-promises
    pub fn promise_state(&self, value: &Value) -> Option<PromiseState> {
        value.as_promise().map(|promise| promise.state())
    }
}

impl Default for Plover {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Plover {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Plover")
            .field("event_loop", &self.event_loop)
            .finish_non_exhaustive()
    }
}
