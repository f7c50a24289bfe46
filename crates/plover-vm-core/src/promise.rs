//! JavaScript Promise implementation for the VM
//!
//! Holds the promise state machine, the capability and resolution-coercion
//! services, reaction registration, and the job runner.
//!
//! ## Rust API
//!
//! ```ignore
//! let capability = new_promise_capability(ncx, &realm.promise_constructor_value())?;
//! ncx.call_function(&capability.resolve, &Value::undefined(), &[Value::number(42.0)])?;
//! // Hand capability.promise back to the caller
//! ```
//!
//! Settlement never runs reactions inline: `fulfill`/`reject` turn each
//! pending reaction into a [`JsPromiseJob`] and enqueue it.

use smallvec::SmallVec;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::context::NativeContext;
use crate::error::{VmError, VmResult};
use crate::object::{JsObject, ObjectKind, PropertyKey};
use crate::operations;
use crate::realm::Realm;
use crate::value::Value;

/// Promise state
#[derive(Debug, Clone, PartialEq)]
pub enum PromiseState {
    /// Not yet settled
    Pending,
    /// Resolved with value
    Fulfilled(Value),
    /// Rejected with error
    Rejected(Value),
}

impl PromiseState {
    /// Check if settled (fulfilled or rejected)
    pub fn is_settled(&self) -> bool {
        !matches!(self, PromiseState::Pending)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Settlement {
    Pending,
    Settled,
}

/// A flag that moves from pending to settled exactly once.
///
/// Backs the `[[AlreadyResolved]]` record of resolving functions and the
/// `[[AlreadyCalled]]` record of combinator element functions.
#[derive(Debug)]
pub struct SettleOnce(Cell<Settlement>);

impl SettleOnce {
    /// A fresh, unsettled flag
    pub fn new() -> Self {
        Self(Cell::new(Settlement::Pending))
    }

    /// Settle the flag. Returns true only for the call that performed the
    /// transition.
    pub fn claim(&self) -> bool {
        self.0.replace(Settlement::Settled) == Settlement::Pending
    }

    /// Has the flag been claimed
    pub fn is_settled(&self) -> bool {
        self.0.get() == Settlement::Settled
    }
}

impl Default for SettleOnce {
    fn default() -> Self {
        Self::new()
    }
}

/// `PromiseCapability Record`: a promise plus the functions that settle it
#[derive(Clone, Debug)]
pub struct PromiseCapability {
    /// The promise object
    pub promise: Value,
    /// Idempotent resolve function
    pub resolve: Value,
    /// Idempotent reject function
    pub reject: Value,
}

/// Kind of JS Promise job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsPromiseJobKind {
    /// Call onFulfilled handler
    Fulfill,
    /// Call onRejected handler
    Reject,
    /// Pass through fulfillment (identity)
    PassthroughFulfill,
    /// Pass through rejection (thrower)
    PassthroughReject,
    /// Call a thenable's `then` with fresh resolving functions
    ResolveThenable,
}

/// A queued promise job
#[derive(Clone, Debug)]
pub struct JsPromiseJob {
    /// Job kind
    pub kind: JsPromiseJobKind,
    /// The function to call (handler or `then` method)
    pub callback: Value,
    /// The `this` binding for the call
    pub this_arg: Value,
    /// Settlement value passed to the handler
    pub argument: Value,
    /// Capability settled with the handler's outcome
    pub result_capability: Option<PromiseCapability>,
    /// Promise being resolved by a `ResolveThenable` job
    pub result_promise: Option<Rc<JsObject>>,
}

#[derive(Clone)]
struct PromiseReaction {
    /// `undefined` means passthrough
    handler: Value,
    capability: Option<PromiseCapability>,
}

#[derive(Clone, Copy)]
enum ReactionType {
    Fulfill,
    Reject,
}

impl PromiseReaction {
    fn into_job(self, reaction_type: ReactionType, argument: Value) -> JsPromiseJob {
        let kind = match (reaction_type, self.handler.is_callable()) {
            (ReactionType::Fulfill, true) => JsPromiseJobKind::Fulfill,
            (ReactionType::Fulfill, false) => JsPromiseJobKind::PassthroughFulfill,
            (ReactionType::Reject, true) => JsPromiseJobKind::Reject,
            (ReactionType::Reject, false) => JsPromiseJobKind::PassthroughReject,
        };
        JsPromiseJob {
            kind,
            callback: self.handler,
            this_arg: Value::undefined(),
            argument,
            result_capability: self.capability,
            result_promise: None,
        }
    }
}

type ReactionList = RefCell<SmallVec<[PromiseReaction; 2]>>;

/// The internal slots of a promise object
pub struct JsPromise {
    state: RefCell<PromiseState>,
    fulfill_reactions: ReactionList,
    reject_reactions: ReactionList,
}

impl std::fmt::Debug for JsPromise {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &*self.state.borrow() {
            PromiseState::Pending => write!(f, "Promise {{ <pending> }}"),
            PromiseState::Fulfilled(v) => write!(f, "Promise {{ <fulfilled>: {:?} }}", v),
            PromiseState::Rejected(v) => write!(f, "Promise {{ <rejected>: {:?} }}", v),
        }
    }
}

impl JsPromise {
    /// Create a new pending promise
    pub fn new() -> Self {
        Self {
            state: RefCell::new(PromiseState::Pending),
            fulfill_reactions: RefCell::new(SmallVec::new()),
            reject_reactions: RefCell::new(SmallVec::new()),
        }
    }

    /// Get current state
    pub fn state(&self) -> PromiseState {
        self.state.borrow().clone()
    }


    /// `FulfillPromise(promise, value)`; no-op once settled
    pub fn fulfill(&self, ncx: &NativeContext<'_>, value: Value) {
        self.settle(ncx, PromiseState::Fulfilled(value));
    }

    /// `RejectPromise(promise, reason)`; no-op once settled
    pub fn reject(&self, ncx: &NativeContext<'_>, reason: Value) {
        self.settle(ncx, PromiseState::Rejected(reason));
    }

    fn settle(&self, ncx: &NativeContext<'_>, outcome: PromiseState) {
        {
            let mut state = self.state.borrow_mut();
            if state.is_settled() {
                return;
            }
            *state = outcome.clone();
        }

        let fulfill_reactions = std::mem::take(&mut *self.fulfill_reactions.borrow_mut());
        let reject_reactions = std::mem::take(&mut *self.reject_reactions.borrow_mut());

        let (reactions, reaction_type, argument) = match outcome {
            PromiseState::Fulfilled(v) => (fulfill_reactions, ReactionType::Fulfill, v),
            PromiseState::Rejected(r) => (reject_reactions, ReactionType::Reject, r),
            PromiseState::Pending => return,
        };
        for reaction in reactions {
            ncx.enqueue_js_job(reaction.into_job(reaction_type, argument.clone()));
        }
    }

    fn add_reactions(&self, on_fulfilled: PromiseReaction, on_rejected: PromiseReaction) {
        self.fulfill_reactions.borrow_mut().push(on_fulfilled);
        self.reject_reactions.borrow_mut().push(on_rejected);
    }
}

impl Default for JsPromise {
    fn default() -> Self {
        Self::new()
    }
}

/// Allocate a pending promise object with the given prototype
pub fn create_promise_object(prototype: Option<Rc<JsObject>>) -> Rc<JsObject> {
    Rc::new(JsObject::with_kind(
        ObjectKind::Promise(JsPromise::new()),
        prototype,
    ))
}

fn promise_slot(obj: &Rc<JsObject>) -> VmResult<&JsPromise> {
    obj.as_promise()
        .ok_or_else(|| VmError::type_error("Receiver is not a promise"))
}

/// `CreateResolvingFunctions(promise)` (ES2026 §27.2.1.3)
///
/// Both functions share one `[[AlreadyResolved]]` flag: whichever is called
/// first wins and every later call of either is a no-op.
pub fn create_resolving_functions(realm: &Realm, promise: &Rc<JsObject>) -> (Value, Value) {
    let already_resolved = Rc::new(SettleOnce::new());

    let resolve = {
        let promise = promise.clone();
        let already_resolved = already_resolved.clone();
        realm.native_function("", 1, move |_this, args, ncx| {
            if !already_resolved.claim() {
                return Ok(Value::undefined());
            }
            let resolution = args.first().cloned().unwrap_or_default();
            resolve_promise(ncx, &promise, resolution)?;
            Ok(Value::undefined())
        })
    };

    let reject = {
        let promise = promise.clone();
        realm.native_function("", 1, move |_this, args, ncx| {
            if !already_resolved.claim() {
                return Ok(Value::undefined());
            }
            let reason = args.first().cloned().unwrap_or_default();
            promise_slot(&promise)?.reject(ncx, reason);
            Ok(Value::undefined())
        })
    };

    (resolve, reject)
}

/// The body of a promise resolve function once `[[AlreadyResolved]]` has
/// been claimed: self-resolution check, thenable detection, fulfillment.
pub fn resolve_promise(
    ncx: &mut NativeContext<'_>,
    promise: &Rc<JsObject>,
    resolution: Value,
) -> VmResult<()> {
    let slot = promise_slot(promise)?;

    let Some(target) = resolution.as_object() else {
        slot.fulfill(ncx, resolution);
        return Ok(());
    };

    if Rc::ptr_eq(target, promise) {
        let error = ncx
            .realm()
            .create_error("TypeError", "Chaining cycle detected for promise");
        slot.reject(ncx, error);
        return Ok(());
    }

    let then = match operations::get(ncx, target, &PropertyKey::string("then")) {
        Ok(then) => then,
        Err(err) => {
            let reason = err.into_value(ncx.realm());
            slot.reject(ncx, reason);
            return Ok(());
        }
    };

    if !then.is_callable() {
        slot.fulfill(ncx, resolution);
        return Ok(());
    }

    ncx.enqueue_js_job(JsPromiseJob {
        kind: JsPromiseJobKind::ResolveThenable,
        callback: then,
        this_arg: resolution,
        argument: Value::undefined(),
        result_capability: None,
        result_promise: Some(promise.clone()),
    });
    Ok(())
}

/// `NewPromiseCapability(C)` (ES2026 §27.2.1.5), restricted to the realm's
/// intrinsic Promise constructor.
///
/// Reads `C.prototype`, which can run a getter and fail; there is no
/// capability to reject into yet, so that failure is returned.
pub fn new_promise_capability(
    ncx: &mut NativeContext<'_>,
    constructor: &Value,
) -> VmResult<PromiseCapability> {
    let realm = ncx.realm();
    if !realm.is_promise_constructor(constructor) {
        return Err(if constructor.is_constructor() {
            VmError::type_error("Promise capabilities require the intrinsic Promise constructor")
        } else {
            VmError::type_error(format!(
                "{} is not a constructor",
                constructor.to_display_string()
            ))
        });
    }

    let promise = promise_from_constructor(ncx, constructor)?;
    let (resolve, reject) = create_resolving_functions(realm, &promise);
    Ok(PromiseCapability {
        promise: Value::object(promise),
        resolve,
        reject,
    })
}

/// `OrdinaryCreateFromConstructor(newTarget, "%Promise.prototype%")`
pub(crate) fn promise_from_constructor(
    ncx: &mut NativeContext<'_>,
    new_target: &Value,
) -> VmResult<Rc<JsObject>> {
    let prototype = match new_target.as_object() {
        Some(ctor) => operations::get(ncx, ctor, &PropertyKey::string("prototype"))?,
        None => Value::undefined(),
    };
    let prototype = prototype
        .as_object()
        .cloned()
        .unwrap_or_else(|| ncx.realm().promise_prototype().clone());
    Ok(create_promise_object(Some(prototype)))
}

/// `PromiseResolve(C, x)` (ES2026 §27.2.4.7.1): resolution coercion.
///
/// Returns `x` itself when it is a promise whose `constructor` is `C`;
/// otherwise a new promise resolved with `x`.
pub fn promise_resolve(
    ncx: &mut NativeContext<'_>,
    constructor: &Value,
    x: Value,
) -> VmResult<Value> {
    if x.is_promise() {
        let x_constructor = operations::get_value(ncx, &x, &PropertyKey::string("constructor"))?;
        if operations::same_object(&x_constructor, constructor) {
            return Ok(x);
        }
    }
    let capability = new_promise_capability(ncx, constructor)?;
    ncx.call_function(&capability.resolve, &Value::undefined(), &[x])?;
    Ok(capability.promise)
}

/// `PerformPromiseThen(promise, onFulfilled, onRejected, resultCapability)`
///
/// Reactions for an already-settled promise are enqueued, never called.
pub fn perform_then(
    ncx: &mut NativeContext<'_>,
    promise: &Rc<JsObject>,
    on_fulfilled: Value,
    on_rejected: Value,
    result_capability: Option<PromiseCapability>,
) -> VmResult<Value> {
    let slot = promise_slot(promise)?;
    let reaction = |handler: Value| PromiseReaction {
        handler: if handler.is_callable() {
            handler
        } else {
            Value::undefined()
        },
        capability: result_capability.clone(),
    };
    let fulfill_reaction = reaction(on_fulfilled);
    let reject_reaction = reaction(on_rejected);

    match slot.state() {
        PromiseState::Pending => slot.add_reactions(fulfill_reaction, reject_reaction),
        PromiseState::Fulfilled(value) => {
            ncx.enqueue_js_job(fulfill_reaction.into_job(ReactionType::Fulfill, value));
        }
        PromiseState::Rejected(reason) => {
            ncx.enqueue_js_job(reject_reaction.into_job(ReactionType::Reject, reason));
        }
    }

    Ok(result_capability
        .map(|capability| capability.promise)
        .unwrap_or_default())
}

/// Run one promise job.
///
/// Handler failures settle the derived capability. An error is returned
/// only when there is no capability to absorb it, or when calling the
/// capability's own functions fails.
pub fn run_job(ncx: &mut NativeContext<'_>, job: JsPromiseJob) -> VmResult<()> {
    match job.kind {
        JsPromiseJobKind::Fulfill | JsPromiseJobKind::Reject => {
            let outcome = ncx.call_function(&job.callback, &Value::undefined(), &[job.argument]);
            settle_derived(ncx, job.result_capability, outcome)
        }
        JsPromiseJobKind::PassthroughFulfill => {
            settle_derived(ncx, job.result_capability, Ok(job.argument))
        }
        JsPromiseJobKind::PassthroughReject => settle_derived(
            ncx,
            job.result_capability,
            Err(VmError::exception(job.argument)),
        ),
        JsPromiseJobKind::ResolveThenable => {
            let target = job
                .result_promise
                .ok_or_else(|| VmError::internal("ResolveThenable job without a promise"))?;
            let (resolve, reject) = create_resolving_functions(ncx.realm(), &target);
            if let Err(err) =
                ncx.call_function(&job.callback, &job.this_arg, &[resolve, reject.clone()])
            {
                let reason = err.into_value(ncx.realm());
                ncx.call_function(&reject, &Value::undefined(), &[reason])?;
            }
            Ok(())
        }
    }
}

fn settle_derived(
    ncx: &mut NativeContext<'_>,
    capability: Option<PromiseCapability>,
    outcome: VmResult<Value>,
) -> VmResult<()> {
    match (capability, outcome) {
        (Some(capability), Ok(value)) => {
            ncx.call_function(&capability.resolve, &Value::undefined(), &[value])?;
        }
        (Some(capability), Err(err)) => {
            let reason = err.into_value(ncx.realm());
            ncx.call_function(&capability.reject, &Value::undefined(), &[reason])?;
        }
        (None, Ok(_)) => {}
        (None, Err(err)) => return Err(err),
    }
    Ok(())
}
