//! Promise combinators: `race`, `all`, `allSettled`, `any`
//!
//! Every combinator call follows the same shape:
//!
//! 1. [`dispatch`] checks the receiver is the intrinsic Promise constructor
//!    and throws synchronously otherwise; no capability exists yet.
//! 2. A capability is created. Failure here also throws.
//! 3. From this point on every failure, including a non-array argument,
//!    becomes `capability.reject(error)` via [`reject_abrupt`].
//! 4. The orchestrator reads `length` once, then walks the elements left to
//!    right: read, coerce with `promise_resolve`, register reactions. It
//!    returns before any element settles.
//!
//! `race` wires each element straight to the shared resolve/reject, which
//! are already idempotent. The other combinators collect results: each
//! element gets an [`ElementHandler`] that owns its output index, and a
//! shared [`SettlementCounter`] detects the last settlement.

use std::cell::Cell;
use std::rc::Rc;

use crate::context::NativeContext;
use crate::error::{VmError, VmResult};
use crate::object::{JsObject, PropertyKey};
use crate::operations;
use crate::promise::{PromiseCapability, SettleOnce, new_promise_capability, promise_resolve};
use crate::realm::Realm;
use crate::value::Value;

/// Message of the `AggregateError` produced by `Promise.any`
pub const ANY_REJECTED_MESSAGE: &str = "All promises were rejected";

/// Which combinator is running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CombinatorKind {
    /// `Promise.race`
    Race,
    /// `Promise.all`
    All,
    /// `Promise.allSettled`
    AllSettled,
    /// `Promise.any`
    Any,
}

impl CombinatorKind {
    /// The static method name on the Promise constructor
    pub fn name(self) -> &'static str {
        match self {
            Self::Race => "race",
            Self::All => "all",
            Self::AllSettled => "allSettled",
            Self::Any => "any",
        }
    }
}

/// Count of outstanding settlements, shared by every element of one call.
///
/// Starts at 1 so that spawning cannot observe zero before the last element
/// is registered; the orchestrator releases that bias after the loop.
#[derive(Clone, Debug)]
pub struct SettlementCounter(Rc<Cell<i64>>);

impl SettlementCounter {
    /// A counter holding the spawn bias
    pub fn new() -> Self {
        Self(Rc::new(Cell::new(1)))
    }

    /// Add one outstanding element, returning the new count
    pub fn increment(&self) -> i64 {
        let n = self.0.get() + 1;
        self.0.set(n);
        n
    }

    /// Retire one outstanding element, returning the new count.
    ///
    /// `None` when the count is already zero; the count is left at zero so
    /// the zero-crossing is observed only once.
    pub fn decrement(&self) -> Option<i64> {
        let current = self.0.get();
        if current == 0 {
            tracing::error!("settlement counter decremented past zero");
            return None;
        }
        self.0.set(current - 1);
        Some(current - 1)
    }

    /// Current count
    pub fn get(&self) -> i64 {
        self.0.get()
    }
}

impl Default for SettlementCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// How a counted combinator fills its output and finishes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Collect {
    /// `all`: fulfillment values; resolve with the array
    Values,
    /// `allSettled`: status records; resolve with the array
    Outcomes,
    /// `any`: rejection reasons; reject with an `AggregateError`
    Errors,
}

#[derive(Debug, Clone, Copy)]
enum Settled {
    Fulfilled,
    Rejected,
}

/// Per-element callback state for the counting combinators.
///
/// The handler writes its element's result to `output[index]` and retires
/// one count, at most once. `allSettled` builds both its fulfill and reject
/// functions from one handler, so they share the `already_called` flag.
pub struct ElementHandler {
    index: u32,
    output: Rc<JsObject>,
    capability: PromiseCapability,
    counter: SettlementCounter,
    already_called: SettleOnce,
    collect: Collect,
}

impl ElementHandler {
    fn new(
        collect: Collect,
        index: u32,
        output: Rc<JsObject>,
        capability: PromiseCapability,
        counter: SettlementCounter,
    ) -> Rc<Self> {
        Rc::new(Self {
            index,
            output,
            capability,
            counter,
            already_called: SettleOnce::new(),
            collect,
        })
    }


    /// Has this element already been recorded
    pub fn is_settled(&self) -> bool {
        self.already_called.is_settled()
    }

    /// The `(onFulfilled, onRejected)` pair registered on the element
    fn reactions(self: &Rc<Self>, realm: &Realm) -> (Value, Value) {
        match self.collect {
            Collect::Values => (
                self.element_function(realm, Settled::Fulfilled),
                self.capability.reject.clone(),
            ),
            Collect::Outcomes => (
                self.element_function(realm, Settled::Fulfilled),
                self.element_function(realm, Settled::Rejected),
            ),
            Collect::Errors => (
                self.capability.resolve.clone(),
                self.element_function(realm, Settled::Rejected),
            ),
        }
    }

    fn element_function(self: &Rc<Self>, realm: &Realm, settled: Settled) -> Value {
        let handler = Rc::clone(self);
        realm.native_function("", 1, move |_this, args, ncx| {
            let value = args.first().cloned().unwrap_or_default();
            handler.record(ncx, settled, value)?;
            Ok(Value::undefined())
        })
    }

    fn record(&self, ncx: &mut NativeContext<'_>, settled: Settled, value: Value) -> VmResult<()> {
        if !self.already_called.claim() {
            return Ok(());
        }
        if let Err(err) = self.write_and_retire(ncx, settled, value) {
            let reason = err.into_value(ncx.realm());
            ncx.call_function(&self.capability.reject, &Value::undefined(), &[reason])?;
        }
        Ok(())
    }

    fn write_and_retire(
        &self,
        ncx: &mut NativeContext<'_>,
        settled: Settled,
        value: Value,
    ) -> VmResult<()> {
        let entry = match self.collect {
            Collect::Outcomes => settlement_record(ncx.realm(), settled, value)?,
            Collect::Values | Collect::Errors => value,
        };
        operations::create_data_property_or_throw(
            &self.output,
            PropertyKey::Index(self.index),
            entry,
        )?;

        let remaining = self.counter.decrement();
        tracing::trace!(index = self.index, ?remaining, "combinator element settled");
        if remaining == Some(0) {
            finish(ncx, self.collect, &self.output, &self.capability)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for ElementHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElementHandler")
            .field("index", &self.index)
            .field("collect", &self.collect)
            .field("settled", &self.is_settled())
            .finish()
    }
}

/// `{ status: "fulfilled", value }` or `{ status: "rejected", reason }`
fn settlement_record(realm: &Realm, settled: Settled, value: Value) -> VmResult<Value> {
    let (status, key) = match settled {
        Settled::Fulfilled => ("fulfilled", "value"),
        Settled::Rejected => ("rejected", "reason"),
    };
    let record = realm.create_object();
    operations::create_data_property_or_throw(&record, "status".into(), Value::string(status))?;
    operations::create_data_property_or_throw(&record, key.into(), value)?;
    Ok(Value::object(record))
}

/// Settle the capability once the counter has reached zero
fn finish(
    ncx: &mut NativeContext<'_>,
    collect: Collect,
    output: &Rc<JsObject>,
    capability: &PromiseCapability,
) -> VmResult<()> {
    let undefined = Value::undefined();
    match collect {
        Collect::Values | Collect::Outcomes => {
            tracing::debug!(elements = output.array_length(), "combinator fulfilled");
            ncx.call_function(&capability.resolve, &undefined, &[Value::object(output.clone())])?;
        }
        Collect::Errors => {
            tracing::debug!(elements = output.array_length(), "combinator rejected with AggregateError");
            let error = ncx
                .realm()
                .create_aggregate_error(output.array_elements(), ANY_REJECTED_MESSAGE);
            ncx.call_function(&capability.reject, &undefined, &[error])?;
        }
    }
    Ok(())
}

/// Throw unless `receiver` is the realm's intrinsic Promise constructor
pub fn require_intrinsic_constructor(realm: &Realm, receiver: &Value, method: &str) -> VmResult<()> {
    if !receiver.is_object() {
        return Err(VmError::type_error(format!(
            "Promise.{method} called on non-object"
        )));
    }
    if !realm.is_promise_constructor(receiver) {
        return Err(VmError::type_error(format!(
            "Promise.{method} requires the intrinsic Promise constructor as receiver"
        )));
    }
    Ok(())
}

/// Turn an error raised after the capability exists into a rejection
pub fn reject_abrupt(
    ncx: &mut NativeContext<'_>,
    capability: &PromiseCapability,
    err: VmError,
) -> VmResult<Value> {
    let reason = err.into_value(ncx.realm());
    ncx.call_function(&capability.reject, &Value::undefined(), &[reason])?;
    Ok(capability.promise.clone())
}

/// Entry point for `Promise.race/all/allSettled/any(items)`
pub fn dispatch(
    ncx: &mut NativeContext<'_>,
    kind: CombinatorKind,
    receiver: &Value,
    items: &Value,
) -> VmResult<Value> {
    require_intrinsic_constructor(ncx.realm(), receiver, kind.name())?;
    let capability = new_promise_capability(ncx, receiver)?;

    let Some(list) = items.as_object().filter(|obj| obj.is_array()).cloned() else {
        let err = VmError::type_error(format!(
            "Promise.{} expects an array, got {}",
            kind.name(),
            items.type_of()
        ));
        return reject_abrupt(ncx, &capability, err);
    };

    let spawned = match kind {
        CombinatorKind::Race => perform_race(ncx, receiver, &list, &capability),
        CombinatorKind::All => perform_all(ncx, receiver, &list, &capability),
        CombinatorKind::AllSettled => perform_all_settled(ncx, receiver, &list, &capability),
        CombinatorKind::Any => perform_any(ncx, receiver, &list, &capability),
    };
    match spawned {
        Ok(()) => Ok(capability.promise),
        Err(err) => {
            tracing::debug!(combinator = kind.name(), error = %err, "combinator aborted");
            reject_abrupt(ncx, &capability, err)
        }
    }
}

/// Register every element directly against the shared resolve/reject
pub fn perform_race(
    ncx: &mut NativeContext<'_>,
    constructor: &Value,
    items: &Rc<JsObject>,
    capability: &PromiseCapability,
) -> VmResult<()> {
    let len = operations::length_of_array_like(ncx, items)?;
    for index in 0..len {
        let next = operations::get(ncx, items, &PropertyKey::Index(index))?;
        let next_promise = promise_resolve(ncx, constructor, next)?;
        operations::invoke(
            ncx,
            &next_promise,
            "then",
            &[capability.resolve.clone(), capability.reject.clone()],
        )?;
    }
    tracing::debug!(elements = len, "race spawned");
    Ok(())
}

/// `Promise.all`: fulfill with every value in index order, fail fast
pub fn perform_all(
    ncx: &mut NativeContext<'_>,
    constructor: &Value,
    items: &Rc<JsObject>,
    capability: &PromiseCapability,
) -> VmResult<()> {
    perform_counted(ncx, Collect::Values, constructor, items, capability)
}

/// `Promise.allSettled`: fulfill with a status record per element
pub fn perform_all_settled(
    ncx: &mut NativeContext<'_>,
    constructor: &Value,
    items: &Rc<JsObject>,
    capability: &PromiseCapability,
) -> VmResult<()> {
    perform_counted(ncx, Collect::Outcomes, constructor, items, capability)
}

/// `Promise.any`: fulfill with the first value, or reject with every reason
pub fn perform_any(
    ncx: &mut NativeContext<'_>,
    constructor: &Value,
    items: &Rc<JsObject>,
    capability: &PromiseCapability,
) -> VmResult<()> {
    perform_counted(ncx, Collect::Errors, constructor, items, capability)
}

fn perform_counted(
    ncx: &mut NativeContext<'_>,
    collect: Collect,
    constructor: &Value,
    items: &Rc<JsObject>,
    capability: &PromiseCapability,
) -> VmResult<()> {
    let output = ncx.realm().create_array(Vec::new());
    let counter = SettlementCounter::new();

    let len = operations::length_of_array_like(ncx, items)?;
    for index in 0..len {
        let next = operations::get(ncx, items, &PropertyKey::Index(index))?;
        operations::create_data_property_or_throw(
            &output,
            PropertyKey::Index(index),
            Value::undefined(),
        )?;
        let next_promise = promise_resolve(ncx, constructor, next)?;

        let handler = ElementHandler::new(
            collect,
            index,
            output.clone(),
            capability.clone(),
            counter.clone(),
        );
        let (on_fulfilled, on_rejected) = handler.reactions(ncx.realm());

        counter.increment();
        operations::invoke(ncx, &next_promise, "then", &[on_fulfilled, on_rejected])?;
    }
    tracing::debug!(elements = len, ?collect, "combinator spawned");

    if counter.decrement() == Some(0) {
        finish(ncx, collect, &output, capability)?;
    }
    Ok(())
}
