//! # Plover VM Core
//!
//! Value model and Promise built-ins for the Plover JavaScript runtime.
//!
//! ## Design Principles
//!
//! - **Single-threaded**: Values are `Rc`-based and never cross threads; jobs
//!   run one at a time, so shared settlement state needs no locks
//! - **Native callbacks**: Every callable is a Rust closure wrapped in a
//!   function object, so per-callback state is captured, not attached
//! - **Deferred reactions**: Promise reactions are always enqueued on the job
//!   queue, never run inline

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod combinator;
pub mod context;
pub mod error;
pub mod function;
pub mod intrinsics_impl;
pub mod object;
pub mod operations;
pub mod promise;
pub mod realm;
pub mod value;

pub use combinator::{CombinatorKind, ElementHandler, SettlementCounter};
pub use context::{JsJobQueueTrait, NativeContext};
pub use error::{VmError, VmResult};
pub use object::{JsObject, ObjectKind, PropertyDescriptor, PropertyKey};
pub use promise::{JsPromise, JsPromiseJob, PromiseCapability, PromiseState, SettleOnce};
pub use realm::Realm;
pub use value::Value;
