//! # Plover VM Runtime
//!
//! High-level runtime for the Plover VM, providing:
//! - FIFO promise job queue
//! - Event loop over a virtual tick clock
//! - Builder API and TOML configuration

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod builder;
pub mod config;
pub mod event_loop;
pub mod microtask;
pub mod plover_runtime;
pub mod timer;

// Re-export main types
pub use builder::PloverBuilder;
pub use config::RuntimeConfig;
pub use event_loop::EventLoop;
pub use microtask::JsJobQueue;
pub use plover_runtime::{Plover, PloverError};
pub use plover_vm_core::{PromiseCapability, PromiseState, Value, VmError};
pub use timer::{TimerCallback, TimerHeapEntry, TimerId};
