//! Job queue for ECMAScript Promise reactions.
//!
//! ## Drain Points
//!
//! Jobs are drained at the following synchronization points:
//!
//! 1. **After a host call into the runtime** (`Plover::drain_jobs`)
//! 2. **After each timer callback**
//!
//! ## Ordering Guarantees
//!
//! - FIFO: First queued, first executed
//! - All pending jobs drained until queue is empty
//! - New jobs enqueued during drain are also executed
//!
//! ## Error Handling
//!
//! - Errors in jobs are captured and the first error is returned
//! - Remaining jobs continue to execute even after an error

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use plover_vm_core::context::JsJobQueueTrait;
use plover_vm_core::promise::JsPromiseJob;

/// Queue of promise jobs, each tagged with its enqueue sequence number
#[derive(Default)]
pub struct JsJobQueue {
    queue: RefCell<VecDeque<(u64, JsPromiseJob)>>,
    next_seq: Cell<u64>,
}

impl JsJobQueue {
    /// Create new empty job queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a promise job
    pub fn enqueue(&self, job: JsPromiseJob) {
        let seq = self.next_seq.get();
        self.next_seq.set(seq + 1);
        self.queue.borrow_mut().push_back((seq, job));
    }

    /// Dequeue the next promise job
    pub fn dequeue(&self) -> Option<JsPromiseJob> {
        self.queue.borrow_mut().pop_front().map(|(_, job)| job)
    }

    /// Peek the next job sequence number
    pub fn peek_seq(&self) -> Option<u64> {
        self.queue.borrow().front().map(|(seq, _)| *seq)
    }

    /// Number of queued jobs
    pub fn len(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Check if queue is empty
    pub fn is_empty(&self) -> bool {
        self.queue.borrow().is_empty()
    }
}

impl JsJobQueueTrait for JsJobQueue {
    fn enqueue(&self, job: JsPromiseJob) {
        JsJobQueue::enqueue(self, job);
    }
}

impl std::fmt::Debug for JsJobQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsJobQueue")
            .field("len", &self.len())
            .field("front_seq", &self.peek_seq())
            .finish()
    }
}
