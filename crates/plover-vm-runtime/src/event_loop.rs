//! Event loop implementation
//!
//! Single-threaded loop over a virtual tick clock. Time only advances when
//! the loop jumps to the next due timer, so runs are deterministic: timers
//! due at the same tick fire in scheduling order, and the job queue is
//! drained after every timer callback.

use std::cell::{Cell, RefCell};
use std::collections::BinaryHeap;

use rustc_hash::FxHashMap;

use plover_vm_core::context::NativeContext;
use plover_vm_core::error::{VmError, VmResult};
use plover_vm_core::promise::run_job;
use plover_vm_core::realm::Realm;

use crate::config::RuntimeConfig;
use crate::microtask::JsJobQueue;
use crate::plover_runtime::PloverError;
use crate::timer::{TimerCallback, TimerHeapEntry, TimerId};

/// Event loop for promise jobs and timers
pub struct EventLoop {
    /// Pending timer callbacks by ID
    timers: RefCell<FxHashMap<TimerId, TimerCallback>>,
    /// Timer heap - min-heap ordered by deadline
    timer_heap: RefCell<BinaryHeap<TimerHeapEntry>>,
    /// Promise job queue
    js_jobs: JsJobQueue,
    /// Next timer ID
    next_timer_id: Cell<u64>,
    /// Current virtual tick
    now: Cell<u64>,
    config: RuntimeConfig,
}

impl EventLoop {
    /// Create a new event loop
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            timers: RefCell::new(FxHashMap::default()),
            timer_heap: RefCell::new(BinaryHeap::new()),
            js_jobs: JsJobQueue::new(),
            next_timer_id: Cell::new(1),
            now: Cell::new(0),
            config,
        }
    }

    /// The promise job queue
    pub fn js_jobs(&self) -> &JsJobQueue {
        &self.js_jobs
    }

    /// Loop configuration
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Current virtual tick
    pub fn now(&self) -> u64 {
        self.now.get()
    }

    /// A native context over `realm` that enqueues into this loop
    pub fn context<'a>(&'a self, realm: &'a Realm) -> NativeContext<'a> {
        NativeContext::new(realm, &self.js_jobs).with_max_depth(self.config.max_native_depth)
    }

    /// Schedule `callback` to run `delay` ticks from now
    pub fn set_timeout<F>(&self, delay: u64, callback: F) -> TimerId
    where
        F: FnOnce(&mut NativeContext<'_>) -> VmResult<()> + 'static,
    {
        let callback: TimerCallback = Box::new(callback);
        let id = TimerId(self.next_timer_id.get());
        self.next_timer_id.set(id.0 + 1);
        let deadline = self.now.get().saturating_add(delay);

        self.timers.borrow_mut().insert(id, callback);
        self.timer_heap
            .borrow_mut()
            .push(TimerHeapEntry { deadline, id });
        tracing::trace!(timer = id.0, deadline, "timer scheduled");
        id
    }

    /// Cancel a pending timer; returns false if it already ran
    pub fn clear_timeout(&self, id: TimerId) -> bool {
        self.timers.borrow_mut().remove(&id).is_some()
    }

    /// Check if any timer is still pending
    pub fn has_pending_timers(&self) -> bool {
        !self.timers.borrow().is_empty()
    }

    /// Run queued jobs until the queue is empty.
    ///
    /// A failing job does not stop the drain; the first failure is returned
    /// once the queue is empty. Exceeding `max_jobs_per_drain` aborts.
    pub fn drain_jobs(&self, realm: &Realm) -> Result<usize, PloverError> {
        let limit = self.config.max_jobs_per_drain;
        let mut ran = 0usize;
        let mut first_error: Option<VmError> = None;

        while !self.js_jobs.is_empty() {
            if ran >= limit {
                tracing::warn!(limit, pending = self.js_jobs.len(), "job drain limit reached");
                return Err(PloverError::JobLimitExceeded { limit });
            }
            let Some(job) = self.js_jobs.dequeue() else {
                break;
            };
            let mut ncx = self.context(realm);
            if let Err(err) = run_job(&mut ncx, job) {
                tracing::warn!(error = %err, "promise job failed");
                first_error.get_or_insert(err);
            }
            ran += 1;
        }

        if ran > 0 {
            tracing::trace!(jobs = ran, "job queue drained");
        }
        match first_error {
            Some(err) => Err(err.into()),
            None => Ok(ran),
        }
    }

    /// Fire every timer due at or before `tick`, then move the clock to `tick`
    pub fn run_until(&self, realm: &Realm, tick: u64) -> Result<(), PloverError> {
        let mut first_error = match self.drain_jobs(realm) {
            Err(err @ PloverError::JobLimitExceeded { .. }) => return Err(err),
            drained => drained.err(),
        };
        while let Some(entry) = self.pop_due(tick) {
            if let Err(err) = self.fire(realm, entry) {
                if matches!(err, PloverError::JobLimitExceeded { .. }) {
                    return Err(err);
                }
                first_error.get_or_insert(err);
            }
        }
        if tick > self.now.get() {
            self.now.set(tick);
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Run until no jobs and no timers remain
    pub fn run_until_idle(&self, realm: &Realm) -> Result<(), PloverError> {
        let mut first_error = match self.drain_jobs(realm) {
            Err(err @ PloverError::JobLimitExceeded { .. }) => return Err(err),
            drained => drained.err(),
        };
        while let Some(entry) = self.pop_due(u64::MAX) {
            if entry.deadline > self.config.max_ticks {
                tracing::warn!(
                    deadline = entry.deadline,
                    max_ticks = self.config.max_ticks,
                    "timer beyond tick limit"
                );
                self.timer_heap.borrow_mut().push(entry);
                return Err(PloverError::TickLimitExceeded {
                    limit: self.config.max_ticks,
                });
            }
            if let Err(err) = self.fire(realm, entry) {
                if matches!(err, PloverError::JobLimitExceeded { .. }) {
                    return Err(err);
                }
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Pop the next live timer due at or before `tick`
    fn pop_due(&self, tick: u64) -> Option<TimerHeapEntry> {
        let mut heap = self.timer_heap.borrow_mut();
        let timers = self.timers.borrow();
        while let Some(&entry) = heap.peek() {
            if entry.deadline > tick {
                return None;
            }
            heap.pop();
            if timers.contains_key(&entry.id) {
                return Some(entry);
            }
        }
        None
    }

    /// Advance the clock to the timer's deadline, run it, drain jobs
    fn fire(&self, realm: &Realm, entry: TimerHeapEntry) -> Result<(), PloverError> {
        let Some(callback) = self.timers.borrow_mut().remove(&entry.id) else {
            return Ok(());
        };
        if entry.deadline > self.now.get() {
            self.now.set(entry.deadline);
        }
        tracing::trace!(timer = entry.id.0, tick = self.now.get(), "timer fired");

        let outcome = {
            let mut ncx = self.context(realm);
            callback(&mut ncx)
        };
        // Drain after each timer callback
        let drained = self.drain_jobs(realm);
        if let Err(err) = outcome {
            tracing::warn!(timer = entry.id.0, error = %err, "timer callback failed");
            drained?;
            return Err(err.into());
        }
        drained.map(|_| ())
    }
}

impl std::fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLoop")
            .field("now", &self.now.get())
            .field("timers", &self.timers.borrow().len())
            .field("js_jobs", &self.js_jobs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn test_timers_fire_in_deadline_order() {
        let realm = Realm::new();
        let event_loop = EventLoop::new(RuntimeConfig::default());
        let log = Rc::new(RefCell::new(Vec::new()));

        for (delay, label) in [(3, "c"), (1, "a"), (1, "b")] {
            let log = log.clone();
            event_loop.set_timeout(
                delay,
                move |_ncx| {
                    log.borrow_mut().push(label);
                    Ok(())
                },
            );
        }
        event_loop.run_until_idle(&realm).unwrap();

        assert_eq!(*log.borrow(), vec!["a", "b", "c"]);
        assert_eq!(event_loop.now(), 3);
        assert!(!event_loop.has_pending_timers());
    }

    #[test]
    fn test_cleared_timer_does_not_fire() {
        let realm = Realm::new();
        let event_loop = EventLoop::new(RuntimeConfig::default());
        let fired = Rc::new(Cell::new(false));
        let flag = fired.clone();
        let id = event_loop.set_timeout(
            2,
            move |_ncx| {
                flag.set(true);
                Ok(())
            },
        );
        assert!(event_loop.clear_timeout(id));
        assert!(!event_loop.clear_timeout(id));
        event_loop.run_until_idle(&realm).unwrap();
        assert!(!fired.get());
    }

    #[test]
    fn test_run_until_stops_at_tick() {
        let realm = Realm::new();
        let event_loop = EventLoop::new(RuntimeConfig::default());
        let count = Rc::new(Cell::new(0));
        for delay in [1, 2, 5] {
            let count = count.clone();
            event_loop.set_timeout(
                delay,
                move |_ncx| {
                    count.set(count.get() + 1);
                    Ok(())
                },
            );
        }
        event_loop.run_until(&realm, 2).unwrap();
        assert_eq!(count.get(), 2);
        assert_eq!(event_loop.now(), 2);
        assert!(event_loop.has_pending_timers());
    }

    #[test]
    fn test_timer_error_reported_after_remaining_timers() {
        let realm = Realm::new();
        let event_loop = EventLoop::new(RuntimeConfig::default());
        let ran = Rc::new(Cell::new(false));
        event_loop.set_timeout(1, |_ncx| Err(VmError::type_error("first")));
        let flag = ran.clone();
        event_loop.set_timeout(
            2,
            move |_ncx| {
                flag.set(true);
                Ok(())
            },
        );

        let err = event_loop.run_until_idle(&realm).unwrap_err();
        assert!(matches!(err, PloverError::Vm(VmError::TypeError(_))));
        assert!(ran.get());
    }

    #[test]
    fn test_tick_limit() {
        let realm = Realm::new();
        let config = RuntimeConfig {
            max_ticks: 10,
            ..RuntimeConfig::default()
        };
        let event_loop = EventLoop::new(config);
        event_loop.set_timeout(11, |_ncx| Ok(()));
        let err = event_loop.run_until_idle(&realm).unwrap_err();
        assert!(matches!(err, PloverError::TickLimitExceeded { limit: 10 }));
        assert!(event_loop.has_pending_timers());
    }
}
