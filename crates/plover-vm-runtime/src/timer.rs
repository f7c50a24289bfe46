//! Timers on the virtual tick clock

use std::cmp::Ordering;

use plover_vm_core::context::NativeContext;
use plover_vm_core::error::VmResult;

/// Unique timer identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

/// Native callback run when a timer fires
pub type TimerCallback = Box<dyn FnOnce(&mut NativeContext<'_>) -> VmResult<()>>;

/// Min-heap entry: earliest deadline first, then scheduling order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerHeapEntry {
    /// Tick at which the timer fires
    pub deadline: u64,
    /// Timer ID (monotonic, so it breaks ties in scheduling order)
    pub id: TimerId,
}

impl Ord for TimerHeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for TimerHeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BinaryHeap;

    #[test]
    fn test_heap_pops_earliest_then_oldest() {
        let mut heap = BinaryHeap::new();
        heap.push(TimerHeapEntry { deadline: 3, id: TimerId(0) });
        heap.push(TimerHeapEntry { deadline: 1, id: TimerId(2) });
        heap.push(TimerHeapEntry { deadline: 1, id: TimerId(1) });

        let order: Vec<_> = std::iter::from_fn(|| heap.pop().map(|e| e.id)).collect();
        assert_eq!(order, vec![TimerId(1), TimerId(2), TimerId(0)]);
    }
}
