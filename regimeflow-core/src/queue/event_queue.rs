//! The deterministic, priority-ordered event queue (§4.1).
//!
//! Multi-producer / single-consumer. `push` assigns a monotonically
//! increasing sequence number, wraps the event in a pool-allocated node,
//! and publishes it onto an intrusive pending list with a single atomic
//! swap — wait-free per producer, no CAS retry loop. The consumer drains
//! that pending list into an internal binary heap ordered by
//! `(timestamp, priority, sequence)` before every `pop`/`peek`.
//!
//! Ordering contract (testable property 1): for events A, B, A dispatches
//! before B iff `A.timestamp < B.timestamp`, or timestamps are equal and
//! `A.priority < B.priority`, or timestamp and priority are equal and
//! `A.sequence < B.sequence`. Sequence numbers are assigned before the
//! publish swap but observed by the single consumer only after a drain, so
//! the consumer sees a total order consistent with assignment order.
//!
//! Allocation failure from the pool is fatal (`Pool` never reports "full");
//! the queue itself never reports "full" and never blocks.

use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicU64, Ordering};

use crate::core::types::Event;
use crate::queue::pool::Pool;

struct Node {
    event: Option<Event>,
    next: AtomicPtr<Node>,
}

impl Default for Node {
    fn default() -> Self {
        Self {
            event: None,
            next: AtomicPtr::new(ptr::null_mut()),
        }
    }
}

/// Wraps an `Event` for the binary heap with reversed `(timestamp, priority,
/// sequence)` ordering so that `BinaryHeap`, a max-heap, yields the smallest
/// key first.
struct HeapEntry(Event);

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.0.queue_order_key() == other.0.queue_order_key()
    }
}
impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other.0.queue_order_key().cmp(&self.0.queue_order_key())
    }
}

pub struct EventQueue {
    pending_head: AtomicPtr<Node>,
    sequence: AtomicU64,
    pool: Pool<Node>,
    heap: std::sync::Mutex<BinaryHeap<HeapEntry>>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self {
            pending_head: AtomicPtr::new(ptr::null_mut()),
            sequence: AtomicU64::new(0),
            pool: Pool::new(),
            heap: std::sync::Mutex::new(BinaryHeap::new()),
        }
    }

    /// Assigns a sequence number, allocates a node from the pool, and
    /// publishes it onto the pending list. Safe to call concurrently from
    /// any number of producer threads.
    pub fn push(&self, mut event: Event) {
        event.sequence = self.sequence.fetch_add(1, Ordering::Relaxed);

        let mut node = self.pool.allocate();
        node.event = Some(event);
        let raw = Box::into_raw(node);

        // Wait-free publish: a single atomic swap, no CAS retry. The
        // previous head becomes this node's successor; readers of `next`
        // must `Acquire` to observe the write below.
        let prev = self.pending_head.swap(raw, Ordering::AcqRel);
        unsafe {
            (*raw).next.store(prev, Ordering::Release);
        }
    }

    /// Drains the pending list (most-recent-first) into the internal heap.
    /// Recycled nodes are returned to the pool immediately.
    fn drain_pending(&self) {
        let mut head = self.pending_head.swap(ptr::null_mut(), Ordering::AcqRel);
        if head.is_null() {
            return;
        }
        let mut heap = self.heap.lock().expect("event queue heap mutex poisoned");
        while !head.is_null() {
            let mut node = unsafe { Box::from_raw(head) };
            head = node.next.load(Ordering::Acquire);
            if let Some(event) = node.event.take() {
                heap.push(HeapEntry(event));
            }
            node.next = AtomicPtr::new(ptr::null_mut());
            self.pool.deallocate(node);
        }
    }

    pub fn pop(&self) -> Option<Event> {
        self.drain_pending();
        self.heap
            .lock()
            .expect("event queue heap mutex poisoned")
            .pop()
            .map(|e| e.0)
    }

    pub fn peek(&self) -> Option<Event> {
        self.drain_pending();
        self.heap
            .lock()
            .expect("event queue heap mutex poisoned")
            .peek()
            .map(|e| e.0.clone())
    }

    pub fn is_empty(&self) -> bool {
        self.drain_pending();
        self.heap
            .lock()
            .expect("event queue heap mutex poisoned")
            .is_empty()
    }

    pub fn size(&self) -> usize {
        self.drain_pending();
        self.heap.lock().expect("event queue heap mutex poisoned").len()
    }

    /// Drains and discards every pending and queued event.
    pub fn clear(&self) {
        self.drain_pending();
        self.heap.lock().expect("event queue heap mutex poisoned").clear();
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for EventQueue {
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::symbol_registry::SymbolRegistry;
    use crate::core::types::{EventPayload, SystemPayload, Timestamp};
    use std::sync::Arc;
    use std::thread;

    fn system_event(ts: i64) -> Event {
        Event::new(Timestamp(ts), None, EventPayload::System(SystemPayload::BacktestStart))
    }

    #[test]
    fn orders_by_timestamp_then_priority_then_sequence() {
        let q = EventQueue::new();
        // S1: Order @1000, Market(Bar) @1000, System(Timer) @1000 -> pop
        // order is System, Market, Order.
        let reg = SymbolRegistry::new();
        let sym = reg.intern("AAA");

        let order_event = Event::new(
            Timestamp(1000),
            Some(sym),
            EventPayload::Order(crate::core::types::OrderPayload::Cancel(1)),
        );
        let bar = crate::core::types::Bar {
            timestamp: Timestamp(1000),
            symbol: sym,
            open: 1.0,
            high: 1.0,
            low: 1.0,
            close: 1.0,
            volume: 1,
            trade_count: 1,
            vwap: 1.0,
        };
        let market_event = Event::new(
            Timestamp(1000),
            Some(sym),
            EventPayload::Market(crate::core::types::MarketPayload::Bar(bar)),
        );
        let timer_event = Event::new(
            Timestamp(1000),
            None,
            EventPayload::System(SystemPayload::Timer { id: 1 }),
        );

        q.push(order_event);
        q.push(market_event);
        q.push(timer_event);

        let first = q.pop().unwrap();
        let second = q.pop().unwrap();
        let third = q.pop().unwrap();

        assert_eq!(first.event_type, crate::core::types::EventType::System);
        assert_eq!(second.event_type, crate::core::types::EventType::Market);
        assert_eq!(third.event_type, crate::core::types::EventType::Order);
        assert!(q.pop().is_none());
    }

    #[test]
    fn sequence_is_strictly_monotonic_across_producers() {
        let q = Arc::new(EventQueue::new());
        let producers: Vec<_> = (0..4)
            .map(|_| {
                let q = q.clone();
                thread::spawn(move || {
                    for i in 0..250 {
                        q.push(system_event(i));
                    }
                })
            })
            .collect();
        for p in producers {
            p.join().unwrap();
        }
        assert_eq!(q.size(), 1000);
        let mut sequences = Vec::with_capacity(1000);
        while let Some(e) = q.pop() {
            sequences.push(e.sequence);
        }
        let mut sorted = sequences.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), 1000, "sequence numbers must be unique");
    }

    #[test]
    fn clear_discards_everything() {
        let q = EventQueue::new();
        q.push(system_event(1));
        q.push(system_event(2));
        q.clear();
        assert!(q.is_empty());
        assert_eq!(q.size(), 0);
    }

    #[test]
    fn lower_timestamp_dispatches_first() {
        let q = EventQueue::new();
        q.push(system_event(2000));
        q.push(system_event(1000));
        assert_eq!(q.pop().unwrap().timestamp, Timestamp(1000));
        assert_eq!(q.pop().unwrap().timestamp, Timestamp(2000));
    }
}
