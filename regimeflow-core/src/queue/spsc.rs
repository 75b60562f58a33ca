//! Fixed-capacity single-producer / single-consumer ring buffer (§4.2).
//!
//! `push` fails (returns `false`) when full; `pop` returns `false` when
//! empty. The producer advances `tail` with `Release`; the consumer reads
//! it with `Acquire`. The consumer advances `head` with `Release`; the
//! producer reads it with `Acquire`. Only one producer and one consumer may
//! call `push`/`pop` respectively — there is no internal synchronization
//! between multiple producers or multiple consumers.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};

pub struct SpscRing<T> {
    capacity: usize,
    slots: Box<[UnsafeCell<MaybeUninit<T>>]>,
    head: AtomicUsize,
    tail: AtomicUsize,
}

unsafe impl<T: Send> Send for SpscRing<T> {}
unsafe impl<T: Send> Sync for SpscRing<T> {}

impl<T> SpscRing<T> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "SpscRing capacity must be > 0");
        let slots = (0..capacity)
            .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            capacity,
            slots,
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Producer-only. Returns `false` without writing `value` if the ring
    /// is full.
    pub fn push(&self, value: T) -> bool {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);
        if tail.wrapping_sub(head) >= self.capacity {
            return false;
        }
        let idx = tail % self.capacity;
        unsafe {
            (*self.slots[idx].get()).write(value);
        }
        self.tail.store(tail.wrapping_add(1), Ordering::Release);
        true
    }

    /// Consumer-only. Returns `None` if the ring is empty.
    pub fn pop(&self) -> Option<T> {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);
        if head == tail {
            return None;
        }
        let idx = head % self.capacity;
        let value = unsafe { (*self.slots[idx].get()).assume_init_read() };
        self.head.store(head.wrapping_add(1), Ordering::Release);
        Some(value)
    }

    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Acquire) == self.tail.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.tail
            .load(Ordering::Acquire)
            .wrapping_sub(self.head.load(Ordering::Acquire))
    }
}

impl<T> Drop for SpscRing<T> {
    fn drop(&mut self) {
        while self.pop().is_some() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn fifo_within_capacity() {
        let ring = SpscRing::new(4);
        assert!(ring.push(1));
        assert!(ring.push(2));
        assert!(ring.push(3));
        assert_eq!(ring.pop(), Some(1));
        assert!(ring.push(4));
        assert!(ring.push(5)); // wraps around
        assert_eq!(ring.pop(), Some(2));
        assert_eq!(ring.pop(), Some(3));
        assert_eq!(ring.pop(), Some(4));
        assert_eq!(ring.pop(), Some(5));
        assert_eq!(ring.pop(), None);
    }

    #[test]
    fn push_fails_when_full() {
        let ring = SpscRing::new(2);
        assert!(ring.push(1));
        assert!(ring.push(2));
        assert!(!ring.push(3));
    }

    #[test]
    fn pop_fails_when_empty() {
        let ring: SpscRing<u32> = SpscRing::new(2);
        assert_eq!(ring.pop(), None);
    }

    #[test]
    fn concurrent_spsc_preserves_order() {
        let ring = std::sync::Arc::new(SpscRing::new(16));
        let producer = {
            let ring = ring.clone();
            thread::spawn(move || {
                for i in 0..1000 {
                    while !ring.push(i) {
                        thread::yield_now();
                    }
                }
            })
        };
        let consumer = thread::spawn(move || {
            let mut received = Vec::with_capacity(1000);
            while received.len() < 1000 {
                if let Some(v) = ring.pop() {
                    received.push(v);
                } else {
                    thread::yield_now();
                }
            }
            received
        });
        producer.join().unwrap();
        let received = consumer.join().unwrap();
        assert_eq!(received, (0..1000).collect::<Vec<_>>());
    }
}
