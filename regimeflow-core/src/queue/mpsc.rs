//! Intrusive multi-producer / single-consumer queue, Michael-Scott style
//! (§4.2): a linked list with an always-present dummy node. Producers
//! exchange the tail pointer; the single consumer advances the head one
//! link at a time. Used where the event bus must accept any number of
//! producers (the live engine's per-topic fan-out), as distinct from the
//! event queue's own pending-list primitive in [`crate::queue::event_queue`].
//!
//! Producers publish a node's `next` link with a `Release` store after the
//! tail exchange; the consumer reads links with `Acquire`. This is the
//! ordering an implementation must preserve to avoid torn lists (§9).

use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

struct Node<T> {
    value: Option<T>,
    next: AtomicPtr<Node<T>>,
}

impl<T> Node<T> {
    fn dummy() -> *mut Node<T> {
        Box::into_raw(Box::new(Node {
            value: None,
            next: AtomicPtr::new(ptr::null_mut()),
        }))
    }
}

pub struct MpscQueue<T> {
    head: AtomicPtr<Node<T>>,
    tail: AtomicPtr<Node<T>>,
}

unsafe impl<T: Send> Send for MpscQueue<T> {}
unsafe impl<T: Send> Sync for MpscQueue<T> {}

impl<T> MpscQueue<T> {
    pub fn new() -> Self {
        let dummy = Node::dummy();
        Self {
            head: AtomicPtr::new(dummy),
            tail: AtomicPtr::new(dummy),
        }
    }

    /// Lock-free; safe to call from any number of producer threads
    /// concurrently.
    pub fn push(&self, value: T) {
        let new_node = Box::into_raw(Box::new(Node {
            value: Some(value),
            next: AtomicPtr::new(ptr::null_mut()),
        }));
        loop {
            let tail = self.tail.load(Ordering::Acquire);
            let next = unsafe { (*tail).next.load(Ordering::Acquire) };
            if tail == self.tail.load(Ordering::Acquire) {
                if next.is_null() {
                    let cas = unsafe {
                        (*tail)
                            .next
                            .compare_exchange(
                                ptr::null_mut(),
                                new_node,
                                Ordering::Release,
                                Ordering::Relaxed,
                            )
                    };
                    if cas.is_ok() {
                        let _ = self.tail.compare_exchange(
                            tail,
                            new_node,
                            Ordering::Release,
                            Ordering::Relaxed,
                        );
                        return;
                    }
                } else {
                    let _ = self.tail.compare_exchange(
                        tail,
                        next,
                        Ordering::Release,
                        Ordering::Relaxed,
                    );
                }
            }
        }
    }

    /// Single-consumer only: calling this from more than one thread
    /// concurrently is undefined behavior (the head CAS loop assumes a
    /// lone competitor, matching §4.2's "consumer advances the head one
    /// link at a time").
    pub fn pop(&self) -> Option<T> {
        loop {
            let head = self.head.load(Ordering::Acquire);
            let tail = self.tail.load(Ordering::Acquire);
            let next = unsafe { (*head).next.load(Ordering::Acquire) };
            if head != self.head.load(Ordering::Acquire) {
                continue;
            }
            if head == tail {
                if next.is_null() {
                    return None;
                }
                let _ = self.tail.compare_exchange(
                    tail,
                    next,
                    Ordering::Release,
                    Ordering::Relaxed,
                );
                continue;
            }
            let cas =
                self.head
                    .compare_exchange(head, next, Ordering::Release, Ordering::Relaxed);
            if cas.is_ok() {
                let value = unsafe { (*next).value.take() };
                unsafe {
                    drop(Box::from_raw(head));
                }
                return value;
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        let head = self.head.load(Ordering::Acquire);
        let next = unsafe { (*head).next.load(Ordering::Acquire) };
        next.is_null()
    }
}

impl<T> Default for MpscQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for MpscQueue<T> {
    fn drop(&mut self) {
        while self.pop().is_some() {}
        let dummy = self.head.load(Ordering::Relaxed);
        unsafe {
            drop(Box::from_raw(dummy));
        }
    }
}
