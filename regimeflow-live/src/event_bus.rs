//! Per-topic event bus with an internal dispatcher thread (§5: "the event
//! bus owns an internal dispatcher thread that fans out subscribed
//! callbacks"). Registration is mutex-guarded; the dispatcher thread blocks
//! on a condvar when its queue is empty and runs subscriber callbacks
//! outside any lock, mirroring the order manager's "callbacks run outside
//! the lock" discipline (§5).

use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

use regimeflow_core::core::symbol_registry::SymbolId;

use crate::broker::{ExecutionReport, MarketMessage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    MarketData,
    Execution,
    Position,
    Account,
    System,
}

/// What travels through the bus; downstream subscribers match on this.
#[derive(Debug, Clone)]
pub enum BusMessage {
    Market(MarketMessage),
    Execution(ExecutionReport),
    Position(SymbolId),
    System(String),
}

type Subscriber = Box<dyn FnMut(&BusMessage) + Send>;

struct Inner {
    queue: std::collections::VecDeque<(Topic, BusMessage)>,
    running: bool,
}

/// Owns a dispatcher thread that drains published messages and invokes
/// every subscriber registered for that message's topic, in registration
/// order.
pub struct EventBus {
    state: Arc<(Mutex<Inner>, Condvar)>,
    subscribers: Arc<Mutex<Vec<(Topic, Subscriber)>>>,
    dispatcher: Option<JoinHandle<()>>,
}

impl EventBus {
    pub fn new() -> Self {
        let state = Arc::new((
            Mutex::new(Inner { queue: std::collections::VecDeque::new(), running: true }),
            Condvar::new(),
        ));
        let subscribers: Arc<Mutex<Vec<(Topic, Subscriber)>>> = Arc::new(Mutex::new(Vec::new()));

        let dispatcher = {
            let state = state.clone();
            let subscribers = subscribers.clone();
            thread::Builder::new()
                .name("regimeflow-event-bus".into())
                .spawn(move || Self::dispatch_loop(state, subscribers))
                .expect("spawning the event bus dispatcher thread")
        };

        Self { state, subscribers, dispatcher: Some(dispatcher) }
    }

    pub fn subscribe(&self, topic: Topic, callback: Subscriber) {
        self.subscribers.lock().unwrap().push((topic, callback));
    }

    pub fn publish(&self, topic: Topic, message: BusMessage) {
        let (lock, condvar) = &*self.state;
        let mut inner = lock.lock().unwrap();
        inner.queue.push_back((topic, message));
        condvar.notify_one();
    }

    fn dispatch_loop(state: Arc<(Mutex<Inner>, Condvar)>, subscribers: Arc<Mutex<Vec<(Topic, Subscriber)>>>) {
        let (lock, condvar) = &*state;
        loop {
            let next = {
                let mut inner = lock.lock().unwrap();
                loop {
                    if let Some(item) = inner.queue.pop_front() {
                        break Some(item);
                    }
                    if !inner.running {
                        break None;
                    }
                    inner = condvar.wait(inner).unwrap();
                }
            };
            let Some((topic, message)) = next else { break };
            let mut subs = subscribers.lock().unwrap();
            for (sub_topic, callback) in subs.iter_mut() {
                if *sub_topic == topic {
                    callback(&message);
                }
            }
        }
    }

    pub fn stop(&self) {
        let (lock, condvar) = &*self.state;
        lock.lock().unwrap().running = false;
        condvar.notify_all();
    }
}

impl Drop for EventBus {
    fn drop(&mut self) {
        self.stop();
        if let Some(handle) = self.dispatcher.take() {
            let _ = handle.join();
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
