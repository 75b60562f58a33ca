//! Event loop: drains the priority queue and dispatches each event to the
//! registered handler for its `EventType`, running pre/post hooks around
//! every dispatch (§4.4).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::core::types::{Event, EventType, Timestamp};
use crate::queue::EventQueue;

use super::hooks::HookManager;

pub trait EventHandler: Send {
    fn handle(&mut self, event: &Event);
}

/// Observer invoked after every dispatched event with the running count;
/// used for progress reporting during long backtests.
pub trait ProgressCallback: Send {
    fn on_progress(&mut self, dispatched: u64, event: &Event);
}

#[derive(Default)]
struct Handlers {
    system: Vec<Box<dyn EventHandler>>,
    market: Vec<Box<dyn EventHandler>>,
    order: Vec<Box<dyn EventHandler>>,
    user: Vec<Box<dyn EventHandler>>,
}

impl Handlers {
    fn for_type(&mut self, event_type: EventType) -> &mut Vec<Box<dyn EventHandler>> {
        match event_type {
            EventType::System => &mut self.system,
            EventType::Market => &mut self.market,
            EventType::Order => &mut self.order,
            EventType::User => &mut self.user,
        }
    }
}

/// Drives the queue to completion, dispatching each popped event to every
/// handler registered for its `EventType` in registration order.
/// Cloneable handle onto an [`EventLoop`]'s `running_` flag (§4.4, §5). A
/// handler or hook can hold one to stop the loop from inside a dispatch
/// without borrowing the loop itself.
#[derive(Clone)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

pub struct EventLoop {
    queue: EventQueue,
    hooks: HookManager,
    handlers: Handlers,
    dispatched: u64,
    dropped: u64,
    current_time: Timestamp,
    running: Arc<AtomicBool>,
    progress: Option<Box<dyn ProgressCallback>>,
}

impl EventLoop {
    pub fn new(queue: EventQueue) -> Self {
        Self {
            queue,
            hooks: HookManager::new(),
            handlers: Handlers::default(),
            dispatched: 0,
            dropped: 0,
            current_time: Timestamp::ZERO,
            running: Arc::new(AtomicBool::new(false)),
            progress: None,
        }
    }

    pub fn set_progress_callback(&mut self, callback: Box<dyn ProgressCallback>) {
        self.progress = Some(callback);
    }

    pub fn current_time(&self) -> Timestamp {
        self.current_time
    }

    /// A cloneable handle that can call `stop()` from outside (or, if
    /// captured by a handler/hook, from inside) a dispatch.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(self.running.clone())
    }

    /// Clears the `running_` flag checked at the top of every loop
    /// iteration (§4.4, §5); takes effect at the next iteration boundary,
    /// never mid-dispatch.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Pops events until the queue is empty or [`stop`](Self::stop) is
    /// called, updating `current_time` to each popped event's timestamp
    /// before pre-hooks run.
    pub fn run(&mut self) {
        self.running.store(true, Ordering::Relaxed);
        while self.is_running() {
            let Some(event) = self.queue.pop() else { break };
            self.current_time = event.timestamp;
            self.dispatch_one(event);
        }
        self.running.store(false, Ordering::Relaxed);
        debug!(dispatched = self.dispatched, dropped = self.dropped, "event loop run() finished");
    }

    /// Processes events up to and including timestamp `t`; stops (without
    /// consuming) as soon as the next event's timestamp exceeds `t` or the
    /// queue is empty.
    pub fn run_until(&mut self, t: Timestamp) {
        self.running.store(true, Ordering::Relaxed);
        while self.is_running() {
            match self.queue.peek() {
                Some(event) if event.timestamp <= t => {
                    let event = self.queue.pop().expect("peeked event must still be present");
                    self.current_time = event.timestamp;
                    self.dispatch_one(event);
                }
                _ => break,
            }
        }
        self.running.store(false, Ordering::Relaxed);
    }

    pub fn queue(&self) -> &EventQueue {
        &self.queue
    }

    pub fn hooks_mut(&mut self) -> &mut HookManager {
        &mut self.hooks
    }

    pub fn register_handler(&mut self, event_type: EventType, handler: Box<dyn EventHandler>) {
        self.handlers.for_type(event_type).push(handler);
    }

    pub fn dispatched_count(&self) -> u64 {
        self.dispatched
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped
    }

    /// Dispatches a single popped event: runs pre-hooks, fans out to every
    /// registered handler for its type if not cancelled, then runs
    /// post-hooks. Returns `false` if the event was cancelled.
    fn dispatch_one(&mut self, event: Event) -> bool {
        if !self.hooks.run_pre_dispatch(&event) {
            self.dropped += 1;
            trace!(sequence = event.sequence, "event cancelled by pre-dispatch hook");
            return false;
        }
        for handler in self.handlers.for_type(event.event_type) {
            handler.handle(&event);
        }
        self.hooks.run_post_dispatch(&event);
        self.dispatched += 1;
        if let Some(progress) = &mut self.progress {
            progress.on_progress(self.dispatched, &event);
        }
        true
    }

    /// Drains the queue until empty, dispatching events one at a time in
    /// the queue's total order. Equivalent to [`run`](Self::run) on a
    /// queue that nothing else is feeding concurrently.
    pub fn run_to_completion(&mut self) {
        while let Some(event) = self.queue.pop() {
            self.current_time = event.timestamp;
            self.dispatch_one(event);
        }
        debug!(dispatched = self.dispatched, dropped = self.dropped, "event loop drained");
    }

    /// Dispatches at most one event; returns `false` when the queue was
    /// empty. Used by callers that interleave their own polling (e.g. the
    /// live engine) with queue draining.
    pub fn step(&mut self) -> bool {
        match self.queue.pop() {
            Some(event) => {
                self.current_time = event.timestamp;
                self.dispatch_one(event);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{EventPayload, SystemPayload, Timestamp};
    use std::sync::{Arc, Mutex};

    struct CountingHandler {
        count: Arc<Mutex<u32>>,
    }
    impl EventHandler for CountingHandler {
        fn handle(&mut self, _event: &Event) {
            *self.count.lock().unwrap() += 1;
        }
    }

    #[test]
    fn dispatches_to_registered_handlers_by_type() {
        let queue = EventQueue::new();
        queue.push(Event::new(Timestamp(1), None, EventPayload::System(SystemPayload::BacktestStart)));
        queue.push(Event::new(Timestamp(2), None, EventPayload::System(SystemPayload::BacktestEnd)));

        let mut event_loop = EventLoop::new(queue);
        let count = Arc::new(Mutex::new(0));
        event_loop.register_handler(EventType::System, Box::new(CountingHandler { count: count.clone() }));
        event_loop.run_to_completion();

        assert_eq!(*count.lock().unwrap(), 2);
        assert_eq!(event_loop.dispatched_count(), 2);
    }

    #[test]
    fn step_processes_one_event_at_a_time() {
        let queue = EventQueue::new();
        queue.push(Event::new(Timestamp(1), None, EventPayload::System(SystemPayload::BacktestStart)));
        queue.push(Event::new(Timestamp(2), None, EventPayload::System(SystemPayload::BacktestEnd)));

        let mut event_loop = EventLoop::new(queue);
        assert!(event_loop.step());
        assert_eq!(event_loop.dispatched_count(), 1);
        assert!(event_loop.step());
        assert_eq!(event_loop.dispatched_count(), 2);
        assert!(!event_loop.step());
    }

    #[test]
    fn run_advances_current_time_and_drains_queue() {
        let queue = EventQueue::new();
        queue.push(Event::new(Timestamp(5), None, EventPayload::System(SystemPayload::BacktestStart)));
        queue.push(Event::new(Timestamp(9), None, EventPayload::System(SystemPayload::BacktestEnd)));

        let mut event_loop = EventLoop::new(queue);
        event_loop.run();
        assert_eq!(event_loop.current_time(), Timestamp(9));
        assert_eq!(event_loop.dispatched_count(), 2);
    }

    #[test]
    fn run_until_stops_without_consuming_events_past_the_cutoff() {
        let queue = EventQueue::new();
        queue.push(Event::new(Timestamp(5), None, EventPayload::System(SystemPayload::BacktestStart)));
        queue.push(Event::new(Timestamp(15), None, EventPayload::System(SystemPayload::BacktestEnd)));

        let mut event_loop = EventLoop::new(queue);
        event_loop.run_until(Timestamp(10));
        assert_eq!(event_loop.dispatched_count(), 1);
        assert_eq!(event_loop.current_time(), Timestamp(5));

        event_loop.run_until(Timestamp(20));
        assert_eq!(event_loop.dispatched_count(), 2);
    }

    #[test]
    fn stop_handle_halts_run_at_the_next_iteration_boundary() {
        struct StoppingHandler {
            handle: StopHandle,
            stop_after: u32,
            seen: u32,
        }
        impl EventHandler for StoppingHandler {
            fn handle(&mut self, _event: &Event) {
                self.seen += 1;
                if self.seen >= self.stop_after {
                    self.handle.stop();
                }
            }
        }

        let queue = EventQueue::new();
        for ts in 1..=5 {
            queue.push(Event::new(Timestamp(ts), None, EventPayload::System(SystemPayload::BacktestStart)));
        }
        let mut event_loop = EventLoop::new(queue);
        let handle = event_loop.stop_handle();
        event_loop.register_handler(
            EventType::System,
            Box::new(StoppingHandler { handle, stop_after: 2, seen: 0 }),
        );
        event_loop.run();
        assert_eq!(event_loop.dispatched_count(), 2);
    }

    #[test]
    fn handler_not_invoked_for_other_types() {
        let queue = EventQueue::new();
        queue.push(Event::new(Timestamp(1), None, EventPayload::System(SystemPayload::BacktestStart)));

        let mut event_loop = EventLoop::new(queue);
        let count = Arc::new(Mutex::new(0));
        event_loop.register_handler(EventType::Market, Box::new(CountingHandler { count: count.clone() }));
        event_loop.run_to_completion();

        assert_eq!(*count.lock().unwrap(), 0);
    }
}
