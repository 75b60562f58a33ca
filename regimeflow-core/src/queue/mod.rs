//! Lock-free primitives and the deterministic event queue built on them
//! (§4.1, §4.2).

pub mod arena;
pub mod event_queue;
pub mod mpsc;
pub mod pool;
pub mod spsc;

pub use arena::Arena;
pub use event_queue::EventQueue;
pub use mpsc::MpscQueue;
pub use pool::Pool;
pub use spsc::SpscRing;
