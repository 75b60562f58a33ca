//! regimeflow-core — deterministic, event-driven backtest and live trading
//! engine core.
//!
//! A single priority event queue drives strategies through market data,
//! timers, and fills with the same code path backtest and live share: the
//! event queue and dispatcher (`queue`, `engine::dispatcher`), the order
//! manager and execution pipeline (`engine::order_manager`,
//! `engine::execution`), portfolio accounting (`engine::portfolio`), and the
//! market-data/order-book substrate backed by a memory-mapped columnar file
//! format (`data::mmap`).
//!
//! ## Modules
//! - `core`: shared data model (`Order`, `Fill`, `Position`, `Event`, ...)
//!   and the error taxonomy every other module propagates through.
//! - `data`: the mmap bar/tick/book file format and the iterator traits the
//!   event generator pulls data through.
//! - `queue`: the priority event queue and its supporting allocators
//!   (pool, arena) and lock-free channels (SPSC ring, MPSC queue).
//! - `engine`: the event loop, event generator, order manager, execution
//!   pipeline, portfolio, hook layers, caches, and strategy context facade.
//! - `risk`: pre-submission risk controls (the sliding-window rate limiter).
//! - `monitoring`: the bounded live-alert ring.
//! - `config`: serde-deserializable configuration structs.
//! - `utils`: ambient logging setup.

pub mod config;
pub mod core;
pub mod data;
pub mod engine;
pub mod monitoring;
pub mod queue;
pub mod risk;
pub mod utils;

pub use core::{
    Error, ErrorCode, Event, Fill, Order, OrderSide, OrderStatus, OrderType, Position, Result,
    SymbolId, SymbolRegistry, Timestamp,
};
pub use engine::{EventLoop, OrderManager, Portfolio, StrategyContext};
pub use queue::EventQueue;

/// Convenient single-import surface for embedding applications and strategy
/// implementations.
pub mod prelude {
    pub use crate::core::{
        Bar, Duration, Error, ErrorCode, Event, EventType, Fill, Order, OrderBookSnapshot,
        OrderSide, OrderStatus, OrderType, Position, Quote, Result, SymbolId, SymbolRegistry,
        Tick, TimeInForce, Timestamp,
    };
    pub use crate::engine::{
        EventHandler, EventLoop, HookKind, OrderManager, Portfolio, StrategyContext, TypedHook,
    };
    pub use crate::queue::EventQueue;
    pub use crate::utils::init_logger;
}
