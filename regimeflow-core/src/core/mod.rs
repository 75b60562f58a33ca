//! Core data model and error taxonomy shared by every other module.

pub mod errors;
pub mod symbol_registry;
pub mod types;
pub mod validation;

pub use errors::{Error, ErrorCode, Result};
pub use symbol_registry::{SymbolId, SymbolRegistry};
pub use validation::validate_order_shape;
pub use types::{
    Bar, BookLevel, Duration, Event, EventPayload, EventType, Fill, LiveOrder, LiveOrderStatus,
    MarketPayload, Order, OrderBookSnapshot, OrderPayload, OrderSide, OrderStatus, OrderType,
    Position, PortfolioSnapshot, Quote, SystemPayload, Tick, TimeInForce, Timestamp, UserPayload,
    BOOK_DEPTH,
};
