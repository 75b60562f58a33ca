//! Core data model: timestamps, market data, events, orders, fills, positions.
//!
//! These are value types (§3 of the design doc): bars/ticks/books are owned
//! by whoever emitted them until pushed onto the event queue; orders are
//! owned by the order manager; fills are owned by the order manager and
//! copied into the portfolio.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::{Add, Sub};

use super::errors::{Error, ErrorCode, Result};
use super::symbol_registry::SymbolId;

/// Signed microseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp(0);

    pub fn from_micros(micros: i64) -> Self {
        Timestamp(micros)
    }

    pub fn micros(self) -> i64 {
        self.0
    }

    /// Calendar date as `yyyymmdd`, treating the stored value as UTC.
    pub fn yyyymmdd(self) -> u32 {
        let days = self.0.div_euclid(86_400_000_000);
        civil_from_days(days)
    }
}

impl Add<Duration> for Timestamp {
    type Output = Timestamp;
    fn add(self, rhs: Duration) -> Timestamp {
        Timestamp(self.0 + rhs.0)
    }
}

impl Sub<Timestamp> for Timestamp {
    type Output = Duration;
    fn sub(self, rhs: Timestamp) -> Duration {
        Duration(self.0 - rhs.0)
    }
}

/// Signed delta of microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Duration(pub i64);

impl Duration {
    pub const ZERO: Duration = Duration(0);

    pub fn from_micros(micros: i64) -> Self {
        Duration(micros)
    }

    pub fn from_millis(millis: i64) -> Self {
        Duration(millis * 1_000)
    }

    pub fn micros(self) -> i64 {
        self.0
    }
}

/// Civil-from-days, Howard Hinnant's algorithm (proleptic Gregorian), used
/// only to label days for the event generator's day markers and the mmap
/// date index — not a general calendar library.
fn civil_from_days(z: i64) -> u32 {
    let z = z + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146_096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };
    (y as u32) * 10_000 + (m as u32) * 100 + d as u32
}

/// OHLCV aggregate bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: Timestamp,
    pub symbol: SymbolId,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    pub trade_count: u32,
    pub vwap: f64,
}

impl Bar {
    pub fn validate(&self) -> Result<()> {
        let finite_positive = [self.open, self.high, self.low, self.close]
            .iter()
            .all(|p| p.is_finite() && *p > 0.0);
        if !finite_positive {
            return Err(Error::new(
                ErrorCode::InvalidArgument,
                "bar prices must be finite and positive",
                "core/types.rs:Bar::validate",
            ));
        }
        if self.high < self.low {
            return Err(Error::new(
                ErrorCode::InvalidArgument,
                "bar high must be >= low",
                "core/types.rs:Bar::validate",
            ));
        }
        if self.high < self.open.max(self.close) {
            return Err(Error::new(
                ErrorCode::InvalidArgument,
                "bar high must be >= max(open, close)",
                "core/types.rs:Bar::validate",
            ));
        }
        if self.low > self.open.min(self.close) {
            return Err(Error::new(
                ErrorCode::InvalidArgument,
                "bar low must be <= min(open, close)",
                "core/types.rs:Bar::validate",
            ));
        }
        Ok(())
    }
}

/// Single trade print.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub timestamp: Timestamp,
    pub symbol: SymbolId,
    pub price: f64,
    pub quantity: f64,
    pub flags: u32,
}

impl Tick {
    pub fn validate(&self) -> Result<()> {
        if !(self.price.is_finite() && self.price > 0.0) {
            return Err(Error::new(
                ErrorCode::InvalidArgument,
                "tick price must be finite and positive",
                "core/types.rs:Tick::validate",
            ));
        }
        if !(self.quantity.is_finite() && self.quantity > 0.0) {
            return Err(Error::new(
                ErrorCode::InvalidArgument,
                "tick quantity must be finite and positive",
                "core/types.rs:Tick::validate",
            ));
        }
        Ok(())
    }
}

/// Best bid/ask snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub timestamp: Timestamp,
    pub symbol: SymbolId,
    pub bid: f64,
    pub ask: f64,
    pub bid_size: f64,
    pub ask_size: f64,
}

/// One level of depth on either side of an [`OrderBookSnapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: f64,
    pub quantity: f64,
    pub num_orders: i64,
}

pub const BOOK_DEPTH: usize = 10;

/// Top-10 depth per side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    pub timestamp: Timestamp,
    pub symbol: SymbolId,
    pub bids: [BookLevel; BOOK_DEPTH],
    pub asks: [BookLevel; BOOK_DEPTH],
}

impl OrderBookSnapshot {
    pub fn empty(timestamp: Timestamp, symbol: SymbolId) -> Self {
        Self {
            timestamp,
            symbol,
            bids: [BookLevel::default(); BOOK_DEPTH],
            asks: [BookLevel::default(); BOOK_DEPTH],
        }
    }

    pub fn best_bid(&self) -> Option<BookLevel> {
        self.bids.iter().copied().find(|l| l.price > 0.0)
    }

    pub fn best_ask(&self) -> Option<BookLevel> {
        self.asks.iter().copied().find(|l| l.price > 0.0)
    }
}

// ---------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------

/// Top-level event classification; determines the default dispatch
/// priority (§3, §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    System,
    Market,
    Order,
    User,
}

impl EventType {
    pub const fn default_priority(self) -> u8 {
        match self {
            EventType::System => 0,
            EventType::Market => 10,
            EventType::Order => 20,
            EventType::User => 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MarketPayload {
    Bar(Bar),
    Tick(Tick),
    Quote(Quote),
    Book(OrderBookSnapshot),
}

impl MarketPayload {
    /// Secondary sort key used by the generator's stable total sort
    /// (§4.3): lower subkinds sort first at equal timestamp/symbol.
    pub const fn subkind_rank(&self) -> u8 {
        match self {
            MarketPayload::Bar(_) => 0,
            MarketPayload::Tick(_) => 1,
            MarketPayload::Quote(_) => 2,
            MarketPayload::Book(_) => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OrderPayload {
    New(Order),
    Fill(Fill),
    Update(Order),
    Cancel(u64),
    Reject { order_id: u64, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SystemPayload {
    BacktestStart,
    BacktestEnd,
    DayStart,
    EndOfDay,
    Timer { id: u64 },
    RegimeChange { regime: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UserPayload {
    Custom { tag: String, data: serde_json::Value },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventPayload {
    Market(MarketPayload),
    Order(OrderPayload),
    System(SystemPayload),
    User(UserPayload),
}

/// A dispatchable event. `sequence` is assigned at enqueue time by the
/// event queue's atomic counter (§4.1); it is not set by callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub timestamp: Timestamp,
    pub event_type: EventType,
    pub priority: u8,
    pub sequence: u64,
    pub symbol: Option<SymbolId>,
    pub payload: EventPayload,
}

impl Event {
    /// Construct an event with the default priority for its type;
    /// `sequence` is a placeholder, overwritten on push.
    pub fn new(timestamp: Timestamp, symbol: Option<SymbolId>, payload: EventPayload) -> Self {
        let event_type = match &payload {
            EventPayload::Market(_) => EventType::Market,
            EventPayload::Order(_) => EventType::Order,
            EventPayload::System(_) => EventType::System,
            EventPayload::User(_) => EventType::User,
        };
        Self {
            timestamp,
            priority: event_type.default_priority(),
            event_type,
            sequence: 0,
            symbol,
            payload,
        }
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    /// `(timestamp, priority, symbol, market-subkind)` ordering tuple used
    /// by the generator's stable sort (§4.3, testable property 2).
    pub fn generator_sort_key(&self) -> (i64, u8, u32, u8) {
        let symbol = self.symbol.map(|s| s.raw()).unwrap_or(0);
        let subkind = match &self.payload {
            EventPayload::Market(m) => m.subkind_rank(),
            _ => 0,
        };
        (self.timestamp.0, self.priority, symbol, subkind)
    }
}

/// Total order used by the event queue's internal heap (§4.1): earlier
/// timestamp first, then lower priority, then lower sequence.
impl Event {
    pub fn queue_order_key(&self) -> (i64, u8, u64) {
        (self.timestamp.0, self.priority, self.sequence)
    }
}

// ---------------------------------------------------------------------
// Orders / fills
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn sign(self) -> i32 {
        match self {
            OrderSide::Buy => 1,
            OrderSide::Sell => -1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    Limit,
    Stop,
    StopLimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeInForce {
    Gtc,
    Ioc,
    Fok,
    Day,
}

/// Order lifecycle status. The only reachable transitions are those in
/// §4.5; terminal states (`Filled`, `Cancelled`, `Rejected`) accept no
/// further transitions (testable property 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Created,
    Pending,
    PartiallyFilled,
    Filled,
    Cancelled,
    Rejected,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Cancelled | OrderStatus::Rejected
        )
    }

    pub fn is_open(self) -> bool {
        matches!(
            self,
            OrderStatus::Created | OrderStatus::Pending | OrderStatus::PartiallyFilled
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: u64,
    pub symbol: SymbolId,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub quantity: Decimal,
    pub limit_price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    pub tif: TimeInForce,
    pub status: OrderStatus,
    pub filled_quantity: Decimal,
    pub avg_fill_price: Option<Decimal>,
    pub strategy_id: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub metadata: HashMap<String, String>,
}

impl Order {
    /// A freshly-constructed order prior to submission; `id` of `0`
    /// signals "assign one" to the order manager (§4.5).
    pub fn new(symbol: SymbolId, side: OrderSide, order_type: OrderType, quantity: Decimal) -> Self {
        Self {
            id: 0,
            symbol,
            side,
            order_type,
            quantity,
            limit_price: None,
            stop_price: None,
            tif: TimeInForce::Gtc,
            status: OrderStatus::Created,
            filled_quantity: Decimal::ZERO,
            avg_fill_price: None,
            strategy_id: None,
            created_at: Timestamp::ZERO,
            updated_at: Timestamp::ZERO,
            metadata: HashMap::new(),
        }
    }

    pub fn remaining_quantity(&self) -> Decimal {
        self.quantity - self.filled_quantity
    }
}

/// Partial or full execution of an order. `quantity` is signed (sign
/// matches the originating order's side).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub id: u64,
    pub order_id: u64,
    pub symbol: SymbolId,
    pub quantity: Decimal,
    pub price: Decimal,
    pub commission: Decimal,
    pub timestamp: Timestamp,
}

/// Net holding in a symbol with cost basis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: SymbolId,
    pub quantity: Decimal,
    pub avg_cost: Decimal,
    pub current_price: Decimal,
    pub last_update: Timestamp,
}

impl Position {
    pub fn flat(symbol: SymbolId) -> Self {
        Self {
            symbol,
            quantity: Decimal::ZERO,
            avg_cost: Decimal::ZERO,
            current_price: Decimal::ZERO,
            last_update: Timestamp::ZERO,
        }
    }

    pub fn market_value(&self) -> Decimal {
        self.quantity * self.current_price
    }
}

/// Portfolio state at a point in time, as appended to the equity curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub timestamp: Timestamp,
    pub cash: Decimal,
    pub equity: Decimal,
    pub gross_exposure: Decimal,
    pub net_exposure: Decimal,
    pub leverage: Decimal,
    pub positions: std::collections::BTreeMap<u32, Position>,
}

// ---------------------------------------------------------------------
// Live order (broker-facing)
// ---------------------------------------------------------------------

/// Broker-reported order status (§4.9). Distinct from [`OrderStatus`]
/// because the broker's state machine has transitions (`PendingCancel`)
/// the backtest order manager never needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LiveOrderStatus {
    PendingNew,
    New,
    PartiallyFilled,
    Filled,
    PendingCancel,
    Cancelled,
    Rejected,
    Expired,
    Error,
}

impl LiveOrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            LiveOrderStatus::Filled
                | LiveOrderStatus::Cancelled
                | LiveOrderStatus::Rejected
                | LiveOrderStatus::Expired
                | LiveOrderStatus::Error
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveOrder {
    pub id: u64,
    pub symbol: SymbolId,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub quantity: Decimal,
    pub limit_price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    pub tif: TimeInForce,
    pub filled_quantity: Decimal,
    pub avg_fill_price: Option<Decimal>,
    pub strategy_id: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub metadata: HashMap<String, String>,

    pub broker_order_id: Option<String>,
    pub broker_exec_id: Option<String>,
    pub status: LiveOrderStatus,
    pub submitted_at: Option<Timestamp>,
    pub acked_at: Option<Timestamp>,
    pub filled_at: Option<Timestamp>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::symbol_registry::SymbolRegistry;

    fn sym() -> SymbolId {
        SymbolRegistry::new().intern("AAPL")
    }

    #[test]
    fn bar_validate_rejects_bad_high_low() {
        let b = Bar {
            timestamp: Timestamp(0),
            symbol: sym(),
            open: 10.0,
            high: 9.0,
            low: 9.5,
            close: 10.0,
            volume: 1,
            trade_count: 1,
            vwap: 10.0,
        };
        assert!(b.validate().is_err());
    }

    #[test]
    fn bar_validate_accepts_consistent_ohlc() {
        let b = Bar {
            timestamp: Timestamp(0),
            symbol: sym(),
            open: 10.0,
            high: 12.0,
            low: 9.0,
            close: 11.0,
            volume: 1,
            trade_count: 1,
            vwap: 10.5,
        };
        assert!(b.validate().is_ok());
    }

    #[test]
    fn event_type_default_priorities_match_spec() {
        assert_eq!(EventType::System.default_priority(), 0);
        assert_eq!(EventType::Market.default_priority(), 10);
        assert_eq!(EventType::Order.default_priority(), 20);
        assert_eq!(EventType::User.default_priority(), 30);
    }

    #[test]
    fn order_status_terminal_classification() {
        assert!(OrderStatus::Filled.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(OrderStatus::Rejected.is_terminal());
        assert!(!OrderStatus::PartiallyFilled.is_terminal());
    }
}
