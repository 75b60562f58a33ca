//! Broker adapter interface (§6): the seam the live order manager and
//! engine glue are written against. Concrete wire protocols (FIX, a
//! specific exchange's REST/WebSocket API) are out of scope (§1 Non-goals)
//! — this module defines only the trait and the wire-agnostic report/
//! snapshot types that cross it.

use std::collections::BTreeMap;

use regimeflow_core::core::errors::Result;
use regimeflow_core::core::symbol_registry::SymbolId;
use regimeflow_core::core::types::{
    LiveOrderStatus, OrderBookSnapshot, OrderSide, OrderType, Position, Quote, TimeInForce, Tick, Timestamp,
};
use rust_decimal::Decimal;

/// One market update as delivered by a broker's push feed; wraps the same
/// payload types the backtest mmap reader produces so downstream code
/// (caches, the event generator) treats live and historical data alike.
#[derive(Debug, Clone, PartialEq)]
pub enum MarketMessage {
    Tick(Tick),
    Quote(Quote),
    Book(OrderBookSnapshot),
}

/// A broker's report on one order, used both for push-style execution
/// reports and for the pull-style `get_open_orders` reconciliation sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionReport {
    pub broker_order_id: String,
    pub broker_exec_id: Option<String>,
    pub symbol: SymbolId,
    pub side: OrderSide,
    pub status: LiveOrderStatus,
    pub filled_quantity: Decimal,
    pub avg_fill_price: Option<Decimal>,
    pub commission: Decimal,
    pub message: Option<String>,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccountInfo {
    pub cash: Decimal,
    pub buying_power: Decimal,
}

/// What the live order manager asks a broker to place; distinct from
/// [`regimeflow_core::core::types::Order`] because the broker only needs
/// the fields that cross the wire, not internal bookkeeping fields.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrderRequest {
    pub symbol: SymbolId,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub quantity: Decimal,
    pub limit_price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    pub tif: TimeInForce,
}

/// Rate-limit hints the broker itself imposes; `0` means "no hint, rely on
/// the engine's own config" (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BrokerRateLimitHints {
    pub max_orders_per_second: u32,
    pub max_messages_per_second: u32,
}

/// The broker-facing seam consumed by the live order manager and engine
/// (§6). A paper/simulated implementation and a concrete exchange
/// implementation both satisfy this trait; this crate ships neither — only
/// the interface and the glue that drives it.
pub trait BrokerAdapter: Send {
    fn connect(&mut self) -> Result<()>;
    fn disconnect(&mut self) -> Result<()>;
    fn is_connected(&self) -> bool;

    fn subscribe_market_data(&mut self, symbols: &[SymbolId]) -> Result<()>;
    fn unsubscribe_market_data(&mut self, symbols: &[SymbolId]) -> Result<()>;

    fn submit_order(&mut self, order: &NewOrderRequest) -> Result<String>;
    fn cancel_order(&mut self, broker_order_id: &str) -> Result<()>;
    fn modify_order(&mut self, broker_order_id: &str, new_quantity: Option<Decimal>, new_limit_price: Option<Decimal>) -> Result<()>;

    fn get_account_info(&mut self) -> Result<AccountInfo>;
    fn get_positions(&mut self) -> Result<BTreeMap<u32, Position>>;
    fn get_open_orders(&mut self) -> Result<Vec<ExecutionReport>>;

    fn rate_limit_hints(&self) -> BrokerRateLimitHints;

    /// Registers the engine's sink for push-delivered updates. The engine
    /// calls each of these exactly once during startup, before `connect`.
    fn register_market_data_callback(&mut self, callback: Box<dyn FnMut(MarketMessage) + Send>);
    fn register_execution_callback(&mut self, callback: Box<dyn FnMut(ExecutionReport) + Send>);
    fn register_position_callback(&mut self, callback: Box<dyn FnMut(SymbolId, Position) + Send>);

    /// Drives the adapter's internal transport (drains sockets, invokes
    /// whatever callback plumbing the concrete adapter wires up). The live
    /// engine calls this once per event-loop iteration.
    fn poll(&mut self) -> Result<()>;
}
