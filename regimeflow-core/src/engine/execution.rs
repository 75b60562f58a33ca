//! Execution pipeline: composes slippage/commission/transaction-cost/
//! market-impact/latency models into fills for a submitted order (§4.6).
//!
//! Per spec §9's flagged double-counting issue, this pipeline applies
//! parametric impact on the reference price when no book is present, and
//! relies on the depth walk's own consumption of true book prices as its
//! impact when a book *is* present — it does not additionally apply
//! `MarketImpactModel` on top of a depth-walked price. See `DESIGN.md`.

use rust_decimal::Decimal;
use tracing::debug;

use crate::core::types::{
    Bar, Duration, Event, EventPayload, Fill, Order, OrderBookSnapshot, OrderPayload, OrderSide, OrderStatus, Tick,
    Timestamp,
};
use crate::queue::EventQueue;

pub trait ExecutionModel: Send {
    /// Produces raw fills at `reference_price` (no book available).
    fn execute(&self, order: &Order, reference_price: Decimal, timestamp: Timestamp) -> Vec<Fill>;
}

pub trait CommissionModel: Send {
    fn commission(&self, order: &Order, fill: &Fill) -> Decimal;
}

pub trait TransactionCostModel: Send {
    fn cost(&self, order: &Order, fill: &Fill) -> Decimal;
}

pub trait MarketImpactModel: Send {
    /// Signed in basis points by side: positive widens the price against
    /// the order (Buy pays more, Sell receives less).
    fn impact_bps(&self, order: &Order, book: Option<&OrderBookSnapshot>) -> f64;
}

pub trait LatencyModel: Send {
    fn latency(&self) -> Duration;
}

// --- default zero-cost models -------------------------------------------

pub struct ZeroSlippageModel;
impl ExecutionModel for ZeroSlippageModel {
    fn execute(&self, order: &Order, reference_price: Decimal, timestamp: Timestamp) -> Vec<Fill> {
        vec![Fill {
            id: 0,
            order_id: order.id,
            symbol: order.symbol,
            quantity: order.remaining_quantity() * Decimal::from(order.side.sign()),
            price: reference_price,
            commission: Decimal::ZERO,
            timestamp,
        }]
    }
}

pub struct ZeroCommissionModel;
impl CommissionModel for ZeroCommissionModel {
    fn commission(&self, _order: &Order, _fill: &Fill) -> Decimal {
        Decimal::ZERO
    }
}

pub struct ZeroTransactionCostModel;
impl TransactionCostModel for ZeroTransactionCostModel {
    fn cost(&self, _order: &Order, _fill: &Fill) -> Decimal {
        Decimal::ZERO
    }
}

/// Impact sub-policies (§4.6): `Zero`, `Fixed(bps)`, or
/// `OrderBookImpact(max_bps)` scaled by the order's share of opposite-side
/// depth.
pub enum ImpactPolicy {
    Zero,
    Fixed(f64),
    OrderBookImpact(f64),
}

impl MarketImpactModel for ImpactPolicy {
    fn impact_bps(&self, order: &Order, book: Option<&OrderBookSnapshot>) -> f64 {
        match self {
            ImpactPolicy::Zero => 0.0,
            ImpactPolicy::Fixed(bps) => *bps,
            ImpactPolicy::OrderBookImpact(max_bps) => {
                let Some(book) = book else { return 0.0 };
                let opposite_qty: f64 = match order.side {
                    OrderSide::Buy => book.asks.iter().map(|l| l.quantity).sum(),
                    OrderSide::Sell => book.bids.iter().map(|l| l.quantity).sum(),
                };
                if opposite_qty <= 0.0 {
                    return *max_bps;
                }
                let order_qty: f64 = order.remaining_quantity().to_string().parse().unwrap_or(0.0);
                (order_qty / opposite_qty).clamp(0.0, 1.0) * max_bps
            }
        }
    }
}

pub struct ZeroLatencyModel;
impl LatencyModel for ZeroLatencyModel {
    fn latency(&self) -> Duration {
        Duration::ZERO
    }
}

/// Last known market price for a symbol, used as the execution reference
/// price when no book is available (§4.6 step 2).
#[derive(Default, Clone, Copy)]
pub struct ReferencePrice {
    pub last_bar_close: Option<f64>,
    pub last_tick_price: Option<f64>,
}

impl ReferencePrice {
    pub fn on_bar(&mut self, bar: &Bar) {
        self.last_bar_close = Some(bar.close);
    }

    pub fn on_tick(&mut self, tick: &Tick) {
        self.last_tick_price = Some(tick.price);
    }

    fn resolve(&self, order: &Order) -> Option<Decimal> {
        if let Some(close) = self.last_bar_close {
            return Decimal::try_from(close).ok();
        }
        if let Some(price) = self.last_tick_price {
            return Decimal::try_from(price).ok();
        }
        order.limit_price
    }
}

pub struct ExecutionPipeline {
    pub execution_model: Box<dyn ExecutionModel>,
    pub commission_model: Box<dyn CommissionModel>,
    pub transaction_cost_model: Box<dyn TransactionCostModel>,
    pub impact_model: Box<dyn MarketImpactModel>,
    pub latency_model: Box<dyn LatencyModel>,
}

impl Default for ExecutionPipeline {
    fn default() -> Self {
        Self {
            execution_model: Box::new(ZeroSlippageModel),
            commission_model: Box::new(ZeroCommissionModel),
            transaction_cost_model: Box::new(ZeroTransactionCostModel),
            impact_model: Box::new(ImpactPolicy::Zero),
            latency_model: Box::new(ZeroLatencyModel),
        }
    }
}

impl ExecutionPipeline {
    /// Runs the order through the pipeline, pushing `Fill` (and, on
    /// partial consumption, `Update`) events onto `queue`.
    pub fn on_order_submitted(
        &self,
        order: &Order,
        reference: &ReferencePrice,
        book: Option<&OrderBookSnapshot>,
        now: Timestamp,
        queue: &EventQueue,
    ) {
        if matches!(order.status, OrderStatus::Rejected | OrderStatus::Cancelled) {
            return;
        }

        let Some(ref_price) = reference.resolve(order) else {
            debug!(order_id = order.id, "no reference price available, skipping execution");
            return;
        };

        let base_ts = if order.created_at != Timestamp::ZERO { order.created_at } else { now };
        let exec_ts = base_ts + self.latency_model.latency();

        let raw_fills = match book {
            Some(book) => walk_book(order, book, ref_price, exec_ts),
            None => self.execution_model.execute(order, ref_price, exec_ts),
        };

        let impact_bps = if book.is_some() { 0.0 } else { self.impact_model.impact_bps(order, book) };
        let sign = order.side.sign() as f64;
        let impact_factor = Decimal::try_from(1.0 + sign * impact_bps / 10_000.0).unwrap_or(Decimal::ONE);

        let mut total_filled = Decimal::ZERO;
        for mut fill in raw_fills {
            fill.price *= impact_factor;
            let commission = self.commission_model.commission(order, &fill);
            let cost = self.transaction_cost_model.cost(order, &fill);
            fill.commission = commission + cost;
            total_filled += fill.quantity.abs();
            queue.push(Event::new(exec_ts, Some(order.symbol), EventPayload::Order(OrderPayload::Fill(fill))));
        }

        if total_filled < order.remaining_quantity() {
            let mut updated = order.clone();
            updated.updated_at = exec_ts;
            queue.push(Event::new(exec_ts, Some(order.symbol), EventPayload::Order(OrderPayload::Update(updated))));
        }
    }
}

/// Depth walk (§4.6): Buy consumes ask levels ascending by price, Sell
/// consumes bid levels, each taking `min(remaining, level.qty)` until
/// either the book is exhausted or the order is filled. A level that
/// carries quantity but no price fills at `reference_price` rather than
/// being skipped.
fn walk_book(order: &Order, book: &OrderBookSnapshot, reference_price: Decimal, timestamp: Timestamp) -> Vec<Fill> {
    let levels: &[crate::core::types::BookLevel] = match order.side {
        OrderSide::Buy => &book.asks,
        OrderSide::Sell => &book.bids,
    };
    let sign = Decimal::from(order.side.sign());
    let mut remaining = order.remaining_quantity();
    let mut fills = Vec::new();

    for level in levels {
        if remaining <= Decimal::ZERO {
            break;
        }
        let level_qty = Decimal::try_from(level.quantity).unwrap_or(Decimal::ZERO);
        if level_qty <= Decimal::ZERO {
            continue;
        }
        let take = remaining.min(level_qty);
        let price = if level.price > 0.0 {
            Decimal::try_from(level.price).unwrap_or(reference_price)
        } else {
            reference_price
        };
        fills.push(Fill {
            id: 0,
            order_id: order.id,
            symbol: order.symbol,
            quantity: take * sign,
            price,
            commission: Decimal::ZERO,
            timestamp,
        });
        remaining -= take;
    }
    fills
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::symbol_registry::SymbolRegistry;
    use crate::core::types::{BookLevel, OrderType, BOOK_DEPTH};
    use rust_decimal_macros::dec;

    fn sym() -> crate::core::SymbolId {
        SymbolRegistry::new().intern("AAPL")
    }

    fn book_with(levels: &[(f64, f64)], side_is_ask: bool) -> OrderBookSnapshot {
        let mut book = OrderBookSnapshot::empty(Timestamp(0), sym());
        let target = if side_is_ask { &mut book.asks } else { &mut book.bids };
        for (i, (price, qty)) in levels.iter().enumerate().take(BOOK_DEPTH) {
            target[i] = BookLevel { price: *price, quantity: *qty, num_orders: 1 };
        }
        book
    }

    #[test]
    fn depth_walk_partial_fill_totals_available_depth() {
        let book = book_with(&[(100.0, 50.0), (101.0, 25.0)], true);
        let mut order = Order::new(sym(), OrderSide::Buy, OrderType::Market, dec!(200));
        order.id = 1;
        let fills = walk_book(&order, &book, dec!(100.0), Timestamp(0));
        let total: Decimal = fills.iter().map(|f| f.quantity.abs()).sum();
        assert_eq!(total, dec!(75));
        assert_eq!(fills[0].price, dec!(100.0));
        assert_eq!(fills[1].price, dec!(101.0));
    }

    #[test]
    fn depth_walk_conserves_min_order_and_available_quantity() {
        let book = book_with(&[(100.0, 500.0)], true);
        let mut order = Order::new(sym(), OrderSide::Buy, OrderType::Market, dec!(50));
        order.id = 1;
        let fills = walk_book(&order, &book, dec!(100.0), Timestamp(0));
        let total: Decimal = fills.iter().map(|f| f.quantity.abs()).sum();
        assert_eq!(total, dec!(50));
    }

    #[test]
    fn depth_walk_fills_priceless_level_at_reference_price() {
        let book = book_with(&[(0.0, 30.0)], true);
        let mut order = Order::new(sym(), OrderSide::Buy, OrderType::Market, dec!(30));
        order.id = 1;
        let fills = walk_book(&order, &book, dec!(99.5), Timestamp(0));
        let total: Decimal = fills.iter().map(|f| f.quantity.abs()).sum();
        assert_eq!(total, dec!(30));
        assert_eq!(fills[0].price, dec!(99.5));
    }

    #[test]
    fn pipeline_emits_update_event_on_partial_fill() {
        let queue = EventQueue::new();
        let book = book_with(&[(100.0, 50.0), (101.0, 25.0)], true);
        let mut order = Order::new(sym(), OrderSide::Buy, OrderType::Market, dec!(200));
        order.id = 1;
        order.status = OrderStatus::Pending;
        order.created_at = Timestamp(1000);

        let pipeline = ExecutionPipeline::default();
        let reference = ReferencePrice { last_bar_close: Some(100.0), last_tick_price: None };
        pipeline.on_order_submitted(&order, &reference, Some(&book), Timestamp(1000), &queue);

        let mut fill_count = 0;
        let mut update_count = 0;
        while let Some(event) = queue.pop() {
            match event.payload {
                EventPayload::Order(OrderPayload::Fill(_)) => fill_count += 1,
                EventPayload::Order(OrderPayload::Update(_)) => update_count += 1,
                _ => {}
            }
        }
        assert_eq!(fill_count, 2);
        assert_eq!(update_count, 1);
    }

    #[test]
    fn rejected_order_is_skipped_entirely() {
        let queue = EventQueue::new();
        let mut order = Order::new(sym(), OrderSide::Buy, OrderType::Market, dec!(100));
        order.status = OrderStatus::Rejected;
        let pipeline = ExecutionPipeline::default();
        let reference = ReferencePrice { last_bar_close: Some(100.0), last_tick_price: None };
        pipeline.on_order_submitted(&order, &reference, None, Timestamp(1), &queue);
        assert!(queue.pop().is_none());
    }
}
