//! Order manager: the canonical `Order` state machine (§4.5), with a
//! strict transition table and callbacks invoked on every accepted
//! transition. Terminal states (`Filled`, `Cancelled`, `Rejected`) reject
//! any further transition, closing the state machine (testable property 3).

use std::collections::HashMap;

use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::core::errors::{ErrorCode, Result};
use crate::core::types::{Fill, Order, OrderStatus, OrderType, Timestamp};
use crate::rf_err;

pub trait OrderStatusListener: Send {
    fn on_transition(&mut self, order: &Order, from: OrderStatus, to: OrderStatus);
}

pub trait FillListener: Send {
    fn on_fill(&mut self, fill: &Fill);
}

/// Runs before an order is accepted; returning `Err` aborts submission
/// (the order is never stored).
pub trait PreSubmitValidator: Send {
    fn validate(&mut self, order: &Order) -> Result<()>;
}

pub struct OrderModification {
    pub quantity: Option<Decimal>,
    pub limit_price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    pub tif: Option<crate::core::types::TimeInForce>,
}

/// Checks whether `from -> to` is a transition the state machine allows.
/// Terminal states admit no further transition; everything else mirrors
/// the forward progression `Created -> Pending -> PartiallyFilled ->
/// Filled`, with `Cancelled`/`Rejected` reachable from any open state.
fn transition_allowed(from: OrderStatus, to: OrderStatus) -> bool {
    use OrderStatus::*;
    if from.is_terminal() {
        return false;
    }
    matches!(
        (from, to),
        (Created, Pending)
            | (Created, Rejected)
            | (Created, Cancelled)
            | (Pending, PartiallyFilled)
            | (Pending, Filled)
            | (Pending, Cancelled)
            | (Pending, Rejected)
            | (PartiallyFilled, PartiallyFilled)
            | (PartiallyFilled, Filled)
            | (PartiallyFilled, Cancelled)
    )
}

/// Checks `{symbol set, quantity > 0, limit_price > 0 for Limit/StopLimit,
/// stop_price > 0 for Stop/StopLimit}`.
fn validate_order_fields(order: &Order) -> Result<()> {
    crate::core::validation::validate_order_shape(
        order.symbol,
        order.quantity,
        order.order_type,
        order.limit_price,
        order.stop_price,
    )
}

pub struct OrderManager {
    orders: HashMap<u64, Order>,
    next_id: u64,
    next_fill_id: u64,
    pre_submit_validators: Vec<Box<dyn PreSubmitValidator>>,
    status_listeners: Vec<Box<dyn OrderStatusListener>>,
    fill_listeners: Vec<Box<dyn FillListener>>,
}

impl OrderManager {
    pub fn new() -> Self {
        Self {
            orders: HashMap::new(),
            next_id: 1,
            next_fill_id: 1,
            pre_submit_validators: Vec::new(),
            status_listeners: Vec::new(),
            fill_listeners: Vec::new(),
        }
    }

    pub fn add_pre_submit_validator(&mut self, validator: Box<dyn PreSubmitValidator>) {
        self.pre_submit_validators.push(validator);
    }

    pub fn add_status_listener(&mut self, listener: Box<dyn OrderStatusListener>) {
        self.status_listeners.push(listener);
    }

    pub fn add_fill_listener(&mut self, listener: Box<dyn FillListener>) {
        self.fill_listeners.push(listener);
    }

    /// Runs registered pre-submit validators in registration order (the
    /// first failure aborts), validates the order fields, assigns an id
    /// if zero, stamps timestamps, and transitions `Created -> Pending`.
    pub fn submit_order(&mut self, mut order: Order, now: Timestamp) -> Result<u64> {
        for validator in &mut self.pre_submit_validators {
            validator.validate(&order)?;
        }
        validate_order_fields(&order)?;

        if order.id == 0 {
            order.id = self.next_id;
            self.next_id += 1;
        }
        order.created_at = now;
        order.updated_at = now;
        order.status = OrderStatus::Created;
        let id = order.id;
        self.orders.insert(id, order);
        self.transition(id, OrderStatus::Pending, now)?;
        Ok(id)
    }

    pub fn get(&self, id: u64) -> Option<&Order> {
        self.orders.get(&id)
    }

    pub fn open_orders(&self) -> impl Iterator<Item = &Order> {
        self.orders.values().filter(|o| o.status.is_open())
    }

    fn transition(&mut self, id: u64, to: OrderStatus, now: Timestamp) -> Result<()> {
        let order = self
            .orders
            .get_mut(&id)
            .ok_or_else(|| rf_err!(ErrorCode::NotFound, "order {} not found", id))?;
        let from = order.status;
        if !transition_allowed(from, to) {
            warn!(order_id = id, ?from, ?to, "rejected illegal order transition");
            return Err(rf_err!(
                ErrorCode::InvalidState,
                "illegal order transition {:?} -> {:?} for order {}",
                from,
                to,
                id
            ));
        }
        order.status = to;
        order.updated_at = now;
        let snapshot = order.clone();
        info!(order_id = id, ?from, ?to, "order transition");
        for listener in &mut self.status_listeners {
            listener.on_transition(&snapshot, from, to);
        }
        Ok(())
    }

    /// `NotFound` if missing; `InvalidState` if not in an open status.
    pub fn cancel_order(&mut self, id: u64, now: Timestamp) -> Result<()> {
        let status = self.orders.get(&id).ok_or_else(|| rf_err!(ErrorCode::NotFound, "order {} not found", id))?.status;
        if !status.is_open() {
            return Err(rf_err!(ErrorCode::InvalidState, "order {} is not open (status {:?})", id, status));
        }
        self.transition(id, OrderStatus::Cancelled, now)
    }

    pub fn reject_order(&mut self, id: u64, now: Timestamp) -> Result<()> {
        self.transition(id, OrderStatus::Rejected, now)
    }

    /// Only permitted from open statuses; re-validates after applying the
    /// modification. Does not reset `filled_quantity`.
    pub fn modify_order(&mut self, id: u64, modification: OrderModification, now: Timestamp) -> Result<()> {
        let order = self.orders.get_mut(&id).ok_or_else(|| rf_err!(ErrorCode::NotFound, "order {} not found", id))?;
        if !order.status.is_open() {
            return Err(rf_err!(ErrorCode::InvalidState, "order {} is not open (status {:?})", id, order.status));
        }
        if let Some(q) = modification.quantity {
            order.quantity = q;
        }
        if let Some(p) = modification.limit_price {
            order.limit_price = Some(p);
        }
        if let Some(p) = modification.stop_price {
            order.stop_price = Some(p);
        }
        if let Some(tif) = modification.tif {
            order.tif = tif;
        }
        validate_order_fields(order)?;
        order.updated_at = now;
        Ok(())
    }

    /// Ignored if the order is unknown. Assigns a fill id/timestamp if
    /// zero, accumulates `filled_quantity` by `|fill.quantity|`, updates
    /// the size-weighted average fill price, and transitions to `Filled`
    /// or `PartiallyFilled`. Fill callbacks fire before order callbacks.
    pub fn process_fill(&mut self, mut fill: Fill, now: Timestamp) -> Result<()> {
        if !self.orders.contains_key(&fill.order_id) {
            return Ok(());
        }
        if fill.id == 0 {
            fill.id = self.next_fill_id;
            self.next_fill_id += 1;
        }
        if fill.timestamp == Timestamp::ZERO {
            fill.timestamp = now;
        }

        let order = self.orders.get_mut(&fill.order_id).expect("checked above");
        let prior_filled = order.filled_quantity;
        let fill_qty = fill.quantity.abs();
        let new_filled = prior_filled + fill_qty;
        let prior_notional = order.avg_fill_price.unwrap_or(Decimal::ZERO) * prior_filled;
        let new_notional = prior_notional + fill.price * fill_qty;
        order.filled_quantity = new_filled;
        order.avg_fill_price = if new_filled.is_zero() { None } else { Some(new_notional / new_filled) };

        for listener in &mut self.fill_listeners {
            listener.on_fill(&fill);
        }

        let target = if new_filled >= order.quantity { OrderStatus::Filled } else { OrderStatus::PartiallyFilled };
        self.transition(fill.order_id, target, now)
    }
}

impl Default for OrderManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::symbol_registry::SymbolRegistry;
    use crate::core::types::{OrderSide, SymbolId};
    use rust_decimal_macros::dec;
    use std::sync::{Arc, Mutex};

    fn sym() -> SymbolId {
        SymbolRegistry::new().intern("AAPL")
    }

    #[test]
    fn submit_assigns_id_and_moves_to_pending() {
        let mut mgr = OrderManager::new();
        let order = Order::new(sym(), OrderSide::Buy, OrderType::Market, dec!(100));
        let id = mgr.submit_order(order, Timestamp(1)).unwrap();
        assert_eq!(mgr.get(id).unwrap().status, OrderStatus::Pending);
    }

    #[test]
    fn submit_rejects_nonpositive_quantity() {
        let mut mgr = OrderManager::new();
        let order = Order::new(sym(), OrderSide::Buy, OrderType::Market, dec!(0));
        assert!(mgr.submit_order(order, Timestamp(1)).is_err());
    }

    #[test]
    fn submit_rejects_limit_order_without_limit_price() {
        let mut mgr = OrderManager::new();
        let order = Order::new(sym(), OrderSide::Buy, OrderType::Limit, dec!(10));
        assert!(mgr.submit_order(order, Timestamp(1)).is_err());
    }

    #[test]
    fn terminal_states_reject_further_transitions() {
        let mut mgr = OrderManager::new();
        let order = Order::new(sym(), OrderSide::Buy, OrderType::Market, dec!(100));
        let id = mgr.submit_order(order, Timestamp(1)).unwrap();
        mgr.cancel_order(id, Timestamp(2)).unwrap();
        assert!(mgr.cancel_order(id, Timestamp(3)).is_err());
        assert!(mgr.reject_order(id, Timestamp(3)).is_err());
    }

    #[test]
    fn partial_then_full_fill_reaches_filled() {
        let mut mgr = OrderManager::new();
        let order = Order::new(sym(), OrderSide::Buy, OrderType::Market, dec!(100));
        let id = mgr.submit_order(order, Timestamp(1)).unwrap();

        let fill1 = Fill { id: 0, order_id: id, symbol: sym(), quantity: dec!(60), price: dec!(10.0), commission: dec!(0.1), timestamp: Timestamp(0) };
        mgr.process_fill(fill1, Timestamp(2)).unwrap();
        assert_eq!(mgr.get(id).unwrap().status, OrderStatus::PartiallyFilled);
        assert_eq!(mgr.get(id).unwrap().filled_quantity, dec!(60));

        let fill2 = Fill { id: 0, order_id: id, symbol: sym(), quantity: dec!(40), price: dec!(11.0), commission: dec!(0.1), timestamp: Timestamp(0) };
        mgr.process_fill(fill2, Timestamp(3)).unwrap();
        let final_order = mgr.get(id).unwrap();
        assert_eq!(final_order.status, OrderStatus::Filled);
        assert_eq!(final_order.filled_quantity, dec!(100));
        let expected_avg = (dec!(60) * dec!(10.0) + dec!(40) * dec!(11.0)) / dec!(100);
        assert_eq!(final_order.avg_fill_price.unwrap(), expected_avg);
    }

    #[test]
    fn fill_for_unknown_order_is_silently_ignored() {
        let mut mgr = OrderManager::new();
        let fill = Fill { id: 0, order_id: 999, symbol: sym(), quantity: dec!(1), price: dec!(1), commission: dec!(0), timestamp: Timestamp(1) };
        assert!(mgr.process_fill(fill, Timestamp(1)).is_ok());
    }

    #[test]
    fn modify_order_does_not_reset_filled_quantity() {
        let mut mgr = OrderManager::new();
        let order = Order::new(sym(), OrderSide::Buy, OrderType::Market, dec!(100));
        let id = mgr.submit_order(order, Timestamp(1)).unwrap();
        let fill = Fill { id: 0, order_id: id, symbol: sym(), quantity: dec!(40), price: dec!(10), commission: dec!(0), timestamp: Timestamp(0) };
        mgr.process_fill(fill, Timestamp(2)).unwrap();

        mgr.modify_order(id, OrderModification { quantity: Some(dec!(200)), limit_price: None, stop_price: None, tif: None }, Timestamp(3)).unwrap();
        let order = mgr.get(id).unwrap();
        assert_eq!(order.quantity, dec!(200));
        assert_eq!(order.filled_quantity, dec!(40));
    }

    #[test]
    fn listener_is_notified_on_every_transition() {
        struct CountingListener(Arc<Mutex<u32>>);
        impl OrderStatusListener for CountingListener {
            fn on_transition(&mut self, _order: &Order, _from: OrderStatus, _to: OrderStatus) {
                *self.0.lock().unwrap() += 1;
            }
        }
        let count = Arc::new(Mutex::new(0));
        let mut mgr = OrderManager::new();
        mgr.add_status_listener(Box::new(CountingListener(count.clone())));
        let order = Order::new(sym(), OrderSide::Buy, OrderType::Market, dec!(100));
        let id = mgr.submit_order(order, Timestamp(1)).unwrap();
        mgr.cancel_order(id, Timestamp(2)).unwrap();
        assert_eq!(*count.lock().unwrap(), 2);
    }

    #[test]
    fn failing_pre_submit_validator_aborts_submission() {
        struct AlwaysReject;
        impl PreSubmitValidator for AlwaysReject {
            fn validate(&mut self, _order: &Order) -> Result<()> {
                Err(rf_err!(ErrorCode::InvalidState, "rejected by risk check"))
            }
        }
        let mut mgr = OrderManager::new();
        mgr.add_pre_submit_validator(Box::new(AlwaysReject));
        let order = Order::new(sym(), OrderSide::Buy, OrderType::Market, dec!(100));
        assert!(mgr.submit_order(order, Timestamp(1)).is_err());
        assert_eq!(mgr.open_orders().count(), 0);
    }
}
