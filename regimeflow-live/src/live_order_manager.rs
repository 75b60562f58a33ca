//! Live order manager (§4.9): the broker-facing counterpart of
//! `regimeflow_core::engine::order_manager::OrderManager`, with its own
//! stricter state machine (`LiveOrderStatus` has `PendingNew`/
//! `PendingCancel`, which the backtest order manager never needs) and a
//! reconciliation path that recovers truth from the broker after a
//! disconnect.

use std::collections::HashMap;

use regimeflow_core::core::errors::{ErrorCode, Result};
use regimeflow_core::core::symbol_registry::SymbolId;
use regimeflow_core::core::types::{LiveOrder, LiveOrderStatus, OrderSide, OrderType, TimeInForce, Timestamp};
use regimeflow_core::core::validate_order_shape;
use regimeflow_core::rf_err;
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::broker::{BrokerAdapter, ExecutionReport, NewOrderRequest};

pub trait LiveOrderListener: Send {
    fn on_transition(&mut self, order: &LiveOrder, from: LiveOrderStatus, to: LiveOrderStatus);
    fn on_fill(&mut self, order: &LiveOrder, fill_quantity: Decimal, fill_price: Decimal, commission: Decimal);
}

/// Checks the §4.9 transition table. Terminal states admit nothing further.
fn transition_allowed(from: LiveOrderStatus, to: LiveOrderStatus) -> bool {
    use LiveOrderStatus::*;
    if from.is_terminal() {
        return false;
    }
    matches!(
        (from, to),
        (PendingNew, New)
            | (PendingNew, PartiallyFilled)
            | (PendingNew, Filled)
            | (PendingNew, Rejected)
            | (PendingNew, Cancelled)
            | (PendingNew, Expired)
            | (PendingNew, Error)
            | (New, PartiallyFilled)
            | (New, Filled)
            | (New, Cancelled)
            | (New, Rejected)
            | (New, Expired)
            | (New, Error)
            | (PartiallyFilled, PartiallyFilled)
            | (PartiallyFilled, Filled)
            | (PartiallyFilled, Cancelled)
            | (PartiallyFilled, Rejected)
            | (PartiallyFilled, Expired)
            | (PartiallyFilled, Error)
            | (PendingCancel, Cancelled)
            | (PendingCancel, Rejected)
            | (PendingCancel, Expired)
            | (PendingCancel, Error)
    )
}

pub struct LiveOrderManager {
    orders: HashMap<u64, LiveOrder>,
    by_broker_id: HashMap<String, u64>,
    next_id: u64,
    listeners: Vec<Box<dyn LiveOrderListener>>,
}

impl LiveOrderManager {
    pub fn new() -> Self {
        Self { orders: HashMap::new(), by_broker_id: HashMap::new(), next_id: 1, listeners: Vec::new() }
    }

    pub fn add_listener(&mut self, listener: Box<dyn LiveOrderListener>) {
        self.listeners.push(listener);
    }

    pub fn get(&self, id: u64) -> Option<&LiveOrder> {
        self.orders.get(&id)
    }

    pub fn find_by_broker_id(&self, broker_order_id: &str) -> Option<&LiveOrder> {
        self.by_broker_id.get(broker_order_id).and_then(|id| self.orders.get(id))
    }

    pub fn open_orders(&self) -> impl Iterator<Item = &LiveOrder> {
        self.orders.values().filter(|o| !o.status.is_terminal())
    }

    /// Validates (same rules as §4.5), requests submission from the
    /// broker, and stores the order as `PendingNew` on success.
    pub fn submit_order(
        &mut self,
        broker: &mut dyn BrokerAdapter,
        symbol: SymbolId,
        side: OrderSide,
        order_type: OrderType,
        quantity: Decimal,
        limit_price: Option<Decimal>,
        stop_price: Option<Decimal>,
        tif: TimeInForce,
        now: Timestamp,
    ) -> Result<u64> {
        validate_order_shape(symbol, quantity, order_type, limit_price, stop_price)?;

        let request = NewOrderRequest { symbol, side, order_type, quantity, limit_price, stop_price, tif };
        let broker_order_id = broker.submit_order(&request)?;

        let id = self.next_id;
        self.next_id += 1;
        let order = LiveOrder {
            id,
            symbol,
            side,
            order_type,
            quantity,
            limit_price,
            stop_price,
            tif,
            filled_quantity: Decimal::ZERO,
            avg_fill_price: None,
            strategy_id: None,
            created_at: now,
            updated_at: now,
            metadata: HashMap::new(),
            broker_order_id: Some(broker_order_id.clone()),
            broker_exec_id: None,
            status: LiveOrderStatus::PendingNew,
            submitted_at: Some(now),
            acked_at: None,
            filled_at: None,
        };
        self.orders.insert(id, order);
        self.by_broker_id.insert(broker_order_id, id);
        Ok(id)
    }

    pub fn cancel_order(&mut self, broker: &mut dyn BrokerAdapter, id: u64, now: Timestamp) -> Result<()> {
        let order = self.orders.get_mut(&id).ok_or_else(|| rf_err!(ErrorCode::NotFound, "live order {} not found", id))?;
        if order.status.is_terminal() {
            return Err(rf_err!(ErrorCode::InvalidState, "live order {} is already terminal ({:?})", id, order.status));
        }
        let broker_order_id = order.broker_order_id.clone().ok_or_else(|| {
            rf_err!(ErrorCode::InvalidState, "live order {} has no broker order id yet", id)
        })?;
        broker.cancel_order(&broker_order_id)?;
        order.status = LiveOrderStatus::PendingCancel;
        order.updated_at = now;
        Ok(())
    }

    pub fn cancel_all(&mut self, broker: &mut dyn BrokerAdapter, now: Timestamp) -> Result<()> {
        let ids: Vec<u64> = self.open_orders().map(|o| o.id).collect();
        for id in ids {
            self.cancel_order(broker, id, now)?;
        }
        Ok(())
    }

    pub fn cancel_orders(&mut self, broker: &mut dyn BrokerAdapter, symbol: SymbolId, now: Timestamp) -> Result<()> {
        let ids: Vec<u64> = self.open_orders().filter(|o| o.symbol == symbol).map(|o| o.id).collect();
        for id in ids {
            self.cancel_order(broker, id, now)?;
        }
        Ok(())
    }

    /// Applies one broker report (§4.9): finds the order by
    /// `broker_order_id`, runs the state machine, updates
    /// `filled_quantity`/`avg_fill_price` on (Partially)Filled, and
    /// invokes listeners. An unknown `(from, to)` pair sets the order to
    /// `Error` with no quantity change and leaves future reports on it
    /// ignored (testable property 4).
    pub fn handle_execution_report(&mut self, report: &ExecutionReport, now: Timestamp) {
        let Some(&id) = self.by_broker_id.get(&report.broker_order_id) else {
            warn!(broker_order_id = %report.broker_order_id, "execution report for unknown order");
            return;
        };
        let order = self.orders.get_mut(&id).expect("by_broker_id index must stay in sync");
        if order.status.is_terminal() {
            return;
        }
        let from = order.status;
        let to = report.status;

        if !transition_allowed(from, to) {
            warn!(order_id = id, ?from, ?to, "invalid live order transition, moving to Error");
            order.status = LiveOrderStatus::Error;
            order.updated_at = now;
            let snapshot = order.clone();
            for listener in &mut self.listeners {
                listener.on_transition(&snapshot, from, LiveOrderStatus::Error);
            }
            return;
        }

        order.broker_exec_id = report.broker_exec_id.clone().or_else(|| order.broker_exec_id.clone());
        if matches!(to, LiveOrderStatus::New) && order.acked_at.is_none() {
            order.acked_at = Some(now);
        }
        if matches!(to, LiveOrderStatus::PartiallyFilled | LiveOrderStatus::Filled) {
            order.filled_quantity = report.filled_quantity;
            order.avg_fill_price = report.avg_fill_price;
            if matches!(to, LiveOrderStatus::Filled) {
                order.filled_at = Some(now);
            }
        }
        order.status = to;
        order.updated_at = now;
        let snapshot = order.clone();

        info!(order_id = id, ?from, ?to, "live order transition");
        if matches!(to, LiveOrderStatus::PartiallyFilled | LiveOrderStatus::Filled) {
            let fill_quantity = report.filled_quantity - (snapshot.filled_quantity - report.filled_quantity).max(Decimal::ZERO);
            for listener in &mut self.listeners {
                listener.on_fill(&snapshot, fill_quantity, report.avg_fill_price.unwrap_or(Decimal::ZERO), report.commission);
            }
        }
        for listener in &mut self.listeners {
            listener.on_transition(&snapshot, from, to);
        }
    }

    /// Pulls every open order the broker reports and reconciles (§4.9):
    /// known orders get their report applied; unknown ones are synthesized
    /// at the next internal id with the broker's reported status, used on
    /// startup or after a disconnect to recover truth. Idempotent:
    /// applying the same report set twice yields the same map (testable
    /// property 10) because a second application of an identical terminal
    /// or identical in-place status is a no-op transition `(x, x)` only
    /// for `PartiallyFilled`; all other repeats are rejected transitions
    /// that this method guards against by checking equality first.
    pub fn reconcile_with_broker(&mut self, broker: &mut dyn BrokerAdapter, now: Timestamp) -> Result<()> {
        let reports = broker.get_open_orders()?;
        for report in &reports {
            if let Some(&id) = self.by_broker_id.get(&report.broker_order_id) {
                let order = self.orders.get(&id).expect("index in sync");
                if order.status == report.status
                    && order.filled_quantity == report.filled_quantity
                    && order.avg_fill_price == report.avg_fill_price
                {
                    continue;
                }
                self.handle_execution_report(report, now);
            } else {
                let id = self.next_id;
                self.next_id += 1;
                let order = LiveOrder {
                    id,
                    symbol: report.symbol,
                    side: report.side,
                    order_type: OrderType::Limit,
                    quantity: report.filled_quantity.max(Decimal::ONE),
                    limit_price: report.avg_fill_price,
                    stop_price: None,
                    tif: TimeInForce::Gtc,
                    filled_quantity: report.filled_quantity,
                    avg_fill_price: report.avg_fill_price,
                    strategy_id: None,
                    created_at: now,
                    updated_at: now,
                    metadata: HashMap::new(),
                    broker_order_id: Some(report.broker_order_id.clone()),
                    broker_exec_id: report.broker_exec_id.clone(),
                    status: report.status,
                    submitted_at: Some(now),
                    acked_at: Some(now),
                    filled_at: if matches!(report.status, LiveOrderStatus::Filled) { Some(now) } else { None },
                };
                info!(order_id = id, broker_order_id = %report.broker_order_id, "synthesized live order during reconciliation");
                self.by_broker_id.insert(report.broker_order_id.clone(), id);
                self.orders.insert(id, order);
            }
        }
        Ok(())
    }
}

impl Default for LiveOrderManager {
    fn default() -> Self {
        Self::new()
    }
}
