//! Portfolio: position accounting and realized/unrealized PnL from fills
//! (§4.7).
//!
//! Cash accounting uses the *signed* fill quantity; `process_fill` on the
//! order manager accumulates `filled_quantity` with `|fill.quantity|`
//! instead — two different surfaces, two different conventions, each
//! documented at its own call site per spec §9's flagged ambiguity.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use tracing::debug;

use crate::core::symbol_registry::SymbolId;
use crate::core::types::{Fill, Position, PortfolioSnapshot, Timestamp};

pub trait PositionListener: Send {
    fn on_position_update(&mut self, position: &Position);
}

pub trait EquityListener: Send {
    fn on_equity_update(&mut self, snapshot: &PortfolioSnapshot);
}

pub struct Portfolio {
    initial_capital: Decimal,
    cash: Decimal,
    currency: String,
    positions: BTreeMap<u32, Position>,
    fills: Vec<Fill>,
    equity_curve: Vec<PortfolioSnapshot>,
    realized_pnl: Decimal,
    position_listeners: Vec<Box<dyn PositionListener>>,
    equity_listeners: Vec<Box<dyn EquityListener>>,
}

impl Portfolio {
    pub fn new(initial_capital: Decimal, currency: impl Into<String>) -> Self {
        Self {
            initial_capital,
            cash: initial_capital,
            currency: currency.into(),
            positions: BTreeMap::new(),
            fills: Vec::new(),
            equity_curve: Vec::new(),
            realized_pnl: Decimal::ZERO,
            position_listeners: Vec::new(),
            equity_listeners: Vec::new(),
        }
    }

    pub fn add_position_listener(&mut self, listener: Box<dyn PositionListener>) {
        self.position_listeners.push(listener);
    }

    pub fn add_equity_listener(&mut self, listener: Box<dyn EquityListener>) {
        self.equity_listeners.push(listener);
    }

    pub fn cash(&self) -> Decimal {
        self.cash
    }

    pub fn initial_capital(&self) -> Decimal {
        self.initial_capital
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn realized_pnl(&self) -> Decimal {
        self.realized_pnl
    }

    pub fn position(&self, symbol: SymbolId) -> Option<&Position> {
        self.positions.get(&symbol.raw())
    }

    pub fn fills(&self) -> &[Fill] {
        &self.fills
    }

    pub fn equity_curve(&self) -> &[PortfolioSnapshot] {
        &self.equity_curve
    }

    /// Cash delta `cash -= fill.price * fill.quantity + fill.commission`
    /// (signed quantity); position delta with realized-PnL accounting on
    /// any reduce/cross/close.
    pub fn update_position(&mut self, fill: Fill) {
        self.cash -= fill.price * fill.quantity + fill.commission;

        let entry = self.positions.entry(fill.symbol.raw()).or_insert_with(|| Position::flat(fill.symbol));
        let old_qty = entry.quantity;
        let old_avg = entry.avg_cost;
        let fill_qty = fill.quantity;

        let same_direction_or_opening = old_qty == Decimal::ZERO || old_qty.signum() == fill_qty.signum();

        if same_direction_or_opening {
            let new_qty = old_qty + fill_qty;
            entry.avg_cost = if new_qty.is_zero() { Decimal::ZERO } else { (old_avg * old_qty + fill.price * fill_qty) / new_qty };
            entry.quantity = new_qty;
        } else {
            let closing_qty = fill_qty.abs().min(old_qty.abs());
            let realized = closing_qty * (fill.price - old_avg) * old_qty.signum();
            self.realized_pnl += realized;

            let new_qty = old_qty + fill_qty;
            if new_qty.is_zero() {
                entry.avg_cost = Decimal::ZERO;
            } else if new_qty.signum() != old_qty.signum() {
                // Crossed through zero: the remainder opens a new position
                // at the fill price.
                entry.avg_cost = fill.price;
            }
            entry.quantity = new_qty;
        }

        entry.current_price = fill.price;
        entry.last_update = fill.timestamp;
        let snapshot = *entry;
        self.fills.push(fill);
        debug!(symbol = fill.symbol.raw(), quantity = %entry.quantity, "position updated");
        for listener in &mut self.position_listeners {
            listener.on_position_update(&snapshot);
        }
    }

    pub fn mark_to_market_one(&mut self, symbol: SymbolId, price: f64, ts: Timestamp) {
        let Ok(price) = Decimal::try_from(price) else { return };
        if let Some(position) = self.positions.get_mut(&symbol.raw()) {
            position.current_price = price;
            position.last_update = ts;
        }
        self.notify_equity(ts);
    }

    pub fn mark_to_market_many(&mut self, prices: &BTreeMap<u32, f64>, ts: Timestamp) {
        for (&raw, &price) in prices {
            let Ok(price) = Decimal::try_from(price) else { continue };
            if let Some(position) = self.positions.get_mut(&raw) {
                position.current_price = price;
                position.last_update = ts;
            }
        }
        self.notify_equity(ts);
    }

    /// Equity = cash + sum(qty*price). Gross = sum |qty*price|. Net =
    /// sum qty*price. Leverage = gross/equity, or 0 if equity is zero.
    pub fn equity(&self) -> Decimal {
        self.cash + self.positions.values().map(|p| p.market_value()).sum::<Decimal>()
    }

    pub fn gross_exposure(&self) -> Decimal {
        self.positions.values().map(|p| p.market_value().abs()).sum()
    }

    pub fn net_exposure(&self) -> Decimal {
        self.positions.values().map(|p| p.market_value()).sum()
    }

    pub fn leverage(&self) -> Decimal {
        let equity = self.equity();
        if equity.is_zero() {
            Decimal::ZERO
        } else {
            self.gross_exposure() / equity
        }
    }

    fn notify_equity(&mut self, ts: Timestamp) {
        let snapshot = self.build_snapshot(ts);
        for listener in &mut self.equity_listeners {
            listener.on_equity_update(&snapshot);
        }
    }

    fn build_snapshot(&self, ts: Timestamp) -> PortfolioSnapshot {
        PortfolioSnapshot {
            timestamp: ts,
            cash: self.cash,
            equity: self.equity(),
            gross_exposure: self.gross_exposure(),
            net_exposure: self.net_exposure(),
            leverage: self.leverage(),
            positions: self.positions.clone(),
        }
    }

    pub fn record_snapshot(&mut self, ts: Timestamp) {
        let snapshot = self.build_snapshot(ts);
        self.equity_curve.push(snapshot);
    }

    /// Atomically replaces the position set, used on broker reconciliation.
    pub fn replace_positions(&mut self, positions: BTreeMap<u32, Position>, ts: Timestamp) {
        self.positions = positions;
        self.notify_equity(ts);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::symbol_registry::SymbolRegistry;
    use rust_decimal_macros::dec;

    fn sym() -> SymbolId {
        SymbolRegistry::new().intern("AAPL")
    }

    fn fill(symbol: SymbolId, qty: Decimal, price: Decimal, commission: Decimal, ts: i64) -> Fill {
        Fill { id: 1, order_id: 1, symbol, quantity: qty, price, commission, timestamp: Timestamp(ts) }
    }

    #[test]
    fn cash_delta_matches_signed_fill_invariant() {
        let mut p = Portfolio::new(dec!(100_000), "USD");
        let s = sym();
        let before = p.cash();
        p.update_position(fill(s, dec!(10), dec!(100), dec!(1), 1));
        assert_eq!(p.cash(), before - (dec!(100) * dec!(10) + dec!(1)));
    }

    #[test]
    fn realized_pnl_on_cross_through_zero() {
        // scenario: start flat, +10 @ 100, then -15 @ 110
        let mut p = Portfolio::new(dec!(100_000), "USD");
        let s = sym();
        p.update_position(fill(s, dec!(10), dec!(100), dec!(0), 1));
        p.update_position(fill(s, dec!(-15), dec!(110), dec!(0), 2));

        let position = p.position(s).unwrap();
        assert_eq!(position.quantity, dec!(-5));
        assert_eq!(position.avg_cost, dec!(110));
        assert_eq!(p.realized_pnl(), dec!(100));
    }

    #[test]
    fn landing_exactly_at_zero_resets_avg_cost() {
        let mut p = Portfolio::new(dec!(100_000), "USD");
        let s = sym();
        p.update_position(fill(s, dec!(10), dec!(100), dec!(0), 1));
        p.update_position(fill(s, dec!(-10), dec!(105), dec!(0), 2));
        let position = p.position(s).unwrap();
        assert_eq!(position.quantity, dec!(0));
        assert_eq!(position.avg_cost, dec!(0));
        assert_eq!(p.realized_pnl(), dec!(50));
    }

    #[test]
    fn equity_and_leverage_reflect_mark_to_market() {
        let mut p = Portfolio::new(dec!(10_000), "USD");
        let s = sym();
        p.update_position(fill(s, dec!(100), dec!(10), dec!(0), 1));
        p.mark_to_market_one(s, 12.0, Timestamp(2));
        assert_eq!(p.equity(), p.cash() + dec!(1200));
        assert!(p.leverage() > Decimal::ZERO);
    }

    #[test]
    fn record_snapshot_appends_to_equity_curve() {
        let mut p = Portfolio::new(dec!(10_000), "USD");
        p.record_snapshot(Timestamp(1));
        p.record_snapshot(Timestamp(2));
        assert_eq!(p.equity_curve().len(), 2);
    }
}
