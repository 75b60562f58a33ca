//! Typed hook kinds and the strategy context facade (§4.10).
//!
//! The untyped pre/post-dispatch hooks in [`super::hooks`] observe every
//! event that flows through the [`super::dispatcher::EventLoop`]. This
//! module is the *other* hook layer spec §4.10 calls for: a
//! priority-ordered registry keyed by a specific [`HookKind`]
//! (`BacktestStart`, `Bar`, `OrderSubmit`, ...), invoked from inside a
//! handler body so that body can honor `Cancel`/`Skip` on its own
//! data-level event — e.g. a `Bar` hook vetoing the bar before it reaches
//! the strategy.

use std::collections::HashMap;

use crate::core::errors::Result;
use crate::core::symbol_registry::SymbolId;
use crate::core::types::{Bar, Duration, Event, OrderBookSnapshot, Quote, Tick, Timestamp};

use super::cache::{MarketDataCache, OrderBookCache};
use super::hooks::HookDecision;
use super::order_manager::OrderManager;
use super::portfolio::Portfolio;
use super::timer::TimerService;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    BacktestStart,
    BacktestEnd,
    DayStart,
    DayEnd,
    Bar,
    Tick,
    Quote,
    Book,
    Timer,
    OrderSubmit,
    Fill,
    RegimeChange,
}

pub trait TypedHook: Send {
    fn on_event(&mut self, kind: HookKind, event: &Event) -> HookDecision;
    fn priority(&self) -> i32 {
        0
    }
}

struct Entry {
    hook: Box<dyn TypedHook>,
    priority: i32,
}

/// Per-[`HookKind`] priority-ordered callback registry. Ascending priority
/// (smaller first), stable within a priority tier by insertion order.
#[derive(Default)]
pub struct HookManager {
    by_kind: HashMap<HookKind, Vec<Entry>>,
}

impl HookManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: HookKind, hook: Box<dyn TypedHook>) {
        let priority = hook.priority();
        let entries = self.by_kind.entry(kind).or_default();
        entries.push(Entry { hook, priority });
        entries.sort_by_key(|e| e.priority);
    }

    /// Invokes every hook registered for `kind` in priority order.
    /// Returns `Cancel` if any hook returns `Cancel`; `Skip` stops
    /// invoking further hooks for this call but does not itself cancel.
    pub fn invoke(&mut self, kind: HookKind, event: &Event) -> HookDecision {
        let Some(entries) = self.by_kind.get_mut(&kind) else {
            return HookDecision::Continue;
        };
        for entry in entries {
            match entry.hook.on_event(kind, event) {
                HookDecision::Continue => continue,
                HookDecision::Skip => return HookDecision::Skip,
                HookDecision::Cancel => return HookDecision::Cancel,
            }
        }
        HookDecision::Continue
    }
}

/// Non-owning facade over engine-owned subsystems, handed to a strategy for
/// the duration of one event's handling. Per spec §3, its lifetime must not
/// outlive the engine that owns the borrowed subsystems — enforced here by
/// the `'a` lifetime rather than reference counting, since the backtest
/// engine drives everything from a single thread.
pub struct StrategyContext<'a> {
    pub order_manager: &'a mut OrderManager,
    pub portfolio: &'a Portfolio,
    pub market_cache: &'a MarketDataCache,
    pub book_cache: &'a OrderBookCache,
    pub timers: &'a mut TimerService,
    pub current_time: Timestamp,
    pub current_regime: String,
}

impl<'a> StrategyContext<'a> {
    /// Stamps `created_at`/`updated_at` at `current_time` and records the
    /// current regime as order metadata before submitting.
    pub fn submit_order(&mut self, mut order: crate::core::types::Order) -> Result<u64> {
        order.created_at = self.current_time;
        order.updated_at = self.current_time;
        order
            .metadata
            .insert("regime".to_string(), self.current_regime.clone());
        self.order_manager.submit_order(order, self.current_time)
    }

    pub fn cancel_order(&mut self, id: u64) -> Result<()> {
        self.order_manager.cancel_order(id, self.current_time)
    }

    pub fn portfolio(&self) -> &Portfolio {
        self.portfolio
    }

    pub fn latest_bar(&self, symbol: SymbolId) -> Option<Bar> {
        self.market_cache.latest_bar(symbol)
    }

    pub fn latest_tick(&self, symbol: SymbolId) -> Option<Tick> {
        self.market_cache.latest_tick(symbol)
    }

    pub fn latest_quote(&self, symbol: SymbolId) -> Option<Quote> {
        self.market_cache.latest_quote(symbol)
    }

    pub fn latest_order_book(&self, symbol: SymbolId) -> Option<&OrderBookSnapshot> {
        self.book_cache.latest(symbol)
    }

    pub fn recent_bars(&self, symbol: SymbolId, n: usize) -> Vec<Bar> {
        self.market_cache.recent_bars(symbol, n)
    }

    pub fn current_regime(&self) -> &str {
        &self.current_regime
    }

    pub fn current_time(&self) -> Timestamp {
        self.current_time
    }

    pub fn schedule_timer(&mut self, id: u64, interval: Duration) {
        self.timers.schedule(id, self.current_time, interval);
    }

    pub fn cancel_timer(&mut self, id: u64) {
        self.timers.cancel(id);
    }
}
