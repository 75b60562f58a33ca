//! Market-data and order-book caches (§2, §4.10): keep the latest bar/tick/
//! quote/book per symbol plus a bounded recent-bars ring, so a strategy
//! context can answer `latest_bar`/`recent_bars(n)` without re-scanning the
//! event stream. Updated by the dispatcher's market handler as events are
//! popped off the queue; read-only from the strategy's point of view.

use std::collections::HashMap;
use std::collections::VecDeque;

use crate::core::symbol_registry::SymbolId;
use crate::core::types::{Bar, OrderBookSnapshot, Quote, Tick};

const DEFAULT_RECENT_BARS_CAPACITY: usize = 256;

#[derive(Default)]
struct SymbolCache {
    latest_bar: Option<Bar>,
    latest_tick: Option<Tick>,
    latest_quote: Option<Quote>,
    recent_bars: VecDeque<Bar>,
}

/// Per-symbol latest bar/tick/quote plus a capped ring of recent bars.
pub struct MarketDataCache {
    recent_bars_capacity: usize,
    symbols: HashMap<u32, SymbolCache>,
}

impl MarketDataCache {
    pub fn new() -> Self {
        Self::with_recent_bars_capacity(DEFAULT_RECENT_BARS_CAPACITY)
    }

    pub fn with_recent_bars_capacity(capacity: usize) -> Self {
        Self {
            recent_bars_capacity: capacity.max(1),
            symbols: HashMap::new(),
        }
    }

    pub fn on_bar(&mut self, bar: Bar) {
        let entry = self.symbols.entry(bar.symbol.raw()).or_default();
        entry.recent_bars.push_back(bar);
        if entry.recent_bars.len() > self.recent_bars_capacity {
            entry.recent_bars.pop_front();
        }
        entry.latest_bar = Some(bar);
    }

    pub fn on_tick(&mut self, tick: Tick) {
        self.symbols.entry(tick.symbol.raw()).or_default().latest_tick = Some(tick);
    }

    pub fn on_quote(&mut self, quote: Quote) {
        self.symbols.entry(quote.symbol.raw()).or_default().latest_quote = Some(quote);
    }

    pub fn latest_bar(&self, symbol: SymbolId) -> Option<Bar> {
        self.symbols.get(&symbol.raw()).and_then(|s| s.latest_bar)
    }

    pub fn latest_tick(&self, symbol: SymbolId) -> Option<Tick> {
        self.symbols.get(&symbol.raw()).and_then(|s| s.latest_tick)
    }

    pub fn latest_quote(&self, symbol: SymbolId) -> Option<Quote> {
        self.symbols.get(&symbol.raw()).and_then(|s| s.latest_quote)
    }

    /// Most recent `n` bars for `symbol`, oldest first. Fewer than `n` are
    /// returned if the cache hasn't accumulated that many yet.
    pub fn recent_bars(&self, symbol: SymbolId, n: usize) -> Vec<Bar> {
        let Some(cache) = self.symbols.get(&symbol.raw()) else {
            return Vec::new();
        };
        let len = cache.recent_bars.len();
        let skip = len.saturating_sub(n);
        cache.recent_bars.iter().skip(skip).copied().collect()
    }
}

impl Default for MarketDataCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Latest order-book snapshot per symbol, kept separate from
/// [`MarketDataCache`] because books are read by the execution pipeline's
/// depth walk on the hot path and most strategies never touch them.
#[derive(Default)]
pub struct OrderBookCache {
    books: HashMap<u32, OrderBookSnapshot>,
}

impl OrderBookCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_book(&mut self, book: OrderBookSnapshot) {
        self.books.insert(book.symbol.raw(), book);
    }

    pub fn latest(&self, symbol: SymbolId) -> Option<&OrderBookSnapshot> {
        self.books.get(&symbol.raw())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::symbol_registry::SymbolRegistry;
    use crate::core::types::Timestamp;

    fn sym() -> SymbolId {
        SymbolRegistry::new().intern("AAPL")
    }

    fn bar(ts: i64, symbol: SymbolId, close: f64) -> Bar {
        Bar {
            timestamp: Timestamp(ts),
            symbol,
            open: close,
            high: close,
            low: close,
            close,
            volume: 1,
            trade_count: 1,
            vwap: close,
        }
    }

    #[test]
    fn latest_bar_tracks_the_last_pushed() {
        let mut cache = MarketDataCache::new();
        let s = sym();
        cache.on_bar(bar(1, s, 10.0));
        cache.on_bar(bar(2, s, 11.0));
        assert_eq!(cache.latest_bar(s).unwrap().close, 11.0);
    }

    #[test]
    fn recent_bars_caps_at_capacity_and_preserves_order() {
        let mut cache = MarketDataCache::with_recent_bars_capacity(3);
        let s = sym();
        for i in 0..5 {
            cache.on_bar(bar(i, s, i as f64));
        }
        let recent = cache.recent_bars(s, 10);
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].close, 2.0);
        assert_eq!(recent[2].close, 4.0);
    }

    #[test]
    fn unknown_symbol_returns_empty() {
        let cache = MarketDataCache::new();
        assert!(cache.recent_bars(sym(), 5).is_empty());
        assert!(cache.latest_bar(sym()).is_none());
    }

    #[test]
    fn order_book_cache_tracks_latest_per_symbol() {
        let mut cache = OrderBookCache::new();
        let s = sym();
        let book = OrderBookSnapshot::empty(Timestamp(1), s);
        cache.on_book(book);
        assert!(cache.latest(s).is_some());
    }
}
