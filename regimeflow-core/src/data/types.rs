//! External collaborator interfaces consumed by the event generator and the
//! backtest engine (§6): market-data iterators and the data-source facade
//! that produces them. Concrete implementations (CSV/DB loaders, schema
//! validation) are out of scope (§1) — these traits are the seam.

use crate::core::errors::Result;
use crate::core::symbol_registry::SymbolId;
use crate::core::types::{Bar, OrderBookSnapshot, Tick, Timestamp};

/// Inclusive time range; `(Timestamp(0), Timestamp(0))` is a sentinel for
/// "the full range" (mirrored by the mmap reader's `find_range`, §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl TimeRange {
    pub const FULL: TimeRange = TimeRange {
        start: Timestamp(0),
        end: Timestamp(0),
    };

    pub fn new(start: Timestamp, end: Timestamp) -> Self {
        Self { start, end }
    }

    pub fn is_full(&self) -> bool {
        self.start.micros() == 0 && self.end.micros() == 0
    }

    pub fn contains(&self, ts: Timestamp) -> bool {
        self.is_full() || (ts >= self.start && ts <= self.end)
    }
}

/// Bar aggregation kind, matching the mmap `bar_type` enum (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarType {
    OneMinute,
    FiveMinute,
    FifteenMinute,
    ThirtyMinute,
    OneHour,
    FourHour,
    OneDay,
    Volume,
    Tick,
    Dollar,
}

impl BarType {
    pub fn wire_code(self) -> u32 {
        match self {
            BarType::OneMinute => 0,
            BarType::FiveMinute => 1,
            BarType::FifteenMinute => 2,
            BarType::ThirtyMinute => 3,
            BarType::OneHour => 4,
            BarType::FourHour => 5,
            BarType::OneDay => 6,
            BarType::Volume => 7,
            BarType::Tick => 8,
            BarType::Dollar => 9,
        }
    }
}

/// Sorted-by-timestamp iterator over one symbol's bars.
pub trait BarIterator {
    fn reset(&mut self) -> Result<()>;
    fn has_next(&self) -> bool;
    fn next(&mut self) -> Option<Bar>;
}

/// Sorted-by-timestamp iterator over one symbol's ticks.
pub trait TickIterator {
    fn reset(&mut self) -> Result<()>;
    fn has_next(&self) -> bool;
    fn next(&mut self) -> Option<Tick>;
}

/// Sorted-by-timestamp iterator over one symbol's order-book snapshots.
pub trait OrderBookIterator {
    fn reset(&mut self) -> Result<()>;
    fn has_next(&self) -> bool;
    fn next(&mut self) -> Option<OrderBookSnapshot>;
}

/// External collaborator that produces bars/ticks/books and the iterators
/// the generator consumes (§6). A concrete implementation (CSV, database,
/// mmap file set) lives outside this crate.
pub trait DataSource {
    fn get_bars(&self, symbol: SymbolId, range: TimeRange, bar_type: BarType) -> Result<Vec<Bar>>;
    fn get_ticks(&self, symbol: SymbolId, range: TimeRange) -> Result<Vec<Tick>>;
    fn get_available_range(&self, symbol: SymbolId) -> Result<TimeRange>;
    fn get_available_symbols(&self) -> Result<Vec<SymbolId>>;

    fn create_iterator(
        &self,
        symbols: &[SymbolId],
        range: TimeRange,
        bar_type: BarType,
    ) -> Result<Box<dyn BarIterator>>;
    fn create_tick_iterator(
        &self,
        symbols: &[SymbolId],
        range: TimeRange,
    ) -> Result<Box<dyn TickIterator>>;
    fn create_book_iterator(
        &self,
        symbols: &[SymbolId],
        range: TimeRange,
    ) -> Result<Box<dyn OrderBookIterator>>;
}
