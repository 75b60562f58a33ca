//! Convenience wrappers around the writer, grounded on the original
//! implementation's `mmap_builder` tool (`SPEC_FULL.md` §6) minus its CLI
//! argument parsing, which is out of scope. An embedding application calls
//! these directly once it has assembled records from its own data source.

use std::path::Path;

use crate::core::errors::Result;
use crate::core::types::{Bar, OrderBookSnapshot, Tick};
use crate::data::types::BarType;

use super::writer::{write_bars, write_books, write_ticks};

pub struct MmapBuilder;

impl MmapBuilder {
    pub fn build_bars(path: &Path, symbol: &str, bar_type: BarType, bar_size_ms: u32, bars: &[Bar]) -> Result<()> {
        write_bars(path, symbol, bar_type.wire_code(), bar_size_ms, bars)
    }

    pub fn build_ticks(path: &Path, symbol: &str, ticks: &[Tick]) -> Result<()> {
        write_ticks(path, symbol, ticks)
    }

    pub fn build_books(path: &Path, symbol: &str, books: &[OrderBookSnapshot]) -> Result<()> {
        write_books(path, symbol, books)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::symbol_registry::SymbolRegistry;
    use crate::core::types::Timestamp;
    use tempfile::tempdir;

    #[test]
    fn builder_delegates_to_writer() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bars.rgm");
        let reg = SymbolRegistry::new();
        let sym = reg.intern("MSFT");
        let bars = vec![Bar {
            timestamp: Timestamp(1_000_000),
            symbol: sym,
            open: 1.0,
            high: 1.0,
            low: 1.0,
            close: 1.0,
            volume: 1,
            trade_count: 1,
            vwap: 1.0,
        }];
        MmapBuilder::build_bars(&path, "MSFT", BarType::OneMinute, 60_000_000, &bars).unwrap();
        assert!(path.exists());
    }
}
