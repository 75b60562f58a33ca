//! Read-only memory-mapped reader for the columnar file format (§4.8).
//!
//! `open` maps the file read-only, verifies magic/version, and bounds-checks
//! `data_offset` and every column's derived extent with checked arithmetic;
//! any mismatch fails construction (a fatal error per §7, not a recoverable
//! one once the caller is past this point — but surfaced as a `Result` so
//! the caller can fail the engine's own construction cleanly). `find_range`
//! binary-searches the timestamps column; `(0, 0)` is a sentinel for "the
//! full range". View types (`BarView`/`TickView`/`BookView`) are
//! index+base-pointer pairs: `at(i)` is bounds-checked, `Index::index` is
//! not.

use memmap2::Mmap;
use std::fs::File;
use std::path::Path;

use crate::core::errors::{Error, ErrorCode, Result};
use crate::core::types::{Bar, BookLevel, OrderBookSnapshot, Tick, Timestamp, BOOK_DEPTH};
use crate::data::types::TimeRange;

use super::checksum::checksum;
use super::header::{Header, DateIndexEntry, DATE_INDEX_ENTRY_SIZE, HEADER_SIZE};

fn checked_column_range(start: u64, elem_size: usize, count: u64, file_len: u64) -> Result<(usize, usize)> {
    let bytes = elem_size
        .checked_mul(count as usize)
        .ok_or_else(|| Error::new(ErrorCode::OutOfRange, "column size overflow", "data/mmap/reader.rs"))?;
    let end = start
        .checked_add(bytes as u64)
        .ok_or_else(|| Error::new(ErrorCode::OutOfRange, "column extent overflow", "data/mmap/reader.rs"))?;
    if end > file_len {
        return Err(Error::new(
            ErrorCode::OutOfRange,
            "column extent exceeds file size",
            "data/mmap/reader.rs",
        ));
    }
    Ok((start as usize, end as usize))
}

/// A single mapped file, generic over which magic it validates against.
/// Owns the `Mmap`; moving this struct transfers the mapping, and dropping
/// it unmaps the file.
pub struct MmapFile {
    mmap: Mmap,
    header: Header,
}

impl MmapFile {
    fn open_checked(path: &Path, expected_magic: [u8; 8]) -> Result<Self> {
        let file = File::open(path)
            .map_err(|e| Error::new(ErrorCode::IoError, e.to_string(), "data/mmap/reader.rs:open"))?;
        let mmap = unsafe { Mmap::map(&file) }
            .map_err(|e| Error::new(ErrorCode::IoError, e.to_string(), "data/mmap/reader.rs:open"))?;
        if mmap.len() < HEADER_SIZE {
            return Err(Error::new(
                ErrorCode::ParseError,
                "file shorter than header",
                "data/mmap/reader.rs:open",
            ));
        }
        let header = Header::from_bytes(&mmap[..HEADER_SIZE], expected_magic)?;
        let file_len = mmap.len() as u64;
        if header.data_offset < HEADER_SIZE as u64 || header.data_offset >= file_len {
            return Err(Error::new(
                ErrorCode::OutOfRange,
                "data_offset out of bounds",
                "data/mmap/reader.rs:open",
            ));
        }
        Ok(Self { mmap, header })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    fn data_columns(&self) -> &[u8] {
        &self.mmap[self.header.data_offset as usize..self.header.index_offset as usize]
    }

    /// Recomputes SHA-256 over the data columns and compares to the header
    /// checksum.
    pub fn verify_checksum(&self) -> bool {
        checksum(self.data_columns()) == self.header.checksum
    }

    /// Read-only walk over the index pages to fault them into the page
    /// cache ahead of the first `find_range` call.
    pub fn preload_index(&self) {
        let start = self.header.index_offset as usize;
        let mut touched: u64 = 0;
        for byte in &self.mmap[start.min(self.mmap.len())..] {
            touched = touched.wrapping_add(*byte as u64);
        }
        std::hint::black_box(touched);
    }

    fn date_index(&self) -> Vec<DateIndexEntry> {
        let start = self.header.index_offset as usize;
        let mut entries = Vec::new();
        let mut offset = start;
        while offset + DATE_INDEX_ENTRY_SIZE <= self.mmap.len() {
            entries.push(DateIndexEntry::from_bytes(&self.mmap[offset..offset + DATE_INDEX_ENTRY_SIZE]));
            offset += DATE_INDEX_ENTRY_SIZE;
        }
        entries
    }

    fn timestamps_column(&self) -> &[i64] {
        let start = self.header.data_offset as usize;
        let count = self.header.record_count as usize;
        let bytes = &self.mmap[start..start + count * 8];
        bytes_as_i64_slice(bytes)
    }

    /// Binary search on the timestamps column; `(0, 0)` returns the full
    /// row range `[0, record_count)`.
    pub fn find_range(&self, range: TimeRange) -> (usize, usize) {
        let count = self.header.record_count as usize;
        if range.is_full() {
            return (0, count);
        }
        let timestamps = self.timestamps_column();
        let start = timestamps.partition_point(|&t| t < range.start.micros());
        let end = timestamps.partition_point(|&t| t <= range.end.micros());
        (start, end.max(start))
    }

    /// Row offset of the first record on or after `date` via the date
    /// index, falling back to a linear scan if `date` isn't a boundary.
    pub fn seek_date(&self, yyyymmdd: u32) -> Option<usize> {
        let index = self.date_index();
        let pos = index.partition_point(|e| e.yyyymmdd < yyyymmdd);
        index.get(pos).map(|e| e.offset as usize)
    }
}

fn bytes_as_i64_slice(bytes: &[u8]) -> &[i64] {
    assert_eq!(bytes.len() % 8, 0);
    let ptr = bytes.as_ptr() as *const i64;
    unsafe { std::slice::from_raw_parts(ptr, bytes.len() / 8) }
}

fn bytes_as_f64_slice(bytes: &[u8]) -> &[f64] {
    assert_eq!(bytes.len() % 8, 0);
    let ptr = bytes.as_ptr() as *const f64;
    unsafe { std::slice::from_raw_parts(ptr, bytes.len() / 8) }
}

fn bytes_as_u64_slice(bytes: &[u8]) -> &[u64] {
    assert_eq!(bytes.len() % 8, 0);
    let ptr = bytes.as_ptr() as *const u64;
    unsafe { std::slice::from_raw_parts(ptr, bytes.len() / 8) }
}

fn bytes_as_u32_slice(bytes: &[u8]) -> &[u32] {
    assert_eq!(bytes.len() % 4, 0);
    let ptr = bytes.as_ptr() as *const u32;
    unsafe { std::slice::from_raw_parts(ptr, bytes.len() / 4) }
}

/// Reader over a bar file. Column accessors return contiguous spans for
/// zero-copy downstream processing.
pub struct BarReader {
    file: MmapFile,
}

impl BarReader {
    pub fn open(path: &Path) -> Result<Self> {
        let file = MmapFile::open_checked(path, super::header::BAR_MAGIC)?;
        let file_len = file.mmap.len() as u64;
        let count = file.header.record_count;
        let base = file.header.data_offset;
        checked_column_range(base, 8, count, file_len)?; // timestamps
        checked_column_range(base + count * 8, 8, count, file_len)?; // open
        checked_column_range(base + count * 16, 8, count, file_len)?; // high
        checked_column_range(base + count * 24, 8, count, file_len)?; // low
        checked_column_range(base + count * 32, 8, count, file_len)?; // close
        checked_column_range(base + count * 40, 8, count, file_len)?; // volume
        Ok(Self { file })
    }

    pub fn header(&self) -> &Header {
        self.file.header()
    }

    pub fn record_count(&self) -> usize {
        self.file.header.record_count as usize
    }

    pub fn find_range(&self, range: TimeRange) -> (usize, usize) {
        self.file.find_range(range)
    }

    pub fn preload_index(&self) {
        self.file.preload_index()
    }

    pub fn verify_checksum(&self) -> bool {
        self.file.verify_checksum()
    }

    fn column(&self, col_index: usize) -> &[u8] {
        let base = self.file.header.data_offset as usize;
        let count = self.record_count();
        let start = base + col_index * count * 8;
        &self.file.mmap[start..start + count * 8]
    }

    pub fn timestamps(&self) -> &[i64] {
        bytes_as_i64_slice(self.column(0))
    }
    pub fn opens(&self) -> &[f64] {
        bytes_as_f64_slice(self.column(1))
    }
    pub fn highs(&self) -> &[f64] {
        bytes_as_f64_slice(self.column(2))
    }
    pub fn lows(&self) -> &[f64] {
        bytes_as_f64_slice(self.column(3))
    }
    pub fn closes(&self) -> &[f64] {
        bytes_as_f64_slice(self.column(4))
    }
    pub fn volumes(&self) -> &[u64] {
        bytes_as_u64_slice(self.column(5))
    }

    /// Lightweight view over this reader's bar columns.
    pub fn view(&self, symbol: crate::core::symbol_registry::SymbolId) -> BarView<'_> {
        BarView { reader: self, symbol }
    }
}

/// Index+base-pointer view; `at` is bounds-checked, `Index::index` is not
/// (§4.8).
pub struct BarView<'a> {
    reader: &'a BarReader,
    symbol: crate::core::symbol_registry::SymbolId,
}

impl<'a> BarView<'a> {
    pub fn len(&self) -> usize {
        self.reader.record_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn at(&self, i: usize) -> Option<Bar> {
        if i >= self.len() {
            return None;
        }
        Some(self.get_unchecked(i))
    }

    /// Unchecked equivalent of `at` — out-of-bounds `i` panics on the
    /// underlying slice index rather than returning `None`.
    pub fn get_unchecked(&self, i: usize) -> Bar {
        // `trade_count`/`vwap` aren't persisted by this format (§6's
        // column list omits them); they're reconstructed as zero/close.
        Bar {
            timestamp: Timestamp(self.reader.timestamps()[i]),
            symbol: self.symbol,
            open: self.reader.opens()[i],
            high: self.reader.highs()[i],
            low: self.reader.lows()[i],
            close: self.reader.closes()[i],
            volume: self.reader.volumes()[i],
            trade_count: 0,
            vwap: self.reader.closes()[i],
        }
    }
}

/// Reader over a tick file.
pub struct TickReader {
    file: MmapFile,
}

impl TickReader {
    pub fn open(path: &Path) -> Result<Self> {
        let file = MmapFile::open_checked(path, super::header::TICK_MAGIC)?;
        let file_len = file.mmap.len() as u64;
        let count = file.header.record_count;
        let base = file.header.data_offset;
        checked_column_range(base, 8, count, file_len)?;
        checked_column_range(base + count * 8, 8, count, file_len)?;
        checked_column_range(base + count * 16, 8, count, file_len)?;
        checked_column_range(base + count * 24, 4, count, file_len)?;
        Ok(Self { file })
    }

    pub fn header(&self) -> &Header {
        self.file.header()
    }

    pub fn record_count(&self) -> usize {
        self.file.header.record_count as usize
    }

    pub fn find_range(&self, range: TimeRange) -> (usize, usize) {
        self.file.find_range(range)
    }

    pub fn verify_checksum(&self) -> bool {
        self.file.verify_checksum()
    }

    pub fn timestamps(&self) -> &[i64] {
        let base = self.file.header.data_offset as usize;
        let count = self.record_count();
        bytes_as_i64_slice(&self.file.mmap[base..base + count * 8])
    }
    pub fn prices(&self) -> &[f64] {
        let base = self.file.header.data_offset as usize + self.record_count() * 8;
        let count = self.record_count();
        bytes_as_f64_slice(&self.file.mmap[base..base + count * 8])
    }
    pub fn quantities(&self) -> &[f64] {
        let base = self.file.header.data_offset as usize + self.record_count() * 16;
        let count = self.record_count();
        bytes_as_f64_slice(&self.file.mmap[base..base + count * 8])
    }
    pub fn flags(&self) -> &[u32] {
        let base = self.file.header.data_offset as usize + self.record_count() * 24;
        let count = self.record_count();
        bytes_as_u32_slice(&self.file.mmap[base..base + count * 4])
    }

    pub fn at(&self, i: usize, symbol: crate::core::symbol_registry::SymbolId) -> Option<Tick> {
        if i >= self.record_count() {
            return None;
        }
        Some(Tick {
            timestamp: Timestamp(self.timestamps()[i]),
            symbol,
            price: self.prices()[i],
            quantity: self.quantities()[i],
            flags: self.flags()[i],
        })
    }
}

/// Reader over a book file.
pub struct BookReader {
    file: MmapFile,
}

impl BookReader {
    pub fn open(path: &Path) -> Result<Self> {
        let file = MmapFile::open_checked(path, super::header::BOOK_MAGIC)?;
        let file_len = file.mmap.len() as u64;
        let count = file.header.record_count;
        let base = file.header.data_offset;
        checked_column_range(base, 8, count, file_len)?; // timestamps
        let mut offset = base + count * 8;
        for _side in 0..2 {
            for _level in 0..BOOK_DEPTH as u64 {
                checked_column_range(offset, 8, count, file_len)?; // price
                checked_column_range(offset + count * 8, 8, count, file_len)?; // quantity
                checked_column_range(offset + count * 16, 8, count, file_len)?; // num_orders
                offset += count * 24;
            }
        }
        Ok(Self { file })
    }

    pub fn header(&self) -> &Header {
        self.file.header()
    }

    pub fn record_count(&self) -> usize {
        self.file.header.record_count as usize
    }

    pub fn find_range(&self, range: TimeRange) -> (usize, usize) {
        self.file.find_range(range)
    }

    pub fn verify_checksum(&self) -> bool {
        self.file.verify_checksum()
    }

    fn timestamps(&self) -> &[i64] {
        let base = self.file.header.data_offset as usize;
        let count = self.record_count();
        bytes_as_i64_slice(&self.file.mmap[base..base + count * 8])
    }

    /// `side`: 0 = bids, 1 = asks. `level` in `0..BOOK_DEPTH`.
    fn level_group_base(&self, side: usize) -> usize {
        let count = self.record_count();
        let ts_bytes = count * 8;
        let per_side_bytes = BOOK_DEPTH * count * (8 + 8 + 8);
        self.file.header.data_offset as usize + ts_bytes + side * per_side_bytes
    }

    fn level_at(&self, side: usize, level: usize, i: usize) -> BookLevel {
        let count = self.record_count();
        let group = self.level_group_base(side) + level * count * 24;
        let prices = bytes_as_f64_slice(&self.file.mmap[group..group + count * 8]);
        let quantities = bytes_as_f64_slice(&self.file.mmap[group + count * 8..group + count * 16]);
        let num_orders = bytes_as_i64_slice(&self.file.mmap[group + count * 16..group + count * 24]);
        BookLevel {
            price: prices[i],
            quantity: quantities[i],
            num_orders: num_orders[i],
        }
    }

    pub fn at(&self, i: usize, symbol: crate::core::symbol_registry::SymbolId) -> Option<OrderBookSnapshot> {
        if i >= self.record_count() {
            return None;
        }
        let mut snapshot = OrderBookSnapshot::empty(Timestamp(self.timestamps()[i]), symbol);
        for level in 0..BOOK_DEPTH {
            snapshot.bids[level] = self.level_at(0, level, i);
            snapshot.asks[level] = self.level_at(1, level, i);
        }
        Some(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::symbol_registry::SymbolRegistry;
    use crate::data::mmap::writer::{write_bars, write_ticks, write_books};
    use crate::core::types::Timestamp;
    use tempfile::tempdir;

    fn mk_bar(ts: i64, reg: &SymbolRegistry) -> Bar {
        Bar {
            timestamp: Timestamp(ts),
            symbol: reg.intern("AAPL"),
            open: 10.0,
            high: 11.0,
            low: 9.0,
            close: 10.5,
            volume: 100,
            trade_count: 5,
            vwap: 10.2,
        }
    }

    #[test]
    fn round_trips_persisted_bar_columns() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bars.rgm");
        let reg = SymbolRegistry::new();
        let bars = vec![mk_bar(1_000_000, &reg), mk_bar(2_000_000, &reg), mk_bar(3_000_000, &reg)];
        write_bars(&path, "AAPL", 0, 60_000_000, &bars).unwrap();

        let reader = BarReader::open(&path).unwrap();
        assert!(reader.verify_checksum());
        assert_eq!(reader.record_count(), 3);
        let view = reader.view(reg.intern("AAPL"));
        for (i, original) in bars.iter().enumerate() {
            let got = view.at(i).unwrap();
            assert_eq!(got.timestamp, original.timestamp);
            assert_eq!(got.open, original.open);
            assert_eq!(got.high, original.high);
            assert_eq!(got.low, original.low);
            assert_eq!(got.close, original.close);
            assert_eq!(got.volume, original.volume);
        }
        assert!(view.at(3).is_none());
    }

    #[test]
    fn find_range_full_sentinel_returns_everything() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bars.rgm");
        let reg = SymbolRegistry::new();
        let bars = vec![mk_bar(1_000_000, &reg), mk_bar(2_000_000, &reg)];
        write_bars(&path, "AAPL", 0, 0, &bars).unwrap();
        let reader = BarReader::open(&path).unwrap();
        assert_eq!(reader.find_range(TimeRange::FULL), (0, 2));
    }

    #[test]
    fn find_range_binary_search_bounds() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bars.rgm");
        let reg = SymbolRegistry::new();
        let bars = vec![
            mk_bar(1_000_000, &reg),
            mk_bar(2_000_000, &reg),
            mk_bar(3_000_000, &reg),
            mk_bar(4_000_000, &reg),
        ];
        write_bars(&path, "AAPL", 0, 0, &bars).unwrap();
        let reader = BarReader::open(&path).unwrap();
        let (start, end) = reader.find_range(TimeRange::new(Timestamp(2_000_000), Timestamp(3_000_000)));
        assert_eq!((start, end), (1, 3));
    }

    #[test]
    fn rejects_truncated_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("short.rgm");
        std::fs::write(&path, vec![0u8; 10]).unwrap();
        assert!(BarReader::open(&path).is_err());
    }

    #[test]
    fn tick_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ticks.rgm");
        let reg = SymbolRegistry::new();
        let sym = reg.intern("AAPL");
        let ticks = vec![
            Tick { timestamp: Timestamp(1), symbol: sym, price: 10.0, quantity: 1.0, flags: 0 },
            Tick { timestamp: Timestamp(2), symbol: sym, price: 10.5, quantity: 2.0, flags: 1 },
        ];
        write_ticks(&path, "AAPL", &ticks).unwrap();
        let reader = TickReader::open(&path).unwrap();
        assert!(reader.verify_checksum());
        assert_eq!(reader.at(0, sym).unwrap(), ticks[0]);
        assert_eq!(reader.at(1, sym).unwrap(), ticks[1]);
    }

    #[test]
    fn book_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("books.rgm");
        let reg = SymbolRegistry::new();
        let sym = reg.intern("AAPL");
        let mut snap = OrderBookSnapshot::empty(Timestamp(1), sym);
        snap.bids[0] = BookLevel { price: 99.0, quantity: 5.0, num_orders: 2 };
        snap.asks[0] = BookLevel { price: 101.0, quantity: 3.0, num_orders: 1 };
        write_books(&path, "AAPL", &[snap]).unwrap();
        let reader = BookReader::open(&path).unwrap();
        assert!(reader.verify_checksum());
        let got = reader.at(0, sym).unwrap();
        assert_eq!(got.bids[0], snap.bids[0]);
        assert_eq!(got.asks[0], snap.asks[0]);
    }
}
