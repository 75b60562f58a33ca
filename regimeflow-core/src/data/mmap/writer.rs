//! Columnar mmap file writer (§4.8, §6).
//!
//! `write_bars`/`write_ticks`/`write_books` sort records by timestamp,
//! validate them, serialize the header followed by each column in the
//! order `spec.md` §3 specifies, append a trailing date index, compute the
//! SHA-256 checksum over the data columns only, and rewrite the header
//! with the final offsets and checksum. File layout is deterministic given
//! the same input ordering.

use std::fs::File;
use std::io::Write as _;
use std::path::Path;

use crate::core::errors::{Error, ErrorCode, Result};
use crate::core::types::{Bar, OrderBookSnapshot, Tick, BOOK_DEPTH};

use super::checksum::checksum;
use super::header::{
    DateIndexEntry, Header, BAR_MAGIC, BOOK_MAGIC, CHECKSUM_SIZE, FORMAT_VERSION, HEADER_SIZE,
    TICK_MAGIC,
};

fn le_i64_column(values: impl Iterator<Item = i64>) -> Vec<u8> {
    values.flat_map(|v| v.to_le_bytes()).collect()
}
fn le_f64_column(values: impl Iterator<Item = f64>) -> Vec<u8> {
    values.flat_map(|v| v.to_le_bytes()).collect()
}
fn le_u64_column(values: impl Iterator<Item = u64>) -> Vec<u8> {
    values.flat_map(|v| v.to_le_bytes()).collect()
}
fn le_u32_column(values: impl Iterator<Item = u32>) -> Vec<u8> {
    values.flat_map(|v| v.to_le_bytes()).collect()
}

fn validate_timestamps_positive_and_sorted(timestamps: &[i64]) -> Result<()> {
    for w in timestamps.windows(2) {
        if w[1] < w[0] {
            return Err(Error::new(
                ErrorCode::InvalidArgument,
                "timestamps must be non-decreasing",
                "data/mmap/writer.rs:validate_timestamps",
            ));
        }
    }
    if timestamps.iter().any(|&t| t <= 0) {
        return Err(Error::new(
            ErrorCode::InvalidArgument,
            "timestamps must be positive",
            "data/mmap/writer.rs:validate_timestamps",
        ));
    }
    Ok(())
}

/// One entry per distinct date, carrying the row offset of the first
/// record on that date.
fn build_date_index(timestamps: &[i64]) -> Vec<DateIndexEntry> {
    let mut index = Vec::new();
    let mut last_date: Option<u32> = None;
    for (row, &ts) in timestamps.iter().enumerate() {
        let date = crate::core::types::Timestamp(ts).yyyymmdd();
        if last_date != Some(date) {
            index.push(DateIndexEntry {
                yyyymmdd: date,
                offset: row as u64,
            });
            last_date = Some(date);
        }
    }
    index
}

fn finalize_file(
    path: &Path,
    mut header: Header,
    data_columns: Vec<u8>,
    date_index: Vec<DateIndexEntry>,
) -> Result<()> {
    header.data_offset = HEADER_SIZE as u64;
    header.index_offset = HEADER_SIZE as u64 + data_columns.len() as u64;
    header.checksum = checksum(&data_columns);

    let mut file = File::create(path).map_err(|e| {
        Error::new(ErrorCode::IoError, e.to_string(), "data/mmap/writer.rs:finalize_file")
    })?;
    file.write_all(&header.to_bytes())
        .and_then(|_| file.write_all(&data_columns))
        .and_then(|_| {
            for entry in &date_index {
                file.write_all(&entry.to_bytes())?;
            }
            Ok(())
        })
        .map_err(|e| Error::new(ErrorCode::IoError, e.to_string(), "data/mmap/writer.rs:finalize_file"))?;
    Ok(())
}

pub fn write_bars(path: &Path, symbol: &str, bar_type_code: u32, bar_size_ms: u32, records: &[Bar]) -> Result<()> {
    let mut sorted = records.to_vec();
    sorted.sort_by_key(|b| b.timestamp.micros());
    for b in &sorted {
        b.validate()?;
    }
    let timestamps: Vec<i64> = sorted.iter().map(|b| b.timestamp.micros()).collect();
    validate_timestamps_positive_and_sorted(&timestamps)?;

    let mut data = Vec::new();
    data.extend(le_i64_column(timestamps.iter().copied()));
    data.extend(le_f64_column(sorted.iter().map(|b| b.open)));
    data.extend(le_f64_column(sorted.iter().map(|b| b.high)));
    data.extend(le_f64_column(sorted.iter().map(|b| b.low)));
    data.extend(le_f64_column(sorted.iter().map(|b| b.close)));
    data.extend(le_u64_column(sorted.iter().map(|b| b.volume)));

    let date_index = build_date_index(&timestamps);
    let header = Header {
        magic: BAR_MAGIC,
        version: FORMAT_VERSION,
        flags: 0,
        symbol: Header::symbol_bytes(symbol),
        kind_field_1: bar_type_code,
        kind_field_2: bar_size_ms,
        start_ts: timestamps.first().copied().unwrap_or(0),
        end_ts: timestamps.last().copied().unwrap_or(0),
        record_count: sorted.len() as u64,
        data_offset: 0,
        index_offset: 0,
        checksum: [0u8; CHECKSUM_SIZE],
    };
    finalize_file(path, header, data, date_index)
}

pub fn write_ticks(path: &Path, symbol: &str, records: &[Tick]) -> Result<()> {
    let mut sorted = records.to_vec();
    sorted.sort_by_key(|t| t.timestamp.micros());
    for t in &sorted {
        t.validate()?;
    }
    let timestamps: Vec<i64> = sorted.iter().map(|t| t.timestamp.micros()).collect();
    validate_timestamps_positive_and_sorted(&timestamps)?;

    let mut data = Vec::new();
    data.extend(le_i64_column(timestamps.iter().copied()));
    data.extend(le_f64_column(sorted.iter().map(|t| t.price)));
    data.extend(le_f64_column(sorted.iter().map(|t| t.quantity)));
    data.extend(le_u32_column(sorted.iter().map(|t| t.flags)));

    let date_index = build_date_index(&timestamps);
    let header = Header {
        magic: TICK_MAGIC,
        version: FORMAT_VERSION,
        flags: 0,
        symbol: Header::symbol_bytes(symbol),
        kind_field_1: 0,
        kind_field_2: 0,
        start_ts: timestamps.first().copied().unwrap_or(0),
        end_ts: timestamps.last().copied().unwrap_or(0),
        record_count: sorted.len() as u64,
        data_offset: 0,
        index_offset: 0,
        checksum: [0u8; CHECKSUM_SIZE],
    };
    finalize_file(path, header, data, date_index)
}

pub fn write_books(path: &Path, symbol: &str, records: &[OrderBookSnapshot]) -> Result<()> {
    let mut sorted = records.to_vec();
    sorted.sort_by_key(|b| b.timestamp.micros());
    let timestamps: Vec<i64> = sorted.iter().map(|b| b.timestamp.micros()).collect();
    validate_timestamps_positive_and_sorted(&timestamps)?;

    let mut data = Vec::new();
    data.extend(le_i64_column(timestamps.iter().copied()));
    for level in 0..BOOK_DEPTH {
        data.extend(le_f64_column(sorted.iter().map(|b| b.bids[level].price)));
        data.extend(le_f64_column(sorted.iter().map(|b| b.bids[level].quantity)));
        data.extend(le_i64_column(sorted.iter().map(|b| b.bids[level].num_orders)));
    }
    for level in 0..BOOK_DEPTH {
        data.extend(le_f64_column(sorted.iter().map(|b| b.asks[level].price)));
        data.extend(le_f64_column(sorted.iter().map(|b| b.asks[level].quantity)));
        data.extend(le_i64_column(sorted.iter().map(|b| b.asks[level].num_orders)));
    }

    let date_index = build_date_index(&timestamps);
    let header = Header {
        magic: BOOK_MAGIC,
        version: FORMAT_VERSION,
        flags: 0,
        symbol: Header::symbol_bytes(symbol),
        kind_field_1: BOOK_DEPTH as u32,
        kind_field_2: 0,
        start_ts: timestamps.first().copied().unwrap_or(0),
        end_ts: timestamps.last().copied().unwrap_or(0),
        record_count: sorted.len() as u64,
        data_offset: 0,
        index_offset: 0,
        checksum: [0u8; CHECKSUM_SIZE],
    };
    finalize_file(path, header, data, date_index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::symbol_registry::{SymbolId, SymbolRegistry};
    use crate::core::types::Timestamp;
    use tempfile::tempdir;

    fn sym() -> SymbolId {
        SymbolRegistry::new().intern("AAPL")
    }

    #[test]
    fn write_bars_rejects_unsorted_after_sort_is_fine() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bars.rgm");
        let bars = vec![
            Bar {
                timestamp: Timestamp(2_000_000),
                symbol: sym(),
                open: 10.0,
                high: 11.0,
                low: 9.0,
                close: 10.5,
                volume: 100,
                trade_count: 5,
                vwap: 10.2,
            },
            Bar {
                timestamp: Timestamp(1_000_000),
                symbol: sym(),
                open: 9.0,
                high: 10.0,
                low: 8.5,
                close: 9.5,
                volume: 50,
                trade_count: 3,
                vwap: 9.1,
            },
        ];
        write_bars(&path, "AAPL", 0, 60_000_000, &bars).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn write_bars_rejects_invalid_ohlc() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.rgm");
        let bars = vec![Bar {
            timestamp: Timestamp(1),
            symbol: sym(),
            open: 10.0,
            high: 5.0,
            low: 1.0,
            close: 10.0,
            volume: 1,
            trade_count: 1,
            vwap: 10.0,
        }];
        assert!(write_bars(&path, "AAPL", 0, 0, &bars).is_err());
    }
}
