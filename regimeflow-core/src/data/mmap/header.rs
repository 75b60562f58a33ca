//! Fixed 256-byte mmap file header (§3, §6).
//!
//! Layout (little-endian):
//!
//! | offset | size | field |
//! |---|---|---|
//! | 0   | 8  | magic |
//! | 8   | 4  | version |
//! | 12  | 4  | flags |
//! | 16  | 32 | symbol (null-padded) |
//! | 48  | 4  | kind_field_1 (bar_type / book level_count / unused) |
//! | 52  | 4  | kind_field_2 (bar_size_ms / unused) |
//! | 56  | 8  | start_ts |
//! | 64  | 8  | end_ts |
//! | 72  | 8  | record_count |
//! | 80  | 8  | data_offset |
//! | 88  | 8  | index_offset |
//! | 96  | 32 | checksum (SHA-256 over data columns only) |
//! | 128 | 128| reserved |

use crate::core::errors::{Error, ErrorCode, Result};

pub const HEADER_SIZE: usize = 256;
pub const SYMBOL_FIELD_SIZE: usize = 32;
pub const CHECKSUM_SIZE: usize = 32;

pub const BAR_MAGIC: [u8; 8] = *b"RGMFLOW1";
pub const TICK_MAGIC: [u8; 8] = *b"RGMTICK1";
pub const BOOK_MAGIC: [u8; 8] = *b"RGMBOOK1";
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub magic: [u8; 8],
    pub version: u32,
    pub flags: u32,
    pub symbol: [u8; SYMBOL_FIELD_SIZE],
    pub kind_field_1: u32,
    pub kind_field_2: u32,
    pub start_ts: i64,
    pub end_ts: i64,
    pub record_count: u64,
    pub data_offset: u64,
    pub index_offset: u64,
    pub checksum: [u8; CHECKSUM_SIZE],
}

impl Header {
    pub fn symbol_bytes(name: &str) -> [u8; SYMBOL_FIELD_SIZE] {
        let mut buf = [0u8; SYMBOL_FIELD_SIZE];
        let bytes = name.as_bytes();
        let len = bytes.len().min(SYMBOL_FIELD_SIZE);
        buf[..len].copy_from_slice(&bytes[..len]);
        buf
    }

    pub fn symbol_str(&self) -> String {
        let end = self.symbol.iter().position(|&b| b == 0).unwrap_or(self.symbol.len());
        String::from_utf8_lossy(&self.symbol[..end]).into_owned()
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..8].copy_from_slice(&self.magic);
        buf[8..12].copy_from_slice(&self.version.to_le_bytes());
        buf[12..16].copy_from_slice(&self.flags.to_le_bytes());
        buf[16..48].copy_from_slice(&self.symbol);
        buf[48..52].copy_from_slice(&self.kind_field_1.to_le_bytes());
        buf[52..56].copy_from_slice(&self.kind_field_2.to_le_bytes());
        buf[56..64].copy_from_slice(&self.start_ts.to_le_bytes());
        buf[64..72].copy_from_slice(&self.end_ts.to_le_bytes());
        buf[72..80].copy_from_slice(&self.record_count.to_le_bytes());
        buf[80..88].copy_from_slice(&self.data_offset.to_le_bytes());
        buf[88..96].copy_from_slice(&self.index_offset.to_le_bytes());
        buf[96..128].copy_from_slice(&self.checksum);
        buf
    }

    pub fn from_bytes(buf: &[u8], expected_magic: [u8; 8]) -> Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(Error::new(
                ErrorCode::IoError,
                "file shorter than header size",
                "data/mmap/header.rs:from_bytes",
            ));
        }
        let mut magic = [0u8; 8];
        magic.copy_from_slice(&buf[0..8]);
        if magic != expected_magic {
            return Err(Error::new(
                ErrorCode::ParseError,
                "magic mismatch",
                "data/mmap/header.rs:from_bytes",
            ));
        }
        let version = u32::from_le_bytes(buf[8..12].try_into().unwrap());
        if version != FORMAT_VERSION {
            return Err(Error::new(
                ErrorCode::ParseError,
                format!("unsupported version {version}"),
                "data/mmap/header.rs:from_bytes",
            ));
        }
        let flags = u32::from_le_bytes(buf[12..16].try_into().unwrap());
        let mut symbol = [0u8; SYMBOL_FIELD_SIZE];
        symbol.copy_from_slice(&buf[16..48]);
        let kind_field_1 = u32::from_le_bytes(buf[48..52].try_into().unwrap());
        let kind_field_2 = u32::from_le_bytes(buf[52..56].try_into().unwrap());
        let start_ts = i64::from_le_bytes(buf[56..64].try_into().unwrap());
        let end_ts = i64::from_le_bytes(buf[64..72].try_into().unwrap());
        let record_count = u64::from_le_bytes(buf[72..80].try_into().unwrap());
        let data_offset = u64::from_le_bytes(buf[80..88].try_into().unwrap());
        let index_offset = u64::from_le_bytes(buf[88..96].try_into().unwrap());
        let mut checksum = [0u8; CHECKSUM_SIZE];
        checksum.copy_from_slice(&buf[96..128]);

        Ok(Self {
            magic,
            version,
            flags,
            symbol,
            kind_field_1,
            kind_field_2,
            start_ts,
            end_ts,
            record_count,
            data_offset,
            index_offset,
            checksum,
        })
    }
}

/// One entry in the trailing date index: the first row offset for a
/// distinct calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateIndexEntry {
    pub yyyymmdd: u32,
    pub offset: u64,
}

pub const DATE_INDEX_ENTRY_SIZE: usize = 12; // u32 + u64, packed without padding

impl DateIndexEntry {
    pub fn to_bytes(self) -> [u8; DATE_INDEX_ENTRY_SIZE] {
        let mut buf = [0u8; DATE_INDEX_ENTRY_SIZE];
        buf[0..4].copy_from_slice(&self.yyyymmdd.to_le_bytes());
        buf[4..12].copy_from_slice(&self.offset.to_le_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Self {
        let yyyymmdd = u32::from_le_bytes(buf[0..4].try_into().unwrap());
        let offset = u64::from_le_bytes(buf[4..12].try_into().unwrap());
        Self { yyyymmdd, offset }
    }
}
