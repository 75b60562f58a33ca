//! Market-data substrate: the mmap columnar file format and the external
//! iterator/data-source interfaces the event generator consumes.

pub mod mmap;
pub mod types;

pub use types::{BarIterator, BarType, DataSource, OrderBookIterator, TickIterator, TimeRange};
