//! Ambient, cross-cutting utilities: logging setup.

pub mod logger;

pub use logger::init_logger;
