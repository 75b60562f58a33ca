//! Serde-deserializable configuration structs (§1 ambient stack, §6 live
//! engine config). Loading mechanics — TOML parsing, env var overrides,
//! CLI flags — are out of scope (§1); these types round-trip through
//! `serde_json` for tests and are otherwise constructed directly by the
//! embedding application, matching the teacher's own `Config::load` being
//! a stub rather than a real file-parsing pipeline.

pub mod types;

pub use types::{
    BacktestConfig, ExecutionConfig, ImpactKind, LiveEngineConfig, MessageQueueConfig, MessageQueueType,
    PortfolioConfig, ReconnectConfig,
};
