//! Layered struct-of-structs config shape, mirroring
//! `bog-core::config::types::Config`'s one-sub-struct-per-concern
//! layout: a top-level config per engine variant, each field a focused
//! sub-struct rather than a flat bag of options.

use serde::{Deserialize, Serialize};

use crate::engine::GeneratorConfig;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PortfolioConfig {
    pub initial_capital: f64,
    #[serde(default = "default_currency")]
    pub currency_code: [u8; 3],
}

fn default_currency() -> [u8; 3] {
    *b"USD"
}

impl PortfolioConfig {
    pub fn currency(&self) -> String {
        String::from_utf8_lossy(&self.currency_code).into_owned()
    }
}

impl Default for PortfolioConfig {
    fn default() -> Self {
        Self {
            initial_capital: 100_000.0,
            currency_code: default_currency(),
        }
    }
}

/// Mirrors the `ImpactPolicy` enum in `engine::execution`, but as a
/// serde-friendly config value rather than a trait object.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImpactKind {
    Zero,
    Fixed { bps: f64 },
    OrderBookImpact { max_bps: f64 },
}

impl Default for ImpactKind {
    fn default() -> Self {
        ImpactKind::Zero
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct ExecutionConfig {
    pub impact: ImpactKind,
    pub commission_rate: f64,
    pub latency_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub portfolio: PortfolioConfig,
    pub execution: ExecutionConfig,
    pub generator: GeneratorConfigDto,
}

/// Serde-friendly mirror of [`GeneratorConfig`]; `Duration`'s inner `i64`
/// round-trips directly, so this is a thin field-for-field copy rather
/// than a distinct shape.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeneratorConfigDto {
    pub emit_start_of_day: bool,
    pub emit_end_of_day: bool,
    pub emit_regime_check: bool,
    pub regime_check_interval_us: i64,
}

impl From<GeneratorConfigDto> for GeneratorConfig {
    fn from(dto: GeneratorConfigDto) -> Self {
        GeneratorConfig {
            emit_start_of_day: dto.emit_start_of_day,
            emit_end_of_day: dto.emit_end_of_day,
            emit_regime_check: dto.emit_regime_check,
            regime_check_interval: crate::core::types::Duration::from_micros(dto.regime_check_interval_us),
        }
    }
}

impl Default for GeneratorConfigDto {
    fn default() -> Self {
        let defaults = GeneratorConfig::default();
        Self {
            emit_start_of_day: defaults.emit_start_of_day,
            emit_end_of_day: defaults.emit_end_of_day,
            emit_regime_check: defaults.emit_regime_check,
            regime_check_interval_us: defaults.regime_check_interval.micros(),
        }
    }
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            portfolio: PortfolioConfig::default(),
            execution: ExecutionConfig::default(),
            generator: GeneratorConfigDto::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReconnectConfig {
    pub enabled: bool,
    pub initial_ms: u64,
    pub max_ms: u64,
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_ms: 500,
            max_ms: 30_000,
            max_attempts: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageQueueType {
    Zeromq,
    Kafka,
    Redis,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageQueueConfig {
    #[serde(rename = "type")]
    pub kind: MessageQueueType,
    pub publish_endpoint: String,
    pub subscribe_endpoint: String,
    pub topic: String,
    pub poll_timeout_ms: u64,
    pub reconnect: ReconnectConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveEngineConfig {
    pub broker: String,
    pub symbols: Vec<String>,
    #[serde(default)]
    pub paper: bool,

    #[serde(default)]
    pub max_orders_per_minute: u32,
    #[serde(default)]
    pub max_orders_per_second: u32,
    #[serde(default)]
    pub max_order_value: f64,

    #[serde(default)]
    pub daily_loss_limit: f64,
    #[serde(default)]
    pub daily_loss_limit_pct: f64,

    #[serde(default = "default_heartbeat_timeout_ms")]
    pub heartbeat_timeout_ms: u64,

    #[serde(default)]
    pub reconnect: ReconnectConfig,

    #[serde(default = "default_order_reconcile_interval_ms")]
    pub order_reconcile_interval_ms: u64,
    #[serde(default = "default_position_reconcile_interval_ms")]
    pub position_reconcile_interval_ms: u64,
    #[serde(default = "default_account_refresh_interval_ms")]
    pub account_refresh_interval_ms: u64,

    #[serde(default)]
    pub enable_message_queue: bool,
    pub message_queue: Option<MessageQueueConfig>,

    #[serde(default = "default_regime_retrain_interval_ms")]
    pub regime_retrain_interval_ms: u64,
    #[serde(default = "default_regime_retrain_min_samples")]
    pub regime_retrain_min_samples: u32,
    #[serde(default = "default_regime_feature_window")]
    pub regime_feature_window: u32,
}

fn default_heartbeat_timeout_ms() -> u64 {
    30_000
}
fn default_order_reconcile_interval_ms() -> u64 {
    5_000
}
fn default_position_reconcile_interval_ms() -> u64 {
    10_000
}
fn default_account_refresh_interval_ms() -> u64 {
    60_000
}
fn default_regime_retrain_interval_ms() -> u64 {
    3_600_000
}
fn default_regime_retrain_min_samples() -> u32 {
    500
}
fn default_regime_feature_window() -> u32 {
    100
}

impl Default for LiveEngineConfig {
    fn default() -> Self {
        Self {
            broker: String::new(),
            symbols: Vec::new(),
            paper: false,
            max_orders_per_minute: 0,
            max_orders_per_second: 0,
            max_order_value: 0.0,
            daily_loss_limit: 0.0,
            daily_loss_limit_pct: 0.0,
            heartbeat_timeout_ms: default_heartbeat_timeout_ms(),
            reconnect: ReconnectConfig::default(),
            order_reconcile_interval_ms: default_order_reconcile_interval_ms(),
            position_reconcile_interval_ms: default_position_reconcile_interval_ms(),
            account_refresh_interval_ms: default_account_refresh_interval_ms(),
            enable_message_queue: false,
            message_queue: None,
            regime_retrain_interval_ms: default_regime_retrain_interval_ms(),
            regime_retrain_min_samples: default_regime_retrain_min_samples(),
            regime_feature_window: default_regime_feature_window(),
        }
    }
}
