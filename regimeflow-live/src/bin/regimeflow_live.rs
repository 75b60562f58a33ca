//! CLI entry point for the live engine (§6 "Exit behavior"): starts the
//! engine, blocks on a run flag, and stops on SIGINT/SIGTERM. Logs one
//! timestamped line per reconnect attempt, reconnect success, and
//! heartbeat state change (at most every 10s).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;
use rust_decimal_macros::dec;
use tracing::{info, warn};

use regimeflow_core::config::LiveEngineConfig;
use regimeflow_core::core::symbol_registry::SymbolRegistry;
use regimeflow_core::utils::init_logger;
use regimeflow_live::LiveEngine;

const HEARTBEAT_LOG_INTERVAL: Duration = Duration::from_secs(10);
const MAIN_LOOP_POLL: Duration = Duration::from_millis(200);

/// Runs the regimeflow live trading engine against a configured broker.
#[derive(Parser, Debug)]
#[command(author, version, about = "Regimeflow live trading engine")]
struct Args {
    /// Path to a JSON file holding a `LiveEngineConfig`.
    #[arg(long)]
    config: String,

    /// Starting cash used to seed the in-process portfolio.
    #[arg(long, default_value = "100000")]
    initial_capital: String,

    #[arg(long, default_value = "info")]
    log_level: String,

    #[arg(long)]
    json_logs: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logger(&args.log_level, args.json_logs);

    let config_text = std::fs::read_to_string(&args.config)?;
    let config: LiveEngineConfig = serde_json::from_str(&config_text)?;
    let initial_capital: rust_decimal::Decimal = args.initial_capital.parse().unwrap_or(dec!(100_000));

    info!(broker = %config.broker, symbols = ?config.symbols, paper = config.paper, "starting regimeflow_live");

    let registry = Arc::new(SymbolRegistry::new());
    for symbol in &config.symbols {
        registry.intern(symbol);
    }

    let mut engine = LiveEngine::new(config, registry, initial_capital);
    engine.start(None, initial_capital);

    let running = Arc::new(AtomicBool::new(true));
    let running_ctrlc = running.clone();
    ctrlc::set_handler(move || {
        warn!("received shutdown signal, stopping live engine");
        running_ctrlc.store(false, Ordering::Release);
    })?;

    let mut last_heartbeat_log = Instant::now();
    let mut last_heartbeat_state = false;
    while running.load(Ordering::Acquire) {
        std::thread::sleep(MAIN_LOOP_POLL);

        if !engine.trading_enabled() {
            warn!("trading disabled (daily-loss breach), continuing to run for reconciliation only");
        }

        let stale = engine.heartbeat_stale();
        if stale != last_heartbeat_state && last_heartbeat_log.elapsed() >= HEARTBEAT_LOG_INTERVAL {
            info!(stale, "heartbeat state changed");
            last_heartbeat_state = stale;
            last_heartbeat_log = Instant::now();
        }
    }

    engine.stop();
    info!("regimeflow_live exited cleanly");
    Ok(())
}
