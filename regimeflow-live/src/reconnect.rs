//! Broker reconnect loop (§5, §6, §8 scenario S6): drives
//! [`crate::backoff::ReconnectBackoff`] against a caller-supplied connect
//! attempt, emitting one notification per attempt and one on success, so
//! the engine (and `regimeflow_live`) can log "a single timestamped line
//! per reconnect attempt, reconnect success" (§6 exit behavior) without
//! this module doing any logging itself.

use std::time::Duration as StdDuration;

use regimeflow_core::config::ReconnectConfig;
use regimeflow_core::core::errors::{Error, ErrorCode, Result};
use regimeflow_core::rf_err;

use crate::backoff::ReconnectBackoff;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconnectNotification {
    pub attempt: u32,
    pub backoff_ms: u64,
    pub connected: bool,
}

/// Retries `connect` with exponential backoff until it succeeds or the
/// backoff is exhausted. `notify` is called once before each attempt's
/// sleep (`connected=false`, `backoff_ms` = the delay about to be slept)
/// and once more on success (`connected=true`, `backoff_ms=0`); `sleep` is
/// injected so tests can skip real waiting.
pub fn connect_with_backoff(
    config: ReconnectConfig,
    mut connect: impl FnMut() -> Result<()>,
    mut sleep: impl FnMut(StdDuration),
    mut notify: impl FnMut(ReconnectNotification),
) -> Result<()> {
    let mut backoff = ReconnectBackoff::new(config);
    let mut call_number = 0u32;
    loop {
        call_number += 1;
        match connect() {
            Ok(()) => {
                notify(ReconnectNotification { attempt: call_number, backoff_ms: 0, connected: true });
                return Ok(());
            }
            Err(err) => {
                let Some(delay) = backoff.next_delay() else {
                    return Err(err);
                };
                notify(ReconnectNotification {
                    attempt: call_number,
                    backoff_ms: delay.as_millis() as u64,
                    connected: false,
                });
                sleep(delay);
            }
        }
    }
}

pub fn unrecoverable(message: impl Into<String>) -> Error {
    rf_err!(ErrorCode::NetworkError, "{}", message.into())
}
