//! Exponential backoff for broker reconnection (§5, §6 `reconnect` config).
//!
//! Grounded on `bog-core::resilience::backoff::ExponentialBackoff`: same
//! state machine (current delay doubles each attempt up to a cap, with
//! jitter to avoid a thundering herd of reconnects), driven here by the
//! live engine's `ReconnectConfig` (`initial_ms`/`max_ms`/`max_attempts`)
//! instead of a standalone `BackoffConfig`.

use std::time::Duration;

use rand::Rng;
use regimeflow_core::config::ReconnectConfig;

const MULTIPLIER: f64 = 2.0;
const JITTER_FACTOR: f64 = 0.1;

pub struct ReconnectBackoff {
    config: ReconnectConfig,
    attempt: u32,
    current_delay: Duration,
}

impl ReconnectBackoff {
    pub fn new(config: ReconnectConfig) -> Self {
        let current_delay = Duration::from_millis(config.initial_ms);
        Self { config, attempt: 0, current_delay }
    }

    /// `None` once `max_attempts` is exceeded or reconnection is disabled.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if !self.config.enabled {
            return None;
        }
        if let Some(max) = self.config.max_attempts {
            if self.attempt >= max {
                return None;
            }
        }

        let delay = self.with_jitter(self.current_delay);
        self.attempt += 1;
        let next_millis = (self.current_delay.as_secs_f64() * MULTIPLIER * 1000.0) as u64;
        self.current_delay = Duration::from_millis(next_millis.min(self.config.max_ms));
        Some(delay)
    }

    fn with_jitter(&self, delay: Duration) -> Duration {
        let mut rng = rand::thread_rng();
        let jitter = rng.gen::<f64>() * JITTER_FACTOR;
        let multiplier = 1.0 + (jitter - JITTER_FACTOR / 2.0);
        Duration::from_secs_f64(delay.as_secs_f64() * multiplier)
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
        self.current_delay = Duration::from_millis(self.config.initial_ms);
    }

    pub fn attempt_number(&self) -> u32 {
        self.attempt
    }

    pub fn can_retry(&self) -> bool {
        self.config.enabled && self.config.max_attempts.map(|max| self.attempt < max).unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_toward_the_cap() {
        let config = ReconnectConfig { enabled: true, initial_ms: 10, max_ms: 100, max_attempts: Some(20) };
        let mut backoff = ReconnectBackoff::new(config);
        let mut last = Duration::from_millis(0);
        for _ in 0..10 {
            let delay = backoff.next_delay().unwrap();
            assert!(delay <= Duration::from_millis(100) + Duration::from_millis(10));
            last = delay;
        }
        assert!(last.as_millis() >= 80);
    }

    #[test]
    fn exhausts_after_max_attempts() {
        let config = ReconnectConfig { enabled: true, initial_ms: 10, max_ms: 100, max_attempts: Some(3) };
        let mut backoff = ReconnectBackoff::new(config);
        assert!(backoff.next_delay().is_some());
        assert!(backoff.next_delay().is_some());
        assert!(backoff.next_delay().is_some());
        assert!(backoff.next_delay().is_none());
        assert!(!backoff.can_retry());
    }

    #[test]
    fn disabled_reconnect_never_retries() {
        let config = ReconnectConfig { enabled: false, initial_ms: 10, max_ms: 100, max_attempts: None };
        let mut backoff = ReconnectBackoff::new(config);
        assert!(backoff.next_delay().is_none());
    }

    #[test]
    fn reset_restores_initial_delay() {
        let config = ReconnectConfig { enabled: true, initial_ms: 10, max_ms: 1000, max_attempts: None };
        let mut backoff = ReconnectBackoff::new(config);
        backoff.next_delay();
        backoff.next_delay();
        assert_eq!(backoff.attempt_number(), 2);
        backoff.reset();
        assert_eq!(backoff.attempt_number(), 0);
    }
}
