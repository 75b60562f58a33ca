//! Bounded alert ring (§7: "appended to a bounded alert ring (size 50)").
//!
//! Grounded on `bog-core`'s `resilience` module's use of `tracing::warn!`/
//! `error!` at reconnect/heartbeat/disconnect call sites, generalized here
//! into a structured, queryable ring instead of log-lines only — callers
//! that want the log line too should also emit one at the call site
//! (`AlertManager` does not log; it is a data structure, not a sink).

use std::collections::VecDeque;

use crate::core::types::Timestamp;

pub const ALERT_RING_CAPACITY: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub severity: AlertSeverity,
    pub code: &'static str,
    pub message: String,
    pub timestamp: Timestamp,
}

/// Fixed-capacity ring of the most recent alerts; pushing past capacity
/// evicts the oldest.
pub struct AlertManager {
    ring: VecDeque<Alert>,
    capacity: usize,
}

impl AlertManager {
    pub fn new() -> Self {
        Self::with_capacity(ALERT_RING_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ring: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, alert: Alert) {
        if self.ring.len() >= self.capacity {
            self.ring.pop_front();
        }
        self.ring.push_back(alert);
    }

    pub fn raise(&mut self, severity: AlertSeverity, code: &'static str, message: impl Into<String>, ts: Timestamp) {
        self.push(Alert {
            severity,
            code,
            message: message.into(),
            timestamp: ts,
        });
    }

    pub fn recent(&self) -> impl Iterator<Item = &Alert> {
        self.ring.iter()
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }
}

impl Default for AlertManager {
    fn default() -> Self {
        Self::new()
    }
}
