//! Timer service (§2, §4.10): lets a strategy context schedule/cancel
//! recurring `Timer` events by id instead of the generator's fixed
//! regime-check stride. Purely a bookkeeping layer over due times — the
//! event loop is responsible for actually popping and re-arming timers as
//! it advances `current_time`.

use std::collections::HashMap;

use crate::core::types::{Duration, Timestamp};

#[derive(Debug, Clone, Copy)]
struct ScheduledTimer {
    interval: Duration,
    next_fire: Timestamp,
}

/// Tracks armed timers by id. `due(now)` returns the ids that have fired
/// and re-arms them for their next interval; `cancel` removes one.
#[derive(Default)]
pub struct TimerService {
    timers: HashMap<u64, ScheduledTimer>,
}

impl TimerService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, id: u64, now: Timestamp, interval: Duration) {
        self.timers.insert(
            id,
            ScheduledTimer {
                interval,
                next_fire: now + interval,
            },
        );
    }

    pub fn cancel(&mut self, id: u64) {
        self.timers.remove(&id);
    }

    pub fn is_scheduled(&self, id: u64) -> bool {
        self.timers.contains_key(&id)
    }

    /// Ids whose `next_fire` is `<= now`; each due timer is re-armed at
    /// `next_fire + interval`.
    pub fn due(&mut self, now: Timestamp) -> Vec<u64> {
        let mut fired = Vec::new();
        for (&id, timer) in self.timers.iter_mut() {
            if timer.next_fire <= now {
                fired.push(id);
                timer.next_fire = timer.next_fire + timer.interval;
            }
        }
        fired.sort_unstable();
        fired
    }
}
