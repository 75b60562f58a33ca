//! Event generator: merges heterogeneous market streams into day/timer
//! markers and the queue's total order (§4.3).
//!
//! `enqueue_all` drains every supplied iterator into a temporary vector,
//! performs a stable total sort by `(timestamp, priority, symbol,
//! market-subkind)`, and synthesizes `DayStart`/`EndOfDay`/`Timer` events
//! while scanning the sorted stream. The combined stream is merged back in
//! sorted order and pushed to the queue — deterministic regardless of how
//! many streams were provided (testable property 2).
//!
//! Per spec §9's open question, the regime-check timer fires at a fixed
//! stride from the *first* data timestamp, not aligned to calendar
//! boundaries — the source's behavior is kept rather than recomputed to
//! calendar-aligned ticks.

use crate::core::errors::Result;
use crate::core::types::{Event, EventPayload, SystemPayload, Timestamp};
use crate::data::types::{BarIterator, OrderBookIterator, TickIterator};
use crate::queue::EventQueue;

#[derive(Debug, Clone, Copy)]
pub struct GeneratorConfig {
    pub emit_start_of_day: bool,
    pub emit_end_of_day: bool,
    pub emit_regime_check: bool,
    pub regime_check_interval: crate::core::types::Duration,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            emit_start_of_day: true,
            emit_end_of_day: true,
            emit_regime_check: false,
            regime_check_interval: crate::core::types::Duration::from_millis(60_000),
        }
    }
}

pub struct EventGenerator {
    config: GeneratorConfig,
}

impl EventGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    /// Drains `bars`/`ticks`/`books` (any may be absent), synthesizes day
    /// and timer markers per the config, and pushes the combined stream
    /// onto `queue` in deterministic order.
    pub fn enqueue_all(
        &self,
        bars: Option<&mut dyn BarIterator>,
        ticks: Option<&mut dyn TickIterator>,
        books: Option<&mut dyn OrderBookIterator>,
        queue: &EventQueue,
    ) -> Result<()> {
        let mut events = Vec::new();

        if let Some(it) = bars {
            it.reset()?;
            while it.has_next() {
                if let Some(bar) = it.next() {
                    events.push(Event::new(
                        bar.timestamp,
                        Some(bar.symbol),
                        EventPayload::Market(crate::core::types::MarketPayload::Bar(bar)),
                    ));
                }
            }
        }
        if let Some(it) = ticks {
            it.reset()?;
            while it.has_next() {
                if let Some(tick) = it.next() {
                    events.push(Event::new(
                        tick.timestamp,
                        Some(tick.symbol),
                        EventPayload::Market(crate::core::types::MarketPayload::Tick(tick)),
                    ));
                }
            }
        }
        if let Some(it) = books {
            it.reset()?;
            while it.has_next() {
                if let Some(book) = it.next() {
                    events.push(Event::new(
                        book.timestamp,
                        Some(book.symbol),
                        EventPayload::Market(crate::core::types::MarketPayload::Book(book)),
                    ));
                }
            }
        }

        // Stable total sort: timestamp, priority, symbol, market-subkind.
        events.sort_by_key(|e| e.generator_sort_key());

        if events.is_empty() {
            return Ok(());
        }

        let synthesized = self.synthesize_markers(&events);
        let merged = merge_sorted(events, synthesized);

        for event in merged {
            queue.push(event);
        }
        Ok(())
    }

    fn synthesize_markers(&self, sorted_events: &[Event]) -> Vec<Event> {
        let mut markers = Vec::new();
        let first_ts = sorted_events.first().unwrap().timestamp;
        let last_ts = sorted_events.last().unwrap().timestamp;

        if self.config.emit_start_of_day || self.config.emit_end_of_day {
            let mut current_day: Option<u32> = None;
            let mut day_start_ts = first_ts;
            let mut day_end_ts = first_ts;
            for event in sorted_events {
                let day = event.timestamp.yyyymmdd();
                match current_day {
                    None => {
                        current_day = Some(day);
                        day_start_ts = event.timestamp;
                        day_end_ts = event.timestamp;
                    }
                    Some(d) if d == day => {
                        day_end_ts = event.timestamp;
                    }
                    Some(_) => {
                        if self.config.emit_start_of_day {
                            markers.push(system_event(day_start_ts, SystemPayload::DayStart));
                        }
                        if self.config.emit_end_of_day {
                            markers.push(system_event(day_end_ts, SystemPayload::EndOfDay));
                        }
                        current_day = Some(day);
                        day_start_ts = event.timestamp;
                        day_end_ts = event.timestamp;
                    }
                }
            }
            if current_day.is_some() {
                if self.config.emit_start_of_day {
                    markers.push(system_event(day_start_ts, SystemPayload::DayStart));
                }
                if self.config.emit_end_of_day {
                    markers.push(system_event(day_end_ts, SystemPayload::EndOfDay));
                }
            }
        }

        if self.config.emit_regime_check {
            let stride = self.config.regime_check_interval.micros().max(1);
            let mut t = first_ts.micros();
            let mut id = 0u64;
            while t <= last_ts.micros() {
                markers.push(system_event(Timestamp(t), SystemPayload::Timer { id }));
                t += stride;
                id += 1;
            }
        }

        markers
    }
}

fn system_event(ts: Timestamp, payload: SystemPayload) -> Event {
    Event::new(ts, None, EventPayload::System(payload))
}

/// Merges two already-sorted (by `generator_sort_key`) vectors into one
/// sorted vector, preserving stability between equal keys (markers after
/// market events at the same key, matching insertion order above).
fn merge_sorted(mut a: Vec<Event>, mut b: Vec<Event>) -> Vec<Event> {
    a.append(&mut b);
    a.sort_by_key(|e| e.generator_sort_key());
    a
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::symbol_registry::SymbolRegistry;
    use crate::core::types::{Bar, Tick};

    struct VecBarIterator {
        items: Vec<Bar>,
        pos: usize,
    }
    impl BarIterator for VecBarIterator {
        fn reset(&mut self) -> Result<()> {
            self.pos = 0;
            Ok(())
        }
        fn has_next(&self) -> bool {
            self.pos < self.items.len()
        }
        fn next(&mut self) -> Option<Bar> {
            let item = self.items.get(self.pos).copied();
            self.pos += 1;
            item
        }
    }

    struct VecTickIterator {
        items: Vec<Tick>,
        pos: usize,
    }
    impl TickIterator for VecTickIterator {
        fn reset(&mut self) -> Result<()> {
            self.pos = 0;
            Ok(())
        }
        fn has_next(&self) -> bool {
            self.pos < self.items.len()
        }
        fn next(&mut self) -> Option<Tick> {
            let item = self.items.get(self.pos).copied();
            self.pos += 1;
            item
        }
    }

    fn bar(ts: i64, reg: &SymbolRegistry) -> Bar {
        Bar {
            timestamp: Timestamp(ts),
            symbol: reg.intern("AAA"),
            open: 1.0,
            high: 1.0,
            low: 1.0,
            close: 1.0,
            volume: 1,
            trade_count: 1,
            vwap: 1.0,
        }
    }

    #[test]
    fn deterministic_across_runs() {
        let reg = SymbolRegistry::new();
        let bars = vec![bar(1_000_000, &reg), bar(90_000_000, &reg)]; // different days apart
        let gen = EventGenerator::new(GeneratorConfig::default());

        let run = |bars: Vec<Bar>| {
            let q = EventQueue::new();
            let mut it = VecBarIterator { items: bars, pos: 0 };
            gen.enqueue_all(Some(&mut it), None, None, &q).unwrap();
            let mut keys = Vec::new();
            while let Some(e) = q.pop() {
                keys.push(e.generator_sort_key());
            }
            keys
        };

        let first = run(bars.clone());
        let second = run(bars);
        assert_eq!(first, second);
    }

    #[test]
    fn synthesizes_day_markers_across_day_boundary() {
        let reg = SymbolRegistry::new();
        let q = EventQueue::new();
        let gen = EventGenerator::new(GeneratorConfig {
            emit_start_of_day: true,
            emit_end_of_day: true,
            emit_regime_check: false,
            regime_check_interval: crate::core::types::Duration::ZERO,
        });
        let bars = vec![bar(1_000_000, &reg), bar(90_000_000_000, &reg)]; // ~25h apart -> new day
        let mut it = VecBarIterator { items: bars, pos: 0 };
        gen.enqueue_all(Some(&mut it), None, None, &q).unwrap();

        let mut day_starts = 0;
        let mut end_of_days = 0;
        while let Some(e) = q.pop() {
            if let EventPayload::System(SystemPayload::DayStart) = e.payload {
                day_starts += 1;
            }
            if let EventPayload::System(SystemPayload::EndOfDay) = e.payload {
                end_of_days += 1;
            }
        }
        assert_eq!(day_starts, 2);
        assert_eq!(end_of_days, 2);
    }

    #[test]
    fn regime_timer_strides_from_first_timestamp() {
        let reg = SymbolRegistry::new();
        let q = EventQueue::new();
        let gen = EventGenerator::new(GeneratorConfig {
            emit_start_of_day: false,
            emit_end_of_day: false,
            emit_regime_check: true,
            regime_check_interval: crate::core::types::Duration::from_micros(1_000_000),
        });
        let bars = vec![bar(0, &reg), bar(3_000_000, &reg)];
        let mut it = VecBarIterator { items: bars, pos: 0 };
        gen.enqueue_all(Some(&mut it), None, None, &q).unwrap();

        let mut timer_timestamps = Vec::new();
        while let Some(e) = q.pop() {
            if let EventPayload::System(SystemPayload::Timer { .. }) = e.payload {
                timer_timestamps.push(e.timestamp.micros());
            }
        }
        assert_eq!(timer_timestamps, vec![0, 1_000_000, 2_000_000, 3_000_000]);
    }
}
