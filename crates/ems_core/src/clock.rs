use std::cmp::Ordering;
use std::collections::BinaryHeap;

use chrono::{Duration, NaiveDate, NaiveDateTime};

/// Simulation time in milliseconds since the scenario epoch.
pub type SimTime = u64;

pub const ONE_MIN_MS: SimTime = 60_000;

/// Wall-clock format used for call times in exported records.
pub const CALL_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Convert (fractional) minutes to simulation ms, rounded to the nearest ms.
pub fn minutes_to_ms(minutes: f64) -> SimTime {
    if minutes <= 0.0 || !minutes.is_finite() {
        return 0;
    }
    (minutes * ONE_MIN_MS as f64).round() as SimTime
}

pub fn ms_to_minutes(ms: SimTime) -> f64 {
    ms as f64 / ONE_MIN_MS as f64
}

/// Default epoch: 2025-05-13 08:00:00, the start of the reference shift.
pub fn default_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 5, 13)
        .and_then(|d| d.and_hms_opt(8, 0, 0))
        .unwrap_or_default()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub timestamp: SimTime,
    /// Insertion sequence; keeps equal-timestamp events in FIFO order.
    pub seq: u64,
    /// Position of the incident in the batch it was queued from.
    pub index: usize,
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering to make BinaryHeap a min-heap by timestamp.
        other
            .timestamp
            .cmp(&self.timestamp)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Time cursor plus a queue of pending incident calls.
#[derive(Debug, Clone)]
pub struct SimulationClock {
    now: SimTime,
    epoch: NaiveDateTime,
    next_seq: u64,
    events: BinaryHeap<Event>,
}

impl Default for SimulationClock {
    fn default() -> Self {
        Self::with_epoch(default_epoch())
    }
}

impl SimulationClock {
    pub fn with_epoch(epoch: NaiveDateTime) -> Self {
        Self {
            now: 0,
            epoch,
            next_seq: 0,
            events: BinaryHeap::new(),
        }
    }

    pub fn now(&self) -> SimTime {
        self.now
    }

    pub fn epoch(&self) -> NaiveDateTime {
        self.epoch
    }

    /// Move the cursor forward. The cursor never moves backwards.
    pub fn advance_to(&mut self, timestamp: SimTime) {
        self.now = self.now.max(timestamp);
    }

    pub fn schedule_call(&mut self, timestamp: SimTime, index: usize) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.events.push(Event {
            timestamp,
            seq,
            index,
        });
    }

    /// Pop the earliest pending call. Does not move the cursor: the simulator
    /// decides the effective call time (which may include queueing delay).
    pub fn pop_next(&mut self) -> Option<Event> {
        self.events.pop()
    }

    pub fn pending(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn to_datetime(&self, timestamp: SimTime) -> NaiveDateTime {
        self.epoch + Duration::milliseconds(timestamp as i64)
    }

    /// Simulation ms for a wall-clock time, or `None` if it precedes the epoch.
    pub fn from_datetime(&self, datetime: NaiveDateTime) -> Option<SimTime> {
        let delta = datetime.signed_duration_since(self.epoch).num_milliseconds();
        u64::try_from(delta).ok()
    }

    pub fn format(&self, timestamp: SimTime) -> String {
        self.to_datetime(timestamp).format(CALL_TIME_FORMAT).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_pops_calls_in_time_order() {
        let mut clock = SimulationClock::default();
        clock.schedule_call(10, 1);
        clock.schedule_call(5, 2);
        clock.schedule_call(20, 3);
        clock.schedule_call(10, 4);

        let order: Vec<usize> = std::iter::from_fn(|| clock.pop_next())
            .map(|e| e.index)
            .collect();
        assert_eq!(order, vec![2, 1, 4, 3]);
        assert!(clock.is_empty());
    }

    #[test]
    fn cursor_only_moves_forward() {
        let mut clock = SimulationClock::default();
        clock.advance_to(500);
        clock.advance_to(100);
        assert_eq!(clock.now(), 500);
    }

    #[test]
    fn formats_relative_to_epoch() {
        let clock = SimulationClock::default();
        assert_eq!(clock.format(0), "2025-05-13 08:00:00");
        assert_eq!(clock.format(7 * ONE_MIN_MS), "2025-05-13 08:07:00");
        let t = clock.to_datetime(90 * ONE_MIN_MS);
        assert_eq!(clock.from_datetime(t), Some(90 * ONE_MIN_MS));
        assert_eq!(clock.from_datetime(default_epoch() - Duration::minutes(1)), None);
    }

    #[test]
    fn minute_conversion_rounds_to_ms() {
        assert_eq!(minutes_to_ms(1.0), ONE_MIN_MS);
        assert_eq!(minutes_to_ms(0.5), 30_000);
        assert_eq!(minutes_to_ms(-3.0), 0);
        assert!((ms_to_minutes(90_000) - 1.5).abs() < 1e-12);
    }
}
