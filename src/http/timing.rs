//! Phase timing for a single execution.
//!
//! Marks are set through `&self` so a timer can be shared with the exchange
//! future and still be read after that future is dropped on timeout or
//! cancellation. The first mark of each phase wins.

use std::sync::OnceLock;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Derived durations, whole milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseTiming {
    pub total_time: u64,
    pub connect_time: u64,
    pub transfer_time: u64,
}

#[derive(Debug)]
pub struct PhaseTimer {
    start: Instant,
    connected: OnceLock<Instant>,
    first_byte: OnceLock<Instant>,
    last_byte: OnceLock<Instant>,
    aborted: OnceLock<Instant>,
}

impl PhaseTimer {
    pub fn start() -> Self {
        Self::started_at(Instant::now())
    }

    pub fn started_at(start: Instant) -> Self {
        Self {
            start,
            connected: OnceLock::new(),
            first_byte: OnceLock::new(),
            last_byte: OnceLock::new(),
            aborted: OnceLock::new(),
        }
    }

    pub fn mark_connected(&self) {
        self.mark_connected_at(Instant::now());
    }

    pub fn mark_first_byte(&self) {
        self.mark_first_byte_at(Instant::now());
    }

    pub fn mark_last_byte(&self) {
        self.mark_last_byte_at(Instant::now());
    }

    /// The execution ended without reading the full response.
    pub fn mark_aborted(&self) {
        let _ = self.aborted.set(Instant::now());
    }

    pub fn mark_connected_at(&self, at: Instant) {
        let _ = self.connected.set(at);
    }

    pub fn mark_first_byte_at(&self, at: Instant) {
        let _ = self.first_byte.set(at);
    }

    pub fn mark_last_byte_at(&self, at: Instant) {
        let _ = self.last_byte.set(at);
    }

    pub fn finish(&self) -> ResponseTiming {
        let connected = self.connected.get().copied();
        let first_byte = self.first_byte.get().copied();
        let last_byte = self.last_byte.get().copied();
        let end = last_byte.or_else(|| self.aborted.get().copied());

        let total = span(Some(self.start), end);
        // total >= connect and total >= transfer must hold even if marks
        // arrive out of order
        let connect = span(Some(self.start), connected).min(total);
        let transfer = span(first_byte, last_byte).min(total);

        ResponseTiming {
            total_time: millis(total),
            connect_time: millis(connect),
            transfer_time: millis(transfer),
        }
    }
}

/// `to - from`, or zero when either mark is missing or the clock went backwards.
fn span(from: Option<Instant>, to: Option<Instant>) -> Duration {
    match (from, to) {
        (Some(from), Some(to)) => to.saturating_duration_since(from),
        _ => Duration::ZERO,
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_full_exchange() {
        let t0 = Instant::now();
        let timer = PhaseTimer::started_at(t0);
        timer.mark_connected_at(t0 + ms(20));
        timer.mark_first_byte_at(t0 + ms(50));
        timer.mark_last_byte_at(t0 + ms(80));

        let timing = timer.finish();
        assert_eq!(timing.connect_time, 20);
        assert_eq!(timing.transfer_time, 30);
        assert_eq!(timing.total_time, 80);
    }

    #[test]
    fn test_abort_before_connection_leaves_phases_at_zero() {
        let timer = PhaseTimer::start();
        timer.mark_aborted();

        let timing = timer.finish();
        assert_eq!(timing.connect_time, 0);
        assert_eq!(timing.transfer_time, 0);
    }

    #[test]
    fn test_unfinished_exchange_without_abort_is_all_zero() {
        let t0 = Instant::now();
        let timer = PhaseTimer::started_at(t0);
        timer.mark_connected_at(t0 + ms(10));
        timer.mark_first_byte_at(t0 + ms(15));

        assert_eq!(timer.finish(), ResponseTiming::default());
    }

    #[test]
    fn test_clock_anomalies_clamp_to_zero() {
        let t0 = Instant::now() + ms(100);
        let timer = PhaseTimer::started_at(t0);
        // marks earlier than start
        timer.mark_connected_at(t0 - ms(50));
        timer.mark_first_byte_at(t0 + ms(40));
        timer.mark_last_byte_at(t0 + ms(30));

        let timing = timer.finish();
        assert_eq!(timing.connect_time, 0);
        assert_eq!(timing.transfer_time, 0);
        assert_eq!(timing.total_time, 30);
    }

    #[test]
    fn test_first_mark_wins() {
        let t0 = Instant::now();
        let timer = PhaseTimer::started_at(t0);
        timer.mark_connected_at(t0 + ms(5));
        timer.mark_connected_at(t0 + ms(500));
        timer.mark_last_byte_at(t0 + ms(10));
        assert_eq!(timer.finish().connect_time, 5);
    }

    #[test]
    fn test_connect_never_exceeds_total() {
        let t0 = Instant::now();
        let timer = PhaseTimer::started_at(t0);
        timer.mark_connected_at(t0 + ms(90));
        timer.mark_last_byte_at(t0 + ms(60));
        let timing = timer.finish();
        assert!(timing.total_time >= timing.connect_time);
        assert!(timing.total_time >= timing.transfer_time);
    }

    #[test]
    fn test_serializes_camel_case() {
        let timing = ResponseTiming {
            total_time: 3,
            connect_time: 1,
            transfer_time: 2,
        };
        let value = serde_json::to_value(timing).unwrap();
        assert_eq!(value["totalTime"], 3);
        assert_eq!(value["connectTime"], 1);
        assert_eq!(value["transferTime"], 2);
    }
}
