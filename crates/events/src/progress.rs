//! Progress reporting throttle for long-running transfers.
//!
//! Raw disk images can be tens of gigabytes; emitting an event per chunk
//! would flood the event channel. [`ProgressThrottle`] gates emission so a
//! download reports at most once per second, and only when the visible
//! percentage has actually moved.

use std::time::{Duration, Instant};

const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Decides whether a progress sample is worth emitting as an event.
///
/// Two independent gates must both pass: at least [`MIN_INTERVAL`] has
/// elapsed since the last emission, and the integer percentage complete has
/// changed. A download with an unknown total size (`total == None`) never
/// computes a percentage and is gated on time alone.
#[derive(Debug)]
pub struct ProgressThrottle {
    total: Option<u64>,
    started_at: Instant,
    last_emit: Option<Instant>,
    last_percent: Option<u8>,
}

impl ProgressThrottle {
    #[must_use]
    pub fn new(total: Option<u64>) -> Self {
        Self {
            total,
            started_at: Instant::now(),
            last_emit: None,
            last_percent: None,
        }
    }

    fn percent(&self, current: u64) -> Option<u8> {
        let total = self.total?;
        if total == 0 {
            return Some(100);
        }
        #[allow(clippy::cast_possible_truncation)]
        let pct = ((current.min(total) as f64 / total as f64) * 100.0) as u8;
        Some(pct)
    }

    /// Returns a [`ProgressSample`] if this update should be emitted, or
    /// `None` if it should be dropped. Always call this on every observed
    /// byte count; the throttle itself decides what survives.
    pub fn sample(&mut self, current: u64) -> Option<ProgressSample> {
        let now = Instant::now();
        let percent = self.percent(current);

        let time_gate_open = match self.last_emit {
            None => true,
            Some(last) => now.duration_since(last) >= MIN_INTERVAL,
        };

        let percent_changed = percent != self.last_percent;

        let should_emit = match (self.last_emit, percent) {
            (None, _) => true,
            (Some(_), Some(_)) => time_gate_open && percent_changed,
            (Some(_), None) => time_gate_open,
        };

        if !should_emit {
            return None;
        }

        self.last_emit = Some(now);
        self.last_percent = percent;

        Some(ProgressSample {
            current,
            total: self.total,
            percent,
            eta: self.eta(current, now),
        })
    }

    fn eta(&self, current: u64, now: Instant) -> Option<Duration> {
        let total = self.total?;
        let remaining = total.saturating_sub(current);
        if remaining == 0 {
            return Some(Duration::ZERO);
        }
        let elapsed = now.duration_since(self.started_at).as_secs_f64();
        if elapsed <= 0.0 || current == 0 {
            return None;
        }
        let rate = current as f64 / elapsed;
        if rate <= 0.0 {
            return None;
        }
        Some(Duration::from_secs_f64(remaining as f64 / rate))
    }
}

/// A throttled progress observation ready to be turned into a [`crate::ProgressEvent`].
#[derive(Debug, Clone, Copy)]
pub struct ProgressSample {
    pub current: u64,
    pub total: Option<u64>,
    pub percent: Option<u8>,
    pub eta: Option<Duration>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sample_always_emits() {
        let mut throttle = ProgressThrottle::new(Some(1000));
        assert!(throttle.sample(0).is_some());
    }

    #[test]
    fn unchanged_percent_within_window_is_dropped() {
        let mut throttle = ProgressThrottle::new(Some(1000));
        throttle.sample(0);
        // same percent (0%), no time elapsed: should be gated out
        assert!(throttle.sample(1).is_none());
    }

    #[test]
    fn percent_change_alone_is_not_enough_within_window() {
        let mut throttle = ProgressThrottle::new(Some(1000));
        throttle.sample(0);
        // percent moved (0% -> 50%) but no time has elapsed: still gated out.
        assert!(throttle.sample(500).is_none());
    }

    #[test]
    fn percent_change_after_window_elapses_emits() {
        let mut throttle = ProgressThrottle::new(Some(1000));
        throttle.sample(0);
        std::thread::sleep(MIN_INTERVAL + Duration::from_millis(50));
        let sample = throttle.sample(500).unwrap();
        assert_eq!(sample.percent, Some(50));
    }

    #[test]
    fn unknown_total_never_computes_percent() {
        let mut throttle = ProgressThrottle::new(None);
        let sample = throttle.sample(0).unwrap();
        assert_eq!(sample.percent, None);
        assert_eq!(sample.eta, None);
    }

    #[test]
    fn complete_transfer_has_zero_eta() {
        let mut throttle = ProgressThrottle::new(Some(100));
        throttle.sample(0);
        std::thread::sleep(MIN_INTERVAL + Duration::from_millis(50));
        let sample = throttle.sample(100).unwrap();
        assert_eq!(sample.eta, Some(Duration::ZERO));
    }
}
