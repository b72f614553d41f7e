//! Reconnect delay policy.

use std::time::Duration;

use rand::Rng;

use crate::config::TransportConfig;

/// Bounded exponential backoff with equal jitter.
///
/// Each delay is drawn from `[base / 2, base]`; `base` grows by the
/// multiplier after every failed cycle up to the configured maximum and
/// returns to the initial value after a successful connection.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    multiplier: f64,
    base: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration, multiplier: f64) -> Self {
        Self {
            initial,
            max,
            multiplier,
            base: initial,
        }
    }

    pub fn from_config(config: &TransportConfig) -> Self {
        Self::new(
            config.reconnect_initial,
            config.reconnect_max,
            config.reconnect_multiplier,
        )
    }

    /// Delay before the next attempt
    pub fn next_delay(&mut self) -> Duration {
        let base_ms = self.base.as_millis() as u64;
        let half = base_ms / 2;
        let jitter = if half == 0 {
            0
        } else {
            rand::rng().random_range(0..=half)
        };
        let delay = Duration::from_millis(base_ms - half + jitter);

        let grown = self.base.mul_f64(self.multiplier.max(1.0));
        self.base = grown.min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.base = self.initial;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delays_stay_bounded() {
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_secs(1), 2.0);
        let mut longest = Duration::ZERO;
        for _ in 0..20 {
            let delay = backoff.next_delay();
            assert!(delay <= Duration::from_secs(1));
            longest = longest.max(delay);
        }
        assert!(longest >= Duration::from_millis(500));
    }

    #[test]
    fn test_first_delay_within_jitter_window() {
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_secs(5), 2.0);
        let delay = backoff.next_delay();
        assert!(delay >= Duration::from_millis(50) && delay <= Duration::from_millis(100));
    }

    #[test]
    fn test_reset_returns_to_initial() {
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_secs(5), 3.0);
        for _ in 0..5 {
            backoff.next_delay();
        }
        backoff.reset();
        assert!(backoff.next_delay() <= Duration::from_millis(100));
    }
}
