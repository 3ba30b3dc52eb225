//! Exponential backoff with jitter for retrying configuration polls.

use std::time::Duration;

use {gatehouse_config::BackoffConfig, rand::Rng};

/// Delay schedule: starts at `initial`, grows by `multiplier` per failure up
/// to `max`, each delay jittered into 0.5x..1.5x and then capped at `max`.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    multiplier: f64,
    current: Duration,
    attempts: u32,
}

/// Shortest delay ever produced, so a zero `initial` still waits.
const MIN_DELAY: Duration = Duration::from_millis(1);

/// Longest delay ever produced (one day).
const MAX_DELAY: Duration = Duration::from_secs(24 * 60 * 60);

impl Backoff {
    /// `initial` and `max` are clamped into `MIN_DELAY..=MAX_DELAY`; a
    /// multiplier below 1 or not finite is treated as 1.
    pub fn new(initial: Duration, max: Duration, multiplier: f64) -> Self {
        let initial = initial.clamp(MIN_DELAY, MAX_DELAY);
        let max = max.clamp(initial, MAX_DELAY);
        let multiplier = if multiplier.is_finite() {
            multiplier.max(1.0)
        } else {
            1.0
        };
        Self {
            initial,
            max,
            multiplier,
            current: initial,
            attempts: 0,
        }
    }

    /// Delay to wait before the next attempt.
    pub fn next_delay(&mut self) -> Duration {
        self.attempts = self.attempts.saturating_add(1);
        let jitter = rand::rng().random_range(0.5..1.5);
        let delay = self.scaled(self.current, jitter).max(MIN_DELAY);
        self.current = self.scaled(self.current, self.multiplier);
        delay
    }

    /// `base * factor`, computed in seconds and capped at `max`.
    fn scaled(&self, base: Duration, factor: f64) -> Duration {
        let max = self.max.as_secs_f64();
        let secs = (base.as_secs_f64() * factor).min(max);
        Duration::try_from_secs_f64(secs).unwrap_or(self.max)
    }

    /// Forget past failures after a success.
    pub fn reset(&mut self) {
        self.current = self.initial;
        self.attempts = 0;
    }

    /// Consecutive failures since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

impl From<&BackoffConfig> for Backoff {
    fn from(cfg: &BackoffConfig) -> Self {
        Self::new(cfg.initial_delay(), cfg.max_delay(), cfg.multiplier)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_within_jitter_bounds() {
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_secs(60), 2.0);
        for base_ms in [100u64, 200, 400, 800] {
            let delay = backoff.next_delay();
            assert!(delay >= Duration::from_millis(base_ms / 2), "{delay:?}");
            assert!(delay <= Duration::from_millis(base_ms * 3 / 2), "{delay:?}");
        }
        assert_eq!(backoff.attempts(), 4);
    }

    #[test]
    fn never_exceeds_max() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(5), 10.0);
        for _ in 0..20 {
            assert!(backoff.next_delay() <= Duration::from_secs(5));
        }
    }

    #[test]
    fn reset_restarts_schedule() {
        let mut backoff = Backoff::new(Duration::from_millis(10), Duration::from_secs(10), 3.0);
        for _ in 0..6 {
            backoff.next_delay();
        }
        backoff.reset();
        assert_eq!(backoff.attempts(), 0);
        assert!(backoff.next_delay() <= Duration::from_millis(15));
    }

    #[test]
    fn huge_limits_stay_finite() {
        let mut backoff = Backoff::from(&BackoffConfig {
            initial_delay_ms: 1000,
            max_delay_secs: u64::MAX,
            multiplier: 2.0,
        });
        for _ in 0..200 {
            assert!(backoff.next_delay() <= MAX_DELAY);
        }
        assert_eq!(backoff.attempts(), 200);

        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::MAX, f64::INFINITY);
        for _ in 0..10 {
            assert!(backoff.next_delay() <= Duration::from_millis(1500));
        }
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(8), f64::NAN);
        assert!(backoff.next_delay() <= Duration::from_millis(1500));
    }

    #[test]
    fn zero_initial_delay_still_waits() {
        let mut backoff = Backoff::from(&BackoffConfig {
            initial_delay_ms: 0,
            ..Default::default()
        });
        for _ in 0..5 {
            assert!(backoff.next_delay() >= MIN_DELAY);
        }

        let mut backoff = Backoff::new(Duration::ZERO, Duration::ZERO, 2.0);
        assert_eq!(backoff.next_delay(), MIN_DELAY);
    }

    #[test]
    fn from_config() {
        let backoff = Backoff::from(&BackoffConfig::default());
        assert_eq!(backoff.initial, Duration::from_secs(1));
        assert_eq!(backoff.max, Duration::from_secs(300));
    }
}
