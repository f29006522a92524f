//! Inter-poll interval schedule.
//!
//! Intervals start at the poll spec's minimum interval and grow by a
//! multiplier after every pending round, capped at a maximum. Optional jitter
//! spreads concurrent waits on the same service apart.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Growth parameters for the interval between probe calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Factor applied to the interval after each pending round.
    pub multiplier: f64,
    /// Upper bound for the interval.
    pub max_interval: Duration,
    /// Relative jitter in `[0.0, 1.0)`; 0.25 lengthens each interval by up to 25%.
    ///
    /// Jitter only ever lengthens, so the minimum interval holds.
    pub jitter: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            multiplier: 2.0,
            max_interval: Duration::from_secs(10),
            jitter: 0.0,
        }
    }
}

impl BackoffConfig {
    /// Poll at a fixed interval.
    pub fn fixed() -> Self {
        Self {
            multiplier: 1.0,
            ..Default::default()
        }
    }

    /// Set the interval cap.
    pub fn with_max_interval(mut self, max_interval: Duration) -> Self {
        self.max_interval = max_interval;
        self
    }

    /// Set the growth factor.
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Set the relative jitter.
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }
}

/// The running interval schedule of one wait.
#[derive(Debug, Clone)]
pub struct Backoff {
    config: BackoffConfig,
    current: Duration,
}

impl Backoff {
    /// Start a schedule at `initial`.
    ///
    /// The cap is raised to `initial` if it is configured below it.
    pub fn new(initial: Duration, mut config: BackoffConfig) -> Self {
        if config.max_interval < initial {
            config.max_interval = initial;
        }
        Self {
            config,
            current: initial,
        }
    }

    /// The interval to sleep now; advances the schedule.
    pub fn next_interval(&mut self) -> Duration {
        let interval = self.jittered(self.current);

        let grown = scale(self.current, self.config.multiplier);
        self.current = grown.min(self.config.max_interval);

        interval
    }

    /// The interval the next call to [`Backoff::next_interval`] is based on.
    pub fn current(&self) -> Duration {
        self.current
    }

    fn jittered(&self, interval: Duration) -> Duration {
        if self.config.jitter <= 0.0 {
            return interval;
        }
        let factor = rand::thread_rng().gen_range(1.0..(1.0 + self.config.jitter));
        scale(interval, factor)
    }
}

fn scale(duration: Duration, factor: f64) -> Duration {
    let nanos = (duration.as_nanos() as f64 * factor).round();
    Duration::from_nanos(nanos.min(u64::MAX as f64) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_growth_is_capped() {
        let config = BackoffConfig::default().with_max_interval(Duration::from_millis(400));
        let mut backoff = Backoff::new(Duration::from_millis(50), config);

        let intervals: Vec<u128> = (0..6).map(|_| backoff.next_interval().as_millis()).collect();
        assert_eq!(intervals, vec![50, 100, 200, 400, 400, 400]);
    }

    #[test]
    fn test_fixed_interval() {
        let mut backoff = Backoff::new(Duration::from_secs(5), BackoffConfig::fixed());
        for _ in 0..5 {
            assert_eq!(backoff.next_interval(), Duration::from_secs(5));
        }
    }

    #[test]
    fn test_cap_never_below_initial() {
        let config = BackoffConfig::default().with_max_interval(Duration::from_secs(1));
        let mut backoff = Backoff::new(Duration::from_secs(5), config);
        assert_eq!(backoff.next_interval(), Duration::from_secs(5));
        assert_eq!(backoff.next_interval(), Duration::from_secs(5));
    }

    #[test]
    fn test_jitter_never_shortens_min_interval() {
        let config = BackoffConfig::fixed().with_jitter(0.5);
        let mut backoff = Backoff::new(Duration::from_millis(100), config);
        for _ in 0..100 {
            let interval = backoff.next_interval();
            assert!(interval >= Duration::from_millis(100), "{:?}", interval);
            assert!(interval <= Duration::from_millis(150), "{:?}", interval);
        }
    }

    #[test]
    fn test_jitter_on_grown_interval() {
        let config = BackoffConfig::default()
            .with_max_interval(Duration::from_millis(400))
            .with_jitter(0.25);
        let mut backoff = Backoff::new(Duration::from_millis(100), config);
        let floors = [100, 200, 400, 400];
        for floor in floors {
            let interval = backoff.next_interval();
            assert!(interval >= Duration::from_millis(floor), "{:?}", interval);
            assert!(interval <= Duration::from_millis(floor * 5 / 4), "{:?}", interval);
        }
    }
}
