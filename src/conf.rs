//! Configuration of a single reconciliation wait.
//!
//! A [`PollSpec`] is built fresh for each Create, Update or Delete and
//! consumed by one call to [`wait_for_state`](crate::poller::wait_for_state).
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use btp_reconcile::conf::PollSpec;
//! use btp_reconcile::retriable::RetryPolicy;
//!
//! let spec = PollSpec::new("entitlement.update")
//!     .with_pending(["STARTED", "PROCESSING"])
//!     .with_target(["OK"])
//!     .with_failure(["PROCESSING_FAILED"])
//!     .with_timeout(Duration::from_secs(600))
//!     .with_delay(Duration::from_secs(10))
//!     .with_min_interval(Duration::from_secs(5))
//!     .with_retriable(RetryPolicy::transient());
//!
//! assert!(spec.validate().is_ok());
//! ```

use std::time::Duration;

use crate::backoff::BackoffConfig;
use crate::error::WaitError;
use crate::retriable::RetryPolicy;
use crate::state::StateSet;

/// Default number of consecutive absent observations tolerated.
pub const DEFAULT_NOT_FOUND_CHECKS: u32 = 20;

/// Describes one reconciliation attempt.
#[derive(Debug, Clone)]
pub struct PollSpec {
    /// Operation label used in logs and diagnostics.
    pub name: String,
    /// States meaning the platform is still working.
    pub pending: StateSet,
    /// States meaning the operation succeeded.
    ///
    /// Leave empty to wait for the entity to disappear.
    pub target: StateSet,
    /// States meaning the operation failed on the platform.
    pub failure: StateSet,
    /// Maximum wall-clock time for the whole wait, delay included.
    pub timeout: Duration,
    /// Wait before the first probe call.
    pub delay: Duration,
    /// Spacing between the first two probe calls.
    pub min_interval: Duration,
    /// Growth of the spacing on successive pending rounds.
    pub backoff: BackoffConfig,
    /// Which probe errors count as pending.
    pub retriable: RetryPolicy,
    /// Consecutive absent observations tolerated while a target is expected.
    pub not_found_checks: u32,
    /// Consecutive target observations required before success.
    pub continuous_target_occurrence: u32,
}

impl PollSpec {
    /// Create a spec with the given operation label and default timing.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pending: StateSet::new(),
            target: StateSet::new(),
            failure: StateSet::new(),
            timeout: Duration::from_secs(600),
            delay: Duration::ZERO,
            min_interval: Duration::from_secs(1),
            backoff: BackoffConfig::default(),
            retriable: RetryPolicy::never(),
            not_found_checks: DEFAULT_NOT_FOUND_CHECKS,
            continuous_target_occurrence: 1,
        }
    }

    /// Set the pending states.
    pub fn with_pending(mut self, states: impl Into<StateSet>) -> Self {
        self.pending = states.into();
        self
    }

    /// Set the target states.
    pub fn with_target(mut self, states: impl Into<StateSet>) -> Self {
        self.target = states.into();
        self
    }

    /// Set the failure states.
    pub fn with_failure(mut self, states: impl Into<StateSet>) -> Self {
        self.failure = states.into();
        self
    }

    /// Set the overall timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the delay before the first probe.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Set the minimum spacing between probe calls.
    pub fn with_min_interval(mut self, min_interval: Duration) -> Self {
        self.min_interval = min_interval;
        self
    }

    /// Set the backoff curve.
    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    /// Set the retriable-error predicate.
    pub fn with_retriable(mut self, retriable: RetryPolicy) -> Self {
        self.retriable = retriable;
        self
    }

    /// Set the number of absent observations tolerated.
    pub fn with_not_found_checks(mut self, checks: u32) -> Self {
        self.not_found_checks = checks;
        self
    }

    /// Require the target state to be seen several times in a row.
    pub fn with_continuous_target_occurrence(mut self, occurrences: u32) -> Self {
        self.continuous_target_occurrence = occurrences;
        self
    }

    /// Check the spec's invariants.
    ///
    /// Returns every violation found, joined into one
    /// [`WaitError::InvalidSpec`].
    pub fn validate(&self) -> Result<(), WaitError> {
        let problems = self.problems();
        if problems.is_empty() {
            Ok(())
        } else {
            Err(WaitError::InvalidSpec(problems.join("; ")))
        }
    }

    fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();

        for (left, left_name, right, right_name) in [
            (&self.pending, "pending", &self.target, "target"),
            (&self.pending, "pending", &self.failure, "failure"),
            (&self.target, "target", &self.failure, "failure"),
        ] {
            let overlap = left.intersection(right);
            if !overlap.is_empty() {
                problems.push(format!(
                    "{} and {} states overlap: {}",
                    left_name,
                    right_name,
                    overlap.join(", ")
                ));
            }
        }

        if self.timeout.is_zero() {
            problems.push("timeout must be greater than zero".to_string());
        }
        if self.min_interval.is_zero() {
            problems.push("min_interval must be greater than zero".to_string());
        }
        if self.backoff.multiplier.is_nan() || self.backoff.multiplier < 1.0 {
            problems.push(format!(
                "backoff multiplier must be at least 1.0, got {}",
                self.backoff.multiplier
            ));
        }
        if !(0.0..1.0).contains(&self.backoff.jitter) {
            problems.push(format!(
                "backoff jitter must be in [0.0, 1.0), got {}",
                self.backoff.jitter
            ));
        }
        if self.continuous_target_occurrence == 0 {
            problems.push("continuous_target_occurrence must be at least 1".to_string());
        }

        problems
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_spec() -> PollSpec {
        PollSpec::new("test")
            .with_pending(["PROCESSING", "STARTED"])
            .with_target(["OK"])
            .with_failure(["PROCESSING_FAILED"])
    }

    #[test]
    fn test_defaults() {
        let spec = PollSpec::new("subaccount.create");
        assert_eq!(spec.name, "subaccount.create");
        assert_eq!(spec.not_found_checks, 20);
        assert_eq!(spec.continuous_target_occurrence, 1);
        assert_eq!(spec.delay, Duration::ZERO);
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_valid_spec() {
        assert!(valid_spec().validate().is_ok());
    }

    #[test]
    fn test_overlapping_pending_and_target() {
        let spec = valid_spec().with_target(["OK", "PROCESSING"]);
        let err = spec.validate().unwrap_err();
        assert!(matches!(err, WaitError::InvalidSpec(_)));
        assert!(err
            .to_string()
            .contains("pending and target states overlap: PROCESSING"));
    }

    #[test]
    fn test_failure_overlaps_target() {
        let spec = valid_spec().with_failure(["OK"]);
        let err = spec.validate().unwrap_err();
        assert!(err
            .to_string()
            .contains("target and failure states overlap: OK"));
    }

    #[test]
    fn test_zero_durations_rejected() {
        let spec = valid_spec()
            .with_timeout(Duration::ZERO)
            .with_min_interval(Duration::ZERO);
        let message = spec.validate().unwrap_err().to_string();
        assert!(message.contains("timeout must be greater than zero"));
        assert!(message.contains("min_interval must be greater than zero"));
    }

    #[test]
    fn test_backoff_bounds() {
        let spec = valid_spec().with_backoff(BackoffConfig::default().with_multiplier(0.5));
        assert!(spec.validate().is_err());

        let spec = valid_spec().with_backoff(BackoffConfig::default().with_jitter(1.0));
        assert!(spec.validate().is_err());

        let spec = valid_spec().with_backoff(BackoffConfig::default().with_multiplier(f64::NAN));
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_zero_target_occurrence_rejected() {
        let spec = valid_spec().with_continuous_target_occurrence(0);
        assert!(spec.validate().is_err());
    }
}
