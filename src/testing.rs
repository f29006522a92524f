//! Testing utilities for code that waits on BTP state transitions.
//!
//! [`ScriptedProbe`] replays a fixed sequence of probe outcomes so that
//! Create/Update/Delete handlers can be tested without a platform.
//!
//! # Example
//!
//! ```ignore
//! use btp_reconcile::testing::{ScriptedProbe, Step};
//! use btp_reconcile::{wait_for_state, presets};
//!
//! #[tokio::test(start_paused = true)]
//! async fn test_subaccount_create_waits_for_ok() {
//!     let probe = ScriptedProbe::states(["STARTED", "CREATING", "OK"]);
//!     let calls = probe.calls();
//!
//!     let spec = presets::subaccount_create(Duration::from_secs(600));
//!     let state = wait_for_state(&CancellationToken::new(), spec, probe).await.unwrap();
//!
//!     assert_eq!(state.as_deref(), Some("OK"));
//!     assert_eq!(calls.load(Ordering::SeqCst), 3);
//! }
//! ```

use std::future::{ready, Future};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::error::{ClientError, WaitError};
use crate::poller::Probe;
use crate::state::Observation;

/// One scripted probe outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum Step<T> {
    /// Report an observation.
    Observe(Observation<T>),
    /// Fail with the error an HTTP response of this status maps to.
    Error {
        /// HTTP status code.
        status: u16,
        /// Error message.
        message: String,
    },
}

impl<T> Step<T> {
    /// Report `value` in `state`.
    pub fn observe(value: T, state: impl Into<String>) -> Self {
        Self::Observe(Observation::new(value, state))
    }

    /// Report that the entity does not exist.
    pub fn absent() -> Self {
        Self::Observe(Observation::absent())
    }

    /// Fail with the error for an HTTP status.
    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Self::Error {
            status,
            message: message.into(),
        }
    }
}

impl Step<String> {
    /// Report an entity whose value is its own state label.
    pub fn state(state: impl Into<String>) -> Self {
        let state = state.into();
        Self::observe(state.clone(), state)
    }

    /// Like [`Step::state`], with a platform state message.
    pub fn state_with_message(state: impl Into<String>, message: impl Into<String>) -> Self {
        let state = state.into();
        Self::Observe(Observation::new(state.clone(), state).with_message(message))
    }
}

/// A probe that replays scripted outcomes.
///
/// Once the script is exhausted the last step repeats, so a script of one
/// pending state keeps a wait pending until it times out.
#[derive(Debug)]
pub struct ScriptedProbe<T> {
    steps: Vec<Step<T>>,
    calls: Arc<AtomicU32>,
}

impl<T: Clone> ScriptedProbe<T> {
    /// Create a probe from a script.
    ///
    /// # Panics
    ///
    /// Panics if `steps` is empty.
    pub fn new(steps: Vec<Step<T>>) -> Self {
        assert!(!steps.is_empty(), "a scripted probe needs at least one step");
        Self {
            steps,
            calls: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Shared counter of probe calls, readable after the probe is consumed.
    pub fn calls(&self) -> Arc<AtomicU32> {
        self.calls.clone()
    }

    fn next_outcome(&mut self) -> Result<Observation<T>, ClientError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
        let step = &self.steps[call.min(self.steps.len() - 1)];
        match step {
            Step::Observe(observation) => Ok(observation.clone()),
            Step::Error { status, message } => {
                Err(ClientError::from_status(*status, message.clone()))
            }
        }
    }
}

impl ScriptedProbe<String> {
    /// A probe reporting each state in turn.
    pub fn states<I, S>(states: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(states.into_iter().map(Step::state).collect())
    }
}

impl<T: Clone + Send> Probe for ScriptedProbe<T> {
    type Output = T;

    fn probe(&mut self) -> impl Future<Output = Result<Observation<T>, ClientError>> + Send {
        ready(self.next_outcome())
    }
}

// =========================================================================
// Assertion Helpers
// =========================================================================

/// Assert that a wait timed out and its error names `state`.
///
/// # Panics
///
/// Panics if the error is not a timeout or does not mention the state.
pub fn assert_timeout_mentions(err: &WaitError, state: &str) {
    assert!(err.is_timeout(), "Expected a timeout, got: {}", err);
    assert!(
        err.to_string().contains(state),
        "Expected timeout error to mention '{}', got: {}",
        state,
        err
    );
}

/// Assert that a wait ended in the given failure state.
///
/// # Panics
///
/// Panics if the error is not [`WaitError::Failed`] with that state.
pub fn assert_failed_with(err: &WaitError, expected_state: &str) {
    match err {
        WaitError::Failed { state, .. } => assert_eq!(
            state, expected_state,
            "Expected failure state '{}', got '{}'",
            expected_state, state
        ),
        other => panic!("Expected failure state '{}', got: {}", expected_state, other),
    }
}
