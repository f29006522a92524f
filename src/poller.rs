//! The reconciliation poller.
//!
//! BTP answers mutating requests with "accepted" long before the change is
//! applied. [`wait_for_state`] blocks a Create, Update or Delete handler until
//! the platform reports a target state for the entity, by repeatedly calling a
//! read-only [`Probe`] and classifying the state label it returns.
//!
//! # Example
//!
//! ```ignore
//! use btp_reconcile::{wait_for_state, Observation, PollSpec};
//! use tokio_util::sync::CancellationToken;
//!
//! let cancel = CancellationToken::new();
//! let spec = PollSpec::new("subaccount.create")
//!     .with_pending(["STARTED", "CREATING"])
//!     .with_target(["OK"])
//!     .with_failure(["CREATION_FAILED"]);
//!
//! let subaccount = wait_for_state(&cancel, spec, || async {
//!     let sa = client.get_subaccount(&id).await?;
//!     Ok(Observation::new(sa.clone(), sa.state).with_message(sa.state_message))
//! })
//! .await?;
//! ```

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::backoff::Backoff;
use crate::conf::PollSpec;
use crate::error::{ClientError, WaitError};
use crate::state::Observation;

/// A read-only status query, called repeatedly during a wait.
///
/// Implementations must not mutate platform state. Closures returning a
/// future implement this trait, so most call sites pass an `async` closure.
pub trait Probe: Send {
    /// The entity type the probe reads.
    type Output: Send;

    /// Query the platform once.
    fn probe(
        &mut self,
    ) -> impl Future<Output = Result<Observation<Self::Output>, ClientError>> + Send;
}

impl<F, Fut, T> Probe for F
where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = Result<Observation<T>, ClientError>> + Send,
    T: Send,
{
    type Output = T;

    fn probe(&mut self) -> impl Future<Output = Result<Observation<T>, ClientError>> + Send {
        self()
    }
}

/// Probe adapter that reports a fixed state when the entity is not found.
///
/// Whether a 404 means "done" or "not visible yet" depends on the operation,
/// so the mapping is opt-in: deletions wrap their probe with
/// `NotFoundAs::new(probe, DELETED)` and target `DELETED`.
#[derive(Debug, Clone)]
pub struct NotFoundAs<P> {
    inner: P,
    state: String,
}

impl<P: Probe> NotFoundAs<P> {
    /// Wrap `inner`, reporting `state` whenever it fails with a 404.
    pub fn new(inner: P, state: impl Into<String>) -> Self {
        Self {
            inner,
            state: state.into(),
        }
    }
}

impl<P: Probe> Probe for NotFoundAs<P> {
    type Output = P::Output;

    fn probe(
        &mut self,
    ) -> impl Future<Output = Result<Observation<Self::Output>, ClientError>> + Send {
        async move {
            match self.inner.probe().await {
                Err(err) if err.is_not_found() => {
                    debug!(state = %self.state, "Entity not found, reporting mapped state");
                    Ok(Observation::state_only(self.state.clone()))
                }
                other => other,
            }
        }
    }
}

/// Everything a wait observed, including on failure.
#[derive(Debug)]
pub struct PollReport<T> {
    /// The last entity observed, if any.
    pub value: Option<T>,
    /// The last state label observed, if any.
    pub last_state: Option<String>,
    /// Number of probe calls made.
    pub attempts: u32,
    /// Time from the start of the wait until it ended.
    pub elapsed: Duration,
    /// How the wait ended.
    pub outcome: Result<(), WaitError>,
}

impl<T> PollReport<T> {
    fn new() -> Self {
        Self {
            value: None,
            last_state: None,
            attempts: 0,
            elapsed: Duration::ZERO,
            outcome: Ok(()),
        }
    }

    /// Whether the target state was reached.
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// The last observed entity on success, the error otherwise.
    ///
    /// The entity is `None` only when the wait succeeded on its absence.
    pub fn into_result(self) -> Result<Option<T>, WaitError> {
        self.outcome.map(|()| self.value)
    }

    fn finish(mut self, started: Instant, outcome: Result<(), WaitError>) -> Self {
        self.elapsed = started.elapsed();
        self.outcome = outcome;
        self
    }
}

/// Wait until `probe` reports a target state.
///
/// Returns the last observed entity on success. See [`run`] for the full
/// report.
pub async fn wait_for_state<P: Probe>(
    cancel: &CancellationToken,
    spec: PollSpec,
    probe: P,
) -> Result<Option<P::Output>, WaitError> {
    run(cancel, spec, probe).await.into_result()
}

enum Round {
    Pending,
    Done,
}

/// Run a wait to completion and report everything it observed.
///
/// The spec is validated first. The wait then sleeps `spec.delay` and polls
/// until one of:
///
/// - the target state is observed (`continuous_target_occurrence` times in a row),
/// - a failure state is observed ([`WaitError::Failed`]),
/// - a state outside pending/target/failure is observed
///   ([`WaitError::UnexpectedState`]),
/// - the probe fails with a non-retriable error ([`WaitError::Probe`]),
/// - the entity stays absent for more than `not_found_checks` rounds
///   ([`WaitError::NotFound`]),
/// - `spec.timeout` elapses ([`WaitError::Timeout`]),
/// - `cancel` is triggered ([`WaitError::Cancelled`]).
///
/// Every sleep and every probe call is raced against the cancellation token
/// and the deadline.
#[instrument(skip_all, fields(operation = %spec.name))]
pub async fn run<P: Probe>(
    cancel: &CancellationToken,
    spec: PollSpec,
    mut probe: P,
) -> PollReport<P::Output> {
    let started = Instant::now();
    let mut report = PollReport::new();

    if let Err(err) = spec.validate() {
        return report.finish(started, Err(err));
    }

    let deadline = instant_after(started, spec.timeout);
    let mut backoff = Backoff::new(spec.min_interval, spec.backoff.clone());
    let mut not_found_ticks = 0u32;
    let mut target_seen = 0u32;
    let mut last_error: Option<String> = None;

    if !spec.delay.is_zero() {
        debug!(delay_ms = spec.delay.as_millis() as u64, "Delaying first probe");
        if !sleep_until(cancel, instant_after(started, spec.delay).min(deadline)).await {
            let last_state = report.last_state.clone();
            return report.finish(started, Err(WaitError::Cancelled { last_state }));
        }
    }

    loop {
        if Instant::now() >= deadline {
            let err = timeout_error(&spec, report.last_state.clone(), last_error);
            warn!(attempts = report.attempts, error = %err, "Wait timed out");
            return report.finish(started, Err(err));
        }

        report.attempts += 1;
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(attempts = report.attempts, "Wait cancelled during probe");
                let last_state = report.last_state.clone();
                return report.finish(started, Err(WaitError::Cancelled { last_state }));
            }
            _ = tokio::time::sleep_until(deadline) => {
                let err = timeout_error(&spec, report.last_state.clone(), last_error);
                warn!(attempts = report.attempts, error = %err, "Wait timed out during probe");
                return report.finish(started, Err(err));
            }
            result = probe.probe() => result,
        };

        let round = match result {
            Err(err) if spec.retriable.is_retriable(&err) => {
                warn!(attempt = report.attempts, error = %err, "Retriable probe error, still pending");
                last_error = Some(err.to_string());
                target_seen = 0;
                Ok(Round::Pending)
            }
            Err(err) => {
                warn!(attempt = report.attempts, error = %err, "Probe failed");
                Err(WaitError::Probe(err))
            }
            Ok(observation) => {
                last_error = None;
                classify(
                    &spec,
                    observation,
                    &mut report,
                    &mut not_found_ticks,
                    &mut target_seen,
                )
            }
        };

        match round {
            Ok(Round::Done) => {
                info!(
                    attempts = report.attempts,
                    state = report.last_state.as_deref().unwrap_or(""),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Target state reached"
                );
                return report.finish(started, Ok(()));
            }
            Ok(Round::Pending) => {}
            Err(err) => return report.finish(started, Err(err)),
        }

        let interval = backoff.next_interval();
        debug!(
            attempt = report.attempts,
            state = report.last_state.as_deref().unwrap_or(""),
            next_ms = interval.as_millis() as u64,
            "Still pending"
        );
        if !sleep_until(cancel, instant_after(Instant::now(), interval).min(deadline)).await {
            let last_state = report.last_state.clone();
            return report.finish(started, Err(WaitError::Cancelled { last_state }));
        }
    }
}

fn classify<T>(
    spec: &PollSpec,
    observation: Observation<T>,
    report: &mut PollReport<T>,
    not_found_ticks: &mut u32,
    target_seen: &mut u32,
) -> Result<Round, WaitError> {
    if observation.is_absent() {
        report.value = None;
        *target_seen = 0;

        if spec.target.is_empty() {
            return Ok(Round::Done);
        }

        *not_found_ticks += 1;
        if *not_found_ticks > spec.not_found_checks {
            return Err(WaitError::NotFound {
                checks: *not_found_ticks,
            });
        }
        debug!(checks = *not_found_ticks, "Entity not found yet");
        return Ok(Round::Pending);
    }

    *not_found_ticks = 0;
    let Observation {
        value,
        state,
        message,
    } = observation;
    report.value = value;
    report.last_state = Some(state.clone());

    if spec.target.contains(&state) {
        *target_seen += 1;
        if *target_seen >= spec.continuous_target_occurrence {
            return Ok(Round::Done);
        }
        return Ok(Round::Pending);
    }

    *target_seen = 0;

    if spec.pending.contains(&state) {
        Ok(Round::Pending)
    } else if spec.failure.contains(&state) {
        warn!(state = %state, detail = message.as_deref().unwrap_or(""), "Failure state reached");
        Err(WaitError::Failed { state, message })
    } else {
        warn!(state = %state, "Unexpected state");
        Err(WaitError::UnexpectedState {
            state,
            expected: spec.target.clone(),
        })
    }
}

fn timeout_error(
    spec: &PollSpec,
    last_state: Option<String>,
    last_error: Option<String>,
) -> WaitError {
    WaitError::Timeout {
        target: spec.target.clone(),
        last_state,
        last_error,
        timeout: spec.timeout,
    }
}

// About 30 years; stands in for instants past the clock's range.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// `base + after`, saturating at [`FAR_FUTURE`] for unbounded durations.
fn instant_after(base: Instant, after: Duration) -> Instant {
    base.checked_add(after).unwrap_or_else(|| base + FAR_FUTURE)
}

/// Sleep until `wake`; returns false if cancelled first.
async fn sleep_until(cancel: &CancellationToken, wake: Instant) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep_until(wake) => true,
    }
}
