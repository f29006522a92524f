//! Waiting on resource operations through a status reader.
//!
//! Resource handlers rarely build a [`PollSpec`] by hand. They implement
//! [`StatusReader`] once on top of their API client and hand it to a
//! [`Reconciler`], which picks the state machine for the resource type and
//! operation from [`presets`](crate::presets) and the timeout from the
//! resource's `timeouts` block.
//!
//! # Example
//!
//! ```ignore
//! use btp_reconcile::{async_trait, ClientError, Observation, Operation, Reconciler};
//! use btp_reconcile::presets::ResourceKind;
//! use btp_reconcile::resource::StatusReader;
//!
//! struct CisReader { client: CisClient }
//!
//! #[async_trait]
//! impl StatusReader for CisReader {
//!     async fn read_status(
//!         &self,
//!         kind: ResourceKind,
//!         id: &str,
//!     ) -> Result<Observation<serde_json::Value>, ClientError> {
//!         let entity = self.client.get(kind, id).await?;
//!         let state = entity["state"].as_str().unwrap_or_default().to_string();
//!         Ok(Observation::new(entity, state))
//!     }
//! }
//!
//! let reconciler = Reconciler::new(Arc::new(CisReader { client }));
//! reconciler
//!     .await_operation(ResourceKind::Subaccount, Operation::Create, &id)
//!     .await?;
//! ```

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::{format_duration, Operation, OperationTimeouts};
use crate::diagnostic::Diagnostic;
use crate::error::{ClientError, WaitError};
use crate::poller::{wait_for_state, NotFoundAs, Probe};
use crate::presets::{self, ResourceKind};
use crate::state::{Observation, DELETED};

/// Reads the current state of a BTP entity.
///
/// Implementations must be read-only. A missing entity is reported either as
/// a [`ClientError::NotFound`] or as [`Observation::absent`].
#[async_trait]
pub trait StatusReader: Send + Sync {
    /// Fetch the entity `id` of type `kind` and its state label.
    async fn read_status(
        &self,
        kind: ResourceKind,
        id: &str,
    ) -> Result<Observation<Value>, ClientError>;
}

/// A [`Probe`] reading one entity through a [`StatusReader`].
#[derive(Clone, Copy)]
pub struct StatusProbe<'a> {
    reader: &'a dyn StatusReader,
    kind: ResourceKind,
    id: &'a str,
}

impl<'a> StatusProbe<'a> {
    /// Probe the entity `id` of type `kind`.
    pub fn new(reader: &'a dyn StatusReader, kind: ResourceKind, id: &'a str) -> Self {
        Self { reader, kind, id }
    }
}

impl Probe for StatusProbe<'_> {
    type Output = Value;

    fn probe(&mut self) -> impl Future<Output = Result<Observation<Value>, ClientError>> + Send {
        self.reader.read_status(self.kind, self.id)
    }
}

/// Waits on resource operations with the state machine of each resource type.
#[derive(Clone)]
pub struct Reconciler {
    reader: Arc<dyn StatusReader>,
    timeouts: OperationTimeouts,
    cancel: CancellationToken,
}

impl Reconciler {
    /// Create a reconciler with default timeouts.
    pub fn new(reader: Arc<dyn StatusReader>) -> Self {
        Self {
            reader,
            timeouts: OperationTimeouts::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Use the timeouts of a resource's `timeouts` block.
    pub fn with_timeouts(mut self, timeouts: OperationTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Abort waits when `cancel` is triggered.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// The token that aborts this reconciler's waits.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Wait for `operation` on entity `id` to complete.
    ///
    /// Returns the last observed entity, or `None` once a deleted entity is
    /// gone. Deletions treat a 404 from the reader as [`DELETED`].
    pub async fn await_operation(
        &self,
        kind: ResourceKind,
        operation: Operation,
        id: &str,
    ) -> Result<Option<Value>, WaitError> {
        let timeout = self.timeouts.for_operation(operation);
        let Some(spec) = presets::spec_for(kind, operation, timeout) else {
            return Err(WaitError::InvalidSpec(format!(
                "{} does not wait on {}",
                kind, operation
            )));
        };

        info!(resource = %kind, %operation, id, timeout = ?timeout, "Waiting for operation to complete");

        let probe = StatusProbe::new(self.reader.as_ref(), kind, id);
        if spec.target.contains(DELETED) {
            wait_for_state(&self.cancel, spec, NotFoundAs::new(probe, DELETED)).await
        } else {
            wait_for_state(&self.cancel, spec, probe).await
        }
    }

    /// Warn about operation timeouts that end a wait before its first status
    /// query.
    ///
    /// Each preset delays the first query (10s for account resources); a
    /// shorter timeout can only ever fail.
    pub fn check_timeouts(&self, kind: ResourceKind) -> Vec<Diagnostic> {
        Operation::ALL
            .into_iter()
            .filter_map(|operation| {
                let timeout = self.timeouts.for_operation(operation);
                let spec = presets::spec_for(kind, operation, timeout)?;
                (timeout <= spec.delay).then(|| {
                    Diagnostic::warning("Timeout Shorter Than Initial Delay")
                        .with_detail(format!(
                            "The {} timeout of {} for {} ends before the first status check, \
                             which happens after {}.",
                            operation,
                            format_duration(timeout),
                            kind,
                            format_duration(spec.delay)
                        ))
                        .with_attribute(format!("timeouts.{}", operation))
                })
            })
            .collect()
    }

    /// Like [`Reconciler::await_operation`], shaping failures into a
    /// diagnostic such as "Timeout creating Subaccount".
    pub async fn await_or_diagnose(
        &self,
        kind: ResourceKind,
        operation: Operation,
        id: &str,
    ) -> Result<Option<Value>, Diagnostic> {
        self.await_operation(kind, operation, id)
            .await
            .map_err(|err| Diagnostic::from_wait_error(&operation_label(kind, operation), &err))
    }
}

/// Human-readable operation label, e.g. "Deleting Service Binding".
pub fn operation_label(kind: ResourceKind, operation: Operation) -> String {
    let verb = match operation {
        Operation::Create => "Creating",
        Operation::Read => "Reading",
        Operation::Update => "Updating",
        Operation::Delete => "Deleting",
    };
    let noun = match kind {
        ResourceKind::Subaccount => "Subaccount",
        ResourceKind::Directory => "Directory",
        ResourceKind::Entitlement => "Entitlement",
        ResourceKind::Subscription => "Subscription",
        ResourceKind::ServiceInstance => "Service Instance",
        ResourceKind::ServiceBinding => "Service Binding",
        ResourceKind::EnvironmentInstance => "Environment Instance",
    };
    format!("{} {}", verb, noun)
}
