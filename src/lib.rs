//! BTP Reconcile
//!
//! Eventual-consistency polling for the SAP BTP Terraform provider.
//!
//! Most BTP APIs accept a Create, Update or Delete request and apply it in the
//! background. A resource handler must not report success until the platform
//! has caught up, so after every mutating call it waits for the entity to
//! reach a target state. This crate provides that wait.
//!
//! # Overview
//!
//! - **Poller**: [`wait_for_state`] and [`run`] drive a [`Probe`] until a
//!   target, failure or unexpected state is observed, the timeout elapses or
//!   the wait is cancelled
//! - **Specs**: [`PollSpec`] describes the state machine and timing of one wait
//! - **Presets**: ready specs for subaccounts, directories, entitlements,
//!   subscriptions, service instances and bindings, and environment instances
//! - **Reconciler**: [`Reconciler`] waits on a resource operation through a
//!   [`StatusReader`](resource::StatusReader) with per-operation timeouts
//! - **Error types**: [`ClientError`] for API failures, [`WaitError`] for
//!   failed waits, and [`Diagnostic`] for surfacing them to the user
//! - **Logging**: Integration with `tracing` for structured logging
//!
//! # Quick Start
//!
//! ```ignore
//! use btp_reconcile::{wait_for_state, ClientError, Observation, PollSpec};
//! use btp_reconcile::state::accounts;
//! use tokio_util::sync::CancellationToken;
//!
//! let spec = PollSpec::new("subaccount.create")
//!     .with_pending([accounts::STARTED, accounts::CREATING])
//!     .with_target([accounts::OK])
//!     .with_failure([accounts::CREATION_FAILED])
//!     .with_timeout(Duration::from_secs(600));
//!
//! let subaccount = wait_for_state(&CancellationToken::new(), spec, || async {
//!     let sa = client.get_subaccount(&id).await?;
//!     Ok::<_, ClientError>(Observation::new(sa.clone(), sa.state))
//! })
//! .await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backoff;
pub mod conf;
pub mod config;
pub mod diagnostic;
pub mod error;
pub mod logging;
pub mod poller;
pub mod presets;
pub mod resource;
pub mod retriable;
pub mod state;
pub mod testing;

// Re-export main types at crate root
pub use backoff::{Backoff, BackoffConfig};
pub use conf::PollSpec;
pub use config::{Operation, OperationTimeouts};
pub use diagnostic::{Diagnostic, DiagnosticSeverity};
pub use error::{ClientError, WaitError};
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use poller::{run, wait_for_state, NotFoundAs, PollReport, Probe};
pub use presets::ResourceKind;
pub use resource::{Reconciler, StatusReader};
pub use retriable::RetryPolicy;
pub use state::{Observation, StateSet, DELETED};

// Re-export async_trait for StatusReader implementations
pub use async_trait::async_trait;

// Re-export commonly used external types
pub use serde_json;
pub use tokio_util::sync::CancellationToken;
pub use tracing;
