//! State labels and probe observations.
//!
//! Every BTP service that processes a mutation asynchronously exposes a state
//! label on the affected entity. This module provides the [`Observation`] type
//! that probes return, the [`StateSet`] used to classify labels, and the label
//! vocabularies of the individual services.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// What a single probe call saw on the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation<T> {
    /// The entity as read from the platform, if any.
    pub value: Option<T>,
    /// The state label reported for the entity. Empty if none was reported.
    pub state: String,
    /// Platform-provided detail about the state (e.g. `stateMessage`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> Observation<T> {
    /// Create an observation of an entity in the given state.
    pub fn new(value: T, state: impl Into<String>) -> Self {
        Self {
            value: Some(value),
            state: state.into(),
            message: None,
        }
    }

    /// Create an observation that carries a state label but no entity.
    ///
    /// Used when the label alone is meaningful, e.g. `DELETED` after a 404.
    pub fn state_only(state: impl Into<String>) -> Self {
        Self {
            value: None,
            state: state.into(),
            message: None,
        }
    }

    /// Create an observation of an entity the platform does not know about.
    pub fn absent() -> Self {
        Self {
            value: None,
            state: String::new(),
            message: None,
        }
    }

    /// Attach the platform's state message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        let message = message.into();
        if !message.is_empty() {
            self.message = Some(message);
        }
        self
    }

    /// Whether the platform reported neither an entity nor a state.
    pub fn is_absent(&self) -> bool {
        self.value.is_none() && self.state.is_empty()
    }
}

/// A set of state labels.
///
/// Ordered so that error messages listing expected states are stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateSet(BTreeSet<String>);

impl StateSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// Add a label to the set.
    pub fn with(mut self, label: impl Into<String>) -> Self {
        self.0.insert(label.into());
        self
    }

    /// Check whether the set contains a label.
    pub fn contains(&self, label: &str) -> bool {
        self.0.contains(label)
    }

    /// Whether the set has no labels.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of labels in the set.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate over the labels in order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Labels present in both sets.
    pub fn intersection<'a>(&'a self, other: &'a StateSet) -> Vec<&'a str> {
        self.0.intersection(&other.0).map(String::as_str).collect()
    }

    /// Extend the set with the labels of another set.
    pub fn union(mut self, other: &StateSet) -> Self {
        self.0.extend(other.0.iter().cloned());
        self
    }
}

impl<S: Into<String>> FromIterator<S> for StateSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl<S: Into<String>, const N: usize> From<[S; N]> for StateSet {
    fn from(labels: [S; N]) -> Self {
        labels.into_iter().collect()
    }
}

impl fmt::Display for StateSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels: Vec<&str> = self.iter().collect();
        write!(f, "{}", labels.join(", "))
    }
}

/// Label used by callers that map a vanished entity to a terminal state.
pub const DELETED: &str = "DELETED";

/// Labels of the accounts service (subaccounts and directories).
#[allow(missing_docs)]
pub mod accounts {
    /// The entity is usable.
    pub const OK: &str = "OK";
    /// The platform accepted the request.
    pub const STARTED: &str = "STARTED";
    /// Creation in progress.
    pub const CREATING: &str = "CREATING";
    /// Update in progress.
    pub const UPDATING: &str = "UPDATING";
    /// Deletion in progress.
    pub const DELETING: &str = "DELETING";
    /// Generic processing.
    pub const PROCESSING: &str = "PROCESSING";
    /// Move between directories in progress.
    pub const MOVING: &str = "MOVING";
    /// Migration in progress.
    pub const MIGRATING: &str = "MIGRATING";
    /// Waiting for manual review.
    pub const PENDING_REVIEW: &str = "PENDING_REVIEW";
    /// The request was cancelled on the platform.
    pub const CANCELED: &str = "CANCELED";
    pub const CREATION_FAILED: &str = "CREATION_FAILED";
    pub const UPDATE_FAILED: &str = "UPDATE_FAILED";
    pub const DELETION_FAILED: &str = "DELETION_FAILED";
    pub const PROCESSING_FAILED: &str = "PROCESSING_FAILED";
    pub const MOVE_FAILED: &str = "MOVE_FAILED";
    pub const MIGRATION_FAILED: &str = "MIGRATION_FAILED";
    pub const SUSPENSION_FAILED: &str = "SUSPENSION_FAILED";
    pub const UPDATE_ACCOUNT_TYPE_FAILED: &str = "UPDATE_ACCOUNT_TYPE_FAILED";
    pub const UPDATE_DIRECTORY_TYPE_FAILED: &str = "UPDATE_DIRECTORY_TYPE_FAILED";
}

/// Labels of the entitlements service.
#[allow(missing_docs)]
pub mod entitlements {
    pub const OK: &str = "OK";
    pub const STARTED: &str = "STARTED";
    pub const PROCESSING: &str = "PROCESSING";
    pub const PROCESSING_FAILED: &str = "PROCESSING_FAILED";
}

/// Labels of the SaaS manager (application subscriptions).
#[allow(missing_docs)]
pub mod subscriptions {
    pub const IN_PROCESS: &str = "IN_PROCESS";
    pub const SUBSCRIBED: &str = "SUBSCRIBED";
    pub const NOT_SUBSCRIBED: &str = "NOT_SUBSCRIBED";
    pub const SUBSCRIBE_FAILED: &str = "SUBSCRIBE_FAILED";
    pub const UNSUBSCRIBE_FAILED: &str = "UNSUBSCRIBE_FAILED";
    pub const UPDATE_FAILED: &str = "UPDATE_FAILED";
    pub const UPDATE_PARAMETERS_FAILED: &str = "UPDATE_PARAMETERS_FAILED";
}

/// Last-operation labels of the service manager (instances and bindings).
#[allow(missing_docs)]
pub mod service_manager {
    pub const IN_PROGRESS: &str = "in progress";
    pub const SUCCEEDED: &str = "succeeded";
    pub const FAILED: &str = "failed";
}

/// Labels of the provisioning service (environment instances).
#[allow(missing_docs)]
pub mod provisioning {
    pub const OK: &str = "OK";
    pub const CREATING: &str = "CREATING";
    pub const UPDATING: &str = "UPDATING";
    pub const DELETING: &str = "DELETING";
    pub const CREATION_FAILED: &str = "CREATION_FAILED";
    pub const UPDATE_FAILED: &str = "UPDATE_FAILED";
    pub const DELETION_FAILED: &str = "DELETION_FAILED";
}
