//! State machines of the BTP resource types.
//!
//! Each function returns a ready [`PollSpec`] for one resource operation. The
//! pending/target/failure vocabularies are those reported by the service that
//! owns the resource type.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backoff::BackoffConfig;
use crate::conf::PollSpec;
use crate::config::Operation;
use crate::retriable::RetryPolicy;
use crate::state::{
    accounts, entitlements, provisioning, service_manager, subscriptions, StateSet, DELETED,
};

/// Delay before the first status query for account and provisioning resources.
pub const DEFAULT_DELAY: Duration = Duration::from_secs(10);
/// First polling interval for account and provisioning resources.
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_secs(5);
/// Delay and first interval for service manager resources.
pub const SERVICE_MANAGER_INTERVAL: Duration = Duration::from_secs(1);

/// BTP resource types whose mutations complete asynchronously.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    /// `btp_subaccount`
    #[serde(rename = "btp_subaccount")]
    Subaccount,
    /// `btp_directory`
    #[serde(rename = "btp_directory")]
    Directory,
    /// `btp_subaccount_entitlement` / `btp_directory_entitlement`
    #[serde(rename = "btp_subaccount_entitlement")]
    Entitlement,
    /// `btp_subaccount_subscription`
    #[serde(rename = "btp_subaccount_subscription")]
    Subscription,
    /// `btp_subaccount_service_instance`
    #[serde(rename = "btp_subaccount_service_instance")]
    ServiceInstance,
    /// `btp_subaccount_service_binding`
    #[serde(rename = "btp_subaccount_service_binding")]
    ServiceBinding,
    /// `btp_subaccount_environment_instance`
    #[serde(rename = "btp_subaccount_environment_instance")]
    EnvironmentInstance,
}

impl ResourceKind {
    /// All resource kinds.
    pub const ALL: [ResourceKind; 7] = [
        Self::Subaccount,
        Self::Directory,
        Self::Entitlement,
        Self::Subscription,
        Self::ServiceInstance,
        Self::ServiceBinding,
        Self::EnvironmentInstance,
    ];

    /// The Terraform type name of the resource.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Subaccount => "btp_subaccount",
            Self::Directory => "btp_directory",
            Self::Entitlement => "btp_subaccount_entitlement",
            Self::Subscription => "btp_subaccount_subscription",
            Self::ServiceInstance => "btp_subaccount_service_instance",
            Self::ServiceBinding => "btp_subaccount_service_binding",
            Self::EnvironmentInstance => "btp_subaccount_environment_instance",
        }
    }

    /// Look up a kind by Terraform type name.
    ///
    /// Directory entitlements share the entitlement state machine.
    pub fn from_type_name(name: &str) -> Option<Self> {
        if name == "btp_directory_entitlement" {
            return Some(Self::Entitlement);
        }
        Self::ALL.into_iter().find(|kind| kind.type_name() == name)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// The poll spec for waiting on `operation` of a `kind` resource.
///
/// Returns `None` for operations that complete synchronously (reads).
pub fn spec_for(kind: ResourceKind, operation: Operation, timeout: Duration) -> Option<PollSpec> {
    let spec = match (kind, operation) {
        (_, Operation::Read) => return None,
        (ResourceKind::Subaccount, Operation::Create) => subaccount_create(timeout),
        (ResourceKind::Subaccount, Operation::Update) => subaccount_update(timeout),
        (ResourceKind::Subaccount, Operation::Delete) => subaccount_delete(timeout),
        (ResourceKind::Directory, Operation::Create) => directory_create(timeout),
        (ResourceKind::Directory, Operation::Update) => directory_update(timeout),
        (ResourceKind::Directory, Operation::Delete) => directory_delete(timeout),
        (ResourceKind::Entitlement, Operation::Create | Operation::Update) => {
            entitlement_update(timeout)
        }
        (ResourceKind::Entitlement, Operation::Delete) => entitlement_delete(timeout),
        (ResourceKind::Subscription, Operation::Create) => subscription_create(timeout),
        (ResourceKind::Subscription, Operation::Update) => subscription_update(timeout),
        (ResourceKind::Subscription, Operation::Delete) => subscription_delete(timeout),
        (ResourceKind::ServiceInstance | ResourceKind::ServiceBinding, Operation::Delete) => {
            service_manager_delete(kind, timeout)
        }
        (ResourceKind::ServiceInstance | ResourceKind::ServiceBinding, _) => {
            service_manager_upsert(kind, operation, timeout)
        }
        (ResourceKind::EnvironmentInstance, Operation::Create) => {
            environment_instance_create(timeout)
        }
        (ResourceKind::EnvironmentInstance, Operation::Update) => {
            environment_instance_update(timeout)
        }
        (ResourceKind::EnvironmentInstance, Operation::Delete) => {
            environment_instance_delete(timeout)
        }
    };
    Some(spec)
}

fn accounts_failures() -> StateSet {
    StateSet::from([
        accounts::CANCELED,
        accounts::CREATION_FAILED,
        accounts::UPDATE_FAILED,
        accounts::DELETION_FAILED,
        accounts::PROCESSING_FAILED,
        accounts::MOVE_FAILED,
        accounts::MIGRATION_FAILED,
        accounts::SUSPENSION_FAILED,
        accounts::UPDATE_ACCOUNT_TYPE_FAILED,
        accounts::UPDATE_DIRECTORY_TYPE_FAILED,
    ])
}

fn accounts_spec(name: &str, timeout: Duration) -> PollSpec {
    PollSpec::new(name)
        .with_timeout(timeout)
        .with_delay(DEFAULT_DELAY)
        .with_min_interval(DEFAULT_MIN_INTERVAL)
        .with_failure(accounts_failures())
        .with_retriable(RetryPolicy::transient())
}

/// Wait for a new subaccount to become usable.
///
/// The subaccount may briefly be unknown to the read API after creation.
pub fn subaccount_create(timeout: Duration) -> PollSpec {
    accounts_spec("subaccount.create", timeout)
        .with_pending([accounts::STARTED, accounts::CREATING])
        .with_target([accounts::OK])
        .with_retriable(RetryPolicy::transient().or(RetryPolicy::not_found()))
}

/// Wait for a subaccount update, including moves between directories.
pub fn subaccount_update(timeout: Duration) -> PollSpec {
    accounts_spec("subaccount.update", timeout)
        .with_pending([
            accounts::STARTED,
            accounts::UPDATING,
            accounts::PROCESSING,
            accounts::MOVING,
        ])
        .with_target([accounts::OK])
}

/// Wait for a subaccount to disappear.
///
/// The probe must report [`DELETED`] once the subaccount is gone.
pub fn subaccount_delete(timeout: Duration) -> PollSpec {
    accounts_spec("subaccount.delete", timeout)
        .with_pending([accounts::STARTED, accounts::DELETING, accounts::OK])
        .with_target([DELETED])
}

/// Wait for a new directory to become usable.
pub fn directory_create(timeout: Duration) -> PollSpec {
    accounts_spec("directory.create", timeout)
        .with_pending([accounts::STARTED, accounts::CREATING])
        .with_target([accounts::OK])
        .with_retriable(RetryPolicy::transient().or(RetryPolicy::not_found()))
}

/// Wait for a directory update (features, labels, admins).
pub fn directory_update(timeout: Duration) -> PollSpec {
    accounts_spec("directory.update", timeout)
        .with_pending([accounts::STARTED, accounts::UPDATING, accounts::PROCESSING])
        .with_target([accounts::OK])
}

/// Wait for a directory to disappear.
pub fn directory_delete(timeout: Duration) -> PollSpec {
    accounts_spec("directory.delete", timeout)
        .with_pending([accounts::STARTED, accounts::DELETING, accounts::OK])
        .with_target([DELETED])
}

/// Wait for an entitlement assignment or amount change.
pub fn entitlement_update(timeout: Duration) -> PollSpec {
    entitlements_spec("entitlement.update", timeout)
        .with_pending([entitlements::STARTED, entitlements::PROCESSING])
        .with_target([entitlements::OK])
}

/// Wait for an entitlement to be removed.
pub fn entitlement_delete(timeout: Duration) -> PollSpec {
    entitlements_spec("entitlement.delete", timeout)
        .with_pending([
            entitlements::STARTED,
            entitlements::PROCESSING,
            entitlements::OK,
        ])
        .with_target([DELETED])
}

fn entitlements_spec(name: &str, timeout: Duration) -> PollSpec {
    PollSpec::new(name)
        .with_timeout(timeout)
        .with_delay(DEFAULT_DELAY)
        .with_min_interval(DEFAULT_MIN_INTERVAL)
        .with_failure([entitlements::PROCESSING_FAILED])
        .with_retriable(RetryPolicy::transient())
}

fn subscriptions_spec(name: &str, timeout: Duration) -> PollSpec {
    PollSpec::new(name)
        .with_timeout(timeout)
        .with_delay(DEFAULT_DELAY)
        .with_min_interval(DEFAULT_MIN_INTERVAL)
        .with_pending([subscriptions::IN_PROCESS])
        .with_retriable(RetryPolicy::transient())
}

/// Wait for an application subscription.
pub fn subscription_create(timeout: Duration) -> PollSpec {
    subscriptions_spec("subscription.create", timeout)
        .with_target([subscriptions::SUBSCRIBED])
        .with_failure([subscriptions::SUBSCRIBE_FAILED])
}

/// Wait for subscription parameters or plan to change.
pub fn subscription_update(timeout: Duration) -> PollSpec {
    subscriptions_spec("subscription.update", timeout)
        .with_target([subscriptions::SUBSCRIBED])
        .with_failure([
            subscriptions::UPDATE_FAILED,
            subscriptions::UPDATE_PARAMETERS_FAILED,
        ])
}

/// Wait for an application to be unsubscribed.
///
/// The app stays listed with `NOT_SUBSCRIBED` rather than disappearing.
pub fn subscription_delete(timeout: Duration) -> PollSpec {
    subscriptions_spec("subscription.delete", timeout)
        .with_pending([subscriptions::IN_PROCESS, subscriptions::SUBSCRIBED])
        .with_target([subscriptions::NOT_SUBSCRIBED])
        .with_failure([subscriptions::UNSUBSCRIBE_FAILED])
}

fn service_manager_spec(name: String, timeout: Duration) -> PollSpec {
    PollSpec::new(name)
        .with_timeout(timeout)
        .with_delay(SERVICE_MANAGER_INTERVAL)
        .with_min_interval(SERVICE_MANAGER_INTERVAL)
        .with_backoff(BackoffConfig::default().with_max_interval(Duration::from_secs(30)))
        .with_failure([service_manager::FAILED])
        .with_retriable(RetryPolicy::transient())
}

fn service_manager_name(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::ServiceBinding => "service_binding",
        _ => "service_instance",
    }
}

/// Wait for the last operation of a service instance or binding to succeed.
pub fn service_manager_upsert(
    kind: ResourceKind,
    operation: Operation,
    timeout: Duration,
) -> PollSpec {
    let name = format!("{}.{}", service_manager_name(kind), operation);
    service_manager_spec(name, timeout)
        .with_pending([service_manager::IN_PROGRESS])
        .with_target([service_manager::SUCCEEDED])
}

/// Wait for a service instance or binding to disappear.
///
/// While the deletion runs the entity reports its last operation as
/// `in progress`; a completed create/update reports `succeeded`.
pub fn service_manager_delete(kind: ResourceKind, timeout: Duration) -> PollSpec {
    let name = format!("{}.delete", service_manager_name(kind));
    service_manager_spec(name, timeout)
        .with_pending([service_manager::IN_PROGRESS, service_manager::SUCCEEDED])
        .with_target([DELETED])
}

fn provisioning_spec(name: &str, timeout: Duration) -> PollSpec {
    PollSpec::new(name)
        .with_timeout(timeout)
        .with_delay(DEFAULT_DELAY)
        .with_min_interval(DEFAULT_MIN_INTERVAL)
        .with_failure([
            provisioning::CREATION_FAILED,
            provisioning::UPDATE_FAILED,
            provisioning::DELETION_FAILED,
        ])
        .with_retriable(RetryPolicy::transient())
}

/// Wait for a new environment instance (e.g. Cloud Foundry, Kyma).
pub fn environment_instance_create(timeout: Duration) -> PollSpec {
    provisioning_spec("environment_instance.create", timeout)
        .with_pending([provisioning::CREATING])
        .with_target([provisioning::OK])
        .with_retriable(RetryPolicy::transient().or(RetryPolicy::not_found()))
}

/// Wait for an environment instance update.
pub fn environment_instance_update(timeout: Duration) -> PollSpec {
    provisioning_spec("environment_instance.update", timeout)
        .with_pending([provisioning::UPDATING])
        .with_target([provisioning::OK])
}

/// Wait for an environment instance to disappear.
pub fn environment_instance_delete(timeout: Duration) -> PollSpec {
    provisioning_spec("environment_instance.delete", timeout)
        .with_pending([provisioning::DELETING, provisioning::OK])
        .with_target([DELETED])
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(600);

    #[test]
    fn test_every_spec_is_valid() {
        for kind in ResourceKind::ALL {
            for operation in [Operation::Create, Operation::Update, Operation::Delete] {
                let spec = spec_for(kind, operation, TIMEOUT)
                    .unwrap_or_else(|| panic!("no spec for {} {}", kind, operation));
                assert!(
                    spec.validate().is_ok(),
                    "{} {}: {:?}",
                    kind,
                    operation,
                    spec.validate()
                );
                assert_eq!(spec.timeout, TIMEOUT);
            }
        }
    }

    #[test]
    fn test_reads_do_not_wait() {
        for kind in ResourceKind::ALL {
            assert!(spec_for(kind, Operation::Read, TIMEOUT).is_none());
        }
    }

    #[test]
    fn test_subaccount_create() {
        let spec = subaccount_create(TIMEOUT);
        assert!(spec.pending.contains("CREATING"));
        assert!(spec.target.contains("OK"));
        assert!(spec.failure.contains("CREATION_FAILED"));
        assert_eq!(spec.delay, DEFAULT_DELAY);
        assert_eq!(spec.min_interval, DEFAULT_MIN_INTERVAL);
        assert!(spec
            .retriable
            .is_retriable(&crate::ClientError::NotFound("new".to_string())));
    }

    #[test]
    fn test_deletes_target_deleted_except_subscriptions() {
        for kind in ResourceKind::ALL {
            let spec = spec_for(kind, Operation::Delete, TIMEOUT).unwrap();
            if kind == ResourceKind::Subscription {
                assert!(spec.target.contains("NOT_SUBSCRIBED"));
            } else {
                assert!(spec.target.contains(DELETED), "{}", kind);
            }
        }
    }

    #[test]
    fn test_entitlement_spec() {
        let spec = spec_for(ResourceKind::Entitlement, Operation::Update, TIMEOUT).unwrap();
        assert_eq!(spec.name, "entitlement.update");
        assert!(spec.pending.contains("STARTED"));
        assert!(spec.pending.contains("PROCESSING"));
        assert!(spec.failure.contains("PROCESSING_FAILED"));
        assert!(spec
            .retriable
            .is_retriable(&crate::ClientError::from_status(429, "too many requests")));

        let delete = entitlement_delete(TIMEOUT);
        assert_eq!(delete.name, "entitlement.delete");
    }

    #[test]
    fn test_service_manager_names() {
        let spec = spec_for(ResourceKind::ServiceBinding, Operation::Create, TIMEOUT).unwrap();
        assert_eq!(spec.name, "service_binding.create");
        assert!(spec.pending.contains("in progress"));
        assert!(spec.target.contains("succeeded"));
        assert!(spec.failure.contains("failed"));

        let spec = spec_for(ResourceKind::ServiceInstance, Operation::Delete, TIMEOUT).unwrap();
        assert_eq!(spec.name, "service_instance.delete");
    }

    #[test]
    fn test_type_names() {
        for kind in ResourceKind::ALL {
            assert_eq!(ResourceKind::from_type_name(kind.type_name()), Some(kind));
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, serde_json::json!(kind.type_name()));
        }
        assert_eq!(
            ResourceKind::from_type_name("btp_directory_entitlement"),
            Some(ResourceKind::Entitlement)
        );
        assert_eq!(ResourceKind::from_type_name("btp_role"), None);
    }
}
