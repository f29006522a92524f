//! Classification of probe errors that should not end a wait.
//!
//! Some BTP services answer status queries with transient errors while a
//! mutation is being applied: HTTP 429 under load, or a "locked" response while
//! another operation holds the entity. A [`RetryPolicy`] decides which of those
//! errors count as "still pending" for a given operation.
//!
//! # Example
//!
//! ```
//! use btp_reconcile::retriable::RetryPolicy;
//! use btp_reconcile::ClientError;
//!
//! let policy = RetryPolicy::transient().or(RetryPolicy::not_found());
//!
//! assert!(policy.is_retriable(&ClientError::RateLimited("slow down".into())));
//! assert!(policy.is_retriable(&ClientError::NotFound("not yet visible".into())));
//! assert!(!policy.is_retriable(&ClientError::PermissionDenied("no".into())));
//! ```

use std::fmt;
use std::sync::Arc;

use crate::error::ClientError;

type Predicate = dyn Fn(&ClientError) -> bool + Send + Sync;

/// A predicate deciding whether a probe error is retriable.
#[derive(Clone)]
pub struct RetryPolicy {
    predicate: Arc<Predicate>,
    label: String,
}

impl RetryPolicy {
    /// Build a policy from an arbitrary predicate.
    pub fn from_fn<F>(label: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&ClientError) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Arc::new(predicate),
            label: label.into(),
        }
    }

    /// Treat every error as fatal.
    pub fn never() -> Self {
        Self::from_fn("never", |_| false)
    }

    /// Retry rate limiting, locked entities and unavailable services.
    pub fn transient() -> Self {
        Self::from_fn("transient", ClientError::is_transient)
    }

    /// Retry 404s.
    ///
    /// Right after a create, the read API may not yet know the new entity.
    pub fn not_found() -> Self {
        Self::from_fn("not_found", ClientError::is_not_found)
    }

    /// Retry errors whose message contains `fragment` (case-insensitive).
    pub fn message_contains(fragment: impl Into<String>) -> Self {
        let fragment = fragment.into().to_ascii_lowercase();
        let label = format!("message_contains({})", fragment);
        Self::from_fn(label, move |err| {
            err.message().to_ascii_lowercase().contains(&fragment)
        })
    }

    /// Retry when either policy retries.
    pub fn or(self, other: RetryPolicy) -> Self {
        let label = format!("{} | {}", self.label, other.label);
        let (left, right) = (self.predicate, other.predicate);
        Self {
            predicate: Arc::new(move |err: &ClientError| left(err) || right(err)),
            label,
        }
    }

    /// Check whether an error is retriable under this policy.
    pub fn is_retriable(&self, err: &ClientError) -> bool {
        (self.predicate)(err)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::never()
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RetryPolicy").field(&self.label).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_never_retries_nothing() {
        let policy = RetryPolicy::default();
        assert!(!policy.is_retriable(&ClientError::RateLimited("x".to_string())));
        assert!(!policy.is_retriable(&ClientError::NotFound("x".to_string())));
    }

    #[test]
    fn test_transient() {
        let policy = RetryPolicy::transient();
        assert!(policy.is_retriable(&ClientError::from_status(429, "too many requests")));
        assert!(policy.is_retriable(&ClientError::from_status(
            409,
            "Entity is locked by a running operation"
        )));
        assert!(!policy.is_retriable(&ClientError::from_status(404, "not found")));
        assert!(!policy.is_retriable(&ClientError::from_status(500, "boom")));
    }

    #[test]
    fn test_message_contains_is_case_insensitive() {
        let policy = RetryPolicy::message_contains("Another Operation");
        assert!(policy.is_retriable(&ClientError::from_status(
            400,
            "another operation is in progress for this service instance"
        )));
        assert!(!policy.is_retriable(&ClientError::from_status(400, "bad plan name")));
    }

    #[test]
    fn test_or_composition() {
        let policy = RetryPolicy::transient().or(RetryPolicy::not_found());
        assert!(policy.is_retriable(&ClientError::Unavailable("x".to_string())));
        assert!(policy.is_retriable(&ClientError::NotFound("x".to_string())));
        assert!(!policy.is_retriable(&ClientError::InvalidRequest("x".to_string())));
        assert_eq!(
            format!("{:?}", policy),
            "RetryPolicy(\"transient | not_found\")"
        );
    }
}
