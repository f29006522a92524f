//! Error types for BTP state reconciliation.

use std::time::Duration;

use thiserror::Error;

use crate::state::StateSet;

/// Errors raised by the status-query client that a probe calls into.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The requested entity was not found (HTTP 404).
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// The platform throttled the request (HTTP 429).
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// The entity is locked by another operation in progress.
    #[error("Resource locked: {0}")]
    Locked(String),

    /// Service temporarily unavailable (HTTP 502/503/504).
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Permission denied (authentication/authorization failure).
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The platform rejected the request as malformed (HTTP 400).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Any other unsuccessful response.
    #[error("Request failed with status {status}: {message}")]
    Request {
        /// HTTP status code of the response.
        status: u16,
        /// Error message returned by the platform.
        message: String,
    },

    /// The response body could not be decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ClientError {
    /// Map an unsuccessful HTTP response to an error.
    ///
    /// A 409 whose message reports the entity as locked or busy is classified
    /// as [`ClientError::Locked`]; the accounts service answers that way while
    /// a previous operation on the same entity is still running.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            400 => Self::InvalidRequest(message),
            401 | 403 => Self::PermissionDenied(message),
            404 => Self::NotFound(message),
            409 if mentions_lock(&message) => Self::Locked(message),
            423 => Self::Locked(message),
            429 => Self::RateLimited(message),
            502..=504 => Self::Unavailable(message),
            _ => Self::Request { status, message },
        }
    }

    /// The HTTP status code this error corresponds to, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::NotFound(_) => Some(404),
            Self::RateLimited(_) => Some(429),
            Self::Locked(_) => Some(423),
            Self::Unavailable(_) => Some(503),
            Self::PermissionDenied(_) => Some(403),
            Self::InvalidRequest(_) => Some(400),
            Self::Request { status, .. } => Some(*status),
            Self::Serialization(_) => None,
        }
    }

    /// Get the error message as a string.
    pub fn message(&self) -> &str {
        match self {
            Self::NotFound(msg) => msg,
            Self::RateLimited(msg) => msg,
            Self::Locked(msg) => msg,
            Self::Unavailable(msg) => msg,
            Self::PermissionDenied(msg) => msg,
            Self::InvalidRequest(msg) => msg,
            Self::Request { message, .. } => message,
            Self::Serialization(_err) => "serialization error (see Debug output)",
        }
    }

    /// Whether the platform signalled a condition that clears by itself.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited(_) | Self::Locked(_) | Self::Unavailable(_)
        )
    }

    /// Whether the entity does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

fn mentions_lock(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("locked") || lower.contains("busy")
}

/// Every way a wait for a target state can end without success.
#[derive(Debug, Error)]
pub enum WaitError {
    /// No terminal state was reached within the configured timeout.
    #[error(
        "timeout while waiting for state to become '{target}' (last state: '{}', timeout: {timeout:?}){}",
        .last_state.as_deref().unwrap_or(""),
        .last_error.as_ref().map(|e| format!(": last error: {}", e)).unwrap_or_default()
    )]
    Timeout {
        /// The states that were being waited for.
        target: StateSet,
        /// The last state observed before giving up.
        last_state: Option<String>,
        /// The last retriable error absorbed before giving up.
        last_error: Option<String>,
        /// The configured timeout.
        timeout: Duration,
    },

    /// The platform reported an explicit failure state.
    #[error(
        "operation reached failure state '{state}'{}",
        .message.as_ref().map(|m| format!(": {}", m)).unwrap_or_default()
    )]
    Failed {
        /// The failure state label.
        state: String,
        /// The platform's explanation, if it gave one.
        message: Option<String>,
    },

    /// The platform reported a state outside the known vocabulary.
    #[error("unexpected state '{state}', wanted target '{expected}'")]
    UnexpectedState {
        /// The unrecognised label.
        state: String,
        /// The states that were being waited for.
        expected: StateSet,
    },

    /// The entity stayed absent for more consecutive checks than allowed.
    #[error("couldn't find resource ({checks} retries)")]
    NotFound {
        /// Number of consecutive absent observations.
        checks: u32,
    },

    /// The probe failed with an error that is not retriable.
    #[error(transparent)]
    Probe(#[from] ClientError),

    /// The wait was cancelled by the caller.
    #[error(
        "wait cancelled (last state: '{}')",
        .last_state.as_deref().unwrap_or("")
    )]
    Cancelled {
        /// The last state observed before cancellation.
        last_state: Option<String>,
    },

    /// The poll configuration violates an invariant.
    #[error("invalid poll configuration: {0}")]
    InvalidSpec(String),
}

impl WaitError {
    /// Whether the wait ran out of time.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Whether the wait was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// The last state label observed, when the error carries one.
    pub fn last_state(&self) -> Option<&str> {
        match self {
            Self::Timeout { last_state, .. } | Self::Cancelled { last_state } => {
                last_state.as_deref()
            }
            Self::Failed { state, .. } | Self::UnexpectedState { state, .. } => Some(state),
            Self::NotFound { .. } | Self::Probe(_) | Self::InvalidSpec(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_display() {
        let err = ClientError::NotFound("subaccount 1234".to_string());
        assert_eq!(format!("{}", err), "Resource not found: subaccount 1234");

        let err = ClientError::Request {
            status: 500,
            message: "internal".to_string(),
        };
        assert_eq!(format!("{}", err), "Request failed with status 500: internal");
    }

    #[test]
    fn test_from_status() {
        assert!(matches!(
            ClientError::from_status(404, "gone"),
            ClientError::NotFound(_)
        ));
        assert!(matches!(
            ClientError::from_status(429, "slow down"),
            ClientError::RateLimited(_)
        ));
        assert!(matches!(
            ClientError::from_status(423, "locked"),
            ClientError::Locked(_)
        ));
        assert!(matches!(
            ClientError::from_status(409, "Subaccount is locked by another operation"),
            ClientError::Locked(_)
        ));
        assert!(matches!(
            ClientError::from_status(409, "already exists"),
            ClientError::Request { status: 409, .. }
        ));
        assert!(matches!(
            ClientError::from_status(503, "maintenance"),
            ClientError::Unavailable(_)
        ));
        assert!(matches!(
            ClientError::from_status(403, "no"),
            ClientError::PermissionDenied(_)
        ));
    }

    #[test]
    fn test_is_transient() {
        assert!(ClientError::RateLimited("x".to_string()).is_transient());
        assert!(ClientError::Locked("x".to_string()).is_transient());
        assert!(ClientError::Unavailable("x".to_string()).is_transient());
        assert!(!ClientError::NotFound("x".to_string()).is_transient());
        assert!(!ClientError::InvalidRequest("x".to_string()).is_transient());
    }

    #[test]
    fn test_status_code_and_message() {
        let err = ClientError::from_status(418, "teapot");
        assert_eq!(err.status_code(), Some(418));
        assert_eq!(err.message(), "teapot");

        let err = ClientError::from_status(429, "slow down");
        assert_eq!(err.status_code(), Some(429));
        assert_eq!(err.message(), "slow down");
    }

    #[test]
    fn test_timeout_display_names_last_state() {
        let err = WaitError::Timeout {
            target: StateSet::from(["OK"]),
            last_state: Some("PROCESSING".to_string()),
            last_error: None,
            timeout: Duration::from_millis(200),
        };
        assert_eq!(
            err.to_string(),
            "timeout while waiting for state to become 'OK' (last state: 'PROCESSING', timeout: 200ms)"
        );
        assert!(err.is_timeout());
        assert_eq!(err.last_state(), Some("PROCESSING"));
    }

    #[test]
    fn test_timeout_display_includes_last_error() {
        let err = WaitError::Timeout {
            target: StateSet::from(["OK"]),
            last_state: None,
            last_error: Some("Rate limited: too many requests".to_string()),
            timeout: Duration::from_secs(1),
        };
        assert!(err
            .to_string()
            .ends_with(": last error: Rate limited: too many requests"));
    }

    #[test]
    fn test_failed_display() {
        let err = WaitError::Failed {
            state: "CREATION_FAILED".to_string(),
            message: Some("quota exceeded".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "operation reached failure state 'CREATION_FAILED': quota exceeded"
        );

        let err = WaitError::Failed {
            state: "PROCESSING_FAILED".to_string(),
            message: None,
        };
        assert_eq!(
            err.to_string(),
            "operation reached failure state 'PROCESSING_FAILED'"
        );
    }

    #[test]
    fn test_probe_error_is_transparent() {
        let err: WaitError = ClientError::PermissionDenied("token expired".to_string()).into();
        assert_eq!(err.to_string(), "Permission denied: token expired");
        assert_eq!(err.last_state(), None);
    }
}
