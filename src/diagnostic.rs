//! User-facing diagnostics for failed waits.
//!
//! Terraform surfaces provider errors as diagnostics with a short summary and
//! a longer detail. [`Diagnostic::from_wait_error`] shapes a [`WaitError`] into
//! one so that every resource reports wait failures the same way.

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::error::WaitError;

/// Diagnostic severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticSeverity {
    /// An error that prevents the operation from completing.
    Error,
    /// A warning that doesn't prevent the operation but should be addressed.
    Warning,
}

/// A diagnostic message for the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// The severity of the diagnostic.
    pub severity: DiagnosticSeverity,
    /// A short summary of the issue.
    pub summary: String,
    /// A detailed description of the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// The attribute path where the issue occurred.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

impl Diagnostic {
    /// Create an error diagnostic.
    pub fn error(summary: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Error,
            summary: summary.into(),
            detail: None,
            attribute: None,
        }
    }

    /// Create a warning diagnostic.
    pub fn warning(summary: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Warning,
            summary: summary.into(),
            detail: None,
            attribute: None,
        }
    }

    /// Add detail to this diagnostic.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Set the attribute path for this diagnostic.
    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    /// Describe a failed wait for the resource operation `operation`
    /// (e.g. "Creating Subaccount").
    pub fn from_wait_error(operation: &str, err: &WaitError) -> Self {
        let summary = match err {
            WaitError::Timeout { .. } => format!("Timeout {}", lowercase_first(operation)),
            WaitError::Cancelled { .. } => format!("{} Cancelled", operation),
            WaitError::InvalidSpec(_) => format!("{} Misconfigured", operation),
            _ => format!("API Error {}", operation),
        };

        let mut detail = err.to_string();
        if err.is_timeout() {
            detail.push_str(
                "\n\nThe platform may still be processing the request. \
                 Run apply again once the operation has finished.",
            );
        }

        Self::error(summary).with_detail(detail)
    }

    /// Describe an unusable `timeouts` block, pointing at the offending entry.
    pub fn from_config_error(err: &ConfigError) -> Self {
        let diag = Self::error("Invalid Timeouts").with_detail(err.to_string());
        match err.attribute() {
            Some(attribute) => diag.with_attribute(attribute),
            None => diag.with_attribute("timeouts"),
        }
    }
}

fn lowercase_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OperationTimeouts;
    use crate::error::ClientError;
    use serde_json::json;
    use crate::state::StateSet;
    use std::time::Duration;

    #[test]
    fn test_diagnostic_builders() {
        let err = Diagnostic::error("Invalid configuration")
            .with_detail("timeout must be positive")
            .with_attribute("timeouts.create");
        assert_eq!(err.severity, DiagnosticSeverity::Error);
        assert_eq!(err.detail.as_deref(), Some("timeout must be positive"));
        assert_eq!(err.attribute.as_deref(), Some("timeouts.create"));

        let warn = Diagnostic::warning("Deprecated");
        assert_eq!(warn.severity, DiagnosticSeverity::Warning);
    }

    #[test]
    fn test_from_timeout() {
        let err = WaitError::Timeout {
            target: StateSet::from(["OK"]),
            last_state: Some("CREATING".to_string()),
            last_error: None,
            timeout: Duration::from_secs(600),
        };
        let diag = Diagnostic::from_wait_error("Creating Subaccount", &err);
        assert_eq!(diag.summary, "Timeout creating Subaccount");
        let detail = diag.detail.unwrap();
        assert!(detail.contains("last state: 'CREATING'"));
        assert!(detail.contains("Run apply again"));
    }

    #[test]
    fn test_from_failure() {
        let err = WaitError::Failed {
            state: "PROCESSING_FAILED".to_string(),
            message: Some("plan not entitled".to_string()),
        };
        let diag = Diagnostic::from_wait_error("Updating Entitlement", &err);
        assert_eq!(diag.summary, "API Error Updating Entitlement");
        assert_eq!(
            diag.detail.as_deref(),
            Some("operation reached failure state 'PROCESSING_FAILED': plan not entitled")
        );
    }

    #[test]
    fn test_from_probe_error() {
        let err = WaitError::Probe(ClientError::from_status(403, "forbidden"));
        let diag = Diagnostic::from_wait_error("Deleting Directory", &err);
        assert_eq!(diag.summary, "API Error Deleting Directory");
        assert_eq!(diag.detail.as_deref(), Some("Permission denied: forbidden"));
    }

    #[test]
    fn test_from_config_error_names_attribute() {
        let err = OperationTimeouts::from_value(&json!({"update": "later"})).unwrap_err();
        let diag = Diagnostic::from_config_error(&err);
        assert_eq!(diag.severity, DiagnosticSeverity::Error);
        assert_eq!(diag.summary, "Invalid Timeouts");
        assert_eq!(diag.attribute.as_deref(), Some("timeouts.update"));
        assert!(diag.detail.unwrap().contains("later"));

        let err = OperationTimeouts::from_value(&json!(true)).unwrap_err();
        let diag = Diagnostic::from_config_error(&err);
        assert_eq!(diag.attribute.as_deref(), Some("timeouts"));
    }

    #[test]
    fn test_serialization_skips_empty_fields() {
        let diag = Diagnostic::error("boom");
        let json = serde_json::to_value(&diag).unwrap();
        assert_eq!(json, serde_json::json!({"severity": "error", "summary": "boom"}));
    }
}
