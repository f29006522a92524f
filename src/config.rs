//! Operation timeouts from a resource's `timeouts` block.
//!
//! Terraform users override how long the provider waits per operation:
//!
//! ```hcl
//! resource "btp_subaccount" "example" {
//!   timeouts = {
//!     create = "25m"
//!     delete = "1h"
//!   }
//! }
//! ```
//!
//! The block arrives as JSON with Go duration strings. Missing entries fall
//! back to [`OperationTimeouts::default`].
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use btp_reconcile::config::{Operation, OperationTimeouts};
//! use serde_json::json;
//!
//! let timeouts = OperationTimeouts::from_value(&json!({"create": "1h30m"})).unwrap();
//! assert_eq!(timeouts.for_operation(Operation::Create), Duration::from_secs(5400));
//! assert_eq!(timeouts.for_operation(Operation::Delete), Duration::from_secs(600));
//! ```

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Errors in a `timeouts` block.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A duration string could not be parsed.
    #[error("invalid duration '{value}': {reason}")]
    InvalidDuration {
        /// The offending input.
        value: String,
        /// What is wrong with it.
        reason: String,
    },

    /// The block did not have the expected shape.
    #[error("invalid timeouts block: {source}")]
    Malformed {
        /// Path of the offending entry (e.g. `timeouts.create`), when known.
        attribute: Option<String>,
        /// The decoding error.
        #[source]
        source: serde_json::Error,
    },
}

impl ConfigError {
    /// Path of the attribute the error is about, if it names one.
    pub fn attribute(&self) -> Option<&str> {
        match self {
            Self::Malformed { attribute, .. } => attribute.as_deref(),
            Self::InvalidDuration { .. } => None,
        }
    }
}

/// The resource operation a wait belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Resource creation.
    Create,
    /// Resource refresh.
    Read,
    /// In-place update.
    Update,
    /// Resource deletion.
    Delete,
}

impl Operation {
    /// All operations, in `timeouts` block order.
    pub const ALL: [Operation; 4] = [Self::Create, Self::Read, Self::Update, Self::Delete];

    /// The operation's key in a `timeouts` block.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How long each operation may wait for the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperationTimeouts {
    /// Timeout for create.
    #[serde(with = "go_duration")]
    pub create: Duration,
    /// Timeout for read.
    #[serde(with = "go_duration")]
    pub read: Duration,
    /// Timeout for update.
    #[serde(with = "go_duration")]
    pub update: Duration,
    /// Timeout for delete.
    #[serde(with = "go_duration")]
    pub delete: Duration,
}

impl Default for OperationTimeouts {
    fn default() -> Self {
        Self {
            create: Duration::from_secs(10 * 60),
            read: Duration::from_secs(5 * 60),
            update: Duration::from_secs(10 * 60),
            delete: Duration::from_secs(10 * 60),
        }
    }
}

impl OperationTimeouts {
    /// Parse a `timeouts` block.
    ///
    /// `null` yields the defaults, as do `null` entries, which is how
    /// Terraform sends attributes the user left unset.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, ConfigError> {
        if value.is_null() {
            return Ok(Self::default());
        }
        let mut block = value.clone();
        if let Some(entries) = block.as_object_mut() {
            entries.retain(|_, entry| !entry.is_null());
        }
        serde_json::from_value(block).map_err(|source| ConfigError::Malformed {
            attribute: offending_attribute(value),
            source,
        })
    }

    /// The timeout for an operation.
    pub fn for_operation(&self, operation: Operation) -> Duration {
        match operation {
            Operation::Create => self.create,
            Operation::Read => self.read,
            Operation::Update => self.update,
            Operation::Delete => self.delete,
        }
    }
}

fn offending_attribute(value: &serde_json::Value) -> Option<String> {
    let entries = value.as_object()?;
    Operation::ALL
        .iter()
        .find(|operation| match entries.get(operation.as_str()) {
            None | Some(serde_json::Value::Null) => false,
            Some(entry) => !matches!(entry.as_str().map(parse_duration), Some(Ok(_))),
        })
        .map(|operation| format!("timeouts.{}", operation))
}

/// Parse a Go duration string such as `"300ms"`, `"45s"` or `"1h30m"`.
///
/// Supported units are `ns`, `us`/`µs`, `ms`, `s`, `m` and `h`; fractional
/// values (`"1.5h"`) are accepted. Negative durations are rejected.
pub fn parse_duration(input: &str) -> Result<Duration, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidDuration {
        value: input.to_string(),
        reason: reason.to_string(),
    };

    let s = input.trim();
    if s.is_empty() {
        return Err(invalid("empty string"));
    }
    if s == "0" {
        return Ok(Duration::ZERO);
    }
    if s.starts_with('-') {
        return Err(invalid("negative durations are not allowed"));
    }
    let s = s.strip_prefix('+').unwrap_or(s);

    let mut total_nanos = 0f64;
    let mut rest = s;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_len == 0 {
            return Err(invalid("expected a number"));
        }
        let number: f64 = rest[..number_len]
            .parse()
            .map_err(|_| invalid("malformed number"))?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let nanos_per_unit = match &rest[..unit_len] {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60.0 * 1e9,
            "h" => 3600.0 * 1e9,
            "" => return Err(invalid("missing unit")),
            _ => return Err(invalid("unknown unit")),
        };
        rest = &rest[unit_len..];

        total_nanos += number * nanos_per_unit;
    }

    if total_nanos > u64::MAX as f64 {
        return Err(invalid("duration out of range"));
    }
    Ok(Duration::from_nanos(total_nanos.round() as u64))
}

/// Format a duration the way Go prints it (`"1h30m0s"`, `"250ms"`).
pub fn format_duration(duration: Duration) -> String {
    if duration.is_zero() {
        return "0s".to_string();
    }
    if duration < Duration::from_secs(1) {
        let nanos = duration.as_nanos();
        return if nanos % 1_000_000 == 0 {
            format!("{}ms", nanos / 1_000_000)
        } else if nanos % 1_000 == 0 {
            format!("{}µs", nanos / 1_000)
        } else {
            format!("{}ns", nanos)
        };
    }

    let total = duration.as_secs();
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{}h", hours));
    }
    if hours > 0 || minutes > 0 {
        out.push_str(&format!("{}m", minutes));
    }
    let nanos = duration.subsec_nanos();
    if nanos > 0 {
        let fraction = format!("{:09}", nanos);
        out.push_str(&format!("{}.{}s", seconds, fraction.trim_end_matches('0')));
    } else {
        out.push_str(&format!("{}s", seconds));
    }
    out
}

mod go_duration {
    use super::*;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_duration(*duration))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let value = String::deserialize(deserializer)?;
        parse_duration(&value).map_err(serde::de::Error::custom)
    }
}
