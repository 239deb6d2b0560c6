//! Error types for the social data layer

use thiserror::Error;

/// Result type for SDK operations
pub type Result<T> = std::result::Result<T, ApiError>;

/// One failed item of a batch housekeeping call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    /// Counterpart alias the item referred to
    pub username: String,
    /// Why this item was not applied
    pub reason: String,
}

impl std::fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.username, self.reason)
    }
}

/// SDK error types
#[derive(Error, Debug)]
pub enum ApiError {
    /// Root record never materialized
    #[error("Not found: {0}")]
    NotFound(String),

    /// Deadline elapsed before the record settled
    #[error("Timed out resolving {path} after {attempts} attempt(s) ({waited_ms} ms)")]
    Timeout {
        path: String,
        attempts: u32,
        waited_ms: u64,
    },

    /// Invalid input (acting on self, bad segment, bad token)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Record already exists, or does not exist when required
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Store acknowledgement carried an error
    #[error("Store write failed at {path}: {message}")]
    StoreWrite { path: String, message: String },

    /// Some items of a batch failed
    #[error("{}", batch_summary(.succeeded, .failures))]
    PartialBatchFailure {
        succeeded: usize,
        failures: Vec<ItemFailure>,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

fn batch_summary(succeeded: &usize, failures: &[ItemFailure]) -> String {
    let items = failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ");
    format!(
        "{} of {} item(s) failed: {}",
        failures.len(),
        failures.len() + succeeded,
        items
    )
}

impl ApiError {
    /// Whether a brand-new call may succeed without changing inputs
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::Timeout { .. } | ApiError::StoreWrite { .. })
    }

    pub(crate) fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation(message.into())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Serialization(err.to_string())
    }
}

impl From<base64::DecodeError> for ApiError {
    fn from(err: base64::DecodeError) -> Self {
        ApiError::Validation(format!("malformed token: {}", err))
    }
}

impl From<toml::de::Error> for ApiError {
    fn from(err: toml::de::Error) -> Self {
        ApiError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for ApiError {
    fn from(err: toml::ser::Error) -> Self {
        ApiError::Config(err.to_string())
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        ApiError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_batch_message_lists_items() {
        let err = ApiError::PartialBatchFailure {
            succeeded: 1,
            failures: vec![ItemFailure {
                username: "bob".into(),
                reason: "friend request does not exist".into(),
            }],
        };
        let msg = err.to_string();
        assert!(msg.starts_with("1 of 2 item(s) failed"));
        assert!(msg.contains("bob: friend request does not exist"));
    }

    #[test]
    fn test_retryable() {
        assert!(ApiError::Timeout { path: "p".into(), attempts: 3, waited_ms: 10 }.is_retryable());
        assert!(!ApiError::NotFound("p".into()).is_retryable());
        assert!(!ApiError::conflict("x").is_retryable());
    }
}
