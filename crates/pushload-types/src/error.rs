//! Structured error model for push-dataset operations.
//!
//! [`PushError`] carries a classification, a stable code, and optional
//! diagnostic details. Construct via category-specific factory methods.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Broad classification of a push error.
///
/// Determines retry behavior and operator-facing categorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Invalid job configuration or dataset identity.
    Config,
    /// Authentication failure or unusable credentials.
    Auth,
    /// Insufficient privileges on the workspace or dataset.
    Permission,
    /// The destination rejected a request for exceeding its quota.
    RateLimit,
    /// Read timeout or connection failure (retryable).
    TransientNetwork,
    /// Invalid or unreadable row data.
    Data,
    /// Local table definitions disagree with the remote dataset.
    Schema,
    /// The destination rejected a request.
    Remote,
    /// A bounded wait ran out.
    Timeout,
    /// Internal error.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Config => "config",
            Self::Auth => "auth",
            Self::Permission => "permission",
            Self::RateLimit => "rate_limit",
            Self::TransientNetwork => "transient_network",
            Self::Data => "data",
            Self::Schema => "schema",
            Self::Remote => "remote",
            Self::Timeout => "timeout",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// Structured error from a push-dataset operation.
///
/// Only [`ErrorCategory::TransientNetwork`] errors are retryable, and only by
/// the HTTP transport. Every other error is terminal for the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("[{category}] {code}: {message}")]
pub struct PushError {
    pub category: ErrorCategory,
    pub code: String,
    pub message: String,
    pub retryable: bool,
    /// HTTP status returned by the destination, when there was one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl PushError {
    fn new(
        category: ErrorCategory,
        retryable: bool,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            code: code.into(),
            message: message.into(),
            retryable,
            status: None,
            details: None,
        }
    }

    /// Configuration error (not retryable).
    #[must_use]
    pub fn config(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Config, false, code, message)
    }

    /// Authentication error (not retryable).
    #[must_use]
    pub fn auth(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Auth, false, code, message)
    }

    /// Permission error (not retryable).
    #[must_use]
    pub fn permission(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Permission, false, code, message)
    }

    /// Quota rejection from the destination.
    ///
    /// Not retryable: proactive rate limiting is expected to keep this path
    /// unreachable, so hitting it means the quota settings are wrong.
    #[must_use]
    pub fn rate_limit(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::RateLimit, false, code, message)
    }

    /// Transient network error (retryable by the transport).
    #[must_use]
    pub fn transient_network(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::TransientNetwork, true, code, message)
    }

    /// Row data error (not retryable).
    #[must_use]
    pub fn data(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Data, false, code, message)
    }

    /// Schema mismatch error (not retryable).
    #[must_use]
    pub fn schema(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Schema, false, code, message)
    }

    /// Destination rejected the request (not retryable).
    #[must_use]
    pub fn remote(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Remote, false, code, message)
    }

    /// A bounded wait was exhausted (not retryable).
    #[must_use]
    pub fn timeout(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Timeout, false, code, message)
    }

    /// Internal error (not retryable).
    #[must_use]
    pub fn internal(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Internal, false, code, message)
    }

    /// Record the HTTP status that produced this error.
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Attach structured diagnostic details.
    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}
