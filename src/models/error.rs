//! Error types for argilla-remote.
//!
//! Epistemic taxonomy:
//! - B_i falsified: Expected failures (permission, validation, unknown names)
//! - I^B materialized: Infrastructure failures (network, timeout, bad status)
//! - K_i violated: Internal invariant violations (bugs)

use super::{ConfigError, UserRole};
use std::time::Duration;
use thiserror::Error;

/// Top-level error type for argilla-remote.
#[derive(Debug, Error)]
pub enum FeedbackError {
    // ═══════════════════════════════════════════════════════════════════
    // B_i FALSIFIED : Belief proven wrong (expected failures, no I/O done)
    // ═══════════════════════════════════════════════════════════════════

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(
        "Permission denied: `{operation}` requires the owner or admin role, current role is \
         `{role}`"
    )]
    PermissionDenied {
        operation: &'static str,
        role: UserRole,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(
        "The following metadata properties do not exist in the current dataset: {unknown:?}. \
         The existing metadata properties are: {existing:?}"
    )]
    UnknownMetadataNames {
        unknown: Vec<String>,
        existing: Vec<String>,
    },

    #[error("Parse error: {0}")]
    ParseError(String),

    // ═══════════════════════════════════════════════════════════════════
    // I^B MATERIALIZED : Remote call failed, wrapped with operation context
    // ═══════════════════════════════════════════════════════════════════

    #[error("{context}: {source}")]
    Remote {
        context: String,
        #[source]
        source: ApiError,
    },

    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // ═══════════════════════════════════════════════════════════════════
    // K_i VIOLATED : Invariant broken (bug, should not happen)
    // ═══════════════════════════════════════════════════════════════════

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Transport errors raised by a [`FeedbackApi`](crate::client::FeedbackApi)
/// implementation.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Request timeout after {0:?}")]
    Timeout(Duration),

    #[error("Authentication failed: invalid API key")]
    AuthenticationFailed,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("API error (status {status}): {detail}")]
    Status { status: u16, detail: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Request failed after {attempts} attempts: {last_error}")]
    MaxRetriesExceeded { attempts: u32, last_error: String },
}

impl ApiError {
    /// Check if this error is worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

impl FeedbackError {
    /// Wrap a transport failure with the operation that triggered it.
    pub fn remote(context: impl Into<String>, source: ApiError) -> Self {
        Self::Remote {
            context: context.into(),
            source,
        }
    }

    /// Create an IO error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// The transport error underneath, if this is a wrapped remote failure.
    pub fn api_source(&self) -> Option<&ApiError> {
        match self {
            Self::Remote { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Result type alias for argilla-remote.
pub type Result<T> = std::result::Result<T, FeedbackError>;
