//! Error types for the query gateway module.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures a query engine reports back to the gateway.
///
/// Each variant corresponds to one failure family; the gateway classifies
/// them by matching on the variant rather than inspecting messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Query language error that is safe to show to the caller.
    #[error("{message}")]
    Exposed {
        message: String,
        /// Machine-readable error name, if the engine assigned one.
        code: Option<String>,
    },

    /// Warehouse error translated into a caller-facing message.
    #[error("{message}")]
    Database { message: String, code: Option<String> },

    /// Failure raised while running a compiled script.
    #[error("{message}")]
    ScriptRuntime { message: String },

    /// A field, table or function name could not be resolved.
    #[error("{message}")]
    Resolution { message: String },

    /// The engine's own concurrency budget was exhausted.
    #[error(transparent)]
    ConcurrencyExceeded(#[from] ConcurrencyExceeded),

    /// Anything the engine did not classify.
    #[error("{message}")]
    Internal { message: String },
}

impl EngineError {
    #[must_use]
    pub fn exposed(message: impl Into<String>, code: Option<String>) -> Self {
        Self::Exposed {
            message: message.into(),
            code,
        }
    }

    #[must_use]
    pub fn database(message: impl Into<String>, code: Option<String>) -> Self {
        Self::Database {
            message: message.into(),
            code,
        }
    }

    #[must_use]
    pub fn script_runtime(message: impl Into<String>) -> Self {
        Self::ScriptRuntime {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn resolution(message: impl Into<String>) -> Self {
        Self::Resolution {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Raised by a [`crate::ConcurrencyLimiter`] when no slot is free.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ConcurrencyExceeded {
    pub message: String,
}

impl ConcurrencyExceeded {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Failure of the feature subscription service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubscriptionError {
    #[error("subscription service unavailable: {0}")]
    Unavailable(String),

    #[error("organization not found: {0}")]
    OrganizationNotFound(uuid::Uuid),
}

/// Failure of the feature flag cache backend.
///
/// Callers treat these as cache misses.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("feature flag cache error: {0}")]
pub struct FeatureCacheError(pub String);

/// Category of a failed query run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Caller can fix the request.
    Validation,
    /// Retry after backing off.
    Throttling,
    /// Server-side failure.
    Unhandled,
}

/// Uniform description of a failed query run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ErrorEnvelope {
    #[must_use]
    pub fn validation(message: impl Into<String>, code: Option<String>) -> Self {
        Self {
            kind: ErrorKind::Validation,
            message: message.into(),
            code,
        }
    }

    #[must_use]
    pub fn throttling(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Throttling,
            message: message.into(),
            code: None,
        }
    }

    #[must_use]
    pub fn unhandled(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Unhandled,
            message: message.into(),
            code: None,
        }
    }
}

impl std::fmt::Display for ErrorEnvelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ErrorEnvelope {}
