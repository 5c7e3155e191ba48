//! Domain errors for the query gateway.

use query_gateway_sdk::{ConcurrencyExceeded, EngineError, SubscriptionError};
use thiserror::Error;

/// Failures raised between request validation and result shaping.
///
/// Converted into an [`query_gateway_sdk::ErrorEnvelope`] by the error classifier.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The request cannot be run as sent.
    #[error("{message}")]
    Validation {
        message: String,
        code: Option<String>,
    },

    /// Admission refused by the concurrency limiter.
    #[error("{0}")]
    Throttled(String),

    /// Failure reported by the query engine.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Entitlement lookup failed.
    #[error("Feature subscription lookup failed: {0}")]
    Subscription(#[from] SubscriptionError),

    /// A typed engine response could not be turned into a JSON object.
    #[error("Failed to normalize query result: {0}")]
    ResultNormalization(#[from] serde_json::Error),
}

impl DomainError {
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            code: None,
        }
    }
}

impl From<ConcurrencyExceeded> for DomainError {
    fn from(err: ConcurrencyExceeded) -> Self {
        Self::Throttled(err.message)
    }
}
