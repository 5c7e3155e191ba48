//! Maps every failure of a `run` call onto the public error taxonomy.

use std::sync::{Arc, LazyLock};

use query_gateway_sdk::{EngineError, ErrorEnvelope, ExceptionSink};
use regex::Regex;

use super::error::DomainError;

/// Appended to missing-column errors: some column types are not queryable yet.
pub const BETA_COLUMN_NOTE: &str = ". Note: While in beta, not all column types may be fully supported";

#[allow(clippy::expect_used)]
static MISSING_COLUMN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:There's no column|no such column).*in table")
        .expect("missing column pattern is valid")
});

pub struct ErrorClassifier {
    sink: Arc<dyn ExceptionSink>,
}

impl ErrorClassifier {
    #[must_use]
    pub fn new(sink: Arc<dyn ExceptionSink>) -> Self {
        Self { sink }
    }

    /// Classifies `err`. Failures outside the known families are reported to the
    /// exception sink, except missing-column errors, which are a known limitation.
    #[must_use]
    pub fn classify(&self, err: DomainError) -> ErrorEnvelope {
        match err {
            DomainError::Validation { message, code } => ErrorEnvelope::validation(message, code),
            DomainError::Throttled(message) => ErrorEnvelope::throttling(message),
            DomainError::Engine(engine) => self.classify_engine(engine),
            other @ (DomainError::Subscription(_) | DomainError::ResultNormalization(_)) => {
                self.unhandled(&other)
            }
        }
    }

    fn classify_engine(&self, err: EngineError) -> ErrorEnvelope {
        match err {
            EngineError::Exposed { message, code } | EngineError::Database { message, code } => {
                ErrorEnvelope::validation(message, code)
            }
            EngineError::ScriptRuntime { message } | EngineError::Resolution { message } => {
                ErrorEnvelope::validation(message, None)
            }
            EngineError::ConcurrencyExceeded(exceeded) => ErrorEnvelope::throttling(exceeded.message),
            other @ EngineError::Internal { .. } => self.unhandled(&other),
        }
    }

    fn unhandled(&self, err: &(dyn std::error::Error + Send + Sync)) -> ErrorEnvelope {
        let message = err.to_string();

        if let Some(found) = MISSING_COLUMN.find(&message) {
            tracing::info!(error = %message, "Query referenced an unsupported column");
            return ErrorEnvelope::validation(format!("{}{BETA_COLUMN_NOTE}", found.as_str()), None);
        }

        self.sink.report(err);
        ErrorEnvelope::unhandled(message)
    }
}
