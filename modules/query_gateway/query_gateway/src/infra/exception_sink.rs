use query_gateway_sdk::ExceptionSink;

/// Reports unexpected failures as `error` level tracing events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingExceptionSink;

impl ExceptionSink for TracingExceptionSink {
    fn report(&self, error: &(dyn std::error::Error + Send + Sync)) {
        tracing::error!(error = %error, "Unhandled query failure");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use query_gateway_sdk::EngineError;
    use tracing_test::traced_test;

    #[test]
    #[traced_test]
    fn report_emits_error_event() {
        TracingExceptionSink.report(&EngineError::internal("socket closed"));
        assert!(logs_contain("Unhandled query failure"));
        assert!(logs_contain("socket closed"));
    }
}
