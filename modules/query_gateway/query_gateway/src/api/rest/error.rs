use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::http::StatusCode;
use query_gateway_sdk::{ErrorEnvelope, ErrorKind, TenantId};

use super::problem::Problem;

pub const VALIDATION_ERROR_CODE: &str = "validation_error";
pub const THROTTLED_CODE: &str = "throttled";
pub const INTERNAL_ERROR_CODE: &str = "internal_error";
pub const TENANT_NOT_FOUND_CODE: &str = "tenant_not_found";
pub const INVALID_REQUEST_CODE: &str = "invalid_request";

fn current_trace_id() -> Option<String> {
    tracing::Span::current()
        .id()
        .map(|id| id.into_u64().to_string())
}

fn with_context(problem: Problem, instance: &str) -> Problem {
    let problem = problem.with_instance(instance);
    match current_trace_id() {
        Some(trace_id) => problem.with_trace_id(trace_id),
        None => problem,
    }
}

/// Map a classified failure to its Problem. The engine's code wins over the default.
pub fn envelope_to_problem(envelope: ErrorEnvelope, instance: &str) -> Problem {
    let (status, title, default_code) = match envelope.kind {
        ErrorKind::Validation => (StatusCode::BAD_REQUEST, "Bad Request", VALIDATION_ERROR_CODE),
        ErrorKind::Throttling => (
            StatusCode::TOO_MANY_REQUESTS,
            "Too Many Requests",
            THROTTLED_CODE,
        ),
        ErrorKind::Unhandled => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal Server Error",
            INTERNAL_ERROR_CODE,
        ),
    };
    let code = envelope.code.unwrap_or_else(|| default_code.to_owned());

    with_context(
        Problem::new(status, title, envelope.message).with_code(code),
        instance,
    )
}

pub fn tenant_not_found(tenant_id: TenantId, instance: &str) -> Problem {
    with_context(
        Problem::new(
            StatusCode::NOT_FOUND,
            "Not Found",
            format!("Tenant {tenant_id} not found"),
        )
        .with_code(TENANT_NOT_FOUND_CODE),
        instance,
    )
}

/// Request-rate rejection. `retry_after` is in whole seconds.
pub fn throttled(retry_after: u64, instance: &str) -> Problem {
    with_context(
        Problem::new(
            StatusCode::TOO_MANY_REQUESTS,
            "Too Many Requests",
            format!("Request was throttled. Expected available in {retry_after} seconds."),
        )
        .with_code(THROTTLED_CODE),
        instance,
    )
}

/// Body extraction failures keep axum's status (400 syntax, 415 content type, 422 shape).
pub fn json_rejection(rejection: &JsonRejection, instance: &str) -> Problem {
    let status = rejection.status();
    with_context(
        Problem::new(
            status,
            status.canonical_reason().unwrap_or("Bad Request"),
            rejection.body_text(),
        )
        .with_code(INVALID_REQUEST_CODE),
        instance,
    )
}

pub fn path_rejection(rejection: &PathRejection, instance: &str) -> Problem {
    let status = rejection.status();
    with_context(
        Problem::new(
            status,
            status.canonical_reason().unwrap_or("Bad Request"),
            rejection.body_text(),
        )
        .with_code(INVALID_REQUEST_CODE),
        instance,
    )
}
