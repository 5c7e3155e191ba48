//! Query kind validation.

use query_gateway_sdk::{HogQLQuery, QueryRequest, QueryVariant};

use super::error::DomainError;

/// The only query kind the `run` action executes.
pub const SUPPORTED_QUERY_KIND: &str = "HogQLQuery";

/// Returns the HogQL query carried by `request`, rejecting every other kind.
///
/// # Errors
///
/// Returns [`DomainError::Validation`] when the request carries another query kind.
pub fn validate_query_variant(request: &QueryRequest) -> Result<&HogQLQuery, DomainError> {
    match &request.query {
        QueryVariant::HogQLQuery(query) => Ok(query),
        other => {
            tracing::debug!(kind = other.kind(), "Rejecting unsupported query kind");
            Err(DomainError::validation(format!(
                "this endpoint only supports {SUPPORTED_QUERY_KIND}"
            )))
        }
    }
}
