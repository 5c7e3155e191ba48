//! Domain service for the query gateway.

use std::sync::Arc;

use query_gateway_sdk::{
    CallerContext, ErrorEnvelope, ExecutionModeResolver, QueryRequest, Tenant,
};

use super::admission::AdmissionGate;
use super::classifier::ErrorClassifier;
use super::dispatcher::QueryDispatcher;
use super::error::DomainError;
use super::execution_mode;
use super::query_tags::{self, QueryTags};
use super::response::{self, QueryOutcome};
use super::validator;

/// Query gateway service.
///
/// One call to [`Service::run`] handles one request from validation to the
/// shaped response or classified error.
pub struct Service {
    mode_resolver: Arc<dyn ExecutionModeResolver>,
    gate: AdmissionGate,
    dispatcher: QueryDispatcher,
    classifier: ErrorClassifier,
}

impl Service {
    #[must_use]
    pub fn new(
        mode_resolver: Arc<dyn ExecutionModeResolver>,
        gate: AdmissionGate,
        dispatcher: QueryDispatcher,
        classifier: ErrorClassifier,
    ) -> Self {
        Self {
            mode_resolver,
            gate,
            dispatcher,
            classifier,
        }
    }

    #[must_use]
    pub fn gate(&self) -> &AdmissionGate {
        &self.gate
    }

    /// Runs `request` for `tenant` on behalf of `caller`.
    ///
    /// # Errors
    ///
    /// Returns the classified [`ErrorEnvelope`] for any failure.
    #[tracing::instrument(
        name = "query_gateway.run",
        skip_all,
        fields(
            tenant_id = %tenant.id,
            access_method = caller.access_method.as_str(),
            mode = tracing::field::Empty,
            client_query_id = tracing::field::Empty,
        )
    )]
    pub async fn run(
        &self,
        tenant: &Tenant,
        caller: CallerContext,
        request: QueryRequest,
    ) -> Result<QueryOutcome, ErrorEnvelope> {
        let tags = QueryTags::for_access_method(caller.access_method);

        query_tags::scope(tags, self.run_tagged(tenant, caller, request))
            .await
            .map_err(|e| self.classifier.classify(e))
    }

    async fn run_tagged(
        &self,
        tenant: &Tenant,
        caller: CallerContext,
        request: QueryRequest,
    ) -> Result<QueryOutcome, DomainError> {
        let query = validator::validate_query_variant(&request)?.clone();

        let resolved =
            self.mode_resolver
                .resolve(tenant, query, request.client_query_id, request.refresh);
        let mode = resolved.execution_mode;
        tracing::Span::current().record("mode", mode.as_str());
        execution_mode::ensure_sync(mode)?;

        let body = self
            .gate
            .admit(tenant, mode, async {
                query_tags::tag_client_query_id(resolved.client_query_id.as_deref());
                self.dispatcher.dispatch(tenant, resolved, caller).await
            })
            .await?;

        let outcome = response::shape(body);
        tracing::debug!(completion = ?outcome.completion, "Query finished");
        Ok(outcome)
    }
}
