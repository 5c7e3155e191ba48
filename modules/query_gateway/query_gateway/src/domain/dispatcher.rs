//! Hands admitted queries to the query engine.

use std::sync::Arc;

use query_gateway_sdk::{
    AccessMethod, CallerContext, EngineRequest, QueryEngineClient, ResolvedQuery, Tenant,
};
use serde_json::{Map, Value};

use super::error::DomainError;
use super::query_tags;

pub struct QueryDispatcher {
    engine: Arc<dyn QueryEngineClient>,
}

impl QueryDispatcher {
    #[must_use]
    pub fn new(engine: Arc<dyn QueryEngineClient>) -> Self {
        Self { engine }
    }

    /// Executes `resolved` and returns the result as a JSON object.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::Engine`] for engine failures and
    /// [`DomainError::ResultNormalization`] if a typed result is not an object.
    pub async fn dispatch(
        &self,
        tenant: &Tenant,
        resolved: ResolvedQuery,
        caller: CallerContext,
    ) -> Result<Map<String, Value>, DomainError> {
        let is_query_service = query_tags::access_method() == Some(AccessMethod::PersonalApiKey);

        let request = EngineRequest {
            tenant: tenant.clone(),
            query: resolved.query,
            execution_mode: resolved.execution_mode,
            client_query_id: resolved.client_query_id,
            caller,
            is_query_service,
        };

        tracing::debug!(
            mode = %request.execution_mode,
            is_query_service,
            "Dispatching query to engine"
        );
        let result = self.engine.execute(request).await?;

        Ok(result.into_mapping()?)
    }
}
