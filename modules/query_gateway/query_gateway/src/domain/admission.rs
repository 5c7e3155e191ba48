//! Per-tenant concurrency admission.
//!
//! Whether a tenant is subject to concurrency limiting is an entitlement of its
//! organization. The answer is memoized in a [`FeatureFlagCache`] with no expiry:
//! plan changes are only observed once the cache is cleared.

use std::future::Future;
use std::sync::Arc;

use query_gateway_sdk::{
    ConcurrencyLimiter, ExecutionMode, FeatureFlagCache, FeatureSubscriptionClient, Tenant,
    TenantId,
};

use super::error::DomainError;

/// Feature gating concurrency limits for API queries.
pub const API_QUERIES_CONCURRENCY_FEATURE: &str = "api_queries_concurrency";

/// Decides whether a query may start and holds its concurrency slot while it runs.
pub struct AdmissionGate {
    cache: Arc<dyn FeatureFlagCache>,
    subscriptions: Arc<dyn FeatureSubscriptionClient>,
    limiter: Arc<dyn ConcurrencyLimiter>,
    feature: String,
}

impl AdmissionGate {
    #[must_use]
    pub fn new(
        cache: Arc<dyn FeatureFlagCache>,
        subscriptions: Arc<dyn FeatureSubscriptionClient>,
        limiter: Arc<dyn ConcurrencyLimiter>,
        feature: impl Into<String>,
    ) -> Self {
        Self {
            cache,
            subscriptions,
            limiter,
            feature: feature.into(),
        }
    }

    /// Cache key of the feature check for `tenant_id`.
    #[must_use]
    pub fn cache_key(&self, tenant_id: TenantId) -> String {
        format!("team/{tenant_id}/feature/{}", self.feature)
    }

    /// Whether concurrency limiting applies to `tenant`.
    ///
    /// A cached answer is returned as-is. On a miss the subscription service is
    /// asked and the answer cached. Tenants without an organization get `false`
    /// and nothing is cached, so they are re-checked on every call.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::Subscription`] if the subscription service fails.
    #[tracing::instrument(skip_all, fields(tenant_id = %tenant.id, feature = %self.feature))]
    pub async fn check_feature(&self, tenant: &Tenant) -> Result<bool, DomainError> {
        let key = self.cache_key(tenant.id);

        match self.cache.get(&key).await {
            Ok(Some(enabled)) => {
                tracing::debug!(enabled, "Feature check served from cache");
                return Ok(enabled);
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "Feature cache read failed, checking subscription"),
        }

        let Some(organization_id) = tenant.organization_id else {
            tracing::debug!("Tenant has no organization, feature treated as disabled");
            return Ok(false);
        };

        let enabled = self
            .subscriptions
            .is_feature_enabled(organization_id, &self.feature)
            .await?;

        if let Err(e) = self.cache.set(&key, enabled).await {
            tracing::warn!(error = %e, "Feature cache write failed");
        }

        Ok(enabled)
    }

    /// Runs `dispatch` once `tenant` is admitted.
    ///
    /// When the feature is enabled a limiter slot is taken first and held until
    /// `dispatch` completes, whatever its outcome. Otherwise `dispatch` runs
    /// without limits.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::Throttled`] when the limiter has no free slot, or
    /// whatever `dispatch` returns.
    pub async fn admit<F, T>(
        &self,
        tenant: &Tenant,
        mode: ExecutionMode,
        dispatch: F,
    ) -> Result<T, DomainError>
    where
        F: Future<Output = Result<T, DomainError>>,
    {
        if !self.check_feature(tenant).await? {
            return dispatch.await;
        }

        let slot = self.limiter.acquire(tenant.id).await.inspect_err(|e| {
            tracing::info!(tenant_id = %tenant.id, %mode, error = %e, "Query rejected by concurrency limiter");
        })?;

        let result = dispatch.await;
        drop(slot);
        result
    }
}
