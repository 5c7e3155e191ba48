//! Collaborator traits consumed by the query gateway.
//!
//! The gateway owns none of these concerns. Hosts register implementations
//! when building the module; the gateway crate ships in-memory and static
//! adapters for local runs and tests.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{
    ConcurrencyExceeded, EngineError, FeatureCacheError, SubscriptionError,
};
use crate::models::{
    AdmissionSlot, EngineRequest, HogQLQuery, QueryResult, RefreshHint, ResolvedQuery, Tenant,
    TenantId,
};

/// Executes queries. Opaque to the gateway.
#[async_trait]
pub trait QueryEngineClient: Send + Sync {
    /// Run a query to completion (or to the point the execution mode allows).
    ///
    /// # Errors
    ///
    /// Returns the [`EngineError`] variant matching the failure family.
    async fn execute(&self, request: EngineRequest) -> Result<QueryResult, EngineError>;
}

/// Bounds the number of simultaneously running queries per tenant.
#[async_trait]
pub trait ConcurrencyLimiter: Send + Sync {
    /// Take a slot for `tenant_id`. The slot is held until the returned value is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`ConcurrencyExceeded`] when the tenant has no free slot.
    async fn acquire(&self, tenant_id: TenantId) -> Result<AdmissionSlot, ConcurrencyExceeded>;
}

/// Answers whether an organization's plan includes a feature.
#[async_trait]
pub trait FeatureSubscriptionClient: Send + Sync {
    /// # Errors
    ///
    /// Returns [`SubscriptionError`] if the subscription backend cannot answer.
    async fn is_feature_enabled(
        &self,
        organization_id: Uuid,
        feature: &str,
    ) -> Result<bool, SubscriptionError>;
}

/// Key/value store for memoized feature checks. Entries never expire.
#[async_trait]
pub trait FeatureFlagCache: Send + Sync {
    /// Cached value for `key`, `None` on miss.
    ///
    /// # Errors
    ///
    /// Returns error if the backend fails (callers fall back to a fresh check).
    async fn get(&self, key: &str) -> Result<Option<bool>, FeatureCacheError>;

    /// Store `value` under `key` with no expiry.
    ///
    /// # Errors
    ///
    /// Returns error if the backend fails (non-fatal for callers).
    async fn set(&self, key: &str, value: bool) -> Result<(), FeatureCacheError>;

    /// Drop every entry.
    ///
    /// # Errors
    ///
    /// Returns error if the backend fails.
    async fn clear(&self) -> Result<(), FeatureCacheError>;
}

/// Receives failures nobody classified.
pub trait ExceptionSink: Send + Sync {
    fn report(&self, error: &(dyn std::error::Error + Send + Sync));
}

/// Looks up tenants addressed by the route.
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    async fn find_tenant(&self, tenant_id: TenantId) -> Option<Tenant>;
}

/// Turns request parameters and tenant defaults into an execution mode.
pub trait ExecutionModeResolver: Send + Sync {
    fn resolve(
        &self,
        tenant: &Tenant,
        query: HogQLQuery,
        client_query_id: Option<String>,
        refresh: Option<RefreshHint>,
    ) -> ResolvedQuery;
}
