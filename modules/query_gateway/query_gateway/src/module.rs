//! Query gateway module wiring.

use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use query_gateway_sdk::{
    ConcurrencyLimiter, ExceptionSink, ExecutionModeResolver, FeatureFlagCache,
    FeatureSubscriptionClient, QueryEngineClient, TenantDirectory,
};
use tracing::info;

use crate::api::rest::{self, RequestThrottle};
use crate::config::QueryGatewayConfig;
use crate::domain::admission::AdmissionGate;
use crate::domain::classifier::ErrorClassifier;
use crate::domain::dispatcher::QueryDispatcher;
use crate::domain::execution_mode::RefreshModeResolver;
use crate::domain::service::Service;
use crate::infra::directory::StaticTenantDirectory;
use crate::infra::exception_sink::TracingExceptionSink;
use crate::infra::feature_cache::InMemoryFeatureFlagCache;
use crate::infra::limiter::InMemoryConcurrencyLimiter;
use crate::infra::subscription::StaticFeatureSubscription;

/// Query gateway module.
///
/// Only the query engine is mandatory. Every other collaborator falls back to
/// the in-process adapter built from [`QueryGatewayConfig`]:
/// - feature cache: [`InMemoryFeatureFlagCache`]
/// - limiter: [`InMemoryConcurrencyLimiter`] sized by `max_concurrent_queries_per_tenant`
/// - subscriptions: [`StaticFeatureSubscription`] over `entitlements`
/// - tenants: [`StaticTenantDirectory`] over `tenants`
/// - exception sink: [`TracingExceptionSink`]
///
/// The request throttle is built from `throttle` and shared by every router.
pub struct QueryGatewayModule {
    config: QueryGatewayConfig,
    service: Arc<Service>,
    tenants: Arc<dyn TenantDirectory>,
    feature_cache: Arc<dyn FeatureFlagCache>,
    throttle: Option<Arc<RequestThrottle>>,
}

impl QueryGatewayModule {
    #[must_use]
    pub fn builder(config: QueryGatewayConfig) -> QueryGatewayModuleBuilder {
        QueryGatewayModuleBuilder::new(config)
    }

    #[must_use]
    pub fn config(&self) -> &QueryGatewayConfig {
        &self.config
    }

    #[must_use]
    pub fn service(&self) -> Arc<Service> {
        self.service.clone()
    }

    #[must_use]
    pub fn tenants(&self) -> Arc<dyn TenantDirectory> {
        self.tenants.clone()
    }

    /// Feature flag cache shared with the admission gate. Clearing it forces
    /// fresh entitlement lookups.
    #[must_use]
    pub fn feature_cache(&self) -> Arc<dyn FeatureFlagCache> {
        self.feature_cache.clone()
    }

    /// REST routes of the module.
    #[must_use]
    pub fn router(&self) -> Router {
        rest::router(
            self.service.clone(),
            self.tenants.clone(),
            self.throttle.clone(),
        )
    }
}

#[must_use]
pub struct QueryGatewayModuleBuilder {
    config: QueryGatewayConfig,
    engine: Option<Arc<dyn QueryEngineClient>>,
    feature_cache: Option<Arc<dyn FeatureFlagCache>>,
    limiter: Option<Arc<dyn ConcurrencyLimiter>>,
    subscriptions: Option<Arc<dyn FeatureSubscriptionClient>>,
    tenants: Option<Arc<dyn TenantDirectory>>,
    exception_sink: Option<Arc<dyn ExceptionSink>>,
    mode_resolver: Option<Arc<dyn ExecutionModeResolver>>,
}

impl QueryGatewayModuleBuilder {
    pub fn new(config: QueryGatewayConfig) -> Self {
        Self {
            config,
            engine: None,
            feature_cache: None,
            limiter: None,
            subscriptions: None,
            tenants: None,
            exception_sink: None,
            mode_resolver: None,
        }
    }

    pub fn engine(mut self, engine: Arc<dyn QueryEngineClient>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn feature_cache(mut self, cache: Arc<dyn FeatureFlagCache>) -> Self {
        self.feature_cache = Some(cache);
        self
    }

    pub fn limiter(mut self, limiter: Arc<dyn ConcurrencyLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub fn subscriptions(mut self, subscriptions: Arc<dyn FeatureSubscriptionClient>) -> Self {
        self.subscriptions = Some(subscriptions);
        self
    }

    pub fn tenants(mut self, tenants: Arc<dyn TenantDirectory>) -> Self {
        self.tenants = Some(tenants);
        self
    }

    pub fn exception_sink(mut self, sink: Arc<dyn ExceptionSink>) -> Self {
        self.exception_sink = Some(sink);
        self
    }

    pub fn mode_resolver(mut self, resolver: Arc<dyn ExecutionModeResolver>) -> Self {
        self.mode_resolver = Some(resolver);
        self
    }

    /// Validates the configuration and assembles the module.
    ///
    /// # Errors
    ///
    /// Returns error if no engine was provided or the configuration is invalid.
    pub fn build(self) -> anyhow::Result<QueryGatewayModule> {
        let Self {
            config,
            engine,
            feature_cache,
            limiter,
            subscriptions,
            tenants,
            exception_sink,
            mode_resolver,
        } = self;

        config.validate()?;
        let engine = engine.context("query gateway requires a query engine")?;
        let throttle = RequestThrottle::from_config(&config.throttle)
            .context("invalid request throttle")?
            .map(Arc::new);
        info!(
            feature = %config.feature_name,
            max_concurrent = config.max_concurrent_queries_per_tenant,
            tenants = config.tenants.len(),
            throttled = throttle.is_some(),
            "Initializing query_gateway"
        );

        let feature_cache =
            feature_cache.unwrap_or_else(|| Arc::new(InMemoryFeatureFlagCache::new()));
        let limiter = limiter.unwrap_or_else(|| {
            Arc::new(InMemoryConcurrencyLimiter::new(
                config.max_concurrent_queries_per_tenant,
            ))
        });
        let subscriptions = subscriptions.unwrap_or_else(|| {
            Arc::new(StaticFeatureSubscription::new(config.entitlements.clone()))
        });
        let tenants = tenants
            .unwrap_or_else(|| Arc::new(StaticTenantDirectory::new(config.tenants.clone())));
        let exception_sink = exception_sink.unwrap_or_else(|| Arc::new(TracingExceptionSink));
        let mode_resolver = mode_resolver.unwrap_or_else(|| Arc::new(RefreshModeResolver));

        let gate = AdmissionGate::new(
            feature_cache.clone(),
            subscriptions,
            limiter,
            config.feature_name.clone(),
        );
        let service = Arc::new(Service::new(
            mode_resolver,
            gate,
            QueryDispatcher::new(engine),
            ErrorClassifier::new(exception_sink),
        ));

        Ok(QueryGatewayModule {
            config,
            service,
            tenants,
            feature_cache,
            throttle,
        })
    }
}
