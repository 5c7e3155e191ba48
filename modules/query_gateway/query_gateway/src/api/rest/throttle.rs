//! Per-tenant request rate limiting for the run endpoint.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use axum::extract::rejection::PathRejection;
use axum::extract::{Path, Request, State};
use axum::http::{HeaderValue, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use governor::clock::Clock;
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use query_gateway_sdk::TenantId;
use tracing::debug;

use super::error;
use crate::config::{RateQuota, RequestThrottleConfig};

/// Burst and sustained token buckets, one pair per tenant.
pub struct RequestThrottle {
    burst: DefaultKeyedRateLimiter<TenantId>,
    sustained: DefaultKeyedRateLimiter<TenantId>,
}

fn quota(spec: RateQuota) -> Result<Quota> {
    let requests = NonZeroU32::new(spec.requests).context("throttle requests is zero")?;
    Quota::with_period(spec.per / spec.requests)
        .map(|q| q.allow_burst(requests))
        .with_context(|| anyhow!("throttle period too short: {spec:?}"))
}

impl RequestThrottle {
    /// # Errors
    /// Returns an error if a quota is zero.
    pub fn new(burst: RateQuota, sustained: RateQuota) -> Result<Self> {
        Ok(Self {
            burst: RateLimiter::keyed(quota(burst).context("invalid burst quota")?),
            sustained: RateLimiter::keyed(quota(sustained).context("invalid sustained quota")?),
        })
    }

    /// `None` when throttling is disabled.
    ///
    /// # Errors
    /// Returns an error if an enabled quota is zero.
    pub fn from_config(config: &RequestThrottleConfig) -> Result<Option<Self>> {
        if !config.enabled {
            return Ok(None);
        }
        Self::new(config.burst, config.sustained).map(Some)
    }

    /// Takes one token from each bucket of the tenant, or returns how long to wait.
    ///
    /// # Errors
    /// Returns the wait time until the exhausted bucket has capacity again.
    pub fn check(&self, tenant_id: TenantId) -> Result<(), Duration> {
        for limiter in [&self.burst, &self.sustained] {
            if let Err(not_until) = limiter.check_key(&tenant_id) {
                return Err(not_until.wait_time_from(limiter.clock().now()));
            }
        }
        Ok(())
    }
}

fn ceil_secs(wait: Duration) -> u64 {
    wait.as_secs() + u64::from(wait.subsec_nanos() > 0)
}

/// Rejects with 429 and `Retry-After` once either bucket of the tenant is empty.
/// Requests whose path does not parse are left to the handler.
pub async fn throttle_middleware(
    State(throttle): State<Arc<RequestThrottle>>,
    path: Result<Path<(TenantId, String)>, PathRejection>,
    req: Request,
    next: Next,
) -> Response {
    let Ok(Path((tenant_id, _))) = path else {
        return next.run(req).await;
    };

    match throttle.check(tenant_id) {
        Ok(()) => next.run(req).await,
        Err(wait) => {
            let secs = ceil_secs(wait);
            debug!(%tenant_id, retry_after = secs, "request throttled");
            let mut response = error::throttled(secs, req.uri().path()).into_response();
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
            response
        }
    }
}
