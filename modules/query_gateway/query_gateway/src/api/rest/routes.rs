use std::sync::Arc;

use axum::middleware::from_fn_with_state;
use axum::routing::post;
use axum::{Extension, Router};
use query_gateway_sdk::TenantDirectory;

use super::handlers;
use super::throttle::{RequestThrottle, throttle_middleware};
use crate::domain::service::Service;

pub const RUN_QUERY_PATH: &str = "/query-gateway/v1/tenants/{tenant_id}/hogql_query/{object_id}/run";

/// Router exposing the run endpoint. Hosts may layer an
/// `Extension<CallerContext>` on top to identify callers.
#[must_use]
pub fn router(
    service: Arc<Service>,
    tenants: Arc<dyn TenantDirectory>,
    throttle: Option<Arc<RequestThrottle>>,
) -> Router {
    let mut router = Router::new().route(RUN_QUERY_PATH, post(handlers::run_query));
    // Route layer so the path parameters are already matched.
    if let Some(throttle) = throttle {
        router = router.route_layer(from_fn_with_state(throttle, throttle_middleware));
    }
    router.layer(Extension(service)).layer(Extension(tenants))
}
