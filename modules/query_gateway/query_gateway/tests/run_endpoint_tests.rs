#![allow(clippy::unwrap_used, clippy::expect_used)]

//! End-to-end tests of the run endpoint through the module router.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::Extension;
use axum::http::{StatusCode, header};
use common::{ScriptedEngine, build_module, mapping, read_json, run_request, send};
use query_gateway::config::{OrganizationEntitlements, RateQuota};
use query_gateway::{CallerContext, EngineError, QueryGatewayConfig, QueryGatewayModule, Tenant};
use query_gateway_sdk::{AccessMethod, FeatureSubscriptionClient, SubscriptionError};
use serde_json::json;
use uuid::Uuid;

const FEATURE: &str = "api_queries_concurrency";

fn hogql_body() -> serde_json::Value {
    json!({"query": {"kind": "HogQLQuery", "query": "select event from events limit 1"}})
}

/// Config with one limited tenant (entitled org) and one unlimited tenant (no org).
fn config(limit: usize) -> (QueryGatewayConfig, Tenant, Tenant) {
    let org = Uuid::new_v4();
    let limited = Tenant::new(Uuid::new_v4(), Some(org));
    let unlimited = Tenant::new(Uuid::new_v4(), None);
    let config = QueryGatewayConfig {
        max_concurrent_queries_per_tenant: limit,
        tenants: vec![limited.clone(), unlimited.clone()],
        entitlements: vec![OrganizationEntitlements {
            organization_id: org,
            features: vec![FEATURE.to_owned()],
        }],
        ..QueryGatewayConfig::default()
    };
    (config, limited, unlimited)
}

#[tokio::test]
async fn complete_query_returns_200_with_body() {
    let (config, tenant, _) = config(3);
    let engine = ScriptedEngine::returning(Ok(mapping(json!({"rows": [1, 2, 3]}))));
    let router = build_module(config, engine.clone()).router();

    let response = send(&router, run_request(tenant.id, &hogql_body())).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await, json!({"rows": [1, 2, 3]}));
    assert_eq!(engine.calls().len(), 1);
}

#[tokio::test]
async fn incomplete_query_returns_202() {
    let (config, tenant, _) = config(3);
    let body = json!({"query_status": {"complete": false}, "rows": []});
    let engine = ScriptedEngine::returning(Ok(mapping(body.clone())));
    let router = build_module(config, engine).router();

    let response = send(&router, run_request(tenant.id, &hogql_body())).await;

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(read_json(response).await, body);
}

#[tokio::test]
async fn async_refresh_is_rejected_without_dispatch() {
    let (config, tenant, _) = config(3);
    let engine = ScriptedEngine::returning(Ok(mapping(json!({}))));
    let router = build_module(config, engine.clone()).router();

    for refresh in [json!("async"), json!("force_async"), json!("lazy_async")] {
        let mut body = hogql_body();
        body["refresh"] = refresh;

        let response = send(&router, run_request(tenant.id, &body)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            read_json(response).await["detail"],
            "only sync modes are supported (refresh param)"
        );
    }
    assert!(engine.calls().is_empty());
}

#[tokio::test]
async fn sync_refresh_values_are_dispatched() {
    let (config, tenant, _) = config(3);
    let engine = ScriptedEngine::returning(Ok(mapping(json!({}))));
    let router = build_module(config, engine.clone()).router();

    for refresh in [json!(true), json!(false), json!("blocking"), json!("force_cache")] {
        let mut body = hogql_body();
        body["refresh"] = refresh;
        let response = send(&router, run_request(tenant.id, &body)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let modes: Vec<_> = engine
        .calls()
        .into_iter()
        .map(|(req, _)| req.execution_mode.as_str())
        .collect();
    assert_eq!(
        modes,
        [
            "calculate_blocking_always",
            "recent_cache_calculate_blocking_if_stale",
            "recent_cache_calculate_blocking_if_stale",
            "cache_only_never_calculate",
        ]
    );
}

#[tokio::test]
async fn limit_exhaustion_returns_429_and_frees_after_completion() {
    let (config, tenant, _) = config(1);
    let engine = ScriptedEngine::slow(Ok(mapping(json!({"rows": []}))), Duration::from_millis(200));
    let router = build_module(config, engine.clone()).router();

    let first = tokio::spawn({
        let router = router.clone();
        let id = tenant.id;
        async move { send(&router, run_request(id, &hogql_body())).await }
    });
    engine.wait_started().await;

    let rejected = send(&router, run_request(tenant.id, &hogql_body())).await;
    assert_eq!(rejected.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        rejected.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/problem+json"
    );
    let problem = read_json(rejected).await;
    assert_eq!(problem["code"], "throttled");
    assert!(
        problem["detail"]
            .as_str()
            .unwrap()
            .contains("exceeded maximum concurrency limit: 1")
    );

    assert_eq!(first.await.unwrap().status(), StatusCode::OK);

    let again = send(&router, run_request(tenant.id, &hogql_body())).await;
    assert_eq!(again.status(), StatusCode::OK);
    assert_eq!(engine.calls().len(), 2);
}

#[tokio::test]
async fn tenant_without_organization_is_not_limited() {
    let (config, _, tenant) = config(1);
    let engine = ScriptedEngine::slow(Ok(mapping(json!({}))), Duration::from_millis(100));
    let router = build_module(config, engine.clone()).router();

    let (a, b) = tokio::join!(
        send(&router, run_request(tenant.id, &hogql_body())),
        send(&router, run_request(tenant.id, &hogql_body())),
    );

    assert_eq!(a.status(), StatusCode::OK);
    assert_eq!(b.status(), StatusCode::OK);
    assert_eq!(engine.calls().len(), 2);
}

#[tokio::test]
async fn organization_without_entitlements_is_not_limited() {
    let (mut config, _, _) = config(1);
    let tenant = Tenant::new(Uuid::new_v4(), Some(Uuid::new_v4()));
    config.tenants.push(tenant.clone());
    let engine = ScriptedEngine::slow(Ok(mapping(json!({}))), Duration::from_millis(100));
    let router = build_module(config, engine.clone()).router();

    let (a, b) = tokio::join!(
        send(&router, run_request(tenant.id, &hogql_body())),
        send(&router, run_request(tenant.id, &hogql_body())),
    );

    assert_eq!(a.status(), StatusCode::OK);
    assert_eq!(b.status(), StatusCode::OK);
    assert_eq!(engine.calls().len(), 2);
}

#[tokio::test]
async fn request_burst_is_throttled_per_tenant() {
    let (mut config, tenant, other) = config(3);
    config.throttle.burst = RateQuota {
        requests: 2,
        per: Duration::from_secs(3600),
    };
    let engine = ScriptedEngine::returning(Ok(mapping(json!({}))));
    let router = build_module(config, engine.clone()).router();

    for _ in 0..2 {
        let response = send(&router, run_request(tenant.id, &hogql_body())).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let rejected = send(&router, run_request(tenant.id, &hogql_body())).await;
    assert_eq!(rejected.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        rejected.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/problem+json"
    );
    let retry_after: u64 = rejected
        .headers()
        .get(header::RETRY_AFTER)
        .unwrap()
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(retry_after > 0);
    let problem = read_json(rejected).await;
    assert_eq!(problem["code"], "throttled");
    assert!(
        problem["detail"]
            .as_str()
            .unwrap()
            .starts_with("Request was throttled.")
    );
    assert_eq!(engine.calls().len(), 2);

    let response = send(&router, run_request(other.id, &hogql_body())).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn disabled_throttle_lets_bursts_through() {
    let (mut config, tenant, _) = config(3);
    config.throttle.enabled = false;
    config.throttle.burst = RateQuota {
        requests: 1,
        per: Duration::from_secs(3600),
    };
    let engine = ScriptedEngine::returning(Ok(mapping(json!({}))));
    let router = build_module(config, engine.clone()).router();

    for _ in 0..3 {
        let response = send(&router, run_request(tenant.id, &hogql_body())).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
    assert_eq!(engine.calls().len(), 3);
}

#[tokio::test]
async fn unknown_tenant_returns_404() {
    let (config, _, _) = config(3);
    let engine = ScriptedEngine::returning(Ok(mapping(json!({}))));
    let router = build_module(config, engine.clone()).router();

    let response = send(&router, run_request(Uuid::new_v4(), &hogql_body())).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(engine.calls().is_empty());
}

#[tokio::test]
async fn missing_column_error_gets_beta_note() {
    let (config, tenant, _) = config(3);
    let engine = ScriptedEngine::returning(Err(EngineError::internal(
        "DB::Exception: There's no column 'properties.$foo' in table 'events': While processing",
    )));
    let router = build_module(config, engine).router();

    let response = send(&router, run_request(tenant.id, &hogql_body())).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        read_json(response).await["detail"],
        "There's no column 'properties.$foo' in table. Note: While in beta, not all column types may be fully supported"
    );
}

#[tokio::test]
async fn engine_validation_error_keeps_code() {
    let (config, tenant, _) = config(3);
    let engine = ScriptedEngine::returning(Err(EngineError::exposed(
        "Unknown table `evnts`.",
        Some("unknown_table".to_owned()),
    )));
    let router = build_module(config, engine).router();

    let response = send(&router, run_request(tenant.id, &hogql_body())).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let problem = read_json(response).await;
    assert_eq!(problem["code"], "unknown_table");
    assert_eq!(problem["detail"], "Unknown table `evnts`.");
}

#[tokio::test]
async fn unexpected_engine_failure_returns_500() {
    let (config, tenant, _) = config(3);
    let engine = ScriptedEngine::returning(Err(EngineError::internal("connection reset by peer")));
    let router = build_module(config, engine).router();

    let response = send(&router, run_request(tenant.id, &hogql_body())).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let problem = read_json(response).await;
    assert_eq!(problem["detail"], "connection reset by peer");
    assert_eq!(problem["code"], "internal_error");
}

#[tokio::test]
async fn correlation_tags_and_caller_reach_engine() {
    let (config, tenant, _) = config(3);
    let engine = ScriptedEngine::returning(Ok(mapping(json!({}))));
    let caller = CallerContext::new(Uuid::new_v4(), AccessMethod::PersonalApiKey);
    let router = build_module(config, engine.clone())
        .router()
        .layer(Extension(caller));

    let mut body = hogql_body();
    body["client_query_id"] = json!("abc123");
    let response = send(&router, run_request(tenant.id, &body)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let (request, tags) = engine.calls().remove(0);
    assert_eq!(tags.client_query_id.as_deref(), Some("abc123"));
    assert_eq!(tags.access_method, Some(AccessMethod::PersonalApiKey));
    assert!(request.is_query_service);
    assert_eq!(request.caller, caller);
}

struct CountingSubscriptions {
    calls: AtomicUsize,
}

#[async_trait]
impl FeatureSubscriptionClient for CountingSubscriptions {
    async fn is_feature_enabled(
        &self,
        _organization_id: Uuid,
        _feature: &str,
    ) -> Result<bool, SubscriptionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(false)
    }
}

#[tokio::test]
async fn feature_check_is_cached_until_cleared() {
    let (config, tenant, _) = config(3);
    let subscriptions = Arc::new(CountingSubscriptions {
        calls: AtomicUsize::new(0),
    });
    let module = QueryGatewayModule::builder(config)
        .engine(ScriptedEngine::returning(Ok(mapping(json!({})))))
        .subscriptions(subscriptions.clone())
        .build()
        .unwrap();
    let router = module.router();

    for _ in 0..3 {
        let response = send(&router, run_request(tenant.id, &hogql_body())).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
    assert_eq!(subscriptions.calls.load(Ordering::SeqCst), 1);

    module.feature_cache().clear().await.unwrap();
    send(&router, run_request(tenant.id, &hogql_body())).await;
    assert_eq!(subscriptions.calls.load(Ordering::SeqCst), 2);
}
