use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Extension, Path};
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use query_gateway_sdk::{CallerContext, QueryRequest, TenantDirectory, TenantId};
use serde_json::Value;

use super::error;
use super::problem::Problem;
use crate::domain::response::Completion;
use crate::domain::service::Service;

/// `POST .../tenants/{tenant_id}/hogql_query/{object_id}/run`
///
/// Responds 200 with the result, or 202 when the engine reports the query
/// as not yet complete. Failures are Problem documents.
pub async fn run_query(
    Extension(svc): Extension<Arc<Service>>,
    Extension(tenants): Extension<Arc<dyn TenantDirectory>>,
    caller: Option<Extension<CallerContext>>,
    uri: Uri,
    path: Result<Path<(TenantId, String)>, PathRejection>,
    body: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Response, Problem> {
    let instance = uri.path();
    let Path((tenant_id, _object_id)) = path.map_err(|e| error::path_rejection(&e, instance))?;
    let Json(request) = body.map_err(|e| error::json_rejection(&e, instance))?;

    let tenant = tenants
        .find_tenant(tenant_id)
        .await
        .ok_or_else(|| error::tenant_not_found(tenant_id, instance))?;
    let caller = caller.map_or_else(CallerContext::anonymous, |Extension(c)| c);

    let outcome = svc
        .run(&tenant, caller, request)
        .await
        .map_err(|envelope| error::envelope_to_problem(envelope, instance))?;

    let status = match outcome.completion {
        Completion::Complete => StatusCode::OK,
        Completion::Incomplete => StatusCode::ACCEPTED,
    };
    Ok((status, Json(Value::Object(outcome.body))).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::admission::{AdmissionGate, API_QUERIES_CONCURRENCY_FEATURE};
    use crate::domain::classifier::ErrorClassifier;
    use crate::domain::dispatcher::QueryDispatcher;
    use crate::domain::execution_mode::RefreshModeResolver;
    use crate::infra::directory::StaticTenantDirectory;
    use crate::infra::exception_sink::TracingExceptionSink;
    use crate::infra::feature_cache::InMemoryFeatureFlagCache;
    use crate::infra::limiter::InMemoryConcurrencyLimiter;
    use crate::infra::subscription::StaticFeatureSubscription;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Request};
    use axum::routing::post;
    use axum::Router;
    use query_gateway_sdk::{EngineError, EngineRequest, QueryEngineClient, QueryResult, Tenant};
    use serde_json::json;
    use std::sync::Mutex;
    use tower::ServiceExt as _;
    use uuid::Uuid;

    struct MockEngine {
        result: Result<QueryResult, EngineError>,
        last_request: Mutex<Option<EngineRequest>>,
    }

    #[async_trait]
    impl QueryEngineClient for MockEngine {
        async fn execute(&self, request: EngineRequest) -> Result<QueryResult, EngineError> {
            *self.last_request.lock().unwrap() = Some(request);
            self.result.clone()
        }
    }

    fn create_test_router(
        tenant: &Tenant,
        result: Result<QueryResult, EngineError>,
    ) -> (Router, Arc<MockEngine>) {
        let engine = Arc::new(MockEngine {
            result,
            last_request: Mutex::new(None),
        });
        let gate = AdmissionGate::new(
            Arc::new(InMemoryFeatureFlagCache::new()),
            Arc::new(StaticFeatureSubscription::default()),
            Arc::new(InMemoryConcurrencyLimiter::new(1)),
            API_QUERIES_CONCURRENCY_FEATURE,
        );
        let service = Arc::new(Service::new(
            Arc::new(RefreshModeResolver),
            gate,
            QueryDispatcher::new(engine.clone()),
            ErrorClassifier::new(Arc::new(TracingExceptionSink)),
        ));
        let tenants: Arc<dyn TenantDirectory> =
            Arc::new(StaticTenantDirectory::new([tenant.clone()]));

        let router = Router::new()
            .route("/tenants/{tenant_id}/q/{object_id}/run", post(run_query))
            .layer(Extension(service))
            .layer(Extension(tenants));
        (router, engine)
    }

    fn post_json(tenant_id: Uuid, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(format!("/tenants/{tenant_id}/q/1/run"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_owned()))
            .unwrap()
    }

    async fn read_json(response: Response) -> Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn rows(value: Value) -> QueryResult {
        match value {
            Value::Object(map) => QueryResult::Mapping(map),
            other => panic!("not an object: {other}"),
        }
    }

    #[tokio::test]
    async fn test_run_query_returns_result_body() {
        // No organization: limiter is never consulted
        let tenant = Tenant::new(Uuid::new_v4(), None);
        let (app, engine) = create_test_router(&tenant, Ok(rows(json!({"rows": [1, 2, 3]}))));

        let response = app
            .oneshot(post_json(
                tenant.id,
                r#"{"query": {"kind": "HogQLQuery", "query": "select 1"}}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(read_json(response).await, json!({"rows": [1, 2, 3]}));

        let request = engine.last_request.lock().unwrap().clone().unwrap();
        assert_eq!(request.tenant, tenant);
        assert_eq!(request.caller, CallerContext::anonymous());
    }

    #[tokio::test]
    async fn test_incomplete_result_is_accepted() {
        let tenant = Tenant::new(Uuid::new_v4(), None);
        let body = json!({"query_status": {"complete": false}, "rows": []});
        let (app, _) = create_test_router(&tenant, Ok(rows(body.clone())));

        let response = app
            .oneshot(post_json(
                tenant.id,
                r#"{"query": {"kind": "HogQLQuery", "query": "select 1"}}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(read_json(response).await, body);
    }

    #[tokio::test]
    async fn test_unsupported_kind_is_problem_400() {
        let tenant = Tenant::new(Uuid::new_v4(), None);
        let (app, engine) = create_test_router(&tenant, Ok(rows(json!({}))));

        let response = app
            .oneshot(post_json(tenant.id, r#"{"query": {"kind": "EventsQuery"}}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            super::super::APPLICATION_PROBLEM_JSON
        );
        let problem = read_json(response).await;
        assert_eq!(problem["detail"], "this endpoint only supports HogQLQuery");
        assert_eq!(problem["status"], 400);
        assert_eq!(
            problem["instance"],
            format!("/tenants/{}/q/1/run", tenant.id)
        );
        assert!(engine.last_request.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_tenant_is_404() {
        let tenant = Tenant::new(Uuid::new_v4(), None);
        let (app, _) = create_test_router(&tenant, Ok(rows(json!({}))));

        let response = app
            .oneshot(post_json(
                Uuid::new_v4(),
                r#"{"query": {"kind": "HogQLQuery", "query": "select 1"}}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(read_json(response).await["code"], "tenant_not_found");
    }

    #[tokio::test]
    async fn test_invalid_body_is_problem() {
        let tenant = Tenant::new(Uuid::new_v4(), None);
        let (app, _) = create_test_router(&tenant, Ok(rows(json!({}))));

        let response = app
            .clone()
            .oneshot(post_json(tenant.id, "{not json"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(read_json(response).await["code"], "invalid_request");

        let response = app
            .oneshot(post_json(
                tenant.id,
                r#"{"query": {"kind": "HogQLQuery", "query": "select 1"}, "refresh": "sometimes"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_caller_extension_is_forwarded() {
        let tenant = Tenant::new(Uuid::new_v4(), None);
        let (app, engine) = create_test_router(&tenant, Ok(rows(json!({}))));
        let caller = CallerContext::new(
            Uuid::new_v4(),
            query_gateway_sdk::AccessMethod::PersonalApiKey,
        );

        let response = app
            .layer(Extension(caller))
            .oneshot(post_json(
                tenant.id,
                r#"{"query": {"kind": "HogQLQuery", "query": "select 1"}}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let request = engine.last_request.lock().unwrap().clone().unwrap();
        assert_eq!(request.caller, caller);
        assert!(request.is_query_service);
    }
}
