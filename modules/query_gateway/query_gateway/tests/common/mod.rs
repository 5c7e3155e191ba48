#![allow(clippy::unwrap_used, clippy::expect_used, dead_code)]

//! Common test utilities for query gateway integration tests

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, header};
use query_gateway::domain::query_tags::{self, QueryTags};
use query_gateway::{EngineError, QueryEngineClient, QueryGatewayConfig, QueryGatewayModule, QueryResult};
use query_gateway_sdk::EngineRequest;
use serde_json::Value;
use tokio::sync::Notify;

/// Scripted engine: returns a fixed outcome and records every request it sees
/// together with the ambient query tags.
pub struct ScriptedEngine {
    result: Result<QueryResult, EngineError>,
    delay: Option<Duration>,
    calls: Mutex<Vec<(EngineRequest, QueryTags)>>,
    started: Notify,
}

impl ScriptedEngine {
    pub fn returning(result: Result<QueryResult, EngineError>) -> Arc<Self> {
        Arc::new(Self {
            result,
            delay: None,
            calls: Mutex::new(Vec::new()),
            started: Notify::new(),
        })
    }

    /// Engine that holds each query for `delay` before answering.
    pub fn slow(result: Result<QueryResult, EngineError>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            result,
            delay: Some(delay),
            calls: Mutex::new(Vec::new()),
            started: Notify::new(),
        })
    }

    pub fn calls(&self) -> Vec<(EngineRequest, QueryTags)> {
        self.calls.lock().unwrap().clone()
    }

    pub async fn wait_started(&self) {
        self.started.notified().await;
    }
}

#[async_trait]
impl QueryEngineClient for ScriptedEngine {
    async fn execute(&self, request: EngineRequest) -> Result<QueryResult, EngineError> {
        self.calls
            .lock()
            .unwrap()
            .push((request, query_tags::current()));
        self.started.notify_one();
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.result.clone()
    }
}

pub fn mapping(value: Value) -> QueryResult {
    match value {
        Value::Object(map) => QueryResult::Mapping(map),
        other => panic!("not an object: {other}"),
    }
}

pub fn build_module(config: QueryGatewayConfig, engine: Arc<ScriptedEngine>) -> QueryGatewayModule {
    QueryGatewayModule::builder(config)
        .engine(engine)
        .build()
        .expect("module builds")
}

pub fn run_request(tenant_id: uuid::Uuid, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(format!(
            "/query-gateway/v1/tenants/{tenant_id}/hogql_query/42/run"
        ))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn read_json(response: Response<Body>) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

pub async fn send(router: &Router, request: Request<Body>) -> Response<Body> {
    use tower::ServiceExt as _;
    router.clone().oneshot(request).await.unwrap()
}
