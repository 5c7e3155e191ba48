//! Query Gateway SDK
//!
//! This crate provides the public contract of the `query_gateway` module:
//!
//! - [`QueryRequest`], [`QueryVariant`], [`HogQLQuery`], [`RefreshHint`] - request models
//! - [`ExecutionMode`], [`ResolvedQuery`], [`EngineRequest`] - execution models
//! - [`QueryResult`], [`HogQLQueryResponse`], [`QueryStatus`] - engine result shapes
//! - [`EngineError`], [`ErrorEnvelope`] - error taxonomy
//! - Collaborator traits the gateway consumes ([`QueryEngineClient`],
//!   [`ConcurrencyLimiter`], [`FeatureSubscriptionClient`], [`FeatureFlagCache`],
//!   [`ExceptionSink`], [`TenantDirectory`], [`ExecutionModeResolver`])
//!
//! ## Usage
//!
//! The host wires its own query engine into the gateway:
//!
//! ```ignore
//! use query_gateway_sdk::{EngineRequest, EngineError, QueryEngineClient, QueryResult};
//!
//! struct MyEngine;
//!
//! #[async_trait::async_trait]
//! impl QueryEngineClient for MyEngine {
//!     async fn execute(&self, request: EngineRequest) -> Result<QueryResult, EngineError> {
//!         // run request.query.query against the warehouse
//!         # unimplemented!()
//!     }
//! }
//! ```

pub mod api;
pub mod error;
pub mod models;

pub use api::{
    ConcurrencyLimiter, ExceptionSink, ExecutionModeResolver, FeatureFlagCache,
    FeatureSubscriptionClient, QueryEngineClient, TenantDirectory,
};
pub use error::{
    ConcurrencyExceeded, EngineError, ErrorEnvelope, ErrorKind, FeatureCacheError,
    SubscriptionError,
};
pub use models::{
    AccessMethod, AdmissionSlot, CallerContext, EngineRequest, ExecutionMode, HogQLQuery,
    HogQLQueryResponse, QueryRequest, QueryResult, QueryStatus, QueryVariant, RefreshHint,
    RefreshMode, ResolvedQuery, Tenant, TenantId,
};
