//! Query Gateway Module Implementation
//!
//! Runs structured queries on behalf of a tenant: validates the query kind,
//! rejects asynchronous execution modes, applies per-tenant concurrency
//! admission and hands the query to the configured engine.
//!
//! The public contract is defined in `query-gateway-sdk` and re-exported here.

pub use query_gateway_sdk::{
    CallerContext, EngineError, ErrorEnvelope, ErrorKind, QueryEngineClient, QueryRequest,
    QueryResult, Tenant,
};

pub mod module;
pub use module::{QueryGatewayModule, QueryGatewayModuleBuilder};

pub mod config;
pub use config::QueryGatewayConfig;


#[doc(hidden)]
pub mod api;
#[doc(hidden)]
pub mod domain;
#[doc(hidden)]
pub mod infra;
