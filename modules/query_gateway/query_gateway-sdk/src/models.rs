//! Domain models for the query gateway module.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Unique identifier for a tenant.
pub type TenantId = Uuid;

/// Envelope posted to the `run` action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    /// The concrete query, discriminated by its `kind`.
    pub query: QueryVariant,
    /// Caller-supplied correlation id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_query_id: Option<String>,
    /// Execution mode hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh: Option<RefreshHint>,
}

impl QueryRequest {
    #[must_use]
    pub fn new(query: QueryVariant) -> Self {
        Self {
            query,
            client_query_id: None,
            refresh: None,
        }
    }

    #[must_use]
    pub fn with_client_query_id(mut self, id: impl Into<String>) -> Self {
        self.client_query_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_refresh(mut self, refresh: RefreshHint) -> Self {
        self.refresh = Some(refresh);
        self
    }
}

/// Structured query types understood by the query API.
///
/// Only [`QueryVariant::HogQLQuery`] is executable through the gateway; the
/// remaining kinds are recognised so the rejection can name what was sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum QueryVariant {
    HogQLQuery(HogQLQuery),
    EventsQuery(Map<String, Value>),
    TrendsQuery(Map<String, Value>),
    FunnelsQuery(Map<String, Value>),
    ActorsQuery(Map<String, Value>),
    #[serde(other)]
    Unknown,
}

impl QueryVariant {
    /// Wire name of the variant.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::HogQLQuery(_) => "HogQLQuery",
            Self::EventsQuery(_) => "EventsQuery",
            Self::TrendsQuery(_) => "TrendsQuery",
            Self::FunnelsQuery(_) => "FunnelsQuery",
            Self::ActorsQuery(_) => "ActorsQuery",
            Self::Unknown => "Unknown",
        }
    }
}

/// A raw SQL-like query with optional placeholders and modifiers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HogQLQuery {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<Value>,
    /// Named placeholder values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modifiers: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explain: Option<bool>,
}

impl HogQLQuery {
    #[must_use]
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }
}

/// The `refresh` request parameter: either a boolean or a named mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RefreshHint {
    Flag(bool),
    Mode(RefreshMode),
}

/// Named values accepted by the `refresh` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshMode {
    Blocking,
    Async,
    LazyAsync,
    AsyncExceptOnCacheMiss,
    ForceAsync,
    ForceBlocking,
    ForceCache,
}

/// How the engine is allowed to satisfy a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    CalculateBlockingAlways,
    CalculateAsyncAlways,
    RecentCacheCalculateBlockingIfStale,
    RecentCacheCalculateAsyncIfStale,
    RecentCacheCalculateAsyncIfStaleAndBlockingOnMiss,
    CacheOnlyNeverCalculate,
}

impl ExecutionMode {
    /// Modes that may hand back an incomplete result and finish in the background.
    pub const ASYNC_MODES: [Self; 3] = [
        Self::CalculateAsyncAlways,
        Self::RecentCacheCalculateAsyncIfStale,
        Self::RecentCacheCalculateAsyncIfStaleAndBlockingOnMiss,
    ];

    #[must_use]
    pub fn is_async(self) -> bool {
        Self::ASYNC_MODES.contains(&self)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CalculateBlockingAlways => "calculate_blocking_always",
            Self::CalculateAsyncAlways => "calculate_async_always",
            Self::RecentCacheCalculateBlockingIfStale => "recent_cache_calculate_blocking_if_stale",
            Self::RecentCacheCalculateAsyncIfStale => "recent_cache_calculate_async_if_stale",
            Self::RecentCacheCalculateAsyncIfStaleAndBlockingOnMiss => {
                "recent_cache_calculate_async_if_stale_and_blocking_on_miss"
            }
            Self::CacheOnlyNeverCalculate => "cache_only_never_calculate",
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tenant (team) a query runs under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: TenantId,
    /// Organization whose subscription decides feature entitlements.
    /// `None` when the tenant cannot be resolved to an organization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<Uuid>,
    /// Refresh behaviour applied when the request carries no hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_refresh: Option<RefreshHint>,
}

impl Tenant {
    #[must_use]
    pub fn new(id: TenantId, organization_id: Option<Uuid>) -> Self {
        Self {
            id,
            organization_id,
            default_refresh: None,
        }
    }
}

/// How the caller authenticated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessMethod {
    #[default]
    Session,
    PersonalApiKey,
    Oauth,
}

impl AccessMethod {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Session => "session",
            Self::PersonalApiKey => "personal_api_key",
            Self::Oauth => "oauth",
        }
    }
}

/// Identity of the caller, inserted by the host's authentication layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerContext {
    pub subject_id: Uuid,
    pub access_method: AccessMethod,
}

impl CallerContext {
    #[must_use]
    pub fn new(subject_id: Uuid, access_method: AccessMethod) -> Self {
        Self {
            subject_id,
            access_method,
        }
    }

    /// Caller with no identity, authenticated by session.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }
}

/// Output of execution mode resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedQuery {
    pub query: HogQLQuery,
    pub client_query_id: Option<String>,
    pub execution_mode: ExecutionMode,
}

/// Everything the query engine needs to run one query.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineRequest {
    pub tenant: Tenant,
    pub query: HogQLQuery,
    pub execution_mode: ExecutionMode,
    pub client_query_id: Option<String>,
    pub caller: CallerContext,
    /// True when the request came through a personal API key.
    pub is_query_service: bool,
}

/// Progress record attached to results of long-running queries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryStatus {
    pub id: String,
    #[serde(default)]
    pub query_async: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complete: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Typed response produced by engines that return structured objects.
///
/// Serializing it yields the public field names (`hasMore`, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HogQLQueryResponse {
    #[serde(default)]
    pub results: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub types: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hogql: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clickhouse: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timings: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
    #[serde(rename = "hasMore", default, skip_serializing_if = "Option::is_none")]
    pub has_more: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_status: Option<QueryStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modifiers: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explain: Option<Vec<String>>,
}

/// What an engine hands back: a plain mapping or a typed response.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    Mapping(Map<String, Value>),
    Response(Box<HogQLQueryResponse>),
}

impl QueryResult {
    /// Converts the result into a JSON object using the public field names.
    ///
    /// # Errors
    ///
    /// Returns an error if a typed response does not serialize to a JSON object.
    pub fn into_mapping(self) -> Result<Map<String, Value>, serde_json::Error> {
        match self {
            Self::Mapping(map) => Ok(map),
            Self::Response(response) => match serde_json::to_value(*response)? {
                Value::Object(map) => Ok(map),
                other => Err(<serde_json::Error as serde::ser::Error>::custom(format!(
                    "query response serialized to {other} instead of an object"
                ))),
            },
        }
    }
}

impl From<HogQLQueryResponse> for QueryResult {
    fn from(response: HogQLQueryResponse) -> Self {
        Self::Response(Box::new(response))
    }
}

impl From<Map<String, Value>> for QueryResult {
    fn from(map: Map<String, Value>) -> Self {
        Self::Mapping(map)
    }
}

/// Proof of admission returned by a [`crate::ConcurrencyLimiter`].
///
/// The slot is released when this value is dropped.
pub struct AdmissionSlot {
    _guard: Box<dyn Send + Sync>,
}

impl AdmissionSlot {
    #[must_use]
    pub fn new<G>(guard: G) -> Self
    where
        G: Send + Sync + 'static,
    {
        Self {
            _guard: Box::new(guard),
        }
    }
}

impl fmt::Debug for AdmissionSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdmissionSlot").finish_non_exhaustive()
    }
}
