//! Execution mode resolution.

use query_gateway_sdk::{
    ExecutionMode, ExecutionModeResolver, HogQLQuery, RefreshHint, RefreshMode, ResolvedQuery,
    Tenant,
};

use super::error::DomainError;

/// Message returned when a request resolves to an asynchronous mode.
pub const SYNC_ONLY_MESSAGE: &str = "only sync modes are supported (refresh param)";

/// Maps the `refresh` parameter (falling back to the tenant default) onto an execution mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct RefreshModeResolver;

impl RefreshModeResolver {
    #[must_use]
    pub fn mode_for(refresh: Option<RefreshHint>) -> ExecutionMode {
        match refresh {
            None | Some(RefreshHint::Flag(false) | RefreshHint::Mode(RefreshMode::Blocking)) => {
                ExecutionMode::RecentCacheCalculateBlockingIfStale
            }
            Some(RefreshHint::Flag(true) | RefreshHint::Mode(RefreshMode::ForceBlocking)) => {
                ExecutionMode::CalculateBlockingAlways
            }
            Some(RefreshHint::Mode(RefreshMode::Async)) => {
                ExecutionMode::RecentCacheCalculateAsyncIfStale
            }
            Some(RefreshHint::Mode(RefreshMode::LazyAsync | RefreshMode::AsyncExceptOnCacheMiss)) => {
                ExecutionMode::RecentCacheCalculateAsyncIfStaleAndBlockingOnMiss
            }
            Some(RefreshHint::Mode(RefreshMode::ForceAsync)) => ExecutionMode::CalculateAsyncAlways,
            Some(RefreshHint::Mode(RefreshMode::ForceCache)) => {
                ExecutionMode::CacheOnlyNeverCalculate
            }
        }
    }
}

impl ExecutionModeResolver for RefreshModeResolver {
    fn resolve(
        &self,
        tenant: &Tenant,
        query: HogQLQuery,
        client_query_id: Option<String>,
        refresh: Option<RefreshHint>,
    ) -> ResolvedQuery {
        ResolvedQuery {
            query,
            client_query_id: client_query_id.filter(|id| !id.is_empty()),
            execution_mode: Self::mode_for(refresh.or(tenant.default_refresh)),
        }
    }
}

/// Rejects asynchronous modes; the gateway only answers with finished results.
///
/// # Errors
///
/// Returns [`DomainError::Validation`] for any asynchronous mode.
pub fn ensure_sync(mode: ExecutionMode) -> Result<(), DomainError> {
    if mode.is_async() {
        return Err(DomainError::validation(SYNC_ONLY_MESSAGE));
    }
    Ok(())
}
