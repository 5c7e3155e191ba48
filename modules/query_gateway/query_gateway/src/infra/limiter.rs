//! Per-tenant in-flight query limiter.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use query_gateway_sdk::{AdmissionSlot, ConcurrencyExceeded, ConcurrencyLimiter, TenantId};
use tokio::sync::Semaphore;

/// Non-blocking [`ConcurrencyLimiter`] backed by one semaphore per tenant.
///
/// Acquisition never waits: a tenant at its limit is rejected immediately.
/// Slots are returned when the [`AdmissionSlot`] is dropped.
pub struct InMemoryConcurrencyLimiter {
    max_concurrent: usize,
    semaphores: DashMap<TenantId, Arc<Semaphore>>,
}

impl InMemoryConcurrencyLimiter {
    #[must_use]
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            max_concurrent,
            semaphores: DashMap::new(),
        }
    }

    #[must_use]
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Number of slots currently held by `tenant_id`.
    #[must_use]
    pub fn in_use(&self, tenant_id: TenantId) -> usize {
        self.semaphores.get(&tenant_id).map_or(0, |sem| {
            self.max_concurrent.saturating_sub(sem.available_permits())
        })
    }

    fn semaphore(&self, tenant_id: TenantId) -> Arc<Semaphore> {
        self.semaphores
            .entry(tenant_id)
            .or_insert_with(|| Arc::new(Semaphore::new(self.max_concurrent)))
            .clone()
    }
}

#[async_trait]
impl ConcurrencyLimiter for InMemoryConcurrencyLimiter {
    async fn acquire(&self, tenant_id: TenantId) -> Result<AdmissionSlot, ConcurrencyExceeded> {
        let permit = self.semaphore(tenant_id).try_acquire_owned().map_err(|_| {
            ConcurrencyExceeded::new(format!(
                "Team {tenant_id} exceeded maximum concurrency limit: {}",
                self.max_concurrent
            ))
        })?;

        Ok(AdmissionSlot::new(permit))
    }
}
