//! Tenant lookup backed by configuration.

use std::collections::HashMap;

use async_trait::async_trait;
use query_gateway_sdk::{Tenant, TenantDirectory, TenantId};

/// [`TenantDirectory`] over a fixed set of tenants.
#[derive(Debug, Default, Clone)]
pub struct StaticTenantDirectory {
    tenants: HashMap<TenantId, Tenant>,
}

impl StaticTenantDirectory {
    /// Builds the directory. Later entries win on duplicate ids.
    #[must_use]
    pub fn new(tenants: impl IntoIterator<Item = Tenant>) -> Self {
        Self {
            tenants: tenants.into_iter().map(|t| (t.id, t)).collect(),
        }
    }
}

#[async_trait]
impl TenantDirectory for StaticTenantDirectory {
    async fn find_tenant(&self, tenant_id: TenantId) -> Option<Tenant> {
        self.tenants.get(&tenant_id).cloned()
    }
}
