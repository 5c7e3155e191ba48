//! Feature entitlements backed by configuration.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use query_gateway_sdk::{FeatureSubscriptionClient, SubscriptionError};
use uuid::Uuid;

use crate::config::OrganizationEntitlements;

/// [`FeatureSubscriptionClient`] answering from a fixed entitlement table.
///
/// Organizations without an entry have no features.
#[derive(Debug, Default, Clone)]
pub struct StaticFeatureSubscription {
    entitlements: HashMap<Uuid, HashSet<String>>,
}

impl StaticFeatureSubscription {
    #[must_use]
    pub fn new(entitlements: impl IntoIterator<Item = OrganizationEntitlements>) -> Self {
        let mut table: HashMap<Uuid, HashSet<String>> = HashMap::new();
        for entry in entitlements {
            table
                .entry(entry.organization_id)
                .or_default()
                .extend(entry.features);
        }
        Self {
            entitlements: table,
        }
    }
}

#[async_trait]
impl FeatureSubscriptionClient for StaticFeatureSubscription {
    async fn is_feature_enabled(
        &self,
        organization_id: Uuid,
        feature: &str,
    ) -> Result<bool, SubscriptionError> {
        Ok(self
            .entitlements
            .get(&organization_id)
            .is_some_and(|features| features.contains(feature)))
    }
}
