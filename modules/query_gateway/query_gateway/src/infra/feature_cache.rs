//! In-memory feature flag cache.

use async_trait::async_trait;
use dashmap::DashMap;
use query_gateway_sdk::{FeatureCacheError, FeatureFlagCache};

/// Process-local [`FeatureFlagCache`]. Entries never expire; [`clear`] drops them all.
///
/// [`clear`]: FeatureFlagCache::clear
#[derive(Debug, Default)]
pub struct InMemoryFeatureFlagCache {
    entries: DashMap<String, bool>,
}

impl InMemoryFeatureFlagCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl FeatureFlagCache for InMemoryFeatureFlagCache {
    async fn get(&self, key: &str) -> Result<Option<bool>, FeatureCacheError> {
        Ok(self.entries.get(key).map(|entry| *entry.value()))
    }

    async fn set(&self, key: &str, enabled: bool) -> Result<(), FeatureCacheError> {
        self.entries.insert(key.to_owned(), enabled);
        Ok(())
    }

    async fn clear(&self) -> Result<(), FeatureCacheError> {
        self.entries.clear();
        Ok(())
    }
}
