use crate::ports::MapStore;
use async_trait::async_trait;
use moka::future::Cache;
use shared::Result;
use std::fmt::Debug;

/// Moka-based in-process store, the default backend when none is supplied.
/// Entries never expire or get evicted here; expiry is tracked per entry by
/// the storage adapter.
#[derive(Clone)]
pub struct MokaStore {
    cache: Cache<String, String>,
}

impl MokaStore {
    pub fn new() -> Self {
        Self {
            cache: Cache::builder().build(),
        }
    }

    /// Create a named store (the name shows up in moka's diagnostics)
    pub fn named(name: &str) -> Self {
        Self {
            cache: Cache::builder().name(name).build(),
        }
    }

    /// Number of entries, after flushing moka's pending maintenance
    pub async fn entry_count(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }
}

impl Default for MokaStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MapStore for MokaStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.cache.get(key).await)
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        self.cache.insert(key.to_string(), value).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.cache.invalidate(key).await;
        Ok(())
    }
}

impl Debug for MokaStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MokaStore")
            .field("entry_count", &self.cache.entry_count())
            .finish()
    }
}
