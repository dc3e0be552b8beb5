use async_trait::async_trait;
use dashmap::DashMap;
use shared::Result;
use stash::ports::ManagerStore;
use std::fmt::Debug;
use std::sync::Arc;

/// In-process cache-manager style store over a sharded concurrent map
#[derive(Clone, Default)]
pub struct DashMapStore {
    entries: Arc<DashMap<String, String>>,
}

impl DashMapStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }
}

#[async_trait]
impl ManagerStore for DashMapStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

impl Debug for DashMapStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DashMapStore")
            .field("entries", &self.entries.len())
            .finish()
    }
}
