use async_trait::async_trait;
use shared::{Error, Result};
use stash::ports::ItemStore;
use std::fmt::Debug;
use std::path::Path;

/// Sled-backed item store; entries survive process restarts.
/// Sled calls are synchronous, so every method completes without suspending
/// except for the flush after a write.
#[derive(Clone)]
pub struct SledItemStore {
    db: sled::Db,
}

impl SledItemStore {
    /// Open (or create) a store at `path`, creating parent directories
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Storage(format!("Failed to create directory: {}", e)))?;
        }

        let db = sled::open(path)
            .map_err(|e| Error::Storage(format!("Failed to open Sled database: {}", e)))?;

        Ok(Self { db })
    }

    /// A throwaway store removed when dropped
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|e| Error::Storage(format!("Failed to open Sled database: {}", e)))?;

        Ok(Self { db })
    }

    pub fn len(&self) -> usize {
        self.db.len()
    }

    pub fn is_empty(&self) -> bool {
        self.db.is_empty()
    }

    async fn flush(&self) -> Result<()> {
        self.db
            .flush_async()
            .await
            .map_err(|e| Error::Storage(format!("Failed to flush database: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl ItemStore for SledItemStore {
    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .db
            .get(key.as_bytes())
            .map_err(|e| Error::Storage(format!("Failed to get item: {}", e)))?;

        match value {
            Some(bytes) => {
                let text = String::from_utf8(bytes.to_vec())
                    .map_err(|e| Error::Storage(format!("Stored item is not UTF-8: {}", e)))?;
                Ok(Some(text))
            }
            None => Ok(None),
        }
    }

    async fn set_item(&self, key: &str, value: String) -> Result<()> {
        self.db
            .insert(key.as_bytes(), value.into_bytes())
            .map_err(|e| Error::Storage(format!("Failed to set item: {}", e)))?;

        self.flush().await
    }

    async fn remove_item(&self, key: &str) -> Result<()> {
        self.db
            .remove(key.as_bytes())
            .map_err(|e| Error::Storage(format!("Failed to remove item: {}", e)))?;

        self.flush().await
    }
}

impl Debug for SledItemStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledItemStore")
            .field("entries", &self.db.len())
            .finish()
    }
}
