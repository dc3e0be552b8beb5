//! Concrete storage backends for the stash cache, one per backend shape.

use shared::Result;
use shared::config::{Config, StorageKind};
use stash::storage::{MokaStore, StorageBackend, CACHE_NAMESPACE};
use std::path::Path;
use tracing::info;

pub mod dashmap_store;
pub mod sled_store;

pub use dashmap_store::DashMapStore;
pub use sled_store::SledItemStore;

/// Build the backend selected by configuration
pub fn backend_from_config(config: &Config) -> Result<StorageBackend> {
    let backend = match config.storage {
        StorageKind::Memory => StorageBackend::map(MokaStore::named(CACHE_NAMESPACE)),
        StorageKind::DashMap => StorageBackend::manager(DashMapStore::new()),
        StorageKind::Sled => {
            let path = Path::new(&config.data_dir).join("responses.sled");
            StorageBackend::item(SledItemStore::open(&path)?)
        }
    };

    info!("Using {} cache storage ({:?})", backend.shape(), config.storage);
    Ok(backend)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_from_config_shapes() {
        let temp_dir = tempfile::tempdir().unwrap();

        let mut config = Config {
            data_dir: temp_dir.path().to_string_lossy().into_owned(),
            ..Config::default()
        };
        assert_eq!(backend_from_config(&config).unwrap().shape(), "map-like");

        config.storage = StorageKind::DashMap;
        assert_eq!(backend_from_config(&config).unwrap().shape(), "manager-like");

        config.storage = StorageKind::Sled;
        assert_eq!(backend_from_config(&config).unwrap().shape(), "item-store");
        assert!(temp_dir.path().join("responses.sled").exists());
    }
}
