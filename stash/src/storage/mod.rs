use crate::domain::{CacheEntry, Response, StoredResponse};
use crate::ports::{ItemStore, ManagerStore, MapStore};
use shared::clock::current_timestamp_ms;
use shared::{Error, Result, TtlMs};
use std::fmt;
use std::sync::Arc;
use tracing::warn;

pub mod memory;

pub use memory::MokaStore;

/// Prefix isolating our keys from unrelated data in a shared backend
pub const CACHE_NAMESPACE: &str = "stash-cache";

/// A storage backend, classified by shape once at construction
#[derive(Clone)]
pub enum StorageBackend {
    Item(Arc<dyn ItemStore>),
    Map(Arc<dyn MapStore>),
    Manager(Arc<dyn ManagerStore>),
}

impl StorageBackend {
    pub fn item(store: impl ItemStore) -> Self {
        StorageBackend::Item(Arc::new(store))
    }

    pub fn map(store: impl MapStore) -> Self {
        StorageBackend::Map(Arc::new(store))
    }

    pub fn manager(store: impl ManagerStore) -> Self {
        StorageBackend::Manager(Arc::new(store))
    }

    pub fn shape(&self) -> &'static str {
        match self {
            StorageBackend::Item(_) => "item-store",
            StorageBackend::Map(_) => "map-like",
            StorageBackend::Manager(_) => "manager-like",
        }
    }

    async fn read(&self, key: &str) -> Result<Option<String>> {
        match self {
            StorageBackend::Item(store) => store.get_item(key).await,
            StorageBackend::Map(store) => store.get(key).await,
            StorageBackend::Manager(store) => store.get(key).await,
        }
    }

    async fn write(&self, key: &str, value: String) -> Result<()> {
        match self {
            StorageBackend::Item(store) => store.set_item(key, value).await,
            StorageBackend::Map(store) => store.set(key, value).await,
            StorageBackend::Manager(store) => store.set(key, value).await,
        }
    }

    async fn remove(&self, key: &str) -> Result<()> {
        match self {
            StorageBackend::Item(store) => store.remove_item(key).await,
            StorageBackend::Map(store) => store.delete(key).await,
            StorageBackend::Manager(store) => store.del(key).await,
        }
    }
}

impl From<Arc<dyn ItemStore>> for StorageBackend {
    fn from(store: Arc<dyn ItemStore>) -> Self {
        StorageBackend::Item(store)
    }
}

impl From<Arc<dyn MapStore>> for StorageBackend {
    fn from(store: Arc<dyn MapStore>) -> Self {
        StorageBackend::Map(store)
    }
}

impl From<Arc<dyn ManagerStore>> for StorageBackend {
    fn from(store: Arc<dyn ManagerStore>) -> Self {
        StorageBackend::Manager(store)
    }
}

impl fmt::Debug for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StorageBackend").field(&self.shape()).finish()
    }
}

/// Uniform get/set/delete of cached responses over any backend shape.
/// Values are JSON-encoded [`CacheEntry`]s stored under `stash-cache::<url>`.
#[derive(Clone, Debug)]
pub struct StorageAdapter {
    backend: StorageBackend,
}

impl StorageAdapter {
    pub fn new(backend: StorageBackend) -> Self {
        Self { backend }
    }

    /// Adapter over a fresh in-process moka store
    pub fn in_memory() -> Self {
        Self::new(StorageBackend::map(MokaStore::named(CACHE_NAMESPACE)))
    }

    pub fn backend(&self) -> &StorageBackend {
        &self.backend
    }

    pub fn cache_key(url: &str) -> String {
        format!("{}::{}", CACHE_NAMESPACE, url)
    }

    /// Fetch a live entry. Expired entries are removed and reported as a miss.
    pub async fn get(&self, url: &str) -> Result<Option<StoredResponse>> {
        let key = Self::cache_key(url);
        let Some(raw) = self.backend.read(&key).await? else {
            return Ok(None);
        };

        let entry: CacheEntry = serde_json::from_str(&raw)
            .map_err(|e| Error::MalformedEntry(format!("{}: {}", key, e)))?;

        if entry.is_expired_at(current_timestamp_ms()) {
            if let Err(e) = self.backend.remove(&key).await {
                warn!("Failed to evict expired cache entry '{}': {}", key, e);
            }
            return Ok(None);
        }

        Ok(Some(entry.value))
    }

    /// Store a response for `ttl`. The transport handle and all config but
    /// the headers are dropped before encoding.
    pub async fn set(&self, url: &str, response: &Response, ttl: TtlMs) -> Result<()> {
        let entry = CacheEntry::new(StoredResponse::from(response), current_timestamp_ms(), ttl);
        let raw = serde_json::to_string(&entry)?;
        self.backend.write(&Self::cache_key(url), raw).await
    }

    pub async fn delete(&self, url: &str) -> Result<()> {
        self.backend.remove(&Self::cache_key(url)).await
    }
}

impl Default for StorageAdapter {
    fn default() -> Self {
        Self::in_memory()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RequestConfig;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::{Duration, sleep};

    /// Synchronous item store over a plain map
    #[derive(Default)]
    struct LocalItemStore {
        items: Mutex<HashMap<String, String>>,
    }

    impl LocalItemStore {
        fn raw(&self, key: &str) -> Option<String> {
            self.items.lock().unwrap().get(key).cloned()
        }

        fn insert_raw(&self, key: &str, value: &str) {
            self.items
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
        }
    }

    #[async_trait]
    impl ItemStore for LocalItemStore {
        async fn get_item(&self, key: &str) -> Result<Option<String>> {
            Ok(self.raw(key))
        }

        async fn set_item(&self, key: &str, value: String) -> Result<()> {
            self.items.lock().unwrap().insert(key.to_string(), value);
            Ok(())
        }

        async fn remove_item(&self, key: &str) -> Result<()> {
            self.items.lock().unwrap().remove(key);
            Ok(())
        }
    }

    /// Manager-like store that suspends on every call and can refuse deletes
    #[derive(Default)]
    struct SlowManagerStore {
        inner: LocalItemStore,
        fail_deletes: bool,
        deletes: AtomicUsize,
    }

    #[async_trait]
    impl ManagerStore for SlowManagerStore {
        async fn get(&self, key: &str) -> Result<Option<String>> {
            tokio::task::yield_now().await;
            Ok(self.inner.raw(key))
        }

        async fn set(&self, key: &str, value: String) -> Result<()> {
            tokio::task::yield_now().await;
            self.inner.set_item(key, value).await
        }

        async fn del(&self, key: &str) -> Result<()> {
            tokio::task::yield_now().await;
            self.deletes.fetch_add(1, Ordering::SeqCst);
            if self.fail_deletes {
                return Err(Error::Storage("delete refused".to_string()));
            }
            self.inner.remove_item(key).await
        }
    }

    fn sample_response() -> Response {
        let config = RequestConfig::get("test/")
            .with_header("Accept", "application/json")
            .with_cache(100u64);
        Response::new(200, r#"{"value":"testValue"}"#)
            .with_status_text("OK")
            .with_header("content-type", "application/json")
            .with_config(config)
            .with_request(Arc::new(String::from("in-flight request")))
    }

    #[test]
    fn test_cache_key_uses_namespace() {
        assert_eq!(StorageAdapter::cache_key("test/"), "stash-cache::test/");
    }

    #[tokio::test]
    async fn test_set_writes_entry_with_expiration() {
        let store = Arc::new(LocalItemStore::default());
        let adapter = StorageAdapter::new(StorageBackend::Item(store.clone()));
        let response = sample_response();

        let before = current_timestamp_ms();
        adapter.set("test/", &response, TtlMs(100)).await.unwrap();
        let after = current_timestamp_ms();

        let raw = store.raw("stash-cache::test/").unwrap();
        let entry: CacheEntry = serde_json::from_str(&raw).unwrap();
        let expiration = entry.expires_at().unwrap() as u64;
        assert!(expiration >= before + 100 && expiration <= after + 100);
        assert_eq!(entry.value, StoredResponse::from(&response));
    }

    #[tokio::test]
    async fn test_round_trip_then_expire() {
        let store = Arc::new(LocalItemStore::default());
        let adapter = StorageAdapter::new(StorageBackend::Item(store.clone()));
        let response = sample_response();

        adapter.set("test/", &response, TtlMs(50)).await.unwrap();

        let cached = adapter.get("test/").await.unwrap().unwrap();
        assert_eq!(cached, StoredResponse::from(&response));
        assert_eq!(cached.data, response.data);
        assert_eq!(cached.config.headers.get("accept"), Some("application/json"));

        sleep(Duration::from_millis(80)).await;

        assert!(adapter.get("test/").await.unwrap().is_none());
        assert!(store.raw("stash-cache::test/").is_none());
    }

    #[tokio::test]
    async fn test_get_missing_key() {
        let adapter = StorageAdapter::in_memory();
        assert!(adapter.get("nothing/").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_map_backend_round_trip_and_delete() {
        let adapter = StorageAdapter::default();
        let response = sample_response();

        adapter.set("test/", &response, TtlMs(10_000)).await.unwrap();
        assert!(adapter.get("test/").await.unwrap().is_some());

        adapter.delete("test/").await.unwrap();
        assert!(adapter.get("test/").await.unwrap().is_none());

        // deleting again is not an error
        adapter.delete("test/").await.unwrap();
    }

    #[tokio::test]
    async fn test_manager_backend_awaits_async_calls() {
        let store = Arc::new(SlowManagerStore::default());
        let adapter = StorageAdapter::new(StorageBackend::Manager(store.clone()));

        adapter.set("test/", &sample_response(), TtlMs(10_000)).await.unwrap();
        assert!(adapter.get("test/").await.unwrap().is_some());

        adapter.delete("test/").await.unwrap();
        assert_eq!(store.deletes.load(Ordering::SeqCst), 1);
        assert!(adapter.get("test/").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_eviction_is_still_a_miss() {
        let store = Arc::new(SlowManagerStore {
            fail_deletes: true,
            ..Default::default()
        });
        let adapter = StorageAdapter::new(StorageBackend::Manager(store.clone()));

        adapter.set("test/", &sample_response(), TtlMs(1)).await.unwrap();
        sleep(Duration::from_millis(20)).await;

        assert!(adapter.get("test/").await.unwrap().is_none());
        assert_eq!(store.deletes.load(Ordering::SeqCst), 1);
        assert!(store.inner.raw("stash-cache::test/").is_some());
    }

    #[tokio::test]
    async fn test_malformed_entry_is_an_error() {
        let store = Arc::new(LocalItemStore::default());
        store.insert_raw("stash-cache::test/", "not json at all");
        let adapter = StorageAdapter::new(StorageBackend::Item(store));

        let result = adapter.get("test/").await;
        assert!(matches!(result, Err(Error::MalformedEntry(_))));
    }

    #[tokio::test]
    async fn test_entry_without_expiration_never_expires() {
        let store = Arc::new(LocalItemStore::default());
        store.insert_raw("stash-cache::test/", r#"{"value":{"status":204}}"#);
        let adapter = StorageAdapter::new(StorageBackend::Item(store));

        let cached = adapter.get("test/").await.unwrap().unwrap();
        assert_eq!(cached.status, 204);
        assert!(cached.data.is_empty());
    }

    #[tokio::test]
    async fn test_expiration_decoded_leniently() {
        let store = Arc::new(MokaStore::new());
        let adapter = StorageAdapter::new(StorageBackend::Map(store.clone()));
        let key = StorageAdapter::cache_key("u");

        // a negative timestamp is a number in the past
        store
            .set(&key, r#"{"expiration":-5,"value":{"status":200}}"#.to_string())
            .await
            .unwrap();
        assert!(adapter.get("u").await.unwrap().is_none());
        assert!(store.get(&key).await.unwrap().is_none());

        for expiration in ["4102444800000.5", r#""soon""#] {
            store
                .set(
                    &key,
                    format!(r#"{{"expiration":{},"value":{{"status":200}}}}"#, expiration),
                )
                .await
                .unwrap();
            let cached = adapter.get("u").await.unwrap();
            assert_eq!(cached.map(|r| r.status), Some(200), "expiration {}", expiration);
        }
    }

    #[test]
    fn test_backend_shape() {
        assert_eq!(StorageBackend::item(LocalItemStore::default()).shape(), "item-store");
        assert_eq!(StorageBackend::map(MokaStore::new()).shape(), "map-like");
        assert_eq!(
            StorageBackend::manager(SlowManagerStore::default()).shape(),
            "manager-like"
        );
    }
}
