//! HTTP response cache: serves eligible GET requests from a pluggable
//! key/value backend and stores fresh responses under a resolved TTL.

pub mod domain;
pub mod interceptor;
pub mod ports;
pub mod storage;
pub mod ttl;

pub use domain::{
    CacheDirective, CacheEntry, Headers, RequestConfig, RequestHandle, Response, StoredConfig,
    StoredResponse,
};
pub use interceptor::{CacheInterceptor, CacheInterceptorBuilder, CacheOptions};
pub use ports::{
    CacheLogger, ItemStore, ManagerStore, MapStore, TracingLogger, Transport, TransportFn,
    transport_fn,
};
pub use storage::{CACHE_NAMESPACE, MokaStore, StorageAdapter, StorageBackend};
pub use ttl::CachingDecision;

pub use shared::{Error, Result, TtlMs};
