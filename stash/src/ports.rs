#![deny(clippy::all)]

use crate::domain::{RequestConfig, Response};
use async_trait::async_trait;
use shared::Result;
use std::future::Future;

// Ports are the pluggable extension points: storage backends, the transport
// that performs the network call and the debug logger.

/// Storage shaped like Web Storage (`getItem` / `setItem` / `removeItem`)
#[async_trait]
pub trait ItemStore: Send + Sync + 'static {
    async fn get_item(&self, key: &str) -> Result<Option<String>>;
    async fn set_item(&self, key: &str, value: String) -> Result<()>;
    async fn remove_item(&self, key: &str) -> Result<()>;
}

/// Storage shaped like a map (`get` / `set` / `delete`)
#[async_trait]
pub trait MapStore: Send + Sync + 'static {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: String) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Storage shaped like a cache manager (`get` / `set` / `del`)
#[async_trait]
pub trait ManagerStore: Send + Sync + 'static {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: String) -> Result<()>;
    async fn del(&self, key: &str) -> Result<()>;
}

/// Port for the executor that actually performs the request
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn execute(&self, config: RequestConfig) -> Result<Response>;
}

/// Transport built from an async function, see [`transport_fn`]
#[derive(Clone)]
pub struct TransportFn<F> {
    f: F,
}

/// Use an async function as a transport
pub fn transport_fn<F, Fut>(f: F) -> TransportFn<F>
where
    F: Fn(RequestConfig) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response>> + Send + 'static,
{
    TransportFn { f }
}

#[async_trait]
impl<F, Fut> Transport for TransportFn<F>
where
    F: Fn(RequestConfig) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response>> + Send + 'static,
{
    async fn execute(&self, config: RequestConfig) -> Result<Response> {
        (self.f)(config).await
    }
}

/// Sink for the cache's debug messages
pub trait CacheLogger: Send + Sync + 'static {
    fn log(&self, message: &str);
}

/// Default logger, forwards to `tracing` at debug level
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingLogger;

impl CacheLogger for TracingLogger {
    fn log(&self, message: &str) {
        tracing::debug!(target: "stash::cache", "{}", message);
    }
}
