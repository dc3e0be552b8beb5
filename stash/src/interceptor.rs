use crate::domain::{RequestConfig, Response};
use crate::ports::{CacheLogger, TracingLogger, Transport};
use crate::storage::{StorageAdapter, StorageBackend};
use crate::ttl::{self, CachingDecision};
use async_trait::async_trait;
use shared::config::Config;
use shared::{Result, TtlMs};
use std::fmt;
use std::sync::Arc;

const LOG_PREFIX: &str = "[stash-cache]";

/// Per-interceptor cache settings
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheOptions {
    pub debug: bool,
    pub parse_headers: bool,
    pub default_ttl: Option<TtlMs>,
}

impl CacheOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            debug: config.debug,
            parse_headers: config.parse_headers,
            default_ttl: config.default_ttl,
        }
    }
}

/// Serves eligible GET requests from storage and stores cacheable responses
/// produced by the wrapped transport.
pub struct CacheInterceptor<T> {
    transport: Arc<T>,
    storage: StorageAdapter,
    logger: Arc<dyn CacheLogger>,
    options: CacheOptions,
}

impl<T> Clone for CacheInterceptor<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            storage: self.storage.clone(),
            logger: Arc::clone(&self.logger),
            options: self.options,
        }
    }
}

impl<T: Transport> CacheInterceptor<T> {
    /// Interceptor over the default in-memory store, logging through `tracing`
    pub fn new(transport: T, options: CacheOptions) -> Self {
        CacheInterceptorBuilder::new().options(options).build(transport)
    }

    pub fn storage(&self) -> &StorageAdapter {
        &self.storage
    }

    pub fn options(&self) -> &CacheOptions {
        &self.options
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Run one request through the cache
    pub async fn execute(&self, config: RequestConfig) -> Result<Response> {
        let is_get = config.is_get();
        let url = config.uri();

        if is_get {
            if let Some(cached) = self.storage.get(&url).await? {
                if self.options.debug {
                    self.logger.log(&format!(
                        "{} serving cached response for url: {}",
                        LOG_PREFIX, url
                    ));
                }
                return Ok(cached.into_response(config));
            }
        }

        let directive = config.cache;
        let response = self.transport.execute(config).await?;

        let decision = ttl::resolve(
            directive,
            self.options.default_ttl,
            self.options.parse_headers,
            &response.headers,
        );

        match decision {
            CachingDecision::CacheFor(ttl) if is_get => {
                if self.options.debug {
                    self.logger.log(&format!(
                        "{} caching response for url: {} with TTL: {}",
                        LOG_PREFIX, url, ttl
                    ));
                }
                self.storage.set(&url, &response, ttl).await?;
            }
            _ => {}
        }

        Ok(response)
    }

    /// Drop any cached response for this request's URL
    pub async fn invalidate(&self, config: &RequestConfig) -> Result<()> {
        self.storage.delete(&config.uri()).await
    }
}

// An interceptor is itself a transport, so caches can wrap other layers
#[async_trait]
impl<T: Transport> Transport for CacheInterceptor<T> {
    async fn execute(&self, config: RequestConfig) -> Result<Response> {
        CacheInterceptor::execute(self, config).await
    }
}

impl<T> fmt::Debug for CacheInterceptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheInterceptor")
            .field("storage", &self.storage)
            .field("options", &self.options)
            .finish()
    }
}

/// Builder for [`CacheInterceptor`]; storage defaults to an in-memory moka
/// store and the logger to [`TracingLogger`]
#[derive(Default)]
pub struct CacheInterceptorBuilder {
    options: CacheOptions,
    storage: Option<StorageBackend>,
    logger: Option<Arc<dyn CacheLogger>>,
}

impl CacheInterceptorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn options(mut self, options: CacheOptions) -> Self {
        self.options = options;
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.options.debug = debug;
        self
    }

    pub fn parse_headers(mut self, parse_headers: bool) -> Self {
        self.options.parse_headers = parse_headers;
        self
    }

    pub fn default_ttl(mut self, ttl: TtlMs) -> Self {
        self.options.default_ttl = Some(ttl);
        self
    }

    pub fn storage(mut self, backend: StorageBackend) -> Self {
        self.storage = Some(backend);
        self
    }

    pub fn logger(mut self, logger: Arc<dyn CacheLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn build<T: Transport>(self, transport: T) -> CacheInterceptor<T> {
        let storage = match self.storage {
            Some(backend) => StorageAdapter::new(backend),
            None => StorageAdapter::in_memory(),
        };

        CacheInterceptor {
            transport: Arc::new(transport),
            storage,
            logger: self.logger.unwrap_or_else(|| Arc::new(TracingLogger)),
            options: self.options,
        }
    }
}
