mod transport;

use clap::Parser;
use futures::future::join_all;
use shared::config::Config;
use stash::{CacheDirective, CacheInterceptor, CacheInterceptorBuilder, CacheOptions, RequestConfig};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use transport::ReqwestTransport;

/// Fetch URLs through the stash response cache
#[derive(Parser, Debug)]
#[command(name = "stash-fetch")]
#[command(about = "Fetch URLs through a TTL-based HTTP response cache")]
#[command(version)]
struct Cli {
    /// URLs to fetch
    #[arg(required = true)]
    urls: Vec<String>,

    /// Cache responses for this many milliseconds, ignoring Cache-Control
    #[arg(long)]
    ttl: Option<u64>,

    /// Never store these responses
    #[arg(long, conflicts_with = "ttl")]
    no_cache: bool,

    /// How many times to fetch each URL
    #[arg(long, default_value_t = 2)]
    repeat: usize,

    /// Derive TTLs from Cache-Control (overrides STASH_PARSE_HEADERS)
    #[arg(long)]
    parse_headers: bool,

    /// Log cache hits and stores (overrides STASH_DEBUG)
    #[arg(long)]
    debug: bool,

    /// Drop any cached entry for each URL before fetching
    #[arg(long)]
    invalidate: bool,
}

impl Cli {
    fn directive(&self) -> Option<CacheDirective> {
        if self.no_cache {
            Some(CacheDirective::Enabled(false))
        } else {
            self.ttl.map(CacheDirective::Ttl)
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load environment variables
    let dotenv = dotenvy::dotenv();

    let mut config = Config::from_env();
    config.debug |= cli.debug;
    config.parse_headers |= cli.parse_headers;

    // Initialize tracing
    let default_filter = if config.debug { "info,stash::cache=debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    match dotenv {
        Ok(_) => info!("Loaded environment variables from .env file"),
        Err(_) => info!("No .env file found, using system environment variables"),
    }

    let backend = storage_engine::backend_from_config(&config)?;
    let transport = ReqwestTransport::new(Duration::from_millis(config.timeout_ms))?;

    let interceptor = CacheInterceptorBuilder::new()
        .options(CacheOptions::from_config(&config))
        .storage(backend)
        .build(transport);

    if let Some(ttl) = config.default_ttl {
        info!("Default TTL: {} ms", ttl);
    }

    let directive = cli.directive();
    let fetches = cli.urls.iter().map(|url| {
        let request = RequestConfig {
            cache: directive,
            ..RequestConfig::get(url.clone())
        };
        fetch_repeatedly(&interceptor, request, cli.repeat, cli.invalidate)
    });

    let failures = join_all(fetches).await.into_iter().filter(|ok| !ok).count();
    if failures > 0 {
        warn!("{} of {} URLs failed", failures, cli.urls.len());
        std::process::exit(1);
    }

    Ok(())
}

async fn fetch_repeatedly(
    interceptor: &CacheInterceptor<ReqwestTransport>,
    request: RequestConfig,
    repeat: usize,
    invalidate: bool,
) -> bool {
    let url = request.uri();

    if invalidate {
        if let Err(e) = interceptor.invalidate(&request).await {
            warn!("Failed to invalidate {}: {}", url, e);
        }
    }

    for attempt in 1..=repeat.max(1) {
        let started = Instant::now();
        match interceptor.execute(request.clone()).await {
            Ok(response) => {
                // only live responses carry a transport handle
                let source = if response.request.is_some() { "network" } else { "cache" };
                info!(
                    "[{}/{}] {} -> {} {} ({} bytes, {}, {:?})",
                    attempt,
                    repeat.max(1),
                    url,
                    response.status,
                    response.status_text,
                    response.data.len(),
                    source,
                    started.elapsed(),
                );
            }
            Err(e) => {
                error!("{} failed: {}", url, e);
                return false;
            }
        }
    }

    true
}
