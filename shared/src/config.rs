use crate::{Error, TtlMs};
use std::str::FromStr;
use tracing::warn;

/// Which backend the embedding application wants behind the cache
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageKind {
    Memory,  // moka, async map-like
    Sled,    // on-disk item store
    DashMap, // in-process manager-like store
}

impl FromStr for StorageKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "moka" => Ok(StorageKind::Memory),
            "sled" | "disk" => Ok(StorageKind::Sled),
            "dashmap" => Ok(StorageKind::DashMap),
            other => Err(Error::Config(format!("unknown storage kind '{}'", other))),
        }
    }
}

pub struct Config {
    pub debug: bool,
    pub parse_headers: bool,
    pub default_ttl: Option<TtlMs>,
    pub storage: StorageKind,
    pub data_dir: String,
    pub timeout_ms: u64,
}

impl Config {
    const DEFAULT_DATA_DIR: &str = "./data/stash";
    const DEFAULT_TIMEOUT_MS: u64 = 30_000;

    pub fn from_env() -> Self {
        let storage = match std::env::var("STASH_STORAGE") {
            Ok(raw) => raw.parse::<StorageKind>().unwrap_or_else(|e| {
                warn!("{}, falling back to in-memory storage", e);
                StorageKind::Memory
            }),
            Err(_) => StorageKind::Memory,
        };

        Self {
            debug: env_flag("STASH_DEBUG"),
            parse_headers: env_flag("STASH_PARSE_HEADERS"),
            default_ttl: std::env::var("STASH_DEFAULT_TTL_MS")
                .ok()
                .and_then(|v| v.trim().parse::<u64>().ok())
                .filter(|ms| *ms > 0)
                .map(TtlMs),
            storage,
            data_dir: std::env::var("STASH_DATA_DIR")
                .unwrap_or_else(|_| Self::DEFAULT_DATA_DIR.to_string()),
            timeout_ms: std::env::var("STASH_TIMEOUT_MS")
                .unwrap_or_else(|_| Self::DEFAULT_TIMEOUT_MS.to_string())
                .parse::<u64>()
                .unwrap_or(Self::DEFAULT_TIMEOUT_MS),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debug: false,
            parse_headers: false,
            default_ttl: None,
            storage: StorageKind::Memory,
            data_dir: Self::DEFAULT_DATA_DIR.to_string(),
            timeout_ms: Self::DEFAULT_TIMEOUT_MS,
        }
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| parse_flag(&v))
        .unwrap_or(false)
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
