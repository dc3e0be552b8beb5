// shared/src/lib.rs

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Boxed error as produced by a transport executor
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("transport: {0}")]
    Transport(#[source] BoxError),
    #[error("storage: {0}")]
    Storage(String),
    #[error("malformed cache entry: {0}")]
    MalformedEntry(String),
    #[error("serialization: {0}")]
    Serialization(String),
    #[error("config: {0}")]
    Config(String),
}

impl Error {
    /// Wrap any transport failure without interpreting it
    pub fn transport(err: impl Into<BoxError>) -> Self {
        Error::Transport(err.into())
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_))
    }

    /// Recover the original transport error, if this is one
    pub fn into_transport(self) -> Option<BoxError> {
        match self {
            Error::Transport(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Time-to-live in milliseconds
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TtlMs(pub u64);

impl TtlMs {
    pub fn from_secs(secs: u64) -> Self {
        TtlMs(secs.saturating_mul(1000))
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }
}

impl From<Duration> for TtlMs {
    fn from(d: Duration) -> Self {
        TtlMs(d.as_millis().min(u64::MAX as u128) as u64)
    }
}

impl std::fmt::Display for TtlMs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub mod clock;
pub mod config;
