//! Error taxonomy for the monitor pipeline
//!
//! Each failure class gets its own enum so the caller decides the policy at the
//! call site: fetch failures are retried next cycle, parse failures skip a
//! single listing or site, storage failures only affect one notify step.

use thiserror::Error;

/// A page could not be loaded. Never aborts anything beyond one (user, site) pair.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("timed out fetching {url}")]
    Timeout { url: String },

    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("transport failure fetching {url}: {message}")]
    Transport { url: String, message: String },

    #[error("render failure for {url}: {message}")]
    Render { url: String, message: String },
}

impl FetchError {
    pub fn url(&self) -> &str {
        match self {
            Self::Timeout { url }
            | Self::Status { url, .. }
            | Self::Transport { url, .. }
            | Self::Render { url, .. } => url,
        }
    }
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid base url {url}: {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid selector {selector}: {message}")]
    Selector { selector: String, message: String },
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("could not (de)serialize stored value: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Rejected at the watch write boundary.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("a watch can follow at most {max} sites")]
    TooManySites { max: usize },

    #[error("invalid price range: min {min} is greater than max {max}")]
    InvalidPriceRange { min: i64, max: i64 },

    #[error("not an http(s) url: {0}")]
    InvalidSiteUrl(String),

    #[error("no site at position {0}")]
    NoSuchSite(usize),

    #[error("invalid value for {var}: {message}")]
    Env { var: String, message: String },
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification transport failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("notification rejected ({status}): {description}")]
    Rejected { status: u16, description: String },
}

/// Everything that can go wrong while evaluating one (user, site) pair or a cycle.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Notify(#[from] NotifyError),
}

impl From<sqlx::Error> for MonitorError {
    fn from(err: sqlx::Error) -> Self {
        Self::Storage(StorageError::Database(err))
    }
}
