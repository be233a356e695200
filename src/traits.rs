//! Seams between the monitor and its collaborators
//!
//! The monitor only ever holds `Arc<dyn ...>` handles to these, so tests swap in
//! in-memory stores, canned pages and recording notifiers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{FetchError, MonitorError, NotifyError, StorageError};
use crate::models::{UserWatch, WatchEdit};

/// Loads one page and returns its HTML.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Short strategy name used in logs
    fn name(&self) -> &'static str;

    /// Fetch `url`, classifying every failure as a [`FetchError`].
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// Delivers an already rendered message to a user.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, user_id: &str, text: &str) -> Result<(), NotifyError>;
}

/// Persisted user watches, shared with the command layer.
#[async_trait]
pub trait WatchStore: Send + Sync {
    /// Snapshot of every watch whose active flag is set.
    async fn active_watches(&self) -> Result<Vec<UserWatch>, StorageError>;

    async fn get_watch(&self, user_id: &str) -> Result<Option<UserWatch>, StorageError>;

    /// Applies `edit` to the user's watch (creating the default watch first if
    /// needed) as one read-modify-commit step and returns the stored result.
    async fn update_watch(&self, user_id: &str, edit: WatchEdit) -> Result<UserWatch, MonitorError>;
}

/// Durable per-user ledger of already notified listing URLs.
#[async_trait]
pub trait SeenStore: Send + Sync {
    async fn has(&self, user_id: &str, url: &str) -> Result<bool, StorageError>;

    /// Idempotent: marking twice is the same as marking once.
    async fn mark(&self, user_id: &str, url: &str) -> Result<(), StorageError>;

    /// Drops records notified before `cutoff`, returning how many went away.
    async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, StorageError>;
}
