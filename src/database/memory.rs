//! In-process store used in tests and for dry runs

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::error::{MonitorError, StorageError};
use crate::models::{UserWatch, WatchEdit};
use crate::traits::{SeenStore, WatchStore};

#[derive(Default)]
struct State {
    watches: BTreeMap<String, UserWatch>,
    seen: HashMap<(String, String), DateTime<Utc>>,
}

/// Both store traits over a mutex-guarded map. Clones share the same state.
#[derive(Clone)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
    max_sites: usize,
}

impl MemoryStore {
    pub fn new(max_sites: usize) -> Self {
        Self {
            state: Arc::default(),
            max_sites,
        }
    }

    /// Store pre-seeded with the given watches.
    pub fn with_watches(max_sites: usize, watches: impl IntoIterator<Item = UserWatch>) -> Self {
        let watches = watches
            .into_iter()
            .map(|w| (w.user_id.clone(), w))
            .collect();

        Self {
            state: Arc::new(Mutex::new(State {
                watches,
                seen: HashMap::new(),
            })),
            max_sites,
        }
    }

    pub async fn seen_count(&self, user_id: &str) -> usize {
        self.state
            .lock()
            .await
            .seen
            .keys()
            .filter(|(user, _)| user == user_id)
            .count()
    }
}

#[async_trait]
impl WatchStore for MemoryStore {
    async fn active_watches(&self) -> Result<Vec<UserWatch>, StorageError> {
        let state = self.state.lock().await;
        Ok(state.watches.values().filter(|w| w.active).cloned().collect())
    }

    async fn get_watch(&self, user_id: &str) -> Result<Option<UserWatch>, StorageError> {
        Ok(self.state.lock().await.watches.get(user_id).cloned())
    }

    async fn update_watch(&self, user_id: &str, edit: WatchEdit) -> Result<UserWatch, MonitorError> {
        let mut state = self.state.lock().await;

        let mut watch = state
            .watches
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| UserWatch::new(user_id));
        watch.apply(&edit, self.max_sites)?;

        state.watches.insert(user_id.to_string(), watch.clone());
        Ok(watch)
    }
}

#[async_trait]
impl SeenStore for MemoryStore {
    async fn has(&self, user_id: &str, url: &str) -> Result<bool, StorageError> {
        let key = (user_id.to_string(), url.to_string());
        Ok(self.state.lock().await.seen.contains_key(&key))
    }

    async fn mark(&self, user_id: &str, url: &str) -> Result<(), StorageError> {
        self.state
            .lock()
            .await
            .seen
            .entry((user_id.to_string(), url.to_string()))
            .or_insert_with(Utc::now);
        Ok(())
    }

    async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, StorageError> {
        let mut state = self.state.lock().await;
        let before = state.seen.len();
        state.seen.retain(|_, notified_at| *notified_at >= cutoff);
        Ok((before - state.seen.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn marks_are_idempotent() {
        let store = MemoryStore::new(5);
        store.mark("u", "https://a/1").await.unwrap();
        store.mark("u", "https://a/1").await.unwrap();

        assert!(store.has("u", "https://a/1").await.unwrap());
        assert_eq!(store.seen_count("u").await, 1);
    }

    #[tokio::test]
    async fn prune_keeps_recent_marks() {
        let store = MemoryStore::new(5);
        store.mark("u", "https://a/1").await.unwrap();
        store.state.lock().await.seen.insert(
            ("u".to_string(), "https://a/old".to_string()),
            Utc::now() - Duration::days(10),
        );

        let removed = store
            .prune_older_than(Utc::now() - Duration::days(1))
            .await
            .unwrap();

        assert_eq!(removed, 1);
        assert!(store.has("u", "https://a/1").await.unwrap());
    }

    #[tokio::test]
    async fn inactive_watches_are_hidden_from_snapshot() {
        let paused = UserWatch {
            active: false,
            ..UserWatch::new("paused")
        };
        let store = MemoryStore::with_watches(5, [UserWatch::new("live"), paused]);

        let active = store.active_watches().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].user_id, "live");
    }
}
