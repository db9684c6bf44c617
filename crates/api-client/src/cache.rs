//! Client-side query cache.
//!
//! Results are stored as JSON under a hierarchical key such as
//! `["tasks", "project", "<id>"]`. Invalidating a prefix drops every entry
//! beneath it and bumps a generation counter that views can watch to know
//! when to re-read.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::watch;

pub type QueryKey = Vec<String>;

/// Build a [`QueryKey`] from string parts.
pub fn key<I, S>(parts: I) -> QueryKey
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    parts.into_iter().map(Into::into).collect()
}

#[derive(Clone)]
pub struct QueryCache {
    entries: Arc<Mutex<HashMap<QueryKey, serde_json::Value>>>,
    generation: Arc<watch::Sender<u64>>,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryCache {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(0);
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            generation: Arc::new(tx),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<QueryKey, serde_json::Value>> {
        self.entries.lock().expect("query cache mutex poisoned")
    }

    /// Cached value for `key`, if present and decodable as `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &[String]) -> Option<T> {
        let value = self.entries().get(key).cloned()?;
        serde_json::from_value(value).ok()
    }

    pub fn insert<T: Serialize>(&self, key: QueryKey, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.entries().insert(key, value);
        Ok(())
    }

    /// Return the cached value for `key`, or run `loader` and cache its result.
    ///
    /// A result whose load overlapped an invalidation is returned but not
    /// stored, so a stale read never outlives the change that triggered it.
    pub async fn fetch<T, F, Fut>(&self, key: QueryKey, loader: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(hit) = self.get(&key) {
            return Ok(hit);
        }

        let started = self.generation();
        let value = loader().await?;
        if self.generation() == started {
            self.insert(key, &value)?;
        }
        Ok(value)
    }

    /// Drop every entry whose key starts with `prefix` and notify watchers.
    /// Returns how many entries were removed.
    pub fn invalidate(&self, prefix: &[String]) -> usize {
        let removed = {
            let mut entries = self.entries();
            let before = entries.len();
            entries.retain(|key, _| !key.starts_with(prefix));
            before - entries.len()
        };
        self.generation.send_modify(|g| *g += 1);
        tracing::debug!(prefix = ?prefix, removed, "query cache invalidated");
        removed
    }

    pub fn generation(&self) -> u64 {
        *self.generation.borrow()
    }

    /// Receiver that changes whenever anything is invalidated.
    pub fn subscribe_generation(&self) -> watch::Receiver<u64> {
        self.generation.subscribe()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn fetch_loads_once_until_invalidated() {
        let cache = QueryCache::new();
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let load = move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, anyhow::Error>(vec!["a".to_string()])
        };

        let first: Vec<String> = cache.fetch(key(["tasks", "recent"]), load).await.unwrap();
        let second: Vec<String> = cache.fetch(key(["tasks", "recent"]), load).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        cache.invalidate(&key(["tasks"]));
        let _: Vec<String> = cache.fetch(key(["tasks", "recent"]), load).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn invalidate_matches_prefix_only() {
        let cache = QueryCache::new();
        cache.insert(key(["tasks", "project", "p1"]), &1).unwrap();
        cache.insert(key(["tasks", "project", "p2"]), &2).unwrap();
        cache.insert(key(["projects"]), &3).unwrap();

        assert_eq!(cache.invalidate(&key(["tasks", "project", "p1"])), 1);
        assert_eq!(cache.get::<i32>(&key(["tasks", "project", "p2"])), Some(2));
        assert_eq!(cache.invalidate(&key(["tasks"])), 1);
        assert_eq!(cache.get::<i32>(&key(["projects"])), Some(3));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn watchers_see_generation_bumps() {
        let cache = QueryCache::new();
        let mut rx = cache.subscribe_generation();
        assert_eq!(*rx.borrow(), 0);

        cache.invalidate(&key(["teams"]));
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), 1);
        assert_eq!(cache.generation(), 1);
    }

    #[tokio::test]
    async fn load_racing_an_invalidation_is_not_cached() {
        let cache = QueryCache::new();
        let racer = cache.clone();
        let value: i32 = cache
            .fetch(key(["projects"]), || async move {
                racer.invalidate(&key(["projects"]));
                Ok::<_, anyhow::Error>(7)
            })
            .await
            .unwrap();
        assert_eq!(value, 7);
        assert!(cache.is_empty());
    }
}
