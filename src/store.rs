//! Key-scoped persistent store.
//!
//! The [`KvStore`] trait is the only way the caches touch persistent
//! state. Every mutation addresses a single key (or, for
//! [`upsert_bounded`](KvStore::upsert_bounded), runs eviction and insert
//! as one atomic step), so two writers in the same namespace can never
//! clobber each other's unrelated entries.
//!
//! Two namespaces are used: [`SHOWS`] and [`SERVERS`].
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`get`](KvStore::get) | Read one entry |
//! | [`upsert`](KvStore::upsert) | Insert or replace one entry |
//! | [`upsert_bounded`](KvStore::upsert_bounded) | Evict oldest, then insert, atomically |
//! | [`remove`](KvStore::remove) | Delete one entry |
//! | [`remove_older_than`](KvStore::remove_older_than) | Drop expired entries |
//! | [`truncate_oldest`](KvStore::truncate_oldest) | Trim to capacity |
//! | [`len`](KvStore::len) | Entry count in a namespace |
//! | [`list`](KvStore::list) | Keys and ages, for reporting |
//! | [`clear`](KvStore::clear) | Drop a namespace |

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use crate::config::Config;
use crate::sqlite_store::SqliteStore;

pub const SHOWS: &str = "cached_shows";
pub const SERVERS: &str = "cached_servers";

/// A stored value with the timestamp eviction and expiry are based on.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub value: serde_json::Value,
    /// Insertion or last-update time, milliseconds since the Unix epoch.
    pub timestamp: i64,
}

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Record>>;

    async fn upsert(&self, namespace: &str, key: &str, record: Record) -> Result<()>;

    /// Insert or replace `key`, first evicting the oldest other entries so
    /// that the namespace holds at most `capacity` entries afterwards.
    ///
    /// Returns the number of evicted entries.
    async fn upsert_bounded(
        &self,
        namespace: &str,
        key: &str,
        record: Record,
        capacity: usize,
    ) -> Result<usize>;

    async fn remove(&self, namespace: &str, key: &str) -> Result<()>;

    /// Remove every entry whose timestamp is strictly older than `cutoff`.
    async fn remove_older_than(&self, namespace: &str, cutoff: i64) -> Result<usize>;

    /// Evict oldest-first until at most `capacity` entries remain.
    async fn truncate_oldest(&self, namespace: &str, capacity: usize) -> Result<usize>;

    async fn len(&self, namespace: &str) -> Result<usize>;

    /// Keys with their timestamps, newest first.
    async fn list(&self, namespace: &str) -> Result<Vec<(String, i64)>>;

    async fn clear(&self, namespace: &str) -> Result<()>;
}

/// In-memory store for tests and for running without a database file.
pub struct MemoryStore {
    namespaces: Mutex<HashMap<String, HashMap<String, Record>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            namespaces: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Keys of `entries` ordered oldest first; ties broken by key so eviction
/// is deterministic.
fn oldest_first<'a>(entries: impl Iterator<Item = (&'a String, &'a Record)>) -> Vec<String> {
    let mut keyed: Vec<(i64, &String)> = entries.map(|(k, r)| (r.timestamp, k)).collect();
    keyed.sort();
    keyed.into_iter().map(|(_, k)| k.clone()).collect()
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Record>> {
        let namespaces = self.namespaces.lock().unwrap();
        Ok(namespaces.get(namespace).and_then(|ns| ns.get(key)).cloned())
    }

    async fn upsert(&self, namespace: &str, key: &str, record: Record) -> Result<()> {
        let mut namespaces = self.namespaces.lock().unwrap();
        namespaces
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), record);
        Ok(())
    }

    async fn upsert_bounded(
        &self,
        namespace: &str,
        key: &str,
        record: Record,
        capacity: usize,
    ) -> Result<usize> {
        let mut namespaces = self.namespaces.lock().unwrap();
        let ns = namespaces.entry(namespace.to_string()).or_default();

        let others = ns.iter().filter(|(k, _)| k.as_str() != key);
        let victims = oldest_first(others);
        let keep = capacity.saturating_sub(1);
        let excess = victims.len().saturating_sub(keep);
        for victim in victims.iter().take(excess) {
            ns.remove(victim);
        }

        ns.insert(key.to_string(), record);
        Ok(excess)
    }

    async fn remove(&self, namespace: &str, key: &str) -> Result<()> {
        let mut namespaces = self.namespaces.lock().unwrap();
        if let Some(ns) = namespaces.get_mut(namespace) {
            ns.remove(key);
        }
        Ok(())
    }

    async fn remove_older_than(&self, namespace: &str, cutoff: i64) -> Result<usize> {
        let mut namespaces = self.namespaces.lock().unwrap();
        let Some(ns) = namespaces.get_mut(namespace) else {
            return Ok(0);
        };
        let before = ns.len();
        ns.retain(|_, r| r.timestamp >= cutoff);
        Ok(before - ns.len())
    }

    async fn truncate_oldest(&self, namespace: &str, capacity: usize) -> Result<usize> {
        let mut namespaces = self.namespaces.lock().unwrap();
        let Some(ns) = namespaces.get_mut(namespace) else {
            return Ok(0);
        };
        let victims = oldest_first(ns.iter());
        let excess = victims.len().saturating_sub(capacity);
        for victim in victims.iter().take(excess) {
            ns.remove(victim);
        }
        Ok(excess)
    }

    async fn len(&self, namespace: &str) -> Result<usize> {
        let namespaces = self.namespaces.lock().unwrap();
        Ok(namespaces.get(namespace).map(|ns| ns.len()).unwrap_or(0))
    }

    async fn list(&self, namespace: &str) -> Result<Vec<(String, i64)>> {
        let namespaces = self.namespaces.lock().unwrap();
        let mut entries: Vec<(String, i64)> = namespaces
            .get(namespace)
            .map(|ns| ns.iter().map(|(k, r)| (k.clone(), r.timestamp)).collect())
            .unwrap_or_default();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Ok(entries)
    }

    async fn clear(&self, namespace: &str) -> Result<()> {
        let mut namespaces = self.namespaces.lock().unwrap();
        namespaces.remove(namespace);
        Ok(())
    }
}

/// The store named by `[store]`: SQLite when a path is configured,
/// otherwise in-memory.
pub async fn open_store(config: &Config) -> Result<Arc<dyn KvStore>> {
    match &config.store.path {
        Some(path) => {
            debug!(path = %path.display(), "opening sqlite store");
            Ok(Arc::new(SqliteStore::open(path).await?))
        }
        None => Ok(Arc::new(MemoryStore::new())),
    }
}
