//! TTL-bounded caches over a [`KvStore`] namespace.
//!
//! [`TtlCache`] is generic over the entry type; the pipeline uses two
//! instances:
//!
//! - [`ShowCache`]: `title|year` → [`ShowCacheEntry`], 7 days, unbounded.
//! - [`ServerCache`]: server id → [`ServerCacheEntry`], 10 minutes, at most
//!   50 entries.
//!
//! Expired entries are dropped lazily when read. The server cache also has
//! an eager [`cleanup`](TtlCache::cleanup) pass that runs at session start.
//! Eviction is by insertion/update time, oldest first, never by access time.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::CacheConfig;
use crate::models::{ServerCacheEntry, ShowCacheEntry};
use crate::store::{self, KvStore, Record};

/// Source of "now" in milliseconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// A clock that only moves when told to.
#[derive(Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start_millis: i64) -> Self {
        Self {
            now: AtomicI64::new(start_millis),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_millis() as i64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Entries carry their own write timestamp.
pub trait Timestamped {
    fn timestamp(&self) -> i64;
}

impl Timestamped for ShowCacheEntry {
    fn timestamp(&self) -> i64 {
        self.timestamp
    }
}

impl Timestamped for ServerCacheEntry {
    fn timestamp(&self) -> i64 {
        self.timestamp
    }
}

pub struct TtlCache<V> {
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    namespace: &'static str,
    ttl: Duration,
    capacity: Option<usize>,
    _entry: PhantomData<fn() -> V>,
}

pub type ShowCache = TtlCache<ShowCacheEntry>;
pub type ServerCache = TtlCache<ServerCacheEntry>;

impl ShowCache {
    pub fn shows(store: Arc<dyn KvStore>, clock: Arc<dyn Clock>, config: &CacheConfig) -> Self {
        TtlCache::new(store, clock, store::SHOWS, config.show_ttl(), None)
    }
}

impl ServerCache {
    pub fn servers(store: Arc<dyn KvStore>, clock: Arc<dyn Clock>, config: &CacheConfig) -> Self {
        TtlCache::new(
            store,
            clock,
            store::SERVERS,
            config.server_ttl(),
            Some(config.server_max_entries),
        )
    }
}

impl<V> TtlCache<V>
where
    V: Serialize + DeserializeOwned + Timestamped,
{
    pub fn new(
        store: Arc<dyn KvStore>,
        clock: Arc<dyn Clock>,
        namespace: &'static str,
        ttl: Duration,
        capacity: Option<usize>,
    ) -> Self {
        Self {
            store,
            clock,
            namespace,
            ttl,
            capacity,
            _entry: PhantomData,
        }
    }

    pub fn now_millis(&self) -> i64 {
        self.clock.now_millis()
    }

    fn is_expired(&self, timestamp: i64, now: i64) -> bool {
        now.saturating_sub(timestamp) > self.ttl.as_millis() as i64
    }

    /// Fresh entry for `key`, or `None` when absent, expired, or unreadable.
    /// Expired and unreadable entries are removed.
    pub async fn get(&self, key: &str) -> Result<Option<V>> {
        let Some(record) = self.store.get(self.namespace, key).await? else {
            return Ok(None);
        };

        let now = self.clock.now_millis();
        if self.is_expired(record.timestamp, now) {
            debug!(namespace = self.namespace, key, "dropping expired cache entry");
            self.store.remove(self.namespace, key).await?;
            return Ok(None);
        }

        match serde_json::from_value::<V>(record.value) {
            Ok(entry) => Ok(Some(entry)),
            Err(e) => {
                warn!(namespace = self.namespace, key, error = %e, "dropping unreadable cache entry");
                self.store.remove(self.namespace, key).await?;
                Ok(None)
            }
        }
    }

    /// Write `entry` under `key`. On a bounded cache the oldest entries are
    /// evicted first, so the namespace never exceeds its capacity.
    pub async fn set(&self, key: &str, entry: &V) -> Result<()> {
        let record = Record {
            value: serde_json::to_value(entry)?,
            timestamp: entry.timestamp(),
        };
        match self.capacity {
            Some(cap) => {
                let evicted = self
                    .store
                    .upsert_bounded(self.namespace, key, record, cap)
                    .await?;
                if evicted > 0 {
                    debug!(namespace = self.namespace, evicted, "evicted oldest cache entries");
                }
            }
            None => self.store.upsert(self.namespace, key, record).await?,
        }
        Ok(())
    }

    /// Drop expired entries, then trim to capacity. Returns how many
    /// entries were removed.
    pub async fn cleanup(&self) -> Result<usize> {
        let cutoff = self.clock.now_millis() - self.ttl.as_millis() as i64;
        let mut removed = self.store.remove_older_than(self.namespace, cutoff).await?;
        if let Some(cap) = self.capacity {
            removed += self.store.truncate_oldest(self.namespace, cap).await?;
        }
        Ok(removed)
    }

    pub async fn len(&self) -> Result<usize> {
        self.store.len(self.namespace).await
    }

    pub async fn clear(&self) -> Result<()> {
        self.store.clear(self.namespace).await
    }
}
