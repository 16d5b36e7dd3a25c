//! SQLite-backed [`KvStore`] implementation.
//!
//! One row per cache entry in `cache_entries`, keyed by `(namespace, key)`.
//! Single-key writes are one statement; bounded writes run their eviction
//! and insert inside one transaction.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::store::{KvStore, Record};

async fn connect(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to open cache database {}", db_path.display()))?;

    Ok(pool)
}

/// Create the cache table and its age index. Idempotent.
async fn create_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS cache_entries (
            namespace TEXT NOT NULL,
            key TEXT NOT NULL,
            value_json TEXT NOT NULL,
            timestamp INTEGER NOT NULL,
            PRIMARY KEY (namespace, key)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_cache_entries_age ON cache_entries(namespace, timestamp)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Bounded writes count, evict and insert as one unit. `BEGIN IMMEDIATE`
/// takes the write lock before the count, so two writers queue on the busy
/// timeout instead of one failing on lock upgrade.
async fn begin_immediate(conn: &mut SqliteConnection) -> Result<()> {
    sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;
    Ok(())
}

async fn finish<T>(conn: &mut SqliteConnection, result: Result<T>) -> Result<T> {
    match result {
        Ok(value) => {
            sqlx::query("COMMIT").execute(&mut *conn).await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
                warn!(error = %rollback, "cache rollback failed");
            }
            Err(e)
        }
    }
}

/// Delete the oldest entries of `namespace`, never `spare`, until at most
/// `keep` of them remain. Returns how many were deleted.
async fn evict_oldest(
    conn: &mut SqliteConnection,
    namespace: &str,
    spare: Option<&str>,
    keep: usize,
) -> Result<usize> {
    let spare = spare.unwrap_or_default();
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM cache_entries WHERE namespace = ? AND key != ?",
    )
    .bind(namespace)
    .bind(spare)
    .fetch_one(&mut *conn)
    .await?;

    let excess = (count - keep as i64).max(0);
    if excess > 0 {
        sqlx::query(
            r#"
            DELETE FROM cache_entries
            WHERE namespace = ? AND key IN (
                SELECT key FROM cache_entries
                WHERE namespace = ? AND key != ?
                ORDER BY timestamp ASC, key ASC
                LIMIT ?
            )
            "#,
        )
        .bind(namespace)
        .bind(namespace)
        .bind(spare)
        .bind(excess)
        .execute(&mut *conn)
        .await?;
    }
    Ok(excess as usize)
}

async fn evict_then_insert(
    conn: &mut SqliteConnection,
    namespace: &str,
    key: &str,
    record: &Record,
    capacity: usize,
) -> Result<usize> {
    let evicted = evict_oldest(conn, namespace, Some(key), capacity.saturating_sub(1)).await?;

    sqlx::query(
        r#"
        INSERT INTO cache_entries (namespace, key, value_json, timestamp)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(namespace, key) DO UPDATE SET
            value_json = excluded.value_json,
            timestamp = excluded.timestamp
        "#,
    )
    .bind(namespace)
    .bind(key)
    .bind(record.value.to_string())
    .bind(record.timestamp)
    .execute(&mut *conn)
    .await?;

    Ok(evicted)
}

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to (creating if needed) the database at `path` and make sure
    /// the schema exists.
    pub async fn open(path: &Path) -> Result<Self> {
        let pool = connect(path).await?;
        create_schema(&pool).await?;
        Ok(Self::new(pool))
    }
}

fn decode(value_json: &str, timestamp: i64) -> Result<Record> {
    let value = serde_json::from_str(value_json).context("Corrupt cache entry")?;
    Ok(Record { value, timestamp })
}

#[async_trait]
impl KvStore for SqliteStore {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Record>> {
        let row = sqlx::query(
            "SELECT value_json, timestamp FROM cache_entries WHERE namespace = ? AND key = ?",
        )
        .bind(namespace)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let value_json: String = row.get("value_json");
                let timestamp: i64 = row.get("timestamp");
                decode(&value_json, timestamp).map(Some)
            }
            None => Ok(None),
        }
    }

    async fn upsert(&self, namespace: &str, key: &str, record: Record) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO cache_entries (namespace, key, value_json, timestamp)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(namespace, key) DO UPDATE SET
                value_json = excluded.value_json,
                timestamp = excluded.timestamp
            "#,
        )
        .bind(namespace)
        .bind(key)
        .bind(record.value.to_string())
        .bind(record.timestamp)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_bounded(
        &self,
        namespace: &str,
        key: &str,
        record: Record,
        capacity: usize,
    ) -> Result<usize> {
        let mut conn = self.pool.acquire().await?;
        begin_immediate(&mut conn).await?;
        let result = evict_then_insert(&mut conn, namespace, key, &record, capacity).await;
        finish(&mut conn, result).await
    }

    async fn remove(&self, namespace: &str, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM cache_entries WHERE namespace = ? AND key = ?")
            .bind(namespace)
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn remove_older_than(&self, namespace: &str, cutoff: i64) -> Result<usize> {
        let result = sqlx::query("DELETE FROM cache_entries WHERE namespace = ? AND timestamp < ?")
            .bind(namespace)
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() as usize)
    }

    async fn truncate_oldest(&self, namespace: &str, capacity: usize) -> Result<usize> {
        let mut conn = self.pool.acquire().await?;
        begin_immediate(&mut conn).await?;
        let result = evict_oldest(&mut conn, namespace, None, capacity).await;
        finish(&mut conn, result).await
    }

    async fn len(&self, namespace: &str) -> Result<usize> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM cache_entries WHERE namespace = ?")
                .bind(namespace)
                .fetch_one(&self.pool)
                .await?;
        Ok(count as usize)
    }

    async fn list(&self, namespace: &str) -> Result<Vec<(String, i64)>> {
        let rows = sqlx::query(
            r#"
            SELECT key, timestamp FROM cache_entries
            WHERE namespace = ?
            ORDER BY timestamp DESC, key ASC
            "#,
        )
        .bind(namespace)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| (row.get::<String, _>("key"), row.get::<i64, _>("timestamp")))
            .collect())
    }

    async fn clear(&self, namespace: &str) -> Result<()> {
        sqlx::query("DELETE FROM cache_entries WHERE namespace = ?")
            .bind(namespace)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{SERVERS, SHOWS};
    use tempfile::TempDir;

    fn rec(ts: i64) -> Record {
        Record {
            value: serde_json::json!({ "address": "10.0.0.1", "ts": ts }),
            timestamp: ts,
        }
    }

    async fn open_temp() -> (TempDir, SqliteStore) {
        let tmp = TempDir::new().unwrap();
        let store = SqliteStore::open(&tmp.path().join("data/cache.sqlite"))
            .await
            .unwrap();
        (tmp, store)
    }

    #[tokio::test]
    async fn roundtrips_and_replaces_entries() {
        let (_tmp, store) = open_temp().await;
        store.upsert(SHOWS, "dark|2017", rec(1)).await.unwrap();
        store.upsert(SHOWS, "dark|2017", rec(2)).await.unwrap();
        assert_eq!(store.get(SHOWS, "dark|2017").await.unwrap(), Some(rec(2)));
        assert_eq!(store.len(SHOWS).await.unwrap(), 1);
        assert!(store.get(SERVERS, "dark|2017").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn bounded_upsert_never_exceeds_capacity() {
        let (_tmp, store) = open_temp().await;
        for i in 0..8 {
            store
                .upsert_bounded(SERVERS, &format!("srv{}", i), rec(i), 5)
                .await
                .unwrap();
            assert!(store.len(SERVERS).await.unwrap() <= 5);
        }
        // srv0..srv2 were the oldest
        for i in 0..3 {
            let key = format!("srv{}", i);
            assert!(store.get(SERVERS, &key).await.unwrap().is_none());
        }
        assert!(store.get(SERVERS, "srv7").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn expiry_and_truncation() {
        let (_tmp, store) = open_temp().await;
        for i in 0..4 {
            store
                .upsert(SERVERS, &format!("srv{}", i), rec(i * 10))
                .await
                .unwrap();
        }
        assert_eq!(store.remove_older_than(SERVERS, 10).await.unwrap(), 1);
        assert_eq!(store.truncate_oldest(SERVERS, 2).await.unwrap(), 1);
        assert!(store.get(SERVERS, "srv1").await.unwrap().is_none());
        assert!(store.get(SERVERS, "srv3").await.unwrap().is_some());
        store.remove(SERVERS, "srv3").await.unwrap();
        assert_eq!(store.len(SERVERS).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn reopening_keeps_entries() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cache.sqlite");
        {
            let store = SqliteStore::open(&path).await.unwrap();
            store.upsert(SHOWS, "k", rec(7)).await.unwrap();
        }
        let store = SqliteStore::open(&path).await.unwrap();
        assert_eq!(store.get(SHOWS, "k").await.unwrap(), Some(rec(7)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_bounded_writers_both_succeed() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cache.sqlite");
        let a = SqliteStore::open(&path).await.unwrap();
        let b = SqliteStore::open(&path).await.unwrap();

        let write_all = |store: SqliteStore, prefix: &'static str| async move {
            for i in 0..20 {
                store
                    .upsert_bounded(SERVERS, &format!("{}{}", prefix, i), rec(i), 5)
                    .await
                    .unwrap();
            }
            store
        };
        let (a, b) = tokio::join!(
            tokio::spawn(write_all(a, "a")),
            tokio::spawn(write_all(b, "b"))
        );

        b.unwrap();
        assert_eq!(a.unwrap().len(SERVERS).await.unwrap(), 5);
    }
}
