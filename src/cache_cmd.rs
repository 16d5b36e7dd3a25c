//! `plexbadge cache` subcommands: inspect, expire and clear the caches.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};

use crate::cache::{Clock, ServerCache, ShowCache, SystemClock};
use crate::config::Config;
use crate::store::{self, open_store, KvStore};

const LISTED_ENTRIES: usize = 10;

fn store_label(config: &Config) -> String {
    match &config.store.path {
        Some(path) => path.display().to_string(),
        None => "in-memory (no [store] path configured)".to_string(),
    }
}

/// Print entry counts, expired counts and the newest keys per cache.
pub async fn run_cache_stats(config: &Config) -> Result<()> {
    let store = open_store(config).await?;
    let now = SystemClock.now_millis();

    println!("plexbadge — Cache Stats");
    println!("=======================");
    println!();
    println!("  Store:       {}", store_label(config));

    let namespaces = [
        ("Shows", store::SHOWS, config.cache.show_ttl(), None),
        (
            "Servers",
            store::SERVERS,
            config.cache.server_ttl(),
            Some(config.cache.server_max_entries),
        ),
    ];

    for (label, namespace, ttl, capacity) in namespaces {
        let entries = store.list(namespace).await?;
        let expired = entries
            .iter()
            .filter(|(_, ts)| now - ts > ttl.as_millis() as i64)
            .count();

        println!();
        let cap = capacity
            .map(|c| format!(", cap {}", c))
            .unwrap_or_default();
        println!(
            "  {} ({}, ttl {}{})",
            label,
            namespace,
            format_duration(ttl),
            cap
        );
        println!("    Entries:   {}", entries.len());
        println!("    Expired:   {}", expired);

        if !entries.is_empty() {
            println!("    {:<40} {}", "KEY", "WRITTEN");
            println!("    {}", "-".repeat(60));
            for (key, ts) in entries.iter().take(LISTED_ENTRIES) {
                println!("    {:<40} {}", key, format_ts_relative(ts / 1000, now / 1000));
            }
            if entries.len() > LISTED_ENTRIES {
                println!("    ... and {} more", entries.len() - LISTED_ENTRIES);
            }
        }
    }

    println!();
    Ok(())
}

/// Drop expired entries from both caches and trim the server cache.
pub async fn run_cache_cleanup(config: &Config) -> Result<()> {
    let store = open_store(config).await?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let shows = ShowCache::shows(store.clone(), clock.clone(), &config.cache);
    let servers = ServerCache::servers(store, clock, &config.cache);

    let removed_shows = shows.cleanup().await?;
    let removed_servers = servers.cleanup().await?;

    println!("Removed {} show entries.", removed_shows);
    println!("Removed {} server entries.", removed_servers);
    Ok(())
}

/// Clear one cache (`shows` or `servers`) or both.
pub async fn run_cache_clear(config: &Config, only: Option<&str>) -> Result<()> {
    let namespaces: &[&str] = match only {
        None => &[store::SHOWS, store::SERVERS],
        Some("shows") => &[store::SHOWS],
        Some("servers") => &[store::SERVERS],
        Some(other) => bail!("Unknown cache '{}'. Use 'shows' or 'servers'.", other),
    };

    let store = open_store(config).await?;
    clear(store.as_ref(), namespaces).await
}

async fn clear(store: &dyn KvStore, namespaces: &[&str]) -> Result<()> {
    for namespace in namespaces {
        let count = store.len(namespace).await?;
        store.clear(namespace).await?;
        println!("Cleared {} entries from {}.", count, namespace);
    }
    Ok(())
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs % 86400 == 0 {
        format!("{}d", secs / 86400)
    } else if secs % 3600 == 0 {
        format!("{}h", secs / 3600)
    } else if secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{}s", secs)
    }
}

/// Format a Unix timestamp relative to `now` (e.g. "3 hours ago").
fn format_ts_relative(ts: i64, now: i64) -> String {
    let delta = now - ts;

    if delta < 0 {
        return format_ts_iso(ts);
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
