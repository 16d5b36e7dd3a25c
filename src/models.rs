//! Core data types that flow through the resolution pipeline.
//!
//! These types represent what the page shows, who it is about, and what
//! the caches remember about it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// What the current page view is about, derived fresh on every run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContext {
    pub title: Option<String>,
    pub year: Option<u32>,
    /// Opaque metadata locator, e.g. `/library/metadata/123`.
    pub plex_key: Option<String>,
    pub href: String,
}

impl PageContext {
    /// Dedup key for this context. The metadata key wins because it
    /// tells seasons and episodes of the same show apart.
    pub fn identity_key(&self) -> PageIdentityKey {
        match &self.plex_key {
            Some(key) => PageIdentityKey::PlexKey(key.clone()),
            None => PageIdentityKey::TitleYear(title_year_key(
                self.title.as_deref().unwrap_or_default(),
                self.year,
            )),
        }
    }

    /// Show cache key, `None` when the page has no title to key on.
    pub fn show_cache_key(&self) -> Option<String> {
        self.title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .map(|t| title_year_key(t, self.year))
    }
}

/// Show cache key for pages whose title has not rendered yet.
pub fn show_id_cache_key(show_id: u64) -> String {
    format!("tmdb:{}", show_id)
}

fn title_year_key(title: &str, year: Option<u32>) -> String {
    let title = title.trim().to_lowercase();
    match year {
        Some(y) => format!("{}|{}", title, y),
        None => title,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PageIdentityKey {
    PlexKey(String),
    TitleYear(String),
}

impl fmt::Display for PageIdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageIdentityKey::PlexKey(k) => write!(f, "key:{}", k),
            PageIdentityKey::TitleYear(k) => write!(f, "title:{}", k),
        }
    }
}

/// External catalog ids for the current view. Only `show_id` is required
/// for a usable result; the rest narrows it down to a season or episode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolvedIdentity {
    pub show_id: Option<u64>,
    pub season_id: Option<u64>,
    pub season_number: Option<u32>,
    pub episode_number: Option<u32>,
}

impl ResolvedIdentity {
    pub fn has_season_context(&self) -> bool {
        self.season_number.is_some() || self.episode_number.is_some()
    }

    /// Fill the season and episode fields this identity lacks from
    /// `other`, never overriding a value already present.
    pub fn fill_missing_from(&mut self, other: &ResolvedIdentity) {
        if self.season_number.is_none() {
            self.season_number = other.season_number;
        }
        if self.episode_number.is_none() {
            self.episode_number = other.episode_number;
        }
        if self.season_id.is_none() {
            self.season_id = other.season_id;
        }
    }
}

/// Season number to provider season id.
pub type SeasonMap = BTreeMap<u32, u64>;

/// Cached rating lookup for one show, keyed by title and year, or by
/// [`show_id_cache_key`] when the page had no title.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShowCacheEntry {
    pub show_id: u64,
    pub url: String,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub season_map: Option<SeasonMap>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

/// Cached connection details for one media server, keyed by server id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerCacheEntry {
    pub address: String,
    pub port: u16,
    pub scheme: String,
    #[serde(default)]
    pub local_addresses: Option<Vec<String>>,
    #[serde(default)]
    pub server_name: Option<String>,
    pub timestamp: i64,
}

impl ServerCacheEntry {
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.address, self.port)
    }
}

/// Where and with what credentials metadata requests go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerContext {
    pub base_url: String,
    pub token: String,
    pub server_id: Option<String>,
}

/// What the badge shows and links to.
#[derive(Debug, Clone, PartialEq)]
pub struct Badge {
    pub url: String,
    /// Five-point display value.
    pub rating: Option<f64>,
}

impl Badge {
    pub fn label(&self) -> String {
        match self.rating {
            Some(r) => format!("{:.1}/5", r),
            None => "No rating yet".to_string(),
        }
    }
}
