//! External rating lookup.
//!
//! The provider's show page embeds one JSON script block carrying the
//! average rating on a 10-point scale and the show's season listing.
//! [`parse_rating_page`] digs both out; [`RatingResolver`] turns proxy
//! responses into a [`RatingOutcome`] the pipeline can cache.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::SkipReason;
use crate::models::SeasonMap;
use crate::proxy::FetchProxy;

static SCRIPT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b([^>]*)>(.*?)</script>").expect("valid script regex")
});

/// What a provider page yielded. Either half may be missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RatingPage {
    pub rating_out_of_10: Option<f64>,
    pub season_map: Option<SeasonMap>,
}

impl RatingPage {
    /// Five-point value rounded to one decimal.
    pub fn display_rating(&self) -> Option<f64> {
        self.rating_out_of_10.map(to_display_rating)
    }
}

pub fn to_display_rating(out_of_10: f64) -> f64 {
    (out_of_10 / 2.0 * 10.0).round() / 10.0
}

fn is_data_block(attrs: &str) -> bool {
    let attrs = attrs.to_ascii_lowercase();
    attrs.contains("__next_data__")
        || attrs.contains("application/json")
        || attrs.contains("application/ld+json")
}

/// JSON payloads embedded in the page, `__NEXT_DATA__` first.
fn data_blocks(html: &str) -> Vec<Value> {
    let mut blocks: Vec<(bool, Value)> = SCRIPT_RE
        .captures_iter(html)
        .filter(|caps| is_data_block(&caps[1]))
        .filter_map(|caps| {
            let next = caps[1].contains("__NEXT_DATA__");
            serde_json::from_str(caps[2].trim()).ok().map(|v| (next, v))
        })
        .collect();
    blocks.sort_by_key(|(next, _)| !*next);
    blocks.into_iter().map(|(_, v)| v).collect()
}

fn find_average_rating(value: &Value) -> Option<f64> {
    match value {
        Value::Object(map) => {
            if let Some(rating) = map.get("averageRating").and_then(number) {
                return Some(rating);
            }
            map.values().find_map(find_average_rating)
        }
        Value::Array(items) => items.iter().find_map(find_average_rating),
        _ => None,
    }
}

/// Numbers sometimes arrive as strings.
fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn season_entry(value: &Value) -> Option<(u32, u64)> {
    let obj = value.as_object()?;
    let season = number(obj.get("seasonNumber")?)?;
    let id = number(obj.get("id")?)?;
    if season < 0.0 || id < 0.0 {
        return None;
    }
    Some((season as u32, id as u64))
}

fn find_season_map(value: &Value) -> Option<SeasonMap> {
    match value {
        Value::Array(items) => {
            let map: SeasonMap = items.iter().filter_map(season_entry).collect();
            if !map.is_empty() {
                return Some(map);
            }
            items.iter().find_map(find_season_map)
        }
        Value::Object(map) => map.values().find_map(find_season_map),
        _ => None,
    }
}

/// Extract the rating and season listing from a provider show page.
/// Never fails; an unusable page gives an empty [`RatingPage`].
pub fn parse_rating_page(html: &str) -> RatingPage {
    let blocks = data_blocks(html);
    RatingPage {
        rating_out_of_10: blocks.iter().find_map(find_average_rating),
        season_map: blocks.iter().find_map(find_season_map),
    }
}

/// Rating lookup result. `rating: None` is a valid "no rating yet".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RatingOutcome {
    pub rating: Option<f64>,
    pub rating_out_of_10: Option<f64>,
    pub season_map: Option<SeasonMap>,
}

pub struct RatingResolver {
    proxy: Arc<dyn FetchProxy>,
}

impl RatingResolver {
    pub fn new(proxy: Arc<dyn FetchProxy>) -> Self {
        Self { proxy }
    }

    /// Ask the proxy for a show's rating. A failed request is retryable;
    /// a successful response without a rating is a partial outcome.
    pub async fn resolve(&self, show_id: u64) -> Result<RatingOutcome, SkipReason> {
        let response = self
            .proxy
            .fetch_external_rating(show_id)
            .await
            .map_err(|e| SkipReason::Network(e.to_string()))?;

        if !response.success {
            let reason = response
                .error
                .unwrap_or_else(|| "rating fetch failed".to_string());
            warn!(show_id, %reason, "rating fetch failed");
            return Err(SkipReason::Network(reason));
        }

        let rating = response
            .rating
            .or_else(|| response.rating_out_of_10.map(to_display_rating));
        debug!(show_id, ?rating, "rating resolved");

        Ok(RatingOutcome {
            rating,
            rating_out_of_10: response.rating_out_of_10,
            season_map: response.season_map.filter(|m| !m.is_empty()),
        })
    }
}
