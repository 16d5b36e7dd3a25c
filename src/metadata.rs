//! Plex metadata records and the catalog ids they carry.
//!
//! A metadata response is a `MediaContainer` whose first `Video` or
//! `Directory` child is the item itself. Catalog ids appear in three places:
//! the item's `guid` attribute, its `<Guid id="..."/>` children, and the
//! `parentGuid` / `grandparentGuid` attributes of seasons and episodes.
//!
//! Which field answers which question depends on the item type:
//!
//! | type    | show id          | season id        | season no.    | episode no. |
//! |---------|------------------|------------------|---------------|-------------|
//! | show    | own guid         | –                | –             | –           |
//! | season  | `parentGuid`     | own guid         | `index`       | –           |
//! | episode | `grandparentGuid`| `parentGuid`     | `parentIndex` | `index`     |
//! | movie   | not resolved     |                  |               |             |
//!
//! Legacy agent guids (`com.plexapp.agents.themoviedb://1399/2/5?lang=en`)
//! lead with the show id whatever the item is, so they are only trusted for
//! the show column.

use std::collections::HashMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

use crate::models::ResolvedIdentity;

const METADATA_PREFIX: &str = "/library/metadata/";
const TMDB_SCHEME: &str = "tmdb://";
const LEGACY_TMDB_SCHEME: &str = "com.plexapp.agents.themoviedb://";

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("malformed metadata XML: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaKind {
    Show,
    Season,
    Episode,
    Movie,
    Other(String),
}

impl MediaKind {
    fn from_type(value: &str) -> Self {
        match value {
            "show" => MediaKind::Show,
            "season" => MediaKind::Season,
            "episode" => MediaKind::Episode,
            "movie" => MediaKind::Movie,
            other => MediaKind::Other(other.to_string()),
        }
    }

    pub fn is_season_or_episode(&self) -> bool {
        matches!(self, MediaKind::Season | MediaKind::Episode)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataRecord {
    pub kind: MediaKind,
    pub title: Option<String>,
    pub rating_key: Option<String>,
    pub index: Option<u32>,
    pub parent_index: Option<u32>,
    pub guid: Option<String>,
    pub parent_guid: Option<String>,
    pub grandparent_guid: Option<String>,
    pub parent_key: Option<String>,
    pub parent_rating_key: Option<String>,
    pub grandparent_key: Option<String>,
    pub grandparent_rating_key: Option<String>,
    /// `id` values of the item's `<Guid>` children.
    pub guids: Vec<String>,
}

impl MetadataRecord {
    fn from_attributes(mut attrs: HashMap<String, String>) -> Self {
        let mut take = |name: &str| attrs.remove(name).filter(|v| !v.is_empty());
        let kind = MediaKind::from_type(&take("type").unwrap_or_default());
        Self {
            kind,
            title: take("title"),
            rating_key: take("ratingKey"),
            index: take("index").and_then(|v| v.parse().ok()),
            parent_index: take("parentIndex").and_then(|v| v.parse().ok()),
            guid: take("guid"),
            parent_guid: take("parentGuid"),
            grandparent_guid: take("grandparentGuid"),
            parent_key: take("parentKey"),
            parent_rating_key: take("parentRatingKey"),
            grandparent_key: take("grandparentKey"),
            grandparent_rating_key: take("grandparentRatingKey"),
            guids: Vec::new(),
        }
    }

    /// Catalog id of the item itself, modern guids only.
    fn own_tmdb_id(&self) -> Option<u64> {
        self.guids
            .iter()
            .chain(self.guid.iter())
            .find_map(|g| tmdb_id(g))
    }

    fn own_show_id(&self) -> Option<u64> {
        self.guids
            .iter()
            .chain(self.guid.iter())
            .find_map(|g| show_catalog_id(g))
    }

    /// Apply the per-type decision table. Movies and unknown types resolve
    /// to an empty identity.
    pub fn identity(&self) -> ResolvedIdentity {
        match self.kind {
            MediaKind::Show => ResolvedIdentity {
                show_id: self.own_show_id(),
                ..Default::default()
            },
            MediaKind::Season => ResolvedIdentity {
                show_id: self.parent_guid.as_deref().and_then(show_catalog_id),
                season_id: self.own_tmdb_id(),
                season_number: self.index,
                episode_number: None,
            },
            MediaKind::Episode => ResolvedIdentity {
                show_id: self.grandparent_guid.as_deref().and_then(show_catalog_id),
                season_id: self.parent_guid.as_deref().and_then(tmdb_id),
                season_number: self.parent_index,
                episode_number: self.index,
            },
            MediaKind::Movie | MediaKind::Other(_) => ResolvedIdentity::default(),
        }
    }

    pub fn own_key(&self) -> Option<String> {
        self.rating_key
            .as_ref()
            .map(|k| format!("{}{}", METADATA_PREFIX, k))
    }

    /// Related records that may carry the show id this one lacks:
    /// grandparent first, then parent.
    pub fn fallback_keys(&self) -> Vec<String> {
        let candidates = [
            related_key(&self.grandparent_key, &self.grandparent_rating_key),
            related_key(&self.parent_key, &self.parent_rating_key),
        ];
        let own = self.own_key();
        let mut keys: Vec<String> = Vec::new();
        for key in candidates.into_iter().flatten() {
            if Some(&key) != own.as_ref() && !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }
}

fn related_key(key: &Option<String>, rating_key: &Option<String>) -> Option<String> {
    key.as_deref()
        .and_then(normalize_metadata_key)
        .or_else(|| {
            rating_key
                .as_deref()
                .and_then(|k| normalize_metadata_key(&format!("{}{}", METADATA_PREFIX, k)))
        })
}

/// `/library/metadata/<id>` with any trailing sub-path (`/children`, query)
/// removed.
pub fn normalize_metadata_key(raw: &str) -> Option<String> {
    let rest = raw.strip_prefix(METADATA_PREFIX)?;
    let id: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    (!id.is_empty()).then(|| format!("{}{}", METADATA_PREFIX, id))
}

fn leading_number(s: &str) -> Option<u64> {
    let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// `tmdb://1399` → `1399`.
pub fn tmdb_id(uri: &str) -> Option<u64> {
    uri.strip_prefix(TMDB_SCHEME).and_then(leading_number)
}

/// Show-level id from a modern or legacy TMDB guid.
pub fn show_catalog_id(uri: &str) -> Option<u64> {
    tmdb_id(uri).or_else(|| {
        uri.strip_prefix(LEGACY_TMDB_SCHEME)
            .and_then(leading_number)
    })
}

pub(crate) fn attributes(e: &BytesStart<'_>) -> HashMap<String, String> {
    e.attributes()
        .flatten()
        .filter_map(|a| {
            let key = String::from_utf8_lossy(a.key.local_name().as_ref()).into_owned();
            a.unescape_value().ok().map(|v| (key, v.into_owned()))
        })
        .collect()
}

fn is_item(name: &[u8]) -> bool {
    matches!(name, b"Video" | b"Directory")
}

/// Parse the first item of a metadata response. `Ok(None)` when the
/// container is empty.
pub fn parse_metadata(xml: &str) -> Result<Option<MetadataRecord>, MetadataError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut record: Option<MetadataRecord> = None;
    let mut depth = 0usize;
    let mut record_depth: Option<usize> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                depth += 1;
                let name = e.local_name();
                match record.as_mut() {
                    None if is_item(name.as_ref()) => {
                        record = Some(MetadataRecord::from_attributes(attributes(&e)));
                        record_depth = Some(depth);
                    }
                    Some(r) if name.as_ref() == b"Guid" => {
                        r.guids.extend(attributes(&e).remove("id"));
                    }
                    _ => {}
                }
            }
            Ok(Event::Empty(e)) => {
                let name = e.local_name();
                match record.as_mut() {
                    None if is_item(name.as_ref()) => {
                        record = Some(MetadataRecord::from_attributes(attributes(&e)));
                        break;
                    }
                    Some(r) if name.as_ref() == b"Guid" => {
                        r.guids.extend(attributes(&e).remove("id"));
                    }
                    _ => {}
                }
            }
            Ok(Event::End(_)) => {
                if record_depth == Some(depth) {
                    break;
                }
                depth = depth.saturating_sub(1);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(MetadataError::Malformed(e.to_string())),
            _ => {}
        }
    }

    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPISODE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<MediaContainer size="1" librarySectionID="2">
  <Video ratingKey="4821" key="/library/metadata/4821" parentRatingKey="4800" grandparentRatingKey="4700"
         guid="plex://episode/5d9c" parentGuid="tmdb://200" grandparentGuid="tmdb://100"
         type="episode" title="Lost and Found" parentIndex="2" index="5"
         parentKey="/library/metadata/4800" grandparentKey="/library/metadata/4700">
    <Media id="1"><Part id="2" file="/tv/s02e05.mkv"/></Media>
    <Guid id="imdb://tt0000001"/>
    <Guid id="tmdb://987654"/>
  </Video>
</MediaContainer>"#;

    #[test]
    fn episode_decision_table() {
        let record = parse_metadata(EPISODE).unwrap().unwrap();
        assert_eq!(record.kind, MediaKind::Episode);
        assert_eq!(record.guids.len(), 2);
        assert_eq!(
            record.identity(),
            ResolvedIdentity {
                show_id: Some(100),
                season_id: Some(200),
                season_number: Some(2),
                episode_number: Some(5),
            }
        );
    }

    #[test]
    fn season_decision_table() {
        let xml = r#"<MediaContainer><Directory ratingKey="4800" type="season" index="2"
            parentGuid="tmdb://100" guid="plex://season/abc"><Guid id="tmdb://200"/></Directory></MediaContainer>"#;
        let record = parse_metadata(xml).unwrap().unwrap();
        assert_eq!(
            record.identity(),
            ResolvedIdentity {
                show_id: Some(100),
                season_id: Some(200),
                season_number: Some(2),
                episode_number: None,
            }
        );
    }

    #[test]
    fn show_decision_table_with_legacy_guid() {
        let xml = r#"<MediaContainer><Directory ratingKey="4700" type="show" title="Dark"
            guid="com.plexapp.agents.themoviedb://70523?lang=en"/></MediaContainer>"#;
        let record = parse_metadata(xml).unwrap().unwrap();
        assert_eq!(record.identity().show_id, Some(70523));
        assert!(!record.identity().has_season_context());
    }

    #[test]
    fn legacy_season_guid_is_not_a_season_id() {
        let xml = r#"<MediaContainer><Directory type="season" index="2"
            guid="com.plexapp.agents.themoviedb://70523/2?lang=en"
            parentGuid="com.plexapp.agents.themoviedb://70523?lang=en"/></MediaContainer>"#;
        let identity = parse_metadata(xml).unwrap().unwrap().identity();
        assert_eq!(identity.show_id, Some(70523));
        assert_eq!(identity.season_id, None);
        assert_eq!(identity.season_number, Some(2));
    }

    #[test]
    fn movies_resolve_to_nothing() {
        let xml = r#"<MediaContainer><Video type="movie" guid="tmdb://603"><Guid id="tmdb://603"/></Video></MediaContainer>"#;
        let record = parse_metadata(xml).unwrap().unwrap();
        assert_eq!(record.kind, MediaKind::Movie);
        assert_eq!(record.identity(), ResolvedIdentity::default());
    }

    #[test]
    fn fallback_keys_grandparent_then_parent() {
        let xml = r#"<MediaContainer><Video ratingKey="10" type="episode" index="1" parentIndex="1"
            grandparentGuid="plex://show/xyz" grandparentKey="/library/metadata/8"
            parentRatingKey="9"/></MediaContainer>"#;
        let record = parse_metadata(xml).unwrap().unwrap();
        assert_eq!(record.identity().show_id, None);
        assert_eq!(
            record.fallback_keys(),
            vec![
                "/library/metadata/8".to_string(),
                "/library/metadata/9".to_string()
            ]
        );
    }

    #[test]
    fn fallback_keys_only_parent_rating_key() {
        let xml = r#"<MediaContainer><Video ratingKey="56" type="episode" index="3" parentIndex="1"
            parentRatingKey="55"/></MediaContainer>"#;
        let record = parse_metadata(xml).unwrap().unwrap();
        assert_eq!(record.fallback_keys(), vec!["/library/metadata/55".to_string()]);
    }

    #[test]
    fn empty_container() {
        assert_eq!(
            parse_metadata(r#"<MediaContainer size="0"></MediaContainer>"#).unwrap(),
            None
        );
    }

    #[test]
    fn malformed_xml_is_an_error() {
        assert!(parse_metadata("<MediaContainer><Video type=\"show\"></Directory>").is_err());
    }

    #[test]
    fn guid_helpers() {
        assert_eq!(tmdb_id("tmdb://1399"), Some(1399));
        assert_eq!(tmdb_id("imdb://tt1"), None);
        assert_eq!(tmdb_id("tmdb://"), None);
        assert_eq!(
            show_catalog_id("com.plexapp.agents.themoviedb://1399/2/5?lang=en"),
            Some(1399)
        );
        assert_eq!(
            normalize_metadata_key("/library/metadata/1399/children").as_deref(),
            Some("/library/metadata/1399")
        );
        assert_eq!(normalize_metadata_key("/hubs/1"), None);
    }
}
