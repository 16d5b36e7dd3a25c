//! The host page as seen by the pipeline.
//!
//! The render tree belongs to Plex Web; this crate only reads a handful of
//! elements from it and places a badge. [`Page`] is that narrow surface.
//! [`StaticPage`] is an in-memory implementation used by the CLI and tests.

use std::sync::{LazyLock, Mutex};

use regex::Regex;

use crate::metadata::normalize_metadata_key;
use crate::models::{Badge, PageContext};

/// Where a badge can be placed, in order of preference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InjectionTarget {
    /// The page's own ratings row.
    RatingsContainer,
    /// Next to the heading at this index in [`Page::heading_texts`].
    InlineAnchor(usize),
    /// A container inserted right after the title element.
    AfterTitle,
}

/// Read access to the host render tree plus badge placement.
///
/// Implementations must tolerate any element being absent; every getter
/// degrades to `None` / empty.
pub trait Page: Send + Sync {
    fn href(&self) -> String;

    fn title_text(&self) -> Option<String>;

    /// The one or two metadata lines under the title (year, runtime, ...).
    fn metadata_lines(&self) -> Vec<String>;

    /// Heading and line texts near the title, scanned for season and
    /// episode wording.
    fn heading_texts(&self) -> Vec<String>;

    fn has_ratings_container(&self) -> bool;

    /// Plex account token from the page's own storage, if signed in.
    fn account_token(&self) -> Option<String>;

    /// Remove every badge this crate placed. Returns how many were removed.
    fn remove_badges(&self) -> usize;

    /// Place `badge` at `target`. `false` when the target does not exist.
    fn insert_badge(&self, target: &InjectionTarget, badge: &Badge) -> bool;

    /// Whether the page has rendered enough to be read.
    fn is_ready(&self) -> bool {
        self.title_text().is_some()
    }
}

static YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(19\d{2}|20\d{2})\b").expect("valid year regex"));

static SEASON_EPISODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bseason\s+(\d{1,3})(?:\s*[·•,:\-–]?\s*episode\s+(\d{1,4}))?")
        .expect("valid season regex")
});

static SHORT_SEASON_EPISODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bS(\d{1,3})\s*[·•\-–]?\s*E(\d{1,4})\b").expect("valid short season regex")
});

/// Season and episode numbers read from visible page text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeasonEpisodeHint {
    pub season_number: Option<u32>,
    pub episode_number: Option<u32>,
}

impl SeasonEpisodeHint {
    pub fn from_text(text: &str) -> Option<Self> {
        if let Some(caps) = SHORT_SEASON_EPISODE_RE.captures(text) {
            return Some(Self {
                season_number: caps.get(1).and_then(|m| m.as_str().parse().ok()),
                episode_number: caps.get(2).and_then(|m| m.as_str().parse().ok()),
            });
        }
        SEASON_EPISODE_RE.captures(text).map(|caps| Self {
            season_number: caps.get(1).and_then(|m| m.as_str().parse().ok()),
            episode_number: caps.get(2).and_then(|m| m.as_str().parse().ok()),
        })
    }

    /// First hint found across the page's heading texts.
    pub fn from_page(page: &dyn Page) -> Option<Self> {
        page.heading_texts()
            .iter()
            .find_map(|text| Self::from_text(text))
    }
}

/// Index of the first heading that reads like a season or episode label.
pub fn season_anchor_index(page: &dyn Page) -> Option<usize> {
    page.heading_texts()
        .iter()
        .position(|text| SeasonEpisodeHint::from_text(text).is_some())
}

pub fn year_from_lines(lines: &[String]) -> Option<u32> {
    lines.iter().find_map(|line| {
        YEAR_RE
            .captures(line)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok())
    })
}

/// Plex Web keeps its route in the fragment: `#!/server/<id>/details?key=...`.
fn fragment_route(href: &str) -> Option<String> {
    let parsed = url::Url::parse(href).ok()?;
    parsed.fragment().map(|f| f.trim_start_matches('!').to_string())
}

/// Metadata key from the `key` parameter of the page route.
pub fn plex_key_from_href(href: &str) -> Option<String> {
    let route = fragment_route(href)?;
    let (_, query) = route.split_once('?')?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(name, _)| name == "key")
        .map(|(_, value)| value.into_owned())
        .and_then(|value| normalize_metadata_key(&value))
}

/// Server machine identifier from `/server/<id>/` in the page route.
pub fn server_id_from_href(href: &str) -> Option<String> {
    let route = fragment_route(href)?;
    let rest = route.split("/server/").nth(1)?;
    let id = rest.split(['/', '?']).next()?;
    (!id.is_empty()).then(|| id.to_string())
}

/// Metadata key from a full metadata request URL, e.g.
/// `https://10.0.0.2:32400/library/metadata/123/children?X-Plex-Token=...`.
pub fn metadata_key_from_url(request_url: &str) -> Option<String> {
    let parsed = url::Url::parse(request_url).ok()?;
    normalize_metadata_key(parsed.path())
}

impl PageContext {
    /// Read the current page. `intercepted_key` is only used when the page
    /// route carries no key of its own.
    pub fn extract(page: &dyn Page, intercepted_key: Option<&str>) -> Option<PageContext> {
        let href = page.href();
        let title = page
            .title_text()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        let plex_key =
            plex_key_from_href(&href).or_else(|| intercepted_key.map(|k| k.to_string()));

        if title.is_none() && plex_key.is_none() {
            return None;
        }

        Some(PageContext {
            title,
            year: year_from_lines(&page.metadata_lines()),
            plex_key,
            href,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct StaticPageState {
    pub href: String,
    pub title: Option<String>,
    pub metadata_lines: Vec<String>,
    pub headings: Vec<String>,
    pub ratings_container: bool,
    pub account_token: Option<String>,
    pub badges: Vec<(InjectionTarget, Badge)>,
}

/// In-memory page snapshot. Mutate it through [`StaticPage::update`] to
/// simulate navigation.
#[derive(Default)]
pub struct StaticPage {
    state: Mutex<StaticPageState>,
}

impl StaticPage {
    pub fn new(state: StaticPageState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn update(&self, f: impl FnOnce(&mut StaticPageState)) {
        let mut state = self.state.lock().unwrap();
        f(&mut state);
    }

    pub fn badges(&self) -> Vec<(InjectionTarget, Badge)> {
        self.state.lock().unwrap().badges.clone()
    }
}

impl Page for StaticPage {
    fn href(&self) -> String {
        self.state.lock().unwrap().href.clone()
    }

    fn title_text(&self) -> Option<String> {
        self.state.lock().unwrap().title.clone()
    }

    fn metadata_lines(&self) -> Vec<String> {
        self.state.lock().unwrap().metadata_lines.clone()
    }

    fn heading_texts(&self) -> Vec<String> {
        self.state.lock().unwrap().headings.clone()
    }

    fn has_ratings_container(&self) -> bool {
        self.state.lock().unwrap().ratings_container
    }

    fn account_token(&self) -> Option<String> {
        self.state.lock().unwrap().account_token.clone()
    }

    fn remove_badges(&self) -> usize {
        let mut state = self.state.lock().unwrap();
        let removed = state.badges.len();
        state.badges.clear();
        removed
    }

    fn insert_badge(&self, target: &InjectionTarget, badge: &Badge) -> bool {
        let mut state = self.state.lock().unwrap();
        let exists = match target {
            InjectionTarget::RatingsContainer => state.ratings_container,
            InjectionTarget::InlineAnchor(i) => *i < state.headings.len(),
            InjectionTarget::AfterTitle => state.title.is_some(),
        };
        if exists {
            state.badges.push((target.clone(), badge.clone()));
        }
        exists
    }
}
