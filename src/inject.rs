//! Badge placement.

use tracing::debug;

use crate::models::Badge;
use crate::page::{season_anchor_index, InjectionTarget, Page};

/// Replace any badge on the page with `badge`.
///
/// Targets are tried in order: the page's ratings row, then (for season
/// and episode views) the season heading, then a container after the
/// title. Returns the target used, or `None` when none exists.
pub fn inject(page: &dyn Page, badge: &Badge, season_context: bool) -> Option<InjectionTarget> {
    let removed = page.remove_badges();
    if removed > 0 {
        debug!(removed, "removed previous badges");
    }

    let mut chain = Vec::with_capacity(3);
    if page.has_ratings_container() {
        chain.push(InjectionTarget::RatingsContainer);
    }
    if season_context {
        if let Some(index) = season_anchor_index(page) {
            chain.push(InjectionTarget::InlineAnchor(index));
        }
    }
    chain.push(InjectionTarget::AfterTitle);

    let target = chain
        .into_iter()
        .find(|target| page.insert_badge(target, badge));
    debug!(?target, label = %badge.label(), "badge placement");
    target
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::{StaticPage, StaticPageState};

    fn badge() -> Badge {
        Badge {
            url: "https://www.serializd.com/show/1".to_string(),
            rating: Some(4.0),
        }
    }

    fn page(ratings: bool, headings: &[&str], title: bool) -> StaticPage {
        StaticPage::new(StaticPageState {
            href: "a".to_string(),
            title: title.then(|| "Dark".to_string()),
            headings: headings.iter().map(|h| h.to_string()).collect(),
            ratings_container: ratings,
            ..Default::default()
        })
    }

    #[test]
    fn prefers_ratings_container() {
        let p = page(true, &["Season 1"], true);
        assert_eq!(inject(&p, &badge(), true), Some(InjectionTarget::RatingsContainer));
    }

    #[test]
    fn season_anchor_only_with_season_context() {
        let p = page(false, &["Cast", "S1 · E4"], true);
        assert_eq!(inject(&p, &badge(), true), Some(InjectionTarget::InlineAnchor(1)));
        assert_eq!(inject(&p, &badge(), false), Some(InjectionTarget::AfterTitle));
    }

    #[test]
    fn rerun_never_duplicates() {
        let p = page(true, &[], true);
        inject(&p, &badge(), false);
        inject(&p, &badge(), false);
        assert_eq!(p.badges().len(), 1);
    }

    #[test]
    fn nothing_to_anchor_on() {
        let p = page(false, &[], false);
        assert_eq!(inject(&p, &badge(), true), None);
        assert!(p.badges().is_empty());
    }
}
