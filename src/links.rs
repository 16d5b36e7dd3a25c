//! Provider URL construction.

use crate::models::ResolvedIdentity;

pub fn show_url(base: &str, show_id: u64) -> String {
    format!("{}/show/{}", base.trim_end_matches('/'), show_id)
}

/// Deep link for a resolved identity: show, then season, then episode.
///
/// The season segment needs both the season number and the provider's
/// season id; without it the link stays at show level and any episode
/// number is dropped. `None` when no show id was resolved.
pub fn external_url(base: &str, identity: &ResolvedIdentity) -> Option<String> {
    let mut url = show_url(base, identity.show_id?);
    if let (Some(number), Some(season_id)) = (identity.season_number, identity.season_id) {
        url.push_str(&format!("/season/{}/{}", season_id, number));
        if let Some(episode) = identity.episode_number {
            url.push_str(&format!("/episode/{}", episode));
        }
    }
    Some(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://www.serializd.com";

    #[test]
    fn episode_url_orders_segments() {
        let identity = ResolvedIdentity {
            show_id: Some(100),
            season_id: Some(200),
            season_number: Some(2),
            episode_number: Some(5),
        };
        assert_eq!(
            external_url(BASE, &identity).as_deref(),
            Some("https://www.serializd.com/show/100/season/200/2/episode/5")
        );
    }

    #[test]
    fn season_without_episode() {
        let identity = ResolvedIdentity {
            show_id: Some(100),
            season_id: Some(200),
            season_number: Some(2),
            episode_number: None,
        };
        assert_eq!(
            external_url(BASE, &identity).as_deref(),
            Some("https://www.serializd.com/show/100/season/200/2")
        );
    }

    #[test]
    fn missing_season_drops_season_and_episode() {
        let no_number = ResolvedIdentity {
            show_id: Some(100),
            season_id: Some(200),
            season_number: None,
            episode_number: Some(5),
        };
        assert_eq!(
            external_url(BASE, &no_number).as_deref(),
            Some("https://www.serializd.com/show/100")
        );

        let no_id = ResolvedIdentity {
            show_id: Some(100),
            season_number: Some(2),
            episode_number: Some(5),
            ..Default::default()
        };
        assert_eq!(
            external_url(&format!("{}/", BASE), &no_id).as_deref(),
            Some("https://www.serializd.com/show/100")
        );
    }

    #[test]
    fn no_show_no_url() {
        assert_eq!(external_url(BASE, &ResolvedIdentity::default()), None);
    }
}
