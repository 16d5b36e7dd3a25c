//! `plexbadge resolve` and `plexbadge url`.
//!
//! `resolve` runs the full pipeline once against the live services, using
//! an in-memory page built from the command-line arguments, and follows
//! retries until the outcome settles.

use std::sync::Arc;

use anyhow::{bail, Result};

use crate::cache::SystemClock;
use crate::config::Config;
use crate::links::external_url;
use crate::models::ResolvedIdentity;
use crate::navigation::{Trigger, TriggerCause};
use crate::page::{server_id_from_href, Page, StaticPage, StaticPageState};
use crate::proxy::{HostMessage, HttpProxy};
use crate::session::{RunOutcome, Session};
use crate::store::open_store;

const DEFAULT_HREF: &str = "https://app.plex.tv/desktop/#!/";

/// What the page would show.
#[derive(Debug, Clone, Default)]
pub struct ResolveArgs {
    pub href: Option<String>,
    pub title: Option<String>,
    pub year: Option<u32>,
    /// Metadata key, e.g. `/library/metadata/123`. Needs `server_url`.
    pub key: Option<String>,
    pub server_url: Option<String>,
    pub token: Option<String>,
}

pub fn page_for(args: &ResolveArgs) -> StaticPage {
    StaticPage::new(StaticPageState {
        href: args.href.clone().unwrap_or_else(|| DEFAULT_HREF.to_string()),
        title: args.title.clone(),
        metadata_lines: args.year.map(|y| vec![y.to_string()]).unwrap_or_default(),
        headings: Vec::new(),
        ratings_container: true,
        account_token: args.token.clone(),
        badges: Vec::new(),
    })
}

pub async fn run_resolve(config: &Config, args: ResolveArgs) -> Result<()> {
    if args.key.is_some() && (args.server_url.is_none() || args.token.is_none()) {
        bail!("--key needs --server-url and --token");
    }

    let page = Arc::new(page_for(&args));
    let href = page.href();
    let store = open_store(config).await?;
    let proxy = Arc::new(HttpProxy::new(config)?);
    let session = Session::new(config.clone(), page, proxy, store, Arc::new(SystemClock));

    if let (Some(server_url), Some(token)) = (&args.server_url, &args.token) {
        let url = format!(
            "{}{}",
            server_url.trim_end_matches('/'),
            args.key.as_deref().unwrap_or_default()
        );
        session
            .handle_intercept(HostMessage::ServerApiIntercepted {
                url,
                server_url: server_url.clone(),
                server_id: server_id_from_href(&href),
                token: token.clone(),
            })
            .await;
    }

    let outcome = session
        .settle(Trigger {
            href,
            href_changed: true,
            cause: TriggerCause::Initial,
        })
        .await;

    match outcome {
        RunOutcome::Injected {
            badge, identity, ..
        } => {
            print_identity(&identity);
            println!("  Rating:    {}", badge.label());
            println!("  URL:       {}", badge.url);
            Ok(())
        }
        RunOutcome::GaveUp(reason) | RunOutcome::RetryScheduled { reason, .. } => {
            bail!("No badge: {}", reason)
        }
        other => bail!("No badge: run ended as {:?}", other),
    }
}

fn print_identity(identity: &ResolvedIdentity) {
    let show = identity
        .show_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "-".to_string());
    println!("  Show:      {}", show);
    if let Some(number) = identity.season_number {
        match identity.season_id {
            Some(id) => println!("  Season:    {} (id {})", number, id),
            None => println!("  Season:    {} (no provider id)", number),
        }
    }
    if let Some(episode) = identity.episode_number {
        println!("  Episode:   {}", episode);
    }
}

/// Print the provider link for a known identity.
pub fn run_url(config: &Config, identity: ResolvedIdentity) -> Result<()> {
    match external_url(&config.provider.base_url, &identity) {
        Some(url) => {
            println!("{}", url);
            Ok(())
        }
        None => bail!("A show id is required"),
    }
}
