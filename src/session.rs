//! One page session: the resolution pipeline and the state it shares.
//!
//! A [`Session`] owns everything that outlives a single run: the caches,
//! the run counter, the retry timer, the in-flight set, the last
//! intercepted server and the memo of the last key that got a badge.
//!
//! # Pipeline
//!
//! ```text
//! page context ─► memo / in-flight check ─► begin run, clear badges
//!      │
//!      ├─► server context ─► metadata (+ fallback) ─► checkpoint
//!      ├─► show cache ─► checkpoint
//!      ├─► season/episode hint from page text
//!      ├─► rating (cached, or fetched then cached) ─► checkpoint
//!      └─► url ─► checkpoint ─► inject
//! ```
//!
//! A stale run stops at its next checkpoint with no side effects. Any other
//! early exit schedules a retry unless the item is excluded. Nothing here
//! returns an error to the caller; every outcome is a [`RunOutcome`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{debug, info, warn};

use crate::cache::{Clock, ServerCache, ShowCache};
use crate::config::Config;
use crate::discovery::entry_from_server_url;
use crate::error::{RunAbort, SkipReason};
use crate::identity::{IdentityResolver, InterceptedServer};
use crate::inject::inject;
use crate::links::{external_url, show_url};
use crate::metadata::MediaKind;
use crate::models::{
    show_id_cache_key, Badge, PageContext, PageIdentityKey, ResolvedIdentity, ShowCacheEntry,
};
use crate::navigation::{HostEvent, NavigationMonitor, Signal, Trigger, TriggerCause};
use crate::page::{metadata_key_from_url, InjectionTarget, Page, SeasonEpisodeHint};
use crate::proxy::{FetchProxy, HostMessage};
use crate::rating::RatingResolver;
use crate::retry::{RetryDecision, RetryScheduler};
use crate::run::{RunController, RunToken};
use crate::store::KvStore;

const READY_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Injected {
        target: InjectionTarget,
        badge: Badge,
        identity: ResolvedIdentity,
    },
    /// The page already shows the badge for this key.
    AlreadyCurrent,
    /// Another run for the same key is still going.
    InFlight,
    /// Superseded by a newer navigation; nothing was written.
    Stale,
    RetryScheduled {
        reason: SkipReason,
        attempt: usize,
    },
    GaveUp(SkipReason),
}

struct Resolution {
    badge: Badge,
    identity: ResolvedIdentity,
    target: InjectionTarget,
}

/// Claims a key for one run. Released on drop, unless a newer run has
/// taken the key over in the meantime.
struct InFlightGuard<'a> {
    set: &'a Mutex<HashMap<PageIdentityKey, RunToken>>,
    key: PageIdentityKey,
    run_id: u64,
}

impl<'a> InFlightGuard<'a> {
    /// Begin a run for `key`. `None` while a live run holds the key; a
    /// holder that went stale is taken over.
    fn acquire(
        set: &'a Mutex<HashMap<PageIdentityKey, RunToken>>,
        key: PageIdentityKey,
        runs: &RunController,
    ) -> Option<(Self, RunToken)> {
        let mut held = set.lock().unwrap();
        if let Some(holder) = held.get(&key) {
            if !holder.is_stale() {
                return None;
            }
            debug!(run = holder.id, %key, "taking over key from stale run");
        }
        let run = runs.begin();
        held.insert(key.clone(), run.clone());
        let run_id = run.id;
        Some((Self { set, key, run_id }, run))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut held) = self.set.lock() {
            if held.get(&self.key).map(|run| run.id) == Some(self.run_id) {
                held.remove(&self.key);
            }
        }
    }
}

pub struct Session {
    config: Config,
    page: Arc<dyn Page>,
    shows: ShowCache,
    servers: Arc<ServerCache>,
    identity: IdentityResolver,
    ratings: RatingResolver,
    runs: RunController,
    retry: RetryScheduler,
    in_flight: Mutex<HashMap<PageIdentityKey, RunToken>>,
    last_key: Mutex<Option<PageIdentityKey>>,
    intercepted: Mutex<Option<InterceptedServer>>,
    retry_rx: tokio::sync::Mutex<UnboundedReceiver<Trigger>>,
}

impl Session {
    pub fn new(
        config: Config,
        page: Arc<dyn Page>,
        proxy: Arc<dyn FetchProxy>,
        store: Arc<dyn KvStore>,
        clock: Arc<dyn Clock>,
    ) -> Arc<Self> {
        let shows = ShowCache::shows(store.clone(), clock.clone(), &config.cache);
        let servers = Arc::new(ServerCache::servers(store, clock, &config.cache));
        let identity = IdentityResolver::new(
            proxy.clone(),
            servers.clone(),
            config.plex.directory_url.clone(),
        );
        let (tx, rx) = mpsc::unbounded_channel();
        let retry = RetryScheduler::new(config.retry.delays(), page.clone(), tx);

        Arc::new(Self {
            shows,
            servers,
            identity,
            ratings: RatingResolver::new(proxy),
            runs: RunController::new(page.clone()),
            retry,
            in_flight: Mutex::new(HashMap::new()),
            last_key: Mutex::new(None),
            intercepted: Mutex::new(None),
            retry_rx: tokio::sync::Mutex::new(rx),
            page,
            config,
        })
    }

    pub fn shows(&self) -> &ShowCache {
        &self.shows
    }

    pub fn servers(&self) -> &ServerCache {
        &self.servers
    }

    pub fn retry(&self) -> &RetryScheduler {
        &self.retry
    }

    /// Run the pipeline once for the current page.
    pub async fn process(&self, trigger: &Trigger) -> RunOutcome {
        let intercepted = self.intercepted.lock().unwrap().clone();
        let intercepted_key = intercepted.as_ref().and_then(|i| i.metadata_key.as_deref());

        let Some(ctx) = PageContext::extract(self.page.as_ref(), intercepted_key) else {
            debug!(cause = ?trigger.cause, "no page context");
            return self.skip(&self.page.href(), SkipReason::NoPageContext);
        };

        let key = ctx.identity_key();
        if self.last_key.lock().unwrap().as_ref() == Some(&key) {
            debug!(%key, "badge already current");
            return RunOutcome::AlreadyCurrent;
        }
        let Some((_guard, run)) = InFlightGuard::acquire(&self.in_flight, key.clone(), &self.runs)
        else {
            debug!(%key, "resolution already in flight");
            return RunOutcome::InFlight;
        };

        debug!(run = run.id, %key, cause = ?trigger.cause, "run started");
        self.page.remove_badges();

        match self.resolve(&ctx, intercepted.as_ref(), &run).await {
            Ok(done) => {
                info!(
                    run = run.id,
                    show_id = ?done.identity.show_id,
                    url = %done.badge.url,
                    "badge injected"
                );
                *self.last_key.lock().unwrap() = Some(key);
                self.retry.reset();
                RunOutcome::Injected {
                    target: done.target,
                    badge: done.badge,
                    identity: done.identity,
                }
            }
            Err(RunAbort::Stale) => RunOutcome::Stale,
            Err(RunAbort::Skipped(reason)) => {
                debug!(run = run.id, %reason, "run skipped");
                self.skip(&run.href, reason)
            }
        }
    }

    fn skip(&self, href: &str, reason: SkipReason) -> RunOutcome {
        if !reason.is_retryable() {
            return RunOutcome::GaveUp(reason);
        }
        match self.retry.schedule(href) {
            RetryDecision::Scheduled { attempt, .. } => RunOutcome::RetryScheduled { reason, attempt },
            RetryDecision::AlreadyPending => RunOutcome::RetryScheduled {
                reason,
                attempt: self.retry.attempts(),
            },
            RetryDecision::Exhausted => {
                info!(%href, %reason, "giving up until next navigation");
                RunOutcome::GaveUp(reason)
            }
        }
    }

    /// Identity from the metadata key. A retryable failure is handed back
    /// so the show cache can still stand in for it.
    async fn resolve_identity(
        &self,
        ctx: &PageContext,
        intercepted: Option<&InterceptedServer>,
        run: &RunToken,
    ) -> Result<(ResolvedIdentity, Option<MediaKind>, Option<SkipReason>), RunAbort> {
        let Some(plex_key) = ctx.plex_key.as_deref() else {
            return Ok((ResolvedIdentity::default(), None, None));
        };
        let attempt = match self
            .identity
            .server_context(&ctx.href, intercepted, self.page.as_ref(), run)
            .await
        {
            Ok(server) => self.identity.resolve(plex_key, &server, run).await,
            Err(abort) => Err(abort),
        };
        match attempt {
            Ok(resolved) => Ok((resolved.identity, Some(resolved.kind), None)),
            Err(RunAbort::Skipped(reason)) if reason.is_retryable() => {
                Ok((ResolvedIdentity::default(), None, Some(reason)))
            }
            Err(abort) => Err(abort),
        }
    }

    async fn read_show(&self, key: &str) -> Option<ShowCacheEntry> {
        self.shows.get(key).await.unwrap_or_else(|e| {
            warn!(%key, error = %e, "show cache read failed");
            None
        })
    }

    async fn resolve(
        &self,
        ctx: &PageContext,
        intercepted: Option<&InterceptedServer>,
        run: &RunToken,
    ) -> Result<Resolution, RunAbort> {
        let (mut identity, kind, failure) = self.resolve_identity(ctx, intercepted, run).await?;
        run.checkpoint("identity")?;

        let title_key = ctx.show_cache_key();
        let cached = match &title_key {
            Some(key) => self.read_show(key).await,
            None => None,
        };
        run.checkpoint("show cache")?;

        // The cache never overrides a show id the metadata produced.
        if identity.show_id.is_none() {
            if let Some(entry) = &cached {
                debug!(show_id = entry.show_id, "show id from cache");
                identity.show_id = Some(entry.show_id);
            }
        }
        let Some(show_id) = identity.show_id else {
            return Err(failure.unwrap_or(SkipReason::NoIdentity).into());
        };

        // Before the title renders, the show id is the only key to cache on.
        let (cache_key, cached) = match title_key {
            Some(key) => (key, cached),
            None => {
                let key = show_id_cache_key(show_id);
                let cached = self.read_show(&key).await;
                run.checkpoint("show cache by id")?;
                (key, cached)
            }
        };

        let text_hint_applies = match &kind {
            None => true,
            Some(kind) => kind.is_season_or_episode() && !identity.has_season_context(),
        };
        if text_hint_applies {
            if let Some(hint) = SeasonEpisodeHint::from_page(self.page.as_ref()) {
                debug!(?hint, "season context from page text");
                identity.season_number = hint.season_number;
                identity.episode_number = hint.episode_number;
            }
        }

        let (rating, season_map) = match cached.filter(|entry| entry.show_id == show_id) {
            Some(entry) => {
                debug!(show_id, "rating from cache");
                (entry.rating, entry.season_map)
            }
            None => {
                let fetched = self.ratings.resolve(show_id).await;
                run.checkpoint("rating fetch")?;
                let outcome = fetched?;
                let entry = ShowCacheEntry {
                    show_id,
                    url: show_url(&self.config.provider.base_url, show_id),
                    rating: outcome.rating,
                    season_map: outcome.season_map.clone(),
                    timestamp: self.shows.now_millis(),
                };
                if let Err(e) = self.shows.set(&cache_key, &entry).await {
                    warn!(key = %cache_key, error = %e, "show cache write failed");
                }
                (outcome.rating, outcome.season_map)
            }
        };

        if identity.season_id.is_none() {
            if let (Some(number), Some(map)) = (identity.season_number, &season_map) {
                identity.season_id = map.get(&number).copied();
            }
        }

        let url = external_url(&self.config.provider.base_url, &identity)
            .ok_or(SkipReason::NoIdentity)?;
        let badge = Badge { url, rating };

        run.checkpoint("injection")?;
        let target = inject(self.page.as_ref(), &badge, identity.has_season_context())
            .ok_or(SkipReason::NoInjectionTarget)?;

        Ok(Resolution {
            badge,
            identity,
            target,
        })
    }

    /// Remember the server a page request went to, and seed the server
    /// cache with it.
    pub async fn handle_intercept(&self, message: HostMessage) {
        let HostMessage::ServerApiIntercepted {
            url,
            server_url,
            server_id,
            token,
        } = message;

        if let Some(id) = &server_id {
            if let Some(entry) = entry_from_server_url(&server_url, self.servers.now_millis()) {
                if let Err(e) = self.servers.set(id, &entry).await {
                    warn!(server_id = %id, error = %e, "server cache write failed");
                }
            }
        }

        let seen = InterceptedServer {
            base_url: server_url.trim_end_matches('/').to_string(),
            token,
            server_id,
            metadata_key: metadata_key_from_url(&url),
        };
        debug!(base_url = %seen.base_url, key = ?seen.metadata_key, "intercepted server request");
        *self.intercepted.lock().unwrap() = Some(seen);
    }

    async fn wait_until_ready(&self) -> bool {
        let deadline = tokio::time::Instant::now() + self.config.navigation.ready_timeout();
        loop {
            if self.page.is_ready() {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(READY_POLL).await;
        }
    }

    /// React to a navigation trigger. An href change drops everything tied
    /// to the previous view (memo, pending retry, running resolutions and
    /// badges) before waiting for the new page to render.
    pub async fn on_navigation(&self, trigger: Trigger) -> RunOutcome {
        if trigger.href_changed {
            self.last_key.lock().unwrap().take();
            self.retry.cancel();
            self.runs.invalidate();
            let removed = self.page.remove_badges();
            if removed > 0 {
                debug!(removed, "cleared badges from previous view");
            }
            if !self.wait_until_ready().await {
                debug!(href = %trigger.href, "page not ready, trying anyway");
            }
        }
        self.process(&trigger).await
    }

    /// Handle `trigger`, then follow the retries it schedules until the
    /// outcome settles. Not for use while [`run`](Session::run) is active.
    pub async fn settle(&self, trigger: Trigger) -> RunOutcome {
        let mut retries = self.retry_rx.lock().await;
        let patience: Duration =
            self.config.retry.delays().iter().sum::<Duration>() + Duration::from_secs(1);

        let mut outcome = self.on_navigation(trigger).await;
        while let RunOutcome::RetryScheduled { .. } = outcome {
            match tokio::time::timeout(patience, retries.recv()).await {
                Ok(Some(next)) => outcome = self.process(&next).await,
                _ => break,
            }
        }
        outcome
    }

    fn spawn_navigation(self: &Arc<Self>, trigger: Trigger) {
        let session = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = session.on_navigation(trigger).await;
            debug!(?outcome, "run finished");
        });
    }

    /// Drive the session from host events until the stream closes.
    pub async fn run(self: Arc<Self>, mut events: UnboundedReceiver<HostEvent>) -> Result<()> {
        match self.servers.cleanup().await {
            Ok(0) => {}
            Ok(removed) => info!(removed, "dropped stale server cache entries"),
            Err(e) => warn!(error = %e, "server cache cleanup failed"),
        }

        let mut retries = self.retry_rx.lock().await;
        let mut monitor = NavigationMonitor::new(self.config.navigation.debounce());
        self.spawn_navigation(monitor.initial(self.page.as_ref()));

        loop {
            tokio::select! {
                signal = monitor.next(&mut events, self.page.as_ref()) => match signal {
                    Some(Signal::Navigate(trigger)) => self.spawn_navigation(trigger),
                    Some(Signal::Intercepted(message)) => {
                        self.handle_intercept(message).await;
                        self.spawn_navigation(Trigger {
                            href: self.page.href(),
                            href_changed: false,
                            cause: TriggerCause::Intercepted,
                        });
                    }
                    None => break,
                },
                Some(trigger) = retries.recv() => self.spawn_navigation(trigger),
            }
        }

        debug!("host event stream closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use crate::page::{StaticPage, StaticPageState};
    use crate::proxy::{ExternalRatingResponse, PageMetadataResponse};
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Title-only page; no metadata key, so the show cache is the only
    /// source of identity.
    struct RatingOnly {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl FetchProxy for RatingOnly {
        async fn fetch_page_metadata(&self, _: &str, _: &str) -> Result<PageMetadataResponse> {
            Ok(PageMetadataResponse::failed("offline"))
        }
        async fn fetch_external_rating(&self, _: u64) -> Result<ExternalRatingResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ExternalRatingResponse {
                success: true,
                rating: Some(4.0),
                ..Default::default()
            })
        }
    }

    fn session(page: Arc<StaticPage>, proxy: Arc<RatingOnly>) -> Arc<Session> {
        Session::new(
            Config::minimal(),
            page,
            proxy,
            Arc::new(MemoryStore::new()),
            Arc::new(ManualClock::new(1_700_000_000_000)),
        )
    }

    fn trigger(href: &str) -> Trigger {
        Trigger {
            href: href.to_string(),
            href_changed: false,
            cause: TriggerCause::Initial,
        }
    }

    #[test]
    fn in_flight_guard_blocks_live_run() {
        let runs = RunController::new(Arc::new(StaticPage::default()));
        let set = Mutex::new(HashMap::new());
        let key = PageIdentityKey::TitleYear("dark|2017".to_string());

        let (guard, _run) = InFlightGuard::acquire(&set, key.clone(), &runs).unwrap();
        assert!(InFlightGuard::acquire(&set, key.clone(), &runs).is_none());
        assert!(set.lock().unwrap().contains_key(&key));

        drop(guard);
        assert!(set.lock().unwrap().is_empty());
        assert!(InFlightGuard::acquire(&set, key, &runs).is_some());
    }

    #[test]
    fn stale_holder_is_taken_over() {
        let runs = RunController::new(Arc::new(StaticPage::default()));
        let set = Mutex::new(HashMap::new());
        let key = PageIdentityKey::PlexKey("/library/metadata/10".to_string());

        let (old_guard, old_run) = InFlightGuard::acquire(&set, key.clone(), &runs).unwrap();
        runs.invalidate();
        let (new_guard, new_run) = InFlightGuard::acquire(&set, key.clone(), &runs).unwrap();
        assert!(old_run.is_stale());
        assert!(!new_run.is_stale());

        // The superseded run finishing must not free the newer claim.
        drop(old_guard);
        assert!(InFlightGuard::acquire(&set, key.clone(), &runs).is_none());
        drop(new_guard);
        assert!(InFlightGuard::acquire(&set, key, &runs).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn title_only_page_uses_cached_show() {
        let page = Arc::new(StaticPage::new(StaticPageState {
            href: "https://app.plex.tv/desktop/#!/".to_string(),
            title: Some("Dark".to_string()),
            metadata_lines: vec!["2017".to_string()],
            ..Default::default()
        }));
        let proxy = Arc::new(RatingOnly {
            calls: AtomicUsize::new(0),
        });
        let session = session(page.clone(), proxy.clone());
        session
            .shows()
            .set(
                "dark|2017",
                &ShowCacheEntry {
                    show_id: 70523,
                    url: "https://www.serializd.com/show/70523".to_string(),
                    rating: Some(4.2),
                    season_map: None,
                    timestamp: 1_700_000_000_000,
                },
            )
            .await
            .unwrap();

        let outcome = session.process(&trigger(&page.href())).await;
        let RunOutcome::Injected { badge, target, .. } = outcome else {
            panic!("expected injection, got {:?}", outcome);
        };
        assert_eq!(badge.url, "https://www.serializd.com/show/70523");
        assert_eq!(badge.rating, Some(4.2));
        assert_eq!(target, InjectionTarget::AfterTitle);
        assert_eq!(proxy.calls.load(Ordering::SeqCst), 0);

        assert_eq!(
            session.process(&trigger(&page.href())).await,
            RunOutcome::AlreadyCurrent
        );
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_title_schedules_retry() {
        let page = Arc::new(StaticPage::new(StaticPageState {
            href: "https://app.plex.tv/desktop/#!/".to_string(),
            title: Some("Dark".to_string()),
            ..Default::default()
        }));
        let session = session(
            page.clone(),
            Arc::new(RatingOnly {
                calls: AtomicUsize::new(0),
            }),
        );
        assert_eq!(
            session.process(&trigger(&page.href())).await,
            RunOutcome::RetryScheduled {
                reason: SkipReason::NoIdentity,
                attempt: 1
            }
        );
        assert!(session.retry().is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn intercept_seeds_server_cache() {
        let page = Arc::new(StaticPage::default());
        let session = session(
            page,
            Arc::new(RatingOnly {
                calls: AtomicUsize::new(0),
            }),
        );
        session
            .handle_intercept(HostMessage::ServerApiIntercepted {
                url: "https://10-0-0-2.abc.plex.direct:32400/library/metadata/9?includeChildren=1"
                    .to_string(),
                server_url: "https://10-0-0-2.abc.plex.direct:32400/".to_string(),
                server_id: Some("5f3a9c".to_string()),
                token: "tok".to_string(),
            })
            .await;

        let entry = session.servers().get("5f3a9c").await.unwrap().unwrap();
        assert_eq!(entry.base_url(), "https://10-0-0-2.abc.plex.direct:32400");
        let seen = session.intercepted.lock().unwrap().clone().unwrap();
        assert_eq!(seen.metadata_key.as_deref(), Some("/library/metadata/9"));
    }

    fn foreign_badge() -> (InjectionTarget, Badge) {
        (
            InjectionTarget::AfterTitle,
            Badge {
                url: "https://www.serializd.com/show/1".to_string(),
                rating: None,
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn href_change_resets_view_state() {
        let page = Arc::new(StaticPage::new(StaticPageState {
            href: "https://app.plex.tv/desktop/#!/".to_string(),
            title: Some("Dark".to_string()),
            metadata_lines: vec!["2017".to_string()],
            badges: vec![foreign_badge()],
            ..Default::default()
        }));
        let proxy = Arc::new(RatingOnly {
            calls: AtomicUsize::new(0),
        });
        let session = session(page.clone(), proxy);
        session
            .shows()
            .set(
                "dark|2017",
                &ShowCacheEntry {
                    show_id: 70523,
                    url: "https://www.serializd.com/show/70523".to_string(),
                    rating: Some(4.2),
                    season_map: None,
                    timestamp: 1_700_000_000_000,
                },
            )
            .await
            .unwrap();

        *session.last_key.lock().unwrap() =
            Some(PageIdentityKey::TitleYear("dark|2017".to_string()));
        session.retry.schedule(&page.href());
        assert!(session.retry().is_pending());
        let earlier = session.runs.begin();

        let outcome = session
            .on_navigation(Trigger {
                href: page.href(),
                href_changed: true,
                cause: TriggerCause::History,
            })
            .await;

        assert!(matches!(outcome, RunOutcome::Injected { .. }), "{:?}", outcome);
        assert!(earlier.is_stale());
        assert!(!session.retry().is_pending());
        let badges = page.badges();
        assert_eq!(badges.len(), 1);
        assert_eq!(badges[0].1.url, "https://www.serializd.com/show/70523");

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(session.retry_rx.lock().await.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn href_change_clears_badges_before_page_renders() {
        let page = Arc::new(StaticPage::new(StaticPageState {
            href: "https://app.plex.tv/desktop/#!/".to_string(),
            badges: vec![foreign_badge()],
            ..Default::default()
        }));
        let session = session(
            page.clone(),
            Arc::new(RatingOnly {
                calls: AtomicUsize::new(0),
            }),
        );

        let outcome = session
            .on_navigation(Trigger {
                href: page.href(),
                href_changed: true,
                cause: TriggerCause::History,
            })
            .await;

        assert_eq!(
            outcome,
            RunOutcome::RetryScheduled {
                reason: SkipReason::NoPageContext,
                attempt: 1
            }
        );
        assert!(page.badges().is_empty());
    }
}
