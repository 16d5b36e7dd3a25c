//! From a Plex metadata key to external catalog ids.
//!
//! Resolution needs a server to ask. The server comes from, in order: a
//! metadata request the page itself made (intercepted), the server cache,
//! or a directory lookup on plex.tv that is then cached. The item's record
//! is read through the metadata decision table; when it carries no show id,
//! up to two related records (grandparent, then parent) are fetched in its
//! place.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::cache::ServerCache;
use crate::discovery::parse_resources;
use crate::error::{RunAbort, SkipReason};
use crate::metadata::{parse_metadata, MediaKind, MetadataRecord};
use crate::models::{ResolvedIdentity, ServerContext};
use crate::page::{server_id_from_href, Page};
use crate::proxy::FetchProxy;
use crate::run::RunToken;

const MAX_FALLBACK_FETCHES: usize = 2;

/// Server details taken from a request the page made on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterceptedServer {
    pub base_url: String,
    pub token: String,
    pub server_id: Option<String>,
    pub metadata_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMetadata {
    pub identity: ResolvedIdentity,
    /// Type of the primary record.
    pub kind: MediaKind,
}

pub struct IdentityResolver {
    proxy: Arc<dyn FetchProxy>,
    servers: Arc<ServerCache>,
    directory_url: String,
}

impl IdentityResolver {
    pub fn new(proxy: Arc<dyn FetchProxy>, servers: Arc<ServerCache>, directory_url: String) -> Self {
        Self {
            proxy,
            servers,
            directory_url,
        }
    }

    /// Work out where metadata requests for `href` go.
    pub async fn server_context(
        &self,
        href: &str,
        intercepted: Option<&InterceptedServer>,
        page: &dyn Page,
        run: &RunToken,
    ) -> Result<ServerContext, RunAbort> {
        let href_server = server_id_from_href(href);

        if let Some(seen) = intercepted {
            let same_server = match (&href_server, &seen.server_id) {
                (None, _) => true,
                (Some(wanted), Some(seen_id)) => wanted == seen_id,
                (Some(_), None) => false,
            };
            if same_server {
                return Ok(ServerContext {
                    base_url: seen.base_url.clone(),
                    token: seen.token.clone(),
                    server_id: seen.server_id.clone().or(href_server),
                });
            }
        }

        let server_id = href_server.ok_or(SkipReason::NoServerContext)?;
        let token = page
            .account_token()
            .or_else(|| intercepted.map(|i| i.token.clone()))
            .ok_or(SkipReason::NoServerContext)?;

        match self.servers.get(&server_id).await {
            Ok(Some(entry)) => {
                debug!(%server_id, "server cache hit");
                return Ok(ServerContext {
                    base_url: entry.base_url(),
                    token,
                    server_id: Some(server_id),
                });
            }
            Ok(None) => {}
            Err(e) => warn!(%server_id, error = %e, "server cache read failed"),
        }

        let body = self
            .proxy
            .fetch_page_metadata(&self.directory_url, &token)
            .await
            .map_err(|e| SkipReason::Network(e.to_string()))?
            .into_body()
            .map_err(SkipReason::Network)?;
        run.checkpoint("server discovery")?;

        let entry = parse_resources(&body, &server_id, self.servers.now_millis())
            .map_err(|e| SkipReason::Parse(e.to_string()))?
            .ok_or(SkipReason::NoServerContext)?;
        info!(%server_id, base_url = %entry.base_url(), "discovered server connection");

        if let Err(e) = self.servers.set(&server_id, &entry).await {
            warn!(%server_id, error = %e, "server cache write failed");
        }

        Ok(ServerContext {
            base_url: entry.base_url(),
            token,
            server_id: Some(server_id),
        })
    }

    async fn fetch_record(
        &self,
        key: &str,
        server: &ServerContext,
    ) -> Result<Option<MetadataRecord>, SkipReason> {
        let url = format!("{}{}", server.base_url.trim_end_matches('/'), key);
        let body = self
            .proxy
            .fetch_page_metadata(&url, &server.token)
            .await
            .map_err(|e| SkipReason::Network(e.to_string()))?
            .into_body()
            .map_err(SkipReason::Network)?;
        parse_metadata(&body).map_err(|e| SkipReason::Parse(e.to_string()))
    }

    /// Resolve `plex_key` to catalog ids. Movies are refused with
    /// [`SkipReason::Excluded`]. A missing show id is not an error here.
    pub async fn resolve(
        &self,
        plex_key: &str,
        server: &ServerContext,
        run: &RunToken,
    ) -> Result<ResolvedMetadata, RunAbort> {
        let fetched = self.fetch_record(plex_key, server).await;
        run.checkpoint("metadata fetch")?;
        let record = fetched?.ok_or_else(|| SkipReason::Parse("empty metadata container".into()))?;

        if record.kind == MediaKind::Movie {
            return Err(SkipReason::Excluded.into());
        }

        let mut identity = record.identity();
        if identity.show_id.is_none() {
            for key in record.fallback_keys().into_iter().take(MAX_FALLBACK_FETCHES) {
                let fetched = self.fetch_record(&key, server).await;
                run.checkpoint("fallback metadata fetch")?;
                let related = match fetched {
                    Ok(Some(r)) => r.identity(),
                    Ok(None) => continue,
                    Err(reason) => {
                        debug!(%key, %reason, "fallback fetch failed");
                        continue;
                    }
                };
                if related.show_id.is_some() {
                    debug!(%key, show_id = ?related.show_id, "show id from related record");
                    identity.show_id = related.show_id;
                    identity.fill_missing_from(&related);
                    break;
                }
            }
        }

        Ok(ResolvedMetadata {
            identity,
            kind: record.kind,
        })
    }
}
