//! The privileged fetch proxy.
//!
//! Cross-origin requests are made on the pipeline's behalf by a proxy that
//! owns no caching or retry logic. [`FetchProxy`] is that seam; the
//! message types below are its JSON contract, tagged by `action`:
//!
//! ```json
//! { "action": "fetchPageMetadata", "url": "...", "token": "..." }
//! → { "success": true, "text": "<MediaContainer .../>", "status": 200 }
//! → { "error": "connection refused" }
//!
//! { "action": "fetchExternalRating", "showId": 100 }
//! → { "success": true, "rating": 4.1, "ratingOutOf10": 8.2, "seasonMap": { "1": 3624 } }
//! ```
//!
//! [`HttpProxy`] performs the requests itself with `reqwest`.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Config;
use crate::links::show_url;
use crate::models::SeasonMap;
use crate::rating::parse_rating_page;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ProxyRequest {
    FetchPageMetadata {
        url: String,
        token: String,
    },
    FetchExternalRating {
        #[serde(rename = "showId")]
        show_id: u64,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageMetadataResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PageMetadataResponse {
    pub fn ok(status: u16, text: String) -> Self {
        Self {
            success: true,
            text: Some(text),
            status: Some(status),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }

    /// Response body when the request succeeded, otherwise a description
    /// of what went wrong.
    pub fn into_body(self) -> std::result::Result<String, String> {
        match (self.success, self.text) {
            (true, Some(text)) => Ok(text),
            _ => Err(self
                .error
                .or_else(|| self.status.map(|s| format!("HTTP {}", s)))
                .unwrap_or_else(|| "empty response".to_string())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalRatingResponse {
    #[serde(default)]
    pub success: bool,
    /// Five-point display value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(
        default,
        rename = "ratingOutOf10",
        skip_serializing_if = "Option::is_none"
    )]
    pub rating_out_of_10: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season_map: Option<SeasonMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Pushed by the host whenever the page itself requests metadata from its
/// server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum HostMessage {
    ServerApiIntercepted {
        url: String,
        #[serde(rename = "serverUrl")]
        server_url: String,
        #[serde(rename = "serverId", default)]
        server_id: Option<String>,
        token: String,
    },
}

#[async_trait]
pub trait FetchProxy: Send + Sync {
    async fn fetch_page_metadata(&self, url: &str, token: &str) -> Result<PageMetadataResponse>;

    async fn fetch_external_rating(&self, show_id: u64) -> Result<ExternalRatingResponse>;
}

/// Answer one request message, for hosts that talk to the proxy over a
/// message channel.
pub async fn dispatch(proxy: &dyn FetchProxy, request: ProxyRequest) -> serde_json::Value {
    let response = match request {
        ProxyRequest::FetchPageMetadata { url, token } => proxy
            .fetch_page_metadata(&url, &token)
            .await
            .and_then(|r| Ok(serde_json::to_value(r)?)),
        ProxyRequest::FetchExternalRating { show_id } => proxy
            .fetch_external_rating(show_id)
            .await
            .and_then(|r| Ok(serde_json::to_value(r)?)),
    };
    response.unwrap_or_else(|e| serde_json::json!({ "error": e.to_string() }))
}

/// Proxy that performs the requests directly.
pub struct HttpProxy {
    client: reqwest::Client,
    provider_base_url: String,
}

impl HttpProxy {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.plex.timeout_secs))
            .user_agent(concat!("plexbadge/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            provider_base_url: config.provider.base_url.clone(),
        })
    }
}

#[async_trait]
impl FetchProxy for HttpProxy {
    async fn fetch_page_metadata(&self, url: &str, token: &str) -> Result<PageMetadataResponse> {
        debug!(url, "fetching metadata");
        let resp = self
            .client
            .get(url)
            .header("X-Plex-Token", token)
            .header("Accept", "application/xml")
            .send()
            .await;

        let response = match resp {
            Ok(response) => response,
            Err(e) => return Ok(PageMetadataResponse::failed(e.to_string())),
        };

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if status.is_success() {
            Ok(PageMetadataResponse::ok(status.as_u16(), text))
        } else {
            Ok(PageMetadataResponse {
                success: false,
                text: None,
                status: Some(status.as_u16()),
                error: None,
            })
        }
    }

    async fn fetch_external_rating(&self, show_id: u64) -> Result<ExternalRatingResponse> {
        let url = show_url(&self.provider_base_url, show_id);
        debug!(%url, "fetching rating page");

        let response = match self.client.get(&url).send().await {
            Ok(r) => r,
            Err(e) => {
                return Ok(ExternalRatingResponse {
                    error: Some(e.to_string()),
                    ..Default::default()
                })
            }
        };

        let status = response.status();
        if !status.is_success() {
            return Ok(ExternalRatingResponse {
                error: Some(format!("HTTP {}", status)),
                ..Default::default()
            });
        }

        let html = response.text().await?;
        let page = parse_rating_page(&html);
        Ok(ExternalRatingResponse {
            success: true,
            rating: page.display_rating(),
            rating_out_of_10: page.rating_out_of_10,
            season_map: page.season_map,
            error: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_wire_format() {
        let req: ProxyRequest = serde_json::from_value(json!({
            "action": "fetchExternalRating",
            "showId": 100
        }))
        .unwrap();
        assert_eq!(req, ProxyRequest::FetchExternalRating { show_id: 100 });

        let value = serde_json::to_value(ProxyRequest::FetchPageMetadata {
            url: "https://srv/library/metadata/1".to_string(),
            token: "t".to_string(),
        })
        .unwrap();
        assert_eq!(value["action"], "fetchPageMetadata");
        assert_eq!(value["token"], "t");
    }

    #[test]
    fn metadata_response_body() {
        let ok: PageMetadataResponse =
            serde_json::from_value(json!({ "success": true, "text": "<x/>", "status": 200 }))
                .unwrap();
        assert_eq!(ok.into_body(), Ok("<x/>".to_string()));

        let err: PageMetadataResponse =
            serde_json::from_value(json!({ "error": "refused" })).unwrap();
        assert_eq!(err.into_body(), Err("refused".to_string()));

        let status: PageMetadataResponse =
            serde_json::from_value(json!({ "success": false, "status": 401 })).unwrap();
        assert_eq!(status.into_body(), Err("HTTP 401".to_string()));
    }

    #[test]
    fn rating_response_wire_format() {
        let resp: ExternalRatingResponse = serde_json::from_value(json!({
            "success": true,
            "rating": 4.1,
            "ratingOutOf10": 8.2,
            "seasonMap": { "1": 3624, "2": 3625 }
        }))
        .unwrap();
        assert_eq!(resp.rating_out_of_10, Some(8.2));
        assert_eq!(resp.season_map.unwrap().get(&2), Some(&3625));
    }

    #[test]
    fn intercepted_message() {
        let msg: HostMessage = serde_json::from_value(json!({
            "action": "serverApiIntercepted",
            "url": "https://srv:32400/library/metadata/9",
            "serverUrl": "https://srv:32400",
            "serverId": "5f3a9c",
            "token": "abc"
        }))
        .unwrap();
        let HostMessage::ServerApiIntercepted { server_id, .. } = msg;
        assert_eq!(server_id.as_deref(), Some("5f3a9c"));
    }

    struct Refusing;

    #[async_trait]
    impl FetchProxy for Refusing {
        async fn fetch_page_metadata(&self, _: &str, _: &str) -> Result<PageMetadataResponse> {
            anyhow::bail!("proxy unavailable")
        }
        async fn fetch_external_rating(&self, _: u64) -> Result<ExternalRatingResponse> {
            Ok(ExternalRatingResponse {
                success: true,
                rating: Some(3.0),
                ..Default::default()
            })
        }
    }

    #[tokio::test]
    async fn dispatch_reports_errors_in_band() {
        let value = dispatch(
            &Refusing,
            ProxyRequest::FetchPageMetadata {
                url: "u".into(),
                token: "t".into(),
            },
        )
        .await;
        assert_eq!(value, json!({ "error": "proxy unavailable" }));

        let value = dispatch(&Refusing, ProxyRequest::FetchExternalRating { show_id: 1 }).await;
        assert_eq!(value, json!({ "success": true, "rating": 3.0 }));
    }
}
