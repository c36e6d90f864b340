//! Page fetching with browser-like headers and an optional dynamic-render
//! fallback for script-gated pages.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, PRAGMA};
use serde_json::json;
use tracing::debug;
use url::Url;

use crate::error::HarvestError;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36";
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// One fetched response, body already read.
#[derive(Clone, Debug)]
pub struct FetchedPage {
    pub url: Url,
    pub status: u16,
    pub content_type: String,
    pub body: String,
}

impl FetchedPage {
    pub fn is_html(&self) -> bool {
        self.content_type.starts_with("text/html")
    }
}

/// Fallback renderer for pages whose static HTML is too thin.
///
/// The production implementation posts to a headless-browser rendering
/// service that waits for DOM load, clicks a visible continue/agree button,
/// and waits until the body text exceeds 500 characters.
#[async_trait]
pub trait DynamicRenderer: Send + Sync {
    async fn render(&self, url: &Url) -> Result<String, HarvestError>;
}

/// HTTP client for a rendering service speaking
/// `POST {endpoint} { "url", "wait_for_body_chars", "click_texts" }` ->
/// `{ "html": ... }`.
pub struct HttpRenderer {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpRenderer {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl DynamicRenderer for HttpRenderer {
    async fn render(&self, url: &Url) -> Result<String, HarvestError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&json!({
                "url": url.as_str(),
                "wait_for_body_chars": 500,
                "click_texts": ["continue", "agree"],
            }))
            .timeout(FETCH_TIMEOUT)
            .send()
            .await
            .map_err(|e| HarvestError::Render(e.to_string()))?
            .error_for_status()
            .map_err(|e| HarvestError::Render(e.to_string()))?;
        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| HarvestError::Render(e.to_string()))?;
        value
            .get("html")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| HarvestError::Render("rendering service returned no html".into()))
    }
}

/// Fetcher shared by the crawler and the sitemap prober.
pub struct PageFetcher {
    client: reqwest::Client,
    renderer: Option<Arc<dyn DynamicRenderer>>,
}

impl PageFetcher {
    pub fn new(renderer: Option<Arc<dyn DynamicRenderer>>) -> Result<Self, HarvestError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,application/json;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| HarvestError::Fetch(e.to_string()))?;

        Ok(Self { client, renderer })
    }

    pub fn has_renderer(&self) -> bool {
        self.renderer.is_some()
    }

    pub async fn fetch(&self, url: &Url) -> Result<FetchedPage, HarvestError> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_lowercase();
        let body = response.text().await?;
        debug!(url = %url, status, content_type = %content_type, bytes = body.len(), "fetched");
        Ok(FetchedPage {
            url: url.clone(),
            status,
            content_type,
            body,
        })
    }

    /// Re-requests a thin page through the rendering fallback.
    pub async fn render(&self, url: &Url) -> Result<String, HarvestError> {
        match &self.renderer {
            Some(renderer) => renderer.render(url).await,
            None => Err(HarvestError::Render("no dynamic renderer configured".into())),
        }
    }
}
