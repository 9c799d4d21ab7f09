//! # HTTP Fetch Seam
//!
//! Sources and the prober issue GET requests through [`HttpFetcher`]. The
//! production client is reqwest with rustls; tests substitute canned responses.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::redirect::Policy;
use reqwest::{Client, Url};
use sigma_common::config::Config;
use thiserror::Error;

/// Response bodies larger than this are truncated for API sources.
pub const SOURCE_BODY_LIMIT: usize = 32 * 1024 * 1024;
/// The prober only needs the head of a page for titles and markers.
pub const PROBE_BODY_LIMIT: usize = 512 * 1024;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
    /// Where the request ended up after redirects.
    pub final_url: String,
}

impl HttpResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
            ..Default::default()
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("could not read body: {0}")]
    Body(String),
    #[error("{0}")]
    Other(String),
}

#[async_trait]
pub trait HttpFetcher: Send + Sync {
    async fn get(&self, url: &str, headers: &[(&str, String)]) -> Result<HttpResponse, FetchError>;
}

pub struct ReqwestFetcher {
    client: Client,
    max_body: usize,
}

impl ReqwestFetcher {
    pub fn new(cfg: &Config, max_body: usize) -> Result<Self, FetchError> {
        Self::with_timeout(cfg, cfg.request_timeout(), max_body)
    }

    pub fn with_timeout(cfg: &Config, timeout: Duration, max_body: usize) -> Result<Self, FetchError> {
        let client = Client::builder()
            .redirect(Policy::limited(4))
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .danger_accept_invalid_certs(true)
            .user_agent(cfg.user_agent.clone())
            .build()
            .map_err(|e| FetchError::Other(e.to_string()))?;
        Ok(Self { client, max_body })
    }
}

#[async_trait]
impl HttpFetcher for ReqwestFetcher {
    async fn get(&self, url: &str, headers: &[(&str, String)]) -> Result<HttpResponse, FetchError> {
        let url = Url::parse(url).map_err(|e| FetchError::Other(format!("bad url {url}: {e}")))?;
        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(*name, value);
        }

        let mut response = request.send().await.map_err(classify)?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();

        let mut raw = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| FetchError::Body(e.to_string()))? {
            let room = self.max_body.saturating_sub(raw.len());
            raw.extend_from_slice(&chunk[..chunk.len().min(room)]);
            if raw.len() >= self.max_body {
                tracing::debug!(%final_url, limit = self.max_body, "response body truncated");
                break;
            }
        }

        Ok(HttpResponse {
            status,
            headers,
            body: String::from_utf8_lossy(&raw).into_owned(),
            final_url,
        })
    }
}

fn classify(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else if e.is_connect() {
        FetchError::Connect(e.to_string())
    } else {
        FetchError::Other(e.to_string())
    }
}
