//! # Prober
//!
//! Checks whether a resolved host answers HTTP and collects what it can from
//! the first response: status, `<title>` and technology markers. HTTPS is
//! tried first; plain HTTP only when HTTPS fails at the network level.

use std::sync::Arc;

use chrono::Utc;
use sigma_common::models::host::ResolvedHost;
use sigma_common::models::probe::ProbeResult;
use sigma_protocols::{fingerprint, html};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::http::{FetchError, HttpFetcher, HttpResponse};

const SCHEMES: [&str; 2] = ["https", "http"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProbeRejected {
    #[error("host is a wildcard suspect")]
    WildcardSuspect,
    #[error("cancelled")]
    Cancelled,
}

pub struct Prober {
    http: Arc<dyn HttpFetcher>,
    pool: Semaphore,
    skip_wildcard_filter: bool,
}

impl Prober {
    pub fn new(http: Arc<dyn HttpFetcher>, concurrency: usize, skip_wildcard_filter: bool) -> Self {
        Self {
            http,
            pool: Semaphore::new(concurrency.max(1)),
            skip_wildcard_filter,
        }
    }

    pub async fn probe(
        &self,
        host: Arc<ResolvedHost>,
        cancel: &CancellationToken,
    ) -> Result<ProbeResult, ProbeRejected> {
        if host.wildcard_suspect && !self.skip_wildcard_filter {
            return Err(ProbeRejected::WildcardSuspect);
        }

        let _slot = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ProbeRejected::Cancelled),
            slot = self.pool.acquire() => slot.map_err(|_| ProbeRejected::Cancelled)?,
        };

        let mut last_error = None;
        for scheme in SCHEMES {
            let url = format!("{scheme}://{}/", host.hostname);
            let attempt = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ProbeRejected::Cancelled),
                res = self.http.get(&url, &[]) => res,
            };
            match attempt {
                Ok(response) => return Ok(describe(host, url, response)),
                Err(e) => {
                    tracing::debug!(%url, "probe failed: {e}");
                    last_error = Some((url, e));
                }
            }
        }

        let (url, err) = last_error.unwrap_or_else(|| (String::new(), FetchError::Other("no scheme tried".into())));
        Ok(ProbeResult::failed(host, url, err.to_string()))
    }
}

fn describe(host: Arc<ResolvedHost>, url: String, response: HttpResponse) -> ProbeResult {
    let url = if response.final_url.is_empty() {
        url
    } else {
        response.final_url.clone()
    };
    ProbeResult {
        hostname: host.hostname.clone(),
        url,
        resolved: host,
        http_status: Some(response.status),
        title: html::extract_title(&response.body),
        tech_tags: fingerprint::fingerprint(&response.headers, &response.body),
        probed_at: Utc::now(),
        error: None,
        error_detail: None,
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
