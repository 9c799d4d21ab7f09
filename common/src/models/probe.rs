use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;
use crate::models::host::ResolvedHost;

/// Outcome of probing one resolved host over HTTP(S).
///
/// A failed probe is still a result: `error` is set and the HTTP fields are empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub hostname: String,
    /// Last URL attempted (the HTTPS one, or the HTTP fallback).
    pub url: String,
    pub resolved: Arc<ResolvedHost>,
    pub http_status: Option<u16>,
    pub title: Option<String>,
    pub tech_tags: BTreeSet<String>,
    pub probed_at: DateTime<Utc>,
    pub error: Option<ErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

impl ProbeResult {
    pub fn failed(resolved: Arc<ResolvedHost>, url: String, detail: impl Into<String>) -> Self {
        Self {
            hostname: resolved.hostname.clone(),
            url,
            resolved,
            http_status: None,
            title: None,
            tech_tags: BTreeSet::new(),
            probed_at: Utc::now(),
            error: Some(ErrorKind::ProbeError),
            error_detail: Some(detail.into()),
        }
    }

    pub fn is_live(&self) -> bool {
        self.error.is_none() && self.http_status.is_some()
    }
}
