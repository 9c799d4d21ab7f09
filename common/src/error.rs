//! # Error Taxonomy
//!
//! Per-item failures (one hostname failing to resolve or answer) are carried
//! inline in result records as an [`ErrorKind`]. Per-source failures end up in
//! that source's stats. Only [`PipelineError`] aborts a whole run.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::run::PipelineState;

/// Classification attached to records, stats and log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A source could not be used at all (missing key, malformed config) or gave up after retries.
    SourceUnavailable,
    /// A rate-limit slot was not granted before the caller's deadline.
    RateLimitTimeout,
    /// The name does not exist.
    Nxdomain,
    /// A DNS query ran out of time on every attempt.
    Timeout,
    /// Any other DNS failure (SERVFAIL, refused, no usable records).
    ResolutionError,
    /// Network or HTTP failure while probing.
    ProbeError,
    /// Work was abandoned because the run was cancelled.
    Cancelled,
    /// No valid target or source; the run never started.
    FatalConfig,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::SourceUnavailable => "source_unavailable",
            ErrorKind::RateLimitTimeout => "rate_limit_timeout",
            ErrorKind::Nxdomain => "nxdomain",
            ErrorKind::Timeout => "timeout",
            ErrorKind::ResolutionError => "resolution_error",
            ErrorKind::ProbeError => "probe_error",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::FatalConfig => "fatal_config",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failures raised while a source adapter is preparing or enumerating.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Fail-fast condition detected before anything was emitted.
    #[error("source {source_id} unavailable: {reason}")]
    Unavailable { source_id: String, reason: String },

    /// The remote rejected the request because of its own rate limiting.
    #[error("rate limited by remote: {0}")]
    RateLimited(String),

    /// The local limiter did not grant a slot in time.
    #[error("no rate-limit slot granted within {0:?}")]
    RateLimitTimeout(Duration),

    /// Connection, TLS or 5xx failure. Retried.
    #[error("transient failure: {0}")]
    Transient(String),

    /// The request ran past its deadline. Retried.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The remote answered with something unusable. Not retried.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// Retries are spent; carries the last underlying error.
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },

    #[error("cancelled")]
    Cancelled,
}

impl SourceError {
    /// Whether another attempt may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SourceError::RateLimited(_) | SourceError::Transient(_) | SourceError::Timeout(_)
        )
    }

    /// The taxonomy entry recorded in the source's stats.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SourceError::RateLimitTimeout(_) => ErrorKind::RateLimitTimeout,
            SourceError::Cancelled => ErrorKind::Cancelled,
            _ => ErrorKind::SourceUnavailable,
        }
    }
}

/// Failures that stop a run before or while it executes.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("fatal configuration error in {stage} stage: {reason}")]
    FatalConfig { stage: PipelineState, reason: String },

    #[error("infrastructure failure during {stage}: {reason}")]
    Infrastructure { stage: PipelineState, reason: String },
}

impl PipelineError {
    pub fn fatal(reason: impl Into<String>) -> Self {
        PipelineError::FatalConfig {
            stage: PipelineState::Idle,
            reason: reason.into(),
        }
    }

    pub fn stage(&self) -> PipelineState {
        match self {
            PipelineError::FatalConfig { stage, .. } | PipelineError::Infrastructure { stage, .. } => *stage,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid api key file {path}: {source}")]
    ApiKeys {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
