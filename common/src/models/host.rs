use std::collections::BTreeSet;
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;

/// DNS answer for one candidate. Re-resolving produces a new value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedHost {
    pub hostname: String,
    pub addresses: BTreeSet<IpAddr>,
    pub cname: Option<String>,
    pub wildcard_suspect: bool,
    pub resolved_at: DateTime<Utc>,
}

impl ResolvedHost {
    pub fn new(hostname: impl Into<String>, addresses: BTreeSet<IpAddr>, cname: Option<String>) -> Self {
        Self {
            hostname: hostname.into(),
            addresses,
            cname,
            wildcard_suspect: false,
            resolved_at: Utc::now(),
        }
    }

    pub fn with_wildcard_suspect(mut self, suspect: bool) -> Self {
        self.wildcard_suspect = suspect;
        self
    }
}

/// A candidate that did not resolve. Kept inline with the run's results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionFailure {
    pub hostname: String,
    pub error: ErrorKind,
    pub detail: String,
}
