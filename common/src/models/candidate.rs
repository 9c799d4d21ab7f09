use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Registry key of a data source (`crtsh`, `wordlist`, ...).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct SourceId(String);

impl SourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for SourceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(SourceId::new)
    }
}

impl From<&str> for SourceId {
    fn from(value: &str) -> Self {
        SourceId::new(value)
    }
}

/// An unverified hostname as a single source reported it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub hostname: String,
    pub source: SourceId,
    pub discovered_at: DateTime<Utc>,
}

impl Candidate {
    pub fn new(hostname: impl Into<String>, source: SourceId) -> Self {
        Self {
            hostname: hostname.into(),
            source,
            discovered_at: Utc::now(),
        }
    }
}

/// One hostname after merging, with every source that reported it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupedCandidate {
    pub hostname: String,
    pub primary_source: SourceId,
    pub sources: BTreeSet<SourceId>,
    pub first_seen: DateTime<Utc>,
}

impl DedupedCandidate {
    pub fn first(hostname: String, candidate: &Candidate) -> Self {
        Self {
            hostname,
            primary_source: candidate.source.clone(),
            sources: BTreeSet::from([candidate.source.clone()]),
            first_seen: candidate.discovered_at,
        }
    }
}
