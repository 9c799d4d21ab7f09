//! Merges the interleaved candidate streams into one record per hostname.

use std::collections::HashMap;
use std::sync::Mutex;

use sigma_common::models::candidate::{Candidate, DedupedCandidate};
use sigma_common::utils::hostname::{self, HostnameError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DedupOutcome {
    /// First sighting; forward downstream.
    New(DedupedCandidate),
    /// Already known; the source was added to its provenance.
    Merged,
    /// New hostname past the candidate cap.
    Dropped,
}

#[derive(Default)]
pub struct Deduplicator {
    seen: Mutex<HashMap<String, DedupedCandidate>>,
    cap: Option<usize>,
}

impl Deduplicator {
    pub fn new(cap: Option<usize>) -> Self {
        Self {
            seen: Mutex::new(HashMap::new()),
            cap,
        }
    }

    /// Check-and-insert under one lock. `hostname` must already be normalized.
    pub fn insert(&self, hostname: String, candidate: &Candidate) -> DedupOutcome {
        let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(existing) = seen.get_mut(&hostname) {
            existing.sources.insert(candidate.source.clone());
            if candidate.discovered_at < existing.first_seen {
                existing.first_seen = candidate.discovered_at;
            }
            return DedupOutcome::Merged;
        }

        if self.cap.is_some_and(|cap| seen.len() >= cap) {
            return DedupOutcome::Dropped;
        }

        let record = DedupedCandidate::first(hostname.clone(), candidate);
        seen.insert(hostname, record.clone());
        DedupOutcome::New(record)
    }

    pub fn insert_raw(&self, candidate: &Candidate) -> Result<DedupOutcome, HostnameError> {
        let key = hostname::normalize(&candidate.hostname)?;
        Ok(self.insert(key, candidate))
    }

    pub fn len(&self) -> usize {
        self.seen.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current records with their final provenance, sorted by hostname.
    pub fn snapshot(&self) -> Vec<DedupedCandidate> {
        let seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
        let mut records: Vec<_> = seen.values().cloned().collect();
        records.sort_by(|a, b| a.hostname.cmp(&b.hostname));
        records
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
