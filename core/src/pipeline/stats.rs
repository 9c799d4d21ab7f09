//! Per-source and per-stage bookkeeping for one run.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use sigma_common::error::SourceError;
use sigma_common::models::candidate::SourceId;
use sigma_common::models::stats::{SourceOutcome, SourceRunStats, StageCounters};
use tokio::sync::watch;

use super::state::Progress;

/// How a source's stream ended.
pub struct SourceEnd<'a> {
    pub outcome: SourceOutcome,
    pub error: Option<&'a SourceError>,
    pub elapsed: Duration,
    pub request_errors: u64,
    pub rate_limited: bool,
}

pub struct StatsBook {
    sources: Mutex<BTreeMap<SourceId, SourceRunStats>>,
    counters: Mutex<StageCounters>,
    progress: watch::Sender<Progress>,
}

impl StatsBook {
    pub fn new(progress: watch::Sender<Progress>) -> Self {
        Self {
            sources: Mutex::new(BTreeMap::new()),
            counters: Mutex::new(StageCounters::default()),
            progress,
        }
    }

    pub fn register(&self, source: &SourceId) {
        let mut sources = self.sources.lock().unwrap_or_else(|e| e.into_inner());
        sources
            .entry(source.clone())
            .or_insert_with(|| SourceRunStats::new(source.clone()));
    }

    /// Counts one emitted candidate. No effect once the source is frozen.
    pub fn found(&self, source: &SourceId) {
        let mut sources = self.sources.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(stats) = sources.get_mut(source).filter(|s| !s.is_frozen()) {
            stats.candidates_found += 1;
        }
    }

    /// Records how a source ended. Only the first call per source counts.
    pub fn freeze(&self, source: &SourceId, end: SourceEnd<'_>) {
        let mut sources = self.sources.lock().unwrap_or_else(|e| e.into_inner());
        let stats = sources
            .entry(source.clone())
            .or_insert_with(|| SourceRunStats::new(source.clone()));
        if stats.is_frozen() {
            return;
        }
        stats.outcome = end.outcome;
        stats.duration_ms = end.elapsed.as_millis() as u64;
        stats.errors = stats.errors.max(end.request_errors);
        stats.rate_limited |= end.rate_limited;
        if let Some(err) = end.error {
            stats.error = Some(err.kind());
            stats.detail = Some(err.to_string());
        } else if end.outcome == SourceOutcome::Cancelled {
            stats.error = Some(sigma_common::error::ErrorKind::Cancelled);
        }
    }

    /// Applies `f` to the stage counters and publishes the result. Returns the new values.
    pub fn bump(&self, f: impl FnOnce(&mut StageCounters)) -> StageCounters {
        let snapshot = {
            let mut counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
            f(&mut counters);
            *counters
        };
        self.progress.send_modify(|p| p.counters = snapshot);
        snapshot
    }

    pub fn counters(&self) -> StageCounters {
        *self.counters.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn sources(&self) -> BTreeMap<SourceId, SourceRunStats> {
        self.sources.lock().unwrap_or_else(|e| e.into_inner()).clone()
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

#[cfg(test)]
mod tests {
    use sigma_common::error::ErrorKind;

    use super::*;

    fn book() -> StatsBook {
        let (tx, _rx) = watch::channel(Progress::default());
        StatsBook::new(tx)
    }

    #[test]
    fn frozen_sources_ignore_late_updates() {
        let stats = book();
        let id = SourceId::new("crtsh");
        stats.register(&id);
        stats.found(&id);
        stats.found(&id);

        let err = SourceError::Exhausted {
            attempts: 4,
            last: "connection refused".into(),
        };
        stats.freeze(
            &id,
            SourceEnd {
                outcome: SourceOutcome::Failed,
                error: Some(&err),
                elapsed: Duration::from_millis(1500),
                request_errors: 4,
                rate_limited: false,
            },
        );
        stats.found(&id);
        stats.freeze(
            &id,
            SourceEnd {
                outcome: SourceOutcome::Completed,
                error: None,
                elapsed: Duration::ZERO,
                request_errors: 0,
                rate_limited: true,
            },
        );

        let snapshot = stats.sources()[&id].clone();
        assert_eq!(snapshot.candidates_found, 2);
        assert_eq!(snapshot.outcome, SourceOutcome::Failed);
        assert_eq!(snapshot.error, Some(ErrorKind::SourceUnavailable));
        assert_eq!(snapshot.errors, 4);
        assert_eq!(snapshot.duration_ms, 1500);
        assert!(!snapshot.rate_limited);
    }

    #[test]
    fn bump_publishes_counters() {
        let (tx, rx) = watch::channel(Progress::default());
        let stats = StatsBook::new(tx);

        stats.bump(|c| c.candidates_unique += 3);
        let after = stats.bump(|c| c.resolved += 1);

        assert_eq!(after.candidates_unique, 3);
        assert_eq!(rx.borrow().counters.resolved, 1);
    }
}
