//! # Pipeline Run
//!
//! The aggregate a run hands back to its caller. It is assembled by the
//! orchestrator from [`RunParts`] and sealed: after [`PipelineRun::seal`] there
//! is no way to mutate it.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::candidate::{DedupedCandidate, SourceId};
use crate::models::host::{ResolutionFailure, ResolvedHost};
use crate::models::probe::ProbeResult;
use crate::models::stats::{CancelSummary, SourceRunStats, StageCounters};
use crate::models::target::Target;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    Discovering,
    Deduping,
    Resolving,
    Validating,
    Probing,
    Completed,
    Cancelling,
    Cancelled,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Completed | PipelineState::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::Discovering => "discovering",
            PipelineState::Deduping => "deduping",
            PipelineState::Resolving => "resolving",
            PipelineState::Validating => "validating",
            PipelineState::Probing => "probing",
            PipelineState::Completed => "completed",
            PipelineState::Cancelling => "cancelling",
            PipelineState::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTransition {
    pub state: PipelineState,
    pub at: DateTime<Utc>,
}

/// Everything the orchestrator collected, before sealing.
#[derive(Debug)]
pub struct RunParts {
    pub run_id: Uuid,
    pub target: Target,
    pub started_at: DateTime<Utc>,
    pub transitions: Vec<StateTransition>,
    pub candidates: Vec<DedupedCandidate>,
    pub resolved: Vec<ResolvedHost>,
    pub resolution_failures: Vec<ResolutionFailure>,
    pub wildcard_filtered: Vec<String>,
    pub probes: Vec<ProbeResult>,
    pub source_stats: BTreeMap<SourceId, SourceRunStats>,
    pub counters: StageCounters,
    pub cancel_summary: Option<CancelSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineRun {
    run_id: Uuid,
    target: Target,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    state: PipelineState,
    transitions: Vec<StateTransition>,
    candidates: Vec<DedupedCandidate>,
    resolved: Vec<ResolvedHost>,
    resolution_failures: Vec<ResolutionFailure>,
    wildcard_filtered: Vec<String>,
    probes: Vec<ProbeResult>,
    source_stats: BTreeMap<SourceId, SourceRunStats>,
    counters: StageCounters,
    cancel_summary: Option<CancelSummary>,
}

impl PipelineRun {
    pub fn seal(mut parts: RunParts) -> Self {
        let state = parts
            .transitions
            .last()
            .map(|t| t.state)
            .unwrap_or(PipelineState::Idle);

        parts.candidates.sort_by(|a, b| a.hostname.cmp(&b.hostname));
        parts.resolved.sort_by(|a, b| a.hostname.cmp(&b.hostname));
        parts.probes.sort_by(|a, b| a.hostname.cmp(&b.hostname));
        parts.wildcard_filtered.sort();

        Self {
            run_id: parts.run_id,
            target: parts.target,
            started_at: parts.started_at,
            finished_at: Utc::now(),
            state,
            transitions: parts.transitions,
            candidates: parts.candidates,
            resolved: parts.resolved,
            resolution_failures: parts.resolution_failures,
            wildcard_filtered: parts.wildcard_filtered,
            probes: parts.probes,
            source_stats: parts.source_stats,
            counters: parts.counters,
            cancel_summary: parts.cancel_summary,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> DateTime<Utc> {
        self.finished_at
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn is_cancelled(&self) -> bool {
        self.state == PipelineState::Cancelled
    }

    pub fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }

    /// Deduplicated candidates sorted by hostname, with final provenance.
    pub fn candidates(&self) -> &[DedupedCandidate] {
        &self.candidates
    }

    pub fn resolved(&self) -> &[ResolvedHost] {
        &self.resolved
    }

    pub fn resolution_failures(&self) -> &[ResolutionFailure] {
        &self.resolution_failures
    }

    pub fn wildcard_filtered(&self) -> &[String] {
        &self.wildcard_filtered
    }

    pub fn probes(&self) -> &[ProbeResult] {
        &self.probes
    }

    pub fn source_stats(&self) -> &BTreeMap<SourceId, SourceRunStats> {
        &self.source_stats
    }

    pub fn counters(&self) -> &StageCounters {
        &self.counters
    }

    pub fn cancel_summary(&self) -> Option<&CancelSummary> {
        self.cancel_summary.as_ref()
    }

    pub fn failed_sources(&self) -> impl Iterator<Item = &SourceRunStats> {
        self.source_stats.values().filter(|stats| stats.failed())
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}
