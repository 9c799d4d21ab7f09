use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;
use crate::models::candidate::SourceId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceOutcome {
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// Per-source bookkeeping for one run. Owned and updated by the orchestrator only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRunStats {
    pub source_id: SourceId,
    pub candidates_found: u64,
    pub errors: u64,
    pub rate_limited: bool,
    pub duration_ms: u64,
    pub outcome: SourceOutcome,
    pub error: Option<ErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl SourceRunStats {
    pub fn new(source_id: SourceId) -> Self {
        Self {
            source_id,
            candidates_found: 0,
            errors: 0,
            rate_limited: false,
            duration_ms: 0,
            outcome: SourceOutcome::Running,
            error: None,
            detail: None,
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.outcome != SourceOutcome::Running
    }

    pub fn failed(&self) -> bool {
        self.outcome == SourceOutcome::Failed
    }
}

/// Item counts per stage, used for summaries and the cancellation report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageCounters {
    pub candidates_received: u64,
    pub candidates_rejected: u64,
    pub candidates_unique: u64,
    pub candidates_dropped: u64,
    pub resolved: u64,
    pub resolution_failures: u64,
    pub wildcard_filtered: u64,
    pub probed: u64,
    pub probe_failures: u64,
    pub sink_failures: u64,
}

/// Completed vs abandoned work when a run stops early.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelSummary {
    pub completed: u64,
    pub abandoned: u64,
}
