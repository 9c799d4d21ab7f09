//! Run lifecycle: `Idle → Discovering → Deduping → Resolving → Validating →
//! Probing → Completed`, or `Cancelling → Cancelled` from any non-terminal
//! state. Transitions only move forward and are published to watchers.

use std::sync::Mutex;

use chrono::Utc;
use sigma_common::models::run::{PipelineState, StateTransition};
use sigma_common::models::stats::StageCounters;
use tokio::sync::watch;

/// What a watcher sees while a run is in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub state: PipelineState,
    pub counters: StageCounters,
}

impl Default for Progress {
    fn default() -> Self {
        Self {
            state: PipelineState::Idle,
            counters: StageCounters::default(),
        }
    }
}

pub struct StateMachine {
    log: Mutex<Vec<StateTransition>>,
    progress: watch::Sender<Progress>,
}

impl StateMachine {
    pub fn new(progress: watch::Sender<Progress>) -> Self {
        progress.send_replace(Progress::default());
        Self {
            log: Mutex::new(vec![StateTransition {
                state: PipelineState::Idle,
                at: Utc::now(),
            }]),
            progress,
        }
    }

    pub fn current(&self) -> PipelineState {
        self.lock().last().map(|t| t.state).unwrap_or(PipelineState::Idle)
    }

    /// Moves forward to `to`. Ignored once cancelling, or if `to` is not ahead.
    pub fn advance(&self, to: PipelineState) -> bool {
        let mut log = self.lock();
        let current = log.last().map(|t| t.state).unwrap_or(PipelineState::Idle);
        if matches!(current, PipelineState::Cancelling) || current.is_terminal() || to <= current {
            return false;
        }
        self.push(&mut log, to);
        true
    }

    /// Enters `Cancelling` unless the run already ended.
    pub fn cancel(&self) -> bool {
        let mut log = self.lock();
        let current = log.last().map(|t| t.state).unwrap_or(PipelineState::Idle);
        if current.is_terminal() || current == PipelineState::Cancelling {
            return false;
        }
        self.push(&mut log, PipelineState::Cancelling);
        true
    }

    /// Terminal transition: `Cancelled` after a cancel, `Completed` otherwise.
    pub fn finish(&self) -> PipelineState {
        let mut log = self.lock();
        let current = log.last().map(|t| t.state).unwrap_or(PipelineState::Idle);
        if current.is_terminal() {
            return current;
        }
        let terminal = if current == PipelineState::Cancelling {
            PipelineState::Cancelled
        } else {
            PipelineState::Completed
        };
        self.push(&mut log, terminal);
        terminal
    }

    pub fn transitions(&self) -> Vec<StateTransition> {
        self.lock().clone()
    }

    fn push(&self, log: &mut Vec<StateTransition>, state: PipelineState) {
        let from = log.last().map(|t| t.state).unwrap_or(PipelineState::Idle);
        log.push(StateTransition { state, at: Utc::now() });
        tracing::info!(%from, to = %state, "pipeline state changed");
        self.progress.send_modify(|p| p.state = state);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<StateTransition>> {
        self.log.lock().unwrap_or_else(|e| e.into_inner())
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
