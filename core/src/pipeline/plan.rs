//! Which stages a run executes.
//!
//! Discovery and deduplication always run. Resolution, wildcard validation
//! and probing can be switched off; dropping resolution drops everything that
//! depends on it.

use std::collections::BTreeSet;

use sigma_common::models::run::PipelineState;
use thiserror::Error;

pub const STAGE_NAMES: [&str; 5] = ["discover", "dedupe", "resolve", "validate", "probe"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("unknown stage '{name}' (expected one of: {known})", name = .0, known = STAGE_NAMES.join(", "))]
    Unknown(String),
    #[error("stage '{0}' cannot be skipped")]
    Required(String),
    #[error("stage '{0}' requires 'resolve' to be selected as well")]
    NeedsResolve(String),
    #[error("cannot continue from '{0}': the stage is not planned")]
    NotResumable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagePlan {
    pub resolve: bool,
    pub validate: bool,
    pub probe: bool,
}

impl Default for StagePlan {
    fn default() -> Self {
        Self::full()
    }
}

impl StagePlan {
    pub fn full() -> Self {
        Self {
            resolve: true,
            validate: true,
            probe: true,
        }
    }

    pub fn discover_only() -> Self {
        Self {
            resolve: false,
            validate: false,
            probe: false,
        }
    }

    /// `only` selects stages explicitly; `skip` removes stages from the full plan.
    pub fn from_names(only: &[String], skip: &[String]) -> Result<Self, PlanError> {
        let only = parse_names(only)?;
        let skip = parse_names(skip)?;

        for required in ["discover", "dedupe"] {
            if skip.contains(required) {
                return Err(PlanError::Required(required.to_string()));
            }
        }

        if !only.is_empty() && !only.contains("resolve") {
            if let Some(dependent) = ["validate", "probe"].into_iter().find(|s| only.contains(s)) {
                return Err(PlanError::NeedsResolve(dependent.to_string()));
            }
        }

        let wanted = |stage: &str| (only.is_empty() || only.contains(stage)) && !skip.contains(stage);
        Ok(Self {
            resolve: wanted("resolve"),
            validate: wanted("validate"),
            probe: wanted("probe"),
        }
        .normalized())
    }

    /// Entry point for a run seeded with hostnames an earlier run carried up
    /// to `stage`. Resolution reruns on the seeds so they get fresh addresses;
    /// continuing from `probe` skips validation.
    pub fn starting_at(mut self, stage: &str) -> Result<Self, PlanError> {
        let planned = match stage {
            "resolve" => self.resolve,
            "validate" => self.validate,
            "probe" => self.probe,
            other if STAGE_NAMES.contains(&other) => false,
            other => return Err(PlanError::Unknown(other.to_string())),
        };
        if !planned {
            return Err(PlanError::NotResumable(stage.to_string()));
        }
        if stage == "probe" {
            self.validate = false;
        }
        Ok(self)
    }

    fn normalized(mut self) -> Self {
        if !self.resolve {
            self.validate = false;
            self.probe = false;
        }
        self
    }

    /// The state entered once the stage owning `current` has drained.
    /// `None` when nothing planned follows.
    pub fn next_after(&self, current: PipelineState) -> Option<PipelineState> {
        let order = [
            (PipelineState::Deduping, true),
            (PipelineState::Resolving, self.resolve),
            (PipelineState::Validating, self.validate),
            (PipelineState::Probing, self.probe),
        ];
        order
            .into_iter()
            .find(|(state, planned)| *planned && *state > current)
            .map(|(state, _)| state)
    }

    pub fn describe(&self) -> String {
        let mut stages = vec!["discover", "dedupe"];
        if self.resolve {
            stages.push("resolve");
        }
        if self.validate {
            stages.push("validate");
        }
        if self.probe {
            stages.push("probe");
        }
        stages.join(" → ")
    }
}

fn parse_names(raw: &[String]) -> Result<BTreeSet<&'static str>, PlanError> {
    raw.iter()
        .flat_map(|entry| entry.split(','))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|name| {
            let lower = name.to_ascii_lowercase();
            STAGE_NAMES
                .iter()
                .find(|known| **known == lower)
                .copied()
                .ok_or_else(|| PlanError::Unknown(name.to_string()))
        })
        .collect()
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
