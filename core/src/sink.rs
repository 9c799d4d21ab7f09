//! # Record Sinks
//!
//! Every record a stage produces is handed to the run's [`Sink`] wrapped in an
//! [`Envelope`]. A sink failure is logged and counted; it never stops a run.

use std::fmt;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sigma_common::models::candidate::{Candidate, DedupedCandidate};
use sigma_common::models::host::ResolvedHost;
use sigma_common::models::probe::ProbeResult;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Discover,
    Dedupe,
    Resolve,
    Probe,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::Discover, Stage::Dedupe, Stage::Resolve, Stage::Probe];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Discover => "discover",
            Stage::Dedupe => "dedupe",
            Stage::Resolve => "resolve",
            Stage::Probe => "probe",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Record<'a> {
    Discovered(&'a Candidate),
    Unique(&'a DedupedCandidate),
    Resolved(&'a ResolvedHost),
    Probe(&'a ProbeResult),
}

impl Record<'_> {
    pub fn stage(&self) -> Stage {
        match self {
            Record::Discovered(_) => Stage::Discover,
            Record::Unique(_) => Stage::Dedupe,
            Record::Resolved(_) => Stage::Resolve,
            Record::Probe(_) => Stage::Probe,
        }
    }

    pub fn hostname(&self) -> &str {
        match self {
            Record::Discovered(c) => &c.hostname,
            Record::Unique(c) => &c.hostname,
            Record::Resolved(h) => &h.hostname,
            Record::Probe(p) => &p.hostname,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Envelope<'a> {
    pub run_id: Uuid,
    pub stage: Stage,
    pub timestamp: DateTime<Utc>,
    pub payload: Record<'a>,
}

impl<'a> Envelope<'a> {
    pub fn new(run_id: Uuid, payload: Record<'a>) -> Self {
        Self {
            run_id,
            stage: payload.stage(),
            timestamp: Utc::now(),
            payload,
        }
    }
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not encode record: {0}")]
    Encode(String),
}

pub trait Sink: Send + Sync {
    fn write(&self, envelope: &Envelope<'_>) -> Result<(), SinkError>;

    fn flush(&self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Discards everything.
pub struct NullSink;

impl Sink for NullSink {
    fn write(&self, _envelope: &Envelope<'_>) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Keeps `(stage, hostname)` pairs in memory.
#[derive(Default)]
pub struct MemorySink {
    seen: Mutex<Vec<(Stage, String)>>,
}

impl MemorySink {
    pub fn records(&self) -> Vec<(Stage, String)> {
        self.seen.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn hostnames(&self, stage: Stage) -> Vec<String> {
        self.records()
            .into_iter()
            .filter(|(s, _)| *s == stage)
            .map(|(_, host)| host)
            .collect()
    }
}

impl Sink for MemorySink {
    fn write(&self, envelope: &Envelope<'_>) -> Result<(), SinkError> {
        let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
        seen.push((envelope.stage, envelope.payload.hostname().to_string()));
        Ok(())
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
