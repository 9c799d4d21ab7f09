use futures::StreamExt;
use futures::stream;
use sigma_common::models::candidate::{Candidate, SourceId};
use sigma_common::models::target::Target;
use sigma_core::source::{CandidateStream, SourceAdapter, SourceBudget};

/// Hostnames supplied up front, reported in the order given.
pub struct StaticList {
    id: SourceId,
    names: Vec<String>,
}

impl StaticList {
    pub fn new(names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::named("static", names)
    }

    pub fn named(id: &str, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            id: SourceId::new(id),
            names: names.into_iter().map(Into::into).collect(),
        }
    }
}

impl SourceAdapter for StaticList {
    fn id(&self) -> SourceId {
        self.id.clone()
    }

    fn enumerate(&self, _target: &Target, _budget: SourceBudget) -> CandidateStream {
        let id = self.id.clone();
        let candidates: Vec<_> = self
            .names
            .iter()
            .map(|name| Ok(Candidate::new(name.clone(), id.clone())))
            .collect();
        stream::iter(candidates).boxed()
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
