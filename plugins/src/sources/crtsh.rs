//! Certificate transparency logs via crt.sh.

use std::sync::Arc;

use sigma_common::models::candidate::SourceId;
use sigma_common::models::target::Target;
use sigma_core::http::HttpFetcher;
use sigma_core::source::{CandidateStream, SourceAdapter, SourceBudget, SourceContext, from_single_fetch};
use sigma_protocols::crtsh;

use super::malformed;

pub struct CrtSh {
    http: Arc<dyn HttpFetcher>,
}

impl CrtSh {
    pub fn new(ctx: &SourceContext) -> Self {
        Self { http: ctx.http.clone() }
    }
}

impl SourceAdapter for CrtSh {
    fn id(&self) -> SourceId {
        SourceId::new("crtsh")
    }

    fn enumerate(&self, target: &Target, budget: SourceBudget) -> CandidateStream {
        let http = self.http.clone();
        let url = format!("https://crt.sh/?q=%25.{}&output=json", target.root());
        from_single_fetch(self.id(), async move {
            let response = budget.get(http.as_ref(), &url, &[]).await?;
            crtsh::parse_names(&response.body).map_err(malformed)
        })
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
