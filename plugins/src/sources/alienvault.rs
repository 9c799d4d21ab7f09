use std::sync::Arc;

use sigma_common::models::candidate::SourceId;
use sigma_common::models::target::Target;
use sigma_core::http::HttpFetcher;
use sigma_core::source::{CandidateStream, SourceAdapter, SourceBudget, SourceContext, from_single_fetch};
use sigma_protocols::otx;

use super::malformed;

/// AlienVault OTX passive DNS. Works without a key; sends one when configured.
pub struct AlienVault {
    http: Arc<dyn HttpFetcher>,
    key: Option<String>,
}

impl AlienVault {
    pub fn new(ctx: &SourceContext) -> Self {
        Self {
            http: ctx.http.clone(),
            key: ctx.config.api_key(&SourceId::new("alienvault")).map(str::to_string),
        }
    }
}

impl SourceAdapter for AlienVault {
    fn id(&self) -> SourceId {
        SourceId::new("alienvault")
    }

    fn enumerate(&self, target: &Target, budget: SourceBudget) -> CandidateStream {
        let http = self.http.clone();
        let url = format!(
            "https://otx.alienvault.com/api/v1/indicators/domain/{}/passive_dns",
            target.root()
        );
        let headers: Vec<(&'static str, String)> = self.key.iter().map(|k| ("X-OTX-API-KEY", k.clone())).collect();
        from_single_fetch(self.id(), async move {
            let response = budget.get(http.as_ref(), &url, &headers).await?;
            otx::parse_passive_dns(&response.body).map_err(malformed)
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
