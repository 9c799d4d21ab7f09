use std::sync::Arc;

use sigma_common::error::SourceError;
use sigma_common::models::candidate::SourceId;
use sigma_common::models::target::Target;
use sigma_core::http::HttpFetcher;
use sigma_core::source::{CandidateStream, SourceAdapter, SourceBudget, SourceContext, from_single_fetch};
use sigma_protocols::hackertarget::{self, HostSearchError};

/// HackerTarget host search. Errors arrive as plain-text bodies with a 200.
pub struct HackerTarget {
    http: Arc<dyn HttpFetcher>,
}

impl HackerTarget {
    pub fn new(ctx: &SourceContext) -> Self {
        Self { http: ctx.http.clone() }
    }
}

impl SourceAdapter for HackerTarget {
    fn id(&self) -> SourceId {
        SourceId::new("hackertarget")
    }

    fn enumerate(&self, target: &Target, budget: SourceBudget) -> CandidateStream {
        let http = self.http.clone();
        let url = format!("https://api.hackertarget.com/hostsearch/?q={}", target.root());
        from_single_fetch(self.id(), async move {
            // Quota errors come back as a 200 body; parsing inside the call lets them back off like a 429.
            budget
                .get_with(http.as_ref(), &url, &[], |response| {
                    hackertarget::parse_hostsearch(&response.body).map_err(|e| match e {
                        HostSearchError::QuotaExceeded(msg) => SourceError::RateLimited(msg),
                        HostSearchError::Api(msg) => SourceError::Malformed(msg),
                    })
                })
                .await
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

#[cfg(test)]
mod tests {
    use sigma_common::config::Config;
    use sigma_core::http::HttpResponse;

    use super::*;
    use crate::sources::testing::{Canned, collect, context};

    const URL: &str = "https://api.hackertarget.com/hostsearch/?q=example.com";

    #[tokio::test]
    async fn reads_host_column() {
        let body = "www.example.com,93.184.216.34\nmail.example.com,93.184.216.35\n";
        let ctx = context(Canned::default().page(URL, HttpResponse::ok(body)), Config::default());

        let names: Vec<_> = collect(&HackerTarget::new(&ctx), "example.com", 0)
            .await
            .into_iter()
            .map(Result::unwrap)
            .collect();

        assert_eq!(names, vec!["www.example.com", "mail.example.com"]);
    }

    #[tokio::test]
    async fn no_records_is_an_empty_source() {
        let ctx = context(
            Canned::default().page(URL, HttpResponse::ok("error no records found")),
            Config::default(),
        );
        assert!(collect(&HackerTarget::new(&ctx), "example.com", 0).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn quota_message_is_retried_then_reported() {
        let ctx = context(
            Canned::default().page(URL, HttpResponse::ok("API count exceeded - Increase Quota with Membership")),
            Config::default(),
        );

        let items = collect(&HackerTarget::new(&ctx), "example.com", 2).await;

        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(SourceError::Exhausted { attempts: 3, .. })));
    }
}
