//! VirusTotal v3 subdomain relationship. Needs an API key; pages are fetched
//! lazily, one request per page, following the cursor.

use std::sync::Arc;

use futures::StreamExt;
use futures::stream;
use sigma_common::error::SourceError;
use sigma_common::models::candidate::{Candidate, SourceId};
use sigma_common::models::target::Target;
use sigma_core::http::HttpFetcher;
use sigma_core::source::{CandidateStream, SourceAdapter, SourceBudget, SourceContext};
use sigma_protocols::virustotal;

use super::malformed;

const PAGE_SIZE: u32 = 40;
/// Guards against a remote that never stops handing out cursors.
const MAX_PAGES: usize = 100;

pub struct VirusTotal {
    http: Arc<dyn HttpFetcher>,
    key: Option<String>,
}

impl VirusTotal {
    pub fn new(ctx: &SourceContext) -> Self {
        Self {
            http: ctx.http.clone(),
            key: ctx.config.api_key(&SourceId::new("virustotal")).map(str::to_string),
        }
    }
}

enum Cursor {
    First,
    Next(String),
}

impl SourceAdapter for VirusTotal {
    fn id(&self) -> SourceId {
        SourceId::new("virustotal")
    }

    fn requires_api_key(&self) -> bool {
        true
    }

    fn enumerate(&self, target: &Target, budget: SourceBudget) -> CandidateStream {
        let id = self.id();
        let Some(key) = self.key.clone() else {
            let err = SourceError::Unavailable {
                source_id: id.to_string(),
                reason: "no api key configured".into(),
            };
            return stream::once(async move { Err(err) }).boxed();
        };

        let http = self.http.clone();
        let base = format!("https://www.virustotal.com/api/v3/domains/{}/subdomains", target.root());

        let pages = stream::unfold(Some(Cursor::First), move |cursor| {
            let http = http.clone();
            let budget = budget.clone();
            let key = key.clone();
            let base = base.clone();
            async move {
                let url = match cursor? {
                    Cursor::First => format!("{base}?limit={PAGE_SIZE}"),
                    Cursor::Next(c) => format!("{base}?limit={PAGE_SIZE}&cursor={c}"),
                };
                let headers = [("x-apikey", key)];
                let page = budget
                    .get(http.as_ref(), &url, &headers)
                    .await
                    .and_then(|response| virustotal::parse_subdomain_page(&response.body).map_err(malformed));
                match page {
                    Ok(page) => {
                        let next = page.cursor.filter(|_| !page.names.is_empty()).map(Cursor::Next);
                        Some((Ok(page.names), next))
                    }
                    Err(e) => Some((Err(e), None)),
                }
            }
        });

        pages
            .take(MAX_PAGES)
            .flat_map(move |page| {
                let items: Vec<Result<Candidate, SourceError>> = match page {
                    Ok(names) => names.into_iter().map(|n| Ok(Candidate::new(n, id.clone()))).collect(),
                    Err(e) => vec![Err(e)],
                };
                stream::iter(items)
            })
            .boxed()
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
