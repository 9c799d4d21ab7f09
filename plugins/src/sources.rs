pub mod alienvault;
pub mod crtsh;
pub mod hackertarget;
pub mod static_list;
pub mod virustotal;
pub mod wordlist;

use sigma_common::error::SourceError;

/// A body that parsed badly will not parse better on retry.
pub(crate) fn malformed(err: impl std::fmt::Display) -> SourceError {
    SourceError::Malformed(err.to_string())
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use futures::StreamExt;
    use sigma_common::config::Config;
    use sigma_common::models::candidate::SourceId;
    use sigma_common::models::target::Target;
    use sigma_core::dns::{DnsAnswer, DnsError, DnsLookup};
    use sigma_core::http::{FetchError, HttpFetcher, HttpResponse};
    use sigma_core::limiter::RateLimiter;
    use sigma_core::source::{SourceAdapter, SourceBudget, SourceContext};
    use tokio_util::sync::CancellationToken;

    use super::SourceError;

    /// Serves canned bodies by exact URL and records every request.
    #[derive(Default)]
    pub struct Canned {
        pub pages: HashMap<String, HttpResponse>,
        pub requests: Mutex<Vec<(String, Vec<(String, String)>)>>,
    }

    impl Canned {
        pub fn page(mut self, url: &str, response: HttpResponse) -> Self {
            self.pages.insert(url.to_string(), response);
            self
        }
    }

    #[async_trait]
    impl HttpFetcher for Canned {
        async fn get(&self, url: &str, headers: &[(&str, String)]) -> Result<HttpResponse, FetchError> {
            self.requests.lock().unwrap().push((
                url.to_string(),
                headers.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
            ));
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| FetchError::Connect(format!("no page for {url}")))
        }
    }

    /// Names listed resolve; everything else is NXDOMAIN.
    #[derive(Default)]
    pub struct Names(pub Vec<String>);

    #[async_trait]
    impl DnsLookup for Names {
        async fn lookup(&self, hostname: &str) -> Result<DnsAnswer, DnsError> {
            if self.0.iter().any(|n| n == hostname) {
                Ok(DnsAnswer::new(["192.0.2.1".parse().unwrap()]))
            } else {
                Err(DnsError::Nxdomain)
            }
        }
    }

    pub fn context(http: Canned, cfg: Config) -> SourceContext {
        SourceContext {
            config: Arc::new(cfg),
            http: Arc::new(http),
            dns: Arc::new(Names::default()),
        }
    }

    pub fn budget(id: &str, retries: u32) -> SourceBudget {
        let cfg = Config {
            retries,
            ..Config::default()
        };
        let limiter = Arc::new(RateLimiter::new(6000, 100));
        SourceBudget::new(SourceId::new(id), limiter, &cfg, CancellationToken::new())
    }

    pub async fn collect(adapter: &dyn SourceAdapter, root: &str, retries: u32) -> Vec<Result<String, SourceError>> {
        let target: Target = root.parse().unwrap();
        adapter
            .enumerate(&target, budget(adapter.id().as_str(), retries))
            .map(|item| item.map(|c| c.hostname))
            .collect()
            .await
    }
}
