//! DNS brute force: prefixes each word to the root and keeps the names that
//! resolve. Every query goes through the source budget like an HTTP call.

use std::path::Path;
use std::sync::Arc;

use futures::StreamExt;
use futures::stream;
use sigma_common::error::SourceError;
use sigma_common::models::candidate::{Candidate, SourceId};
use sigma_common::models::target::Target;
use sigma_core::dns::{DnsError, DnsLookup};
use sigma_core::source::{CandidateStream, SourceAdapter, SourceBudget, SourceContext};

const IN_FLIGHT: usize = 16;

const BUILTIN: &[&str] = &[
    "www", "api", "admin", "dev", "staging", "test", "qa", "uat",
    "mail", "smtp", "pop", "imap", "webmail", "mx",
    "ftp", "sftp", "ssh", "ns1", "ns2",
    "vpn", "remote", "access", "gateway",
    "blog", "forum", "shop", "store",
    "cdn", "static", "assets", "media", "images",
    "m", "mobile", "app",
    "portal", "dashboard", "panel",
    "beta", "alpha", "demo",
    "git", "gitlab", "jenkins", "ci",
    "jira", "confluence", "wiki",
    "status", "monitor", "metrics", "grafana",
    "db", "mysql", "postgres", "redis",
    "backup", "old", "new", "legacy",
    "v1", "v2", "ws", "graphql",
    "docs", "help", "support",
    "secure", "login", "auth", "sso",
    "pay", "checkout",
    "internal", "corp", "intranet", "office",
];

pub struct Wordlist {
    dns: Arc<dyn DnsLookup>,
    words: Result<Arc<Vec<String>>, String>,
}

impl Wordlist {
    pub fn new(ctx: &SourceContext) -> Self {
        let words = match &ctx.config.wordlist {
            Some(path) => load(path).map(Arc::new),
            None => Ok(Arc::new(BUILTIN.iter().map(|w| w.to_string()).collect())),
        };
        Self {
            dns: ctx.dns.clone(),
            words,
        }
    }

    pub fn with_words(dns: Arc<dyn DnsLookup>, words: Vec<String>) -> Self {
        Self {
            dns,
            words: Ok(Arc::new(words)),
        }
    }
}

fn load(path: &Path) -> Result<Vec<String>, String> {
    let raw = std::fs::read_to_string(path).map_err(|e| format!("cannot read {}: {e}", path.display()))?;
    let words: Vec<String> = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_ascii_lowercase)
        .collect();
    if words.is_empty() {
        return Err(format!("{} contains no words", path.display()));
    }
    Ok(words)
}

impl SourceAdapter for Wordlist {
    fn id(&self) -> SourceId {
        SourceId::new("wordlist")
    }

    fn prepare(&self, _ctx: &SourceContext) -> Result<(), SourceError> {
        self.words.as_ref().map(|_| ()).map_err(|reason| SourceError::Unavailable {
            source_id: self.id().to_string(),
            reason: reason.clone(),
        })
    }

    fn enumerate(&self, target: &Target, budget: SourceBudget) -> CandidateStream {
        let id = self.id();
        let words = match &self.words {
            Ok(words) => words.clone(),
            Err(reason) => {
                let err = SourceError::Unavailable {
                    source_id: id.to_string(),
                    reason: reason.clone(),
                };
                return stream::once(async move { Err(err) }).boxed();
            }
        };
        let dns = self.dns.clone();
        let root = target.root().to_string();
        let count = words.len();

        stream::iter(0..count)
            .map(move |idx| {
                let host = format!("{}.{root}", words[idx]);
                let dns = dns.clone();
                let budget = budget.clone();
                async move { (host.clone(), probe(&budget, dns.as_ref(), &host).await) }
            })
            .buffer_unordered(IN_FLIGHT)
            .filter_map(move |(host, outcome)| {
                let id = id.clone();
                async move {
                    match outcome {
                        Ok(true) => Some(Ok(Candidate::new(host, id))),
                        Ok(false) => None,
                        Err(e @ (SourceError::Cancelled | SourceError::RateLimitTimeout(_))) => Some(Err(e)),
                        Err(e) => {
                            tracing::debug!(%host, "brute-force query gave up: {e}");
                            None
                        }
                    }
                }
            })
            .boxed()
    }
}

/// `Ok(false)` for a definitive "does not exist".
async fn probe(budget: &SourceBudget, dns: &dyn DnsLookup, host: &str) -> Result<bool, SourceError> {
    budget
        .call(|| async move {
            match dns.lookup(host).await {
                Ok(_) => Ok(true),
                Err(DnsError::Nxdomain | DnsError::NoRecords) => Ok(false),
                Err(DnsError::Timeout) => Err(SourceError::Transient(format!("{host}: query timed out"))),
                Err(DnsError::Failed(reason)) => Err(SourceError::Transient(reason)),
            }
        })
        .await
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
