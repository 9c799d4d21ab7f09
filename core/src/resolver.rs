//! # Resolver
//!
//! Resolves deduplicated candidates through a bounded pool and flags hosts
//! that only answer because the zone has a wildcard record.
//!
//! Wildcard detection queries `N` random labels under the root before any real
//! candidate is classified. If every one of them resolves, the union of their
//! addresses (and any CNAME targets) becomes the root's wildcard profile; a
//! host whose addresses all fall inside that profile is a suspect.

use std::collections::{BTreeSet, HashMap};
use std::net::IpAddr;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use futures::future::join_all;
use rand::Rng;
use rand::distr::Alphanumeric;
use sigma_common::config::Config;
use sigma_common::models::host::{ResolutionFailure, ResolvedHost};
use sigma_common::utils::hostname;
use sigma_common::utils::retry::RetryPolicy;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::dns::{DnsAnswer, DnsError, DnsLookup};
use crate::retry::{RetryError, retry};

const PROBE_LABEL_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum ResolveFailure {
    #[error("{} did not resolve: {}", .0.hostname, .0.detail)]
    Failed(ResolutionFailure),
    #[error("cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WildcardProfile {
    pub root: String,
    pub addresses: BTreeSet<IpAddr>,
    pub cnames: BTreeSet<String>,
}

impl WildcardProfile {
    pub fn matches(&self, answer: &DnsAnswer) -> bool {
        if answer.cname.as_ref().is_some_and(|cname| self.cnames.contains(cname)) {
            return true;
        }
        !answer.addresses.is_empty() && answer.addresses.is_subset(&self.addresses)
    }
}

pub struct Resolver {
    dns: Arc<dyn DnsLookup>,
    pool: Semaphore,
    policy: RetryPolicy,
    query_timeout: Duration,
    /// `None` records that detection ran and found no wildcard.
    wildcards: RwLock<HashMap<String, Option<WildcardProfile>>>,
}

impl Resolver {
    pub fn new(dns: Arc<dyn DnsLookup>, cfg: &Config) -> Self {
        Self {
            dns,
            pool: Semaphore::new(cfg.resolver_concurrency.max(1)),
            policy: cfg.dns_retry_policy(),
            query_timeout: cfg.dns_timeout(),
            wildcards: RwLock::new(HashMap::new()),
        }
    }

    /// Probes `tests` random labels under `root` and records the outcome.
    pub async fn detect_wildcard(
        &self,
        root: &str,
        tests: usize,
        cancel: &CancellationToken,
    ) -> Option<WildcardProfile> {
        if tests == 0 {
            self.store_profile(root, None);
            return None;
        }

        let labels: Vec<String> = (0..tests).map(|_| format!("{}.{root}", random_label())).collect();
        let answers = join_all(labels.iter().map(|host| self.query(host, cancel))).await;

        let mut profile = WildcardProfile {
            root: root.to_string(),
            ..Default::default()
        };
        for answer in answers {
            match answer {
                Ok(answer) => {
                    profile.addresses.extend(answer.addresses);
                    profile.cnames.extend(answer.cname);
                }
                Err(_) => {
                    tracing::debug!(root, "no wildcard: at least one random label did not resolve");
                    self.store_profile(root, None);
                    return None;
                }
            }
        }

        tracing::warn!(
            root,
            addresses = profile.addresses.len(),
            "wildcard DNS detected, matching hosts will be flagged"
        );
        self.store_profile(root, Some(profile.clone()));
        Some(profile)
    }

    pub fn wildcard_profile(&self, root: &str) -> Option<WildcardProfile> {
        let wildcards = self.wildcards.read().unwrap_or_else(|e| e.into_inner());
        wildcards.get(root).cloned().flatten()
    }

    /// Resolves one hostname, waiting for a pool slot first.
    pub async fn resolve(&self, host: &str, cancel: &CancellationToken) -> Result<ResolvedHost, ResolveFailure> {
        let _slot = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ResolveFailure::Cancelled),
            slot = self.pool.acquire() => slot.map_err(|_| ResolveFailure::Cancelled)?,
        };

        match self.query(host, cancel).await {
            Ok(answer) => {
                let suspect = self.is_wildcard_suspect(host, &answer);
                Ok(ResolvedHost::new(host, answer.addresses, answer.cname).with_wildcard_suspect(suspect))
            }
            Err(RetryError::Cancelled) => Err(ResolveFailure::Cancelled),
            Err(RetryError::Exhausted { last, .. } | RetryError::Fatal(last)) => {
                Err(ResolveFailure::Failed(ResolutionFailure {
                    hostname: host.to_string(),
                    error: last.kind(),
                    detail: last.to_string(),
                }))
            }
        }
    }

    async fn query(&self, host: &str, cancel: &CancellationToken) -> Result<DnsAnswer, RetryError<DnsError>> {
        retry(
            &self.policy,
            cancel,
            |_| async move {
                match tokio::time::timeout(self.query_timeout, self.dns.lookup(host)).await {
                    Ok(answer) => answer,
                    Err(_elapsed) => Err(DnsError::Timeout),
                }
            },
            DnsError::is_retryable,
        )
        .await
    }

    fn is_wildcard_suspect(&self, host: &str, answer: &DnsAnswer) -> bool {
        let wildcards = self.wildcards.read().unwrap_or_else(|e| e.into_inner());
        wildcards
            .iter()
            .filter(|(root, _)| hostname::is_within(host, root))
            .max_by_key(|(root, _)| root.len())
            .and_then(|(_, profile)| profile.as_ref())
            .is_some_and(|profile| profile.matches(answer))
    }

    fn store_profile(&self, root: &str, profile: Option<WildcardProfile>) {
        let mut wildcards = self.wildcards.write().unwrap_or_else(|e| e.into_inner());
        wildcards.insert(root.to_string(), profile);
    }
}

fn random_label() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(PROBE_LABEL_LEN)
        .map(|b| char::from(b).to_ascii_lowercase())
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

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use sigma_common::error::ErrorKind;

    use super::*;

    /// Exact names first, then a catch-all for anything under `wildcard_root`.
    #[derive(Default)]
    struct Table {
        exact: HashMap<String, Result<DnsAnswer, DnsError>>,
        wildcard: Option<(String, DnsAnswer)>,
        calls: AtomicU32,
        flaky: Mutex<HashMap<String, u32>>,
    }

    #[async_trait]
    impl DnsLookup for Table {
        async fn lookup(&self, hostname: &str) -> Result<DnsAnswer, DnsError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(left) = self.flaky.lock().unwrap().get_mut(hostname) {
                if *left > 0 {
                    *left -= 1;
                    return Err(DnsError::Timeout);
                }
            }
            if let Some(answer) = self.exact.get(hostname) {
                return answer.clone();
            }
            match &self.wildcard {
                Some((root, answer)) if hostname::is_within(hostname, root) => Ok(answer.clone()),
                _ => Err(DnsError::Nxdomain),
            }
        }
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    fn resolver(table: Table) -> Resolver {
        Resolver::new(Arc::new(table), &Config::default())
    }

    #[tokio::test]
    async fn wildcard_hosts_are_flagged_and_real_ones_are_not() {
        let mut table = Table::default();
        table.wildcard = Some(("example.com".into(), DnsAnswer::new([ip("10.0.0.1")])));
        table
            .exact
            .insert("www.example.com".into(), Ok(DnsAnswer::new([ip("93.184.216.34")])));
        let resolver = resolver(table);
        let cancel = CancellationToken::new();

        let profile = resolver.detect_wildcard("example.com", 3, &cancel).await.unwrap();
        assert_eq!(profile.addresses, BTreeSet::from([ip("10.0.0.1")]));

        let junk = resolver.resolve("anything.example.com", &cancel).await.unwrap();
        let real = resolver.resolve("www.example.com", &cancel).await.unwrap();
        assert!(junk.wildcard_suspect);
        assert!(!real.wildcard_suspect);
    }

    #[tokio::test]
    async fn one_unresolved_probe_means_no_wildcard() {
        let resolver = resolver(Table::default());
        let cancel = CancellationToken::new();

        assert!(resolver.detect_wildcard("example.com", 3, &cancel).await.is_none());
        assert!(resolver.wildcard_profile("example.com").is_none());
    }

    #[tokio::test]
    async fn nxdomain_is_not_retried() {
        let table = Arc::new(Table::default());
        let resolver = Resolver::new(table.clone(), &Config::default());

        let err = resolver
            .resolve("gone.example.com", &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            ResolveFailure::Failed(failure) => assert_eq!(failure.error, ErrorKind::Nxdomain),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(table.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timeouts_are_retried_within_the_dns_budget() {
        let mut table = Table::default();
        table.exact.insert("api.example.com".into(), Ok(DnsAnswer::new([ip("1.1.1.1")])));
        table.flaky.lock().unwrap().insert("api.example.com".into(), 2);
        let table = Arc::new(table);
        let resolver = Resolver::new(table.clone(), &Config::default());

        let host = resolver
            .resolve("api.example.com", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(host.addresses.len(), 1);
        assert_eq!(table.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_timeouts_surface_as_timeout_kind() {
        let mut table = Table::default();
        table.flaky.lock().unwrap().insert("slow.example.com".into(), 100);
        let resolver = resolver(table);

        let err = resolver
            .resolve("slow.example.com", &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ResolveFailure::Failed(ref f) if f.error == ErrorKind::Timeout));
    }

    #[test]
    fn profile_matches_subsets_and_cnames() {
        let profile = WildcardProfile {
            root: "example.com".into(),
            addresses: BTreeSet::from([ip("10.0.0.1"), ip("10.0.0.2")]),
            cnames: BTreeSet::from(["parking.example.net".to_string()]),
        };

        assert!(profile.matches(&DnsAnswer::new([ip("10.0.0.2")])));
        assert!(!profile.matches(&DnsAnswer::new([ip("10.0.0.2"), ip("8.8.8.8")])));
        assert!(profile.matches(&DnsAnswer::new([ip("8.8.8.8")]).with_cname("parking.example.net")));
        assert!(!profile.matches(&DnsAnswer::default()));
    }

    #[test]
    fn random_labels_are_dns_safe() {
        let label = random_label();
        assert_eq!(label.len(), PROBE_LABEL_LEN);
        assert!(label.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }
}
