//! In-memory stand-ins for the network.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use sigma_common::config::Config;
use sigma_common::error::SourceError;
use sigma_common::models::candidate::{Candidate, SourceId};
use sigma_common::models::target::Target;
use sigma_core::dns::{DnsAnswer, DnsError, DnsLookup};
use sigma_core::http::{FetchError, HttpFetcher, HttpResponse};
use sigma_core::pipeline::{Pipeline, StagePlan};
use sigma_core::sink::{Envelope, MemorySink, Sink, SinkError};
use sigma_core::source::{CandidateStream, SourceAdapter, SourceBudget};

/// Exact records plus optional wildcard records per zone.
#[derive(Default)]
pub struct ZoneDns {
    records: HashMap<String, BTreeSet<IpAddr>>,
    wildcards: HashMap<String, IpAddr>,
    lookups: AtomicU32,
}

impl ZoneDns {
    pub fn host(mut self, name: &str, ip: &str) -> Self {
        self.records
            .entry(name.to_string())
            .or_default()
            .insert(ip.parse().expect("test address"));
        self
    }

    /// Every name under `root` without its own record answers with `ip`.
    pub fn wildcard(mut self, root: &str, ip: &str) -> Self {
        self.wildcards.insert(root.to_string(), ip.parse().expect("test address"));
        self
    }

    pub fn lookups(&self) -> u32 {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DnsLookup for ZoneDns {
    async fn lookup(&self, hostname: &str) -> Result<DnsAnswer, DnsError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if let Some(addresses) = self.records.get(hostname) {
            return Ok(DnsAnswer::new(addresses.iter().copied()));
        }
        self.wildcards
            .iter()
            .find(|(root, _)| hostname.ends_with(&format!(".{root}")))
            .map(|(_, ip)| DnsAnswer::new([*ip]))
            .ok_or(DnsError::Nxdomain)
    }
}

/// Serves a page for hosts marked as up, over HTTPS only, and canned bodies by exact URL.
#[derive(Default)]
pub struct FakeWeb {
    up: HashSet<String>,
    pages: HashMap<String, String>,
}

impl FakeWeb {
    pub fn up(mut self, host: &str) -> Self {
        self.up.insert(host.to_string());
        self
    }

    pub fn page(mut self, url: &str, body: &str) -> Self {
        self.pages.insert(url.to_string(), body.to_string());
        self
    }
}

#[async_trait]
impl HttpFetcher for FakeWeb {
    async fn get(&self, url: &str, _headers: &[(&str, String)]) -> Result<HttpResponse, FetchError> {
        if let Some(body) = self.pages.get(url) {
            return Ok(HttpResponse::ok(body.clone()));
        }
        let host = url
            .strip_prefix("https://")
            .and_then(|rest| rest.split('/').next())
            .unwrap_or_default();
        if self.up.contains(host) {
            Ok(HttpResponse::ok(format!("<html><title>{host}</title></html>")).with_header("server", "nginx"))
        } else {
            Err(FetchError::Connect(format!("{url}: connection refused")))
        }
    }
}

/// Emits its names one request at a time, each going through the budget.
pub struct ScriptedSource {
    id: &'static str,
    names: Vec<String>,
}

impl ScriptedSource {
    pub fn new(id: &'static str, names: &[&str]) -> Self {
        Self {
            id,
            names: names.iter().map(|n| n.to_string()).collect(),
        }
    }

    /// `count` names of the form `host-<n>.<root>`.
    pub fn generated(id: &'static str, root: &str, count: usize) -> Self {
        Self {
            id,
            names: (0..count).map(|n| format!("{id}-host-{n}.{root}")).collect(),
        }
    }
}

impl SourceAdapter for ScriptedSource {
    fn id(&self) -> SourceId {
        SourceId::new(self.id)
    }

    fn enumerate(&self, _target: &Target, budget: SourceBudget) -> CandidateStream {
        let id = self.id();
        stream::unfold(
            (self.names.clone().into_iter(), budget),
            move |(mut names, budget)| {
                let id = id.clone();
                async move {
                    let name = names.next()?;
                    let item = budget
                        .call(|| async { Ok::<_, SourceError>(()) })
                        .await
                        .map(|()| Candidate::new(name, id));
                    Some((item, (names, budget)))
                }
            },
        )
        .boxed()
    }
}

/// Every request fails with a retryable error.
pub struct FlakySource {
    pub attempts: Arc<AtomicU32>,
}

impl SourceAdapter for FlakySource {
    fn id(&self) -> SourceId {
        SourceId::new("flaky")
    }

    fn enumerate(&self, target: &Target, budget: SourceBudget) -> CandidateStream {
        let attempts = self.attempts.clone();
        let id = self.id();
        let name = format!("flaky.{}", target.root());
        stream::once(async move {
            budget
                .call(|| {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    async { Err::<(), _>(SourceError::Transient("503 service unavailable".into())) }
                })
                .await
                .map(|()| Candidate::new(name, id))
        })
        .boxed()
    }
}

/// Rejects every record, as a full disk would.
pub struct FailingSink;

impl Sink for FailingSink {
    fn write(&self, _envelope: &Envelope<'_>) -> Result<(), SinkError> {
        Err(SinkError::Io(std::io::Error::other("no space left on device")))
    }

    fn flush(&self) -> Result<(), SinkError> {
        Err(SinkError::Io(std::io::Error::other("no space left on device")))
    }
}

pub fn sources(list: Vec<Arc<dyn SourceAdapter>>) -> Vec<Arc<dyn SourceAdapter>> {
    list
}

/// Defaults with fast, generous limits.
pub fn config() -> Config {
    Config {
        rate_limit_per_source: 6000,
        retries: 3,
        ..Config::default()
    }
}

pub struct Harness {
    pub pipeline: Pipeline,
    pub dns: Arc<ZoneDns>,
    pub sink: Arc<MemorySink>,
}

pub fn harness(cfg: Config, plan: StagePlan, dns: ZoneDns, web: FakeWeb) -> Harness {
    let dns = Arc::new(dns);
    let web = Arc::new(web);
    let sink = Arc::new(MemorySink::default());
    let pipeline = Pipeline::builder(cfg)
        .with_dns(dns.clone())
        .with_http(web.clone())
        .with_source_http(web)
        .with_sink(sink.clone() as Arc<dyn Sink>)
        .with_plan(plan)
        .build()
        .expect("valid pipeline");
    Harness { pipeline, dns, sink }
}

pub fn target(root: &str) -> Target {
    root.parse().expect("valid target")
}
