//! # Pipeline Orchestrator
//!
//! Runs one target through the planned stages:
//!
//! ```text
//! sources ──▶ dedupe ──▶ resolve ──▶ validate ──▶ probe
//! ```
//!
//! Stages are connected by bounded channels and run concurrently, so the
//! resolver starts on the first unique hostname while sources are still
//! paging. A stage is considered done once its input channel is closed and
//! its in-flight work has drained; only then does the run's state move past
//! it.
//!
//! Cancellation (caller token, run timeout) is observed at every suspension
//! point. Whatever was produced before it is kept and returned as a partial
//! [`PipelineRun`].

use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::Utc;
use futures::StreamExt;
use futures::stream;
use sigma_common::config::Config;
use sigma_common::error::{PipelineError, SourceError};
use sigma_common::models::candidate::{Candidate, DedupedCandidate};
use sigma_common::models::host::{ResolutionFailure, ResolvedHost};
use sigma_common::models::probe::ProbeResult;
use sigma_common::models::run::{PipelineRun, PipelineState, RunParts};
use sigma_common::models::stats::{CancelSummary, SourceOutcome, StageCounters};
use sigma_common::models::target::Target;
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::dedup::{DedupOutcome, Deduplicator};
use crate::dns::{DnsLookup, HickoryLookup};
use crate::http::{HttpFetcher, PROBE_BODY_LIMIT, ReqwestFetcher, SOURCE_BODY_LIMIT};
use crate::limiter::RateLimiter;
use crate::prober::{ProbeRejected, Prober};
use crate::resolver::{ResolveFailure, Resolver};
use crate::sink::{Envelope, NullSink, Record, Sink};
use crate::source::{SourceAdapter, SourceBudget, SourceCatalog, SourceContext};

mod plan;
mod state;
mod stats;

pub use plan::{PlanError, STAGE_NAMES, StagePlan};
pub use state::{Progress, StateMachine};
pub use stats::{SourceEnd, StatsBook};

const CHANNEL_DEPTH: usize = 256;

pub struct PipelineBuilder {
    config: Config,
    dns: Option<Arc<dyn DnsLookup>>,
    probe_http: Option<Arc<dyn HttpFetcher>>,
    source_http: Option<Arc<dyn HttpFetcher>>,
    sink: Option<Arc<dyn Sink>>,
    plan: StagePlan,
}

impl PipelineBuilder {
    pub fn with_dns(mut self, dns: Arc<dyn DnsLookup>) -> Self {
        self.dns = Some(dns);
        self
    }

    /// Client used by the prober.
    pub fn with_http(mut self, http: Arc<dyn HttpFetcher>) -> Self {
        self.probe_http = Some(http);
        self
    }

    /// Client handed to source adapters through their [`SourceContext`].
    pub fn with_source_http(mut self, http: Arc<dyn HttpFetcher>) -> Self {
        self.source_http = Some(http);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn Sink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_plan(mut self, plan: StagePlan) -> Self {
        self.plan = plan;
        self
    }

    pub fn build(self) -> Result<Pipeline, PipelineError> {
        self.config
            .validate()
            .map_err(|e| PipelineError::fatal(e.to_string()))?;

        let infra = |e: crate::http::FetchError| PipelineError::Infrastructure {
            stage: PipelineState::Idle,
            reason: format!("could not build http client: {e}"),
        };
        let probe_http: Arc<dyn HttpFetcher> = match self.probe_http {
            Some(http) => http,
            None => Arc::new(ReqwestFetcher::new(&self.config, PROBE_BODY_LIMIT).map_err(infra)?),
        };
        let source_http: Arc<dyn HttpFetcher> = match self.source_http {
            Some(http) => http,
            None => Arc::new(ReqwestFetcher::new(&self.config, SOURCE_BODY_LIMIT).map_err(infra)?),
        };
        let dns: Arc<dyn DnsLookup> = match self.dns {
            Some(dns) => dns,
            None => Arc::new(HickoryLookup::from_config(&self.config)),
        };

        let (progress, _) = watch::channel(Progress::default());
        Ok(Pipeline {
            limiter: Arc::new(RateLimiter::from_config(&self.config)),
            config: Arc::new(self.config),
            dns,
            probe_http,
            source_http,
            sink: self.sink.unwrap_or_else(|| Arc::new(NullSink)),
            plan: self.plan,
            progress,
        })
    }
}

pub struct Pipeline {
    config: Arc<Config>,
    dns: Arc<dyn DnsLookup>,
    probe_http: Arc<dyn HttpFetcher>,
    source_http: Arc<dyn HttpFetcher>,
    sink: Arc<dyn Sink>,
    plan: StagePlan,
    /// Shared by every run of this pipeline so rate limits hold across targets.
    limiter: Arc<RateLimiter>,
    progress: watch::Sender<Progress>,
}

/// Results gathered by the concurrent stages.
#[derive(Default)]
struct Collected {
    resolved: Mutex<Vec<ResolvedHost>>,
    failures: Mutex<Vec<ResolutionFailure>>,
    wildcard: Mutex<Vec<String>>,
    probes: Mutex<Vec<ProbeResult>>,
}

fn push<T>(into: &Mutex<Vec<T>>, item: T) {
    into.lock().unwrap_or_else(|e| e.into_inner()).push(item);
}

fn take<T>(from: Mutex<Vec<T>>) -> Vec<T> {
    from.into_inner().unwrap_or_else(|e| e.into_inner())
}

/// Per-run borrowed view handed to each stage.
struct RunScope<'a> {
    run_id: Uuid,
    target: &'a Target,
    state: &'a StateMachine,
    stats: &'a StatsBook,
    collected: &'a Collected,
    cancel: &'a CancellationToken,
}

impl Pipeline {
    pub fn builder(config: Config) -> PipelineBuilder {
        PipelineBuilder {
            config,
            dns: None,
            probe_http: None,
            source_http: None,
            sink: None,
            plan: StagePlan::full(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn plan(&self) -> StagePlan {
        self.plan
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Services a source adapter may use.
    pub fn source_context(&self) -> SourceContext {
        SourceContext {
            config: self.config.clone(),
            http: self.source_http.clone(),
            dns: self.dns.clone(),
        }
    }

    /// State and counters of the current run, updated as it progresses.
    pub fn progress(&self) -> watch::Receiver<Progress> {
        self.progress.subscribe()
    }

    pub async fn run(
        &self,
        target: Target,
        catalog: &dyn SourceCatalog,
        cancel: &CancellationToken,
    ) -> Result<PipelineRun, PipelineError> {
        let adapters = catalog.list_enabled();
        if adapters.is_empty() {
            return Err(PipelineError::fatal("no sources enabled"));
        }

        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("pipeline", %run_id, target = %target);
        self.execute(run_id, target, adapters, cancel).instrument(span).await
    }

    async fn execute(
        &self,
        run_id: Uuid,
        target: Target,
        adapters: Vec<Arc<dyn SourceAdapter>>,
        cancel: &CancellationToken,
    ) -> Result<PipelineRun, PipelineError> {
        let started_at = Utc::now();
        let run_cancel = cancel.child_token();
        let state = Arc::new(StateMachine::new(self.progress.clone()));
        let stats = StatsBook::new(self.progress.clone());
        let collected = Collected::default();
        let dedup = Deduplicator::new(self.config.max_candidates);

        let ready = self.prepare_sources(adapters, &stats);
        tracing::info!(sources = ready.len(), plan = %self.plan.describe(), "starting run");

        let watcher = {
            let state = state.clone();
            let token = run_cancel.clone();
            tokio::spawn(async move {
                token.cancelled().await;
                if state.cancel() {
                    sigma_common::warn!("cancelling run, keeping results produced so far");
                }
            })
        };
        let timer = self.config.run_timeout().map(|limit| {
            let token = run_cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(limit).await;
                sigma_common::warn!("run timeout of {}s reached", limit.as_secs());
                token.cancel();
            })
        });

        let scope = RunScope {
            run_id,
            target: &target,
            state: state.as_ref(),
            stats: &stats,
            collected: &collected,
            cancel: &run_cancel,
        };

        let (cand_tx, cand_rx) = mpsc::channel::<Candidate>(CHANNEL_DEPTH);
        let (uniq_tx, uniq_rx) = mpsc::channel::<DedupedCandidate>(CHANNEL_DEPTH);
        let (res_tx, res_rx) = mpsc::channel::<ResolvedHost>(CHANNEL_DEPTH);
        let (valid_tx, valid_rx) = mpsc::channel::<Arc<ResolvedHost>>(CHANNEL_DEPTH);

        scope.state.advance(PipelineState::Discovering);
        tokio::join!(
            self.discover_stage(&scope, ready, cand_tx),
            self.dedupe_stage(&scope, &dedup, cand_rx, uniq_tx),
            self.resolve_stage(&scope, uniq_rx, res_tx),
            self.validate_stage(&scope, res_rx, valid_tx),
            self.probe_stage(&scope, valid_rx),
        );

        watcher.abort();
        if let Some(timer) = timer {
            timer.abort();
        }
        if let Err(e) = self.sink.flush() {
            stats.bump(|c| c.sink_failures += 1);
            sigma_common::warn!("could not flush output: {e}");
        }

        let cancelled = run_cancel.is_cancelled();
        if cancelled {
            state.cancel();
        }
        let counters = stats.counters();
        let cancel_summary = cancelled.then(|| self.cancel_summary(&counters));
        let final_state = state.finish();

        match (final_state, cancel_summary) {
            (PipelineState::Cancelled, Some(summary)) => sigma_common::warn!(
                "run cancelled: {} items completed, {} abandoned",
                summary.completed,
                summary.abandoned
            ),
            _ => sigma_common::success!(
                "run finished: {} unique, {} resolved, {} probed",
                counters.candidates_unique,
                counters.resolved,
                counters.probed
            ),
        }

        Ok(PipelineRun::seal(RunParts {
            run_id,
            target,
            started_at,
            transitions: state.transitions(),
            candidates: dedup.snapshot(),
            resolved: take(collected.resolved),
            resolution_failures: take(collected.failures),
            wildcard_filtered: take(collected.wildcard),
            probes: take(collected.probes),
            source_stats: stats.sources(),
            counters,
            cancel_summary,
        }))
    }

    fn prepare_sources(&self, adapters: Vec<Arc<dyn SourceAdapter>>, stats: &StatsBook) -> Vec<Arc<dyn SourceAdapter>> {
        let ctx = self.source_context();
        let mut ready = Vec::with_capacity(adapters.len());
        for adapter in adapters {
            let id = adapter.id();
            stats.register(&id);
            match adapter.prepare(&ctx) {
                Ok(()) => ready.push(adapter),
                Err(e) => {
                    sigma_common::warn!("source {id} skipped: {e}");
                    stats.freeze(
                        &id,
                        SourceEnd {
                            outcome: SourceOutcome::Failed,
                            error: Some(&e),
                            elapsed: Default::default(),
                            request_errors: 0,
                            rate_limited: false,
                        },
                    );
                }
            }
        }
        ready
    }

    /// Items that reached their last planned stage vs items that were accepted
    /// for further work but never got there.
    fn cancel_summary(&self, c: &StageCounters) -> CancelSummary {
        let completed = if !self.plan.resolve {
            c.candidates_unique
        } else if self.plan.probe {
            c.resolution_failures + c.probed + c.probe_failures + c.wildcard_filtered
        } else {
            c.resolution_failures + c.resolved
        };
        CancelSummary {
            completed,
            abandoned: c.candidates_unique.saturating_sub(completed),
        }
    }

    fn emit(&self, scope: &RunScope<'_>, record: Record<'_>) {
        if let Err(e) = self.sink.write(&Envelope::new(scope.run_id, record)) {
            let failures = scope.stats.bump(|c| c.sink_failures += 1).sink_failures;
            if failures == 1 {
                sigma_common::warn!("could not write record: {e}");
            } else {
                tracing::debug!("could not write record: {e}");
            }
        }
    }

    fn advance_after(&self, scope: &RunScope<'_>, stage: PipelineState) {
        if scope.cancel.is_cancelled() {
            return;
        }
        if let Some(next) = self.plan.next_after(stage) {
            scope.state.advance(next);
        }
    }

    // ── stages ─────────────────────────────────────────────────────────

    async fn discover_stage(
        &self,
        scope: &RunScope<'_>,
        sources: Vec<Arc<dyn SourceAdapter>>,
        out: mpsc::Sender<Candidate>,
    ) {
        stream::iter(sources)
            .for_each_concurrent(self.config.source_concurrency, |adapter| {
                let span = tracing::info_span!("source", id = %adapter.id());
                self.drive_source(scope, adapter, out.clone()).instrument(span)
            })
            .await;
        drop(out);
        self.advance_after(scope, PipelineState::Discovering);
    }

    async fn drive_source(&self, scope: &RunScope<'_>, adapter: Arc<dyn SourceAdapter>, out: mpsc::Sender<Candidate>) {
        let id = adapter.id();
        let budget = SourceBudget::new(id.clone(), self.limiter.clone(), &self.config, scope.cancel.clone());
        let started = Instant::now();
        let mut candidates = adapter.enumerate(scope.target, budget.clone());

        let mut failure: Option<SourceError> = None;
        let mut outcome = SourceOutcome::Completed;
        loop {
            let next = tokio::select! {
                biased;
                _ = scope.cancel.cancelled() => {
                    outcome = SourceOutcome::Cancelled;
                    break;
                }
                next = candidates.next() => next,
            };
            match next {
                None => break,
                Some(Ok(candidate)) => {
                    scope.stats.found(&id);
                    self.emit(scope, Record::Discovered(&candidate));
                    if !forward(&out, candidate, scope.cancel).await {
                        outcome = SourceOutcome::Cancelled;
                        break;
                    }
                }
                Some(Err(SourceError::Cancelled)) => {
                    outcome = SourceOutcome::Cancelled;
                    break;
                }
                Some(Err(e)) => {
                    sigma_common::warn!("source {id} failed: {e}");
                    outcome = SourceOutcome::Failed;
                    failure = Some(e);
                    break;
                }
            }
        }

        scope.stats.freeze(
            &id,
            SourceEnd {
                outcome,
                error: failure.as_ref(),
                elapsed: started.elapsed(),
                request_errors: budget.errors(),
                rate_limited: budget.was_rate_limited(),
            },
        );
        if outcome == SourceOutcome::Completed {
            tracing::debug!(source = %id, "source exhausted");
        }
    }

    async fn dedupe_stage(
        &self,
        scope: &RunScope<'_>,
        dedup: &Deduplicator,
        mut input: mpsc::Receiver<Candidate>,
        out: mpsc::Sender<DedupedCandidate>,
    ) {
        while let Some(candidate) = receive(&mut input, scope.cancel).await {
            scope.stats.bump(|c| c.candidates_received += 1);

            let hostname = match scope.target.scope(&candidate.hostname) {
                Ok(hostname) => hostname,
                Err(e) => {
                    scope.stats.bump(|c| c.candidates_rejected += 1);
                    tracing::debug!(source = %candidate.source, "rejected {}: {e}", candidate.hostname);
                    continue;
                }
            };

            match dedup.insert(hostname, &candidate) {
                DedupOutcome::New(unique) => {
                    scope.stats.bump(|c| c.candidates_unique += 1);
                    self.emit(scope, Record::Unique(&unique));
                    if self.plan.resolve && !forward(&out, unique, scope.cancel).await {
                        break;
                    }
                }
                DedupOutcome::Merged => {}
                DedupOutcome::Dropped => {
                    let dropped = scope.stats.bump(|c| c.candidates_dropped += 1).candidates_dropped;
                    if dropped == 1 {
                        sigma_common::warn!(
                            "candidate cap of {} reached, further new hostnames are dropped",
                            self.config.max_candidates.unwrap_or_default()
                        );
                    }
                }
            }
        }
        drop(out);
        self.advance_after(scope, PipelineState::Deduping);
    }

    async fn resolve_stage(
        &self,
        scope: &RunScope<'_>,
        input: mpsc::Receiver<DedupedCandidate>,
        out: mpsc::Sender<ResolvedHost>,
    ) {
        if !self.plan.resolve {
            return;
        }

        let resolver = Resolver::new(self.dns.clone(), &self.config);
        if self.config.wildcard_test_count > 0 {
            resolver
                .detect_wildcard(scope.target.root(), self.config.wildcard_test_count, scope.cancel)
                .await;
        }

        let resolver = &resolver;
        let out_ref = &out;
        ReceiverStream::new(input)
            .take_until(scope.cancel.cancelled())
            .for_each_concurrent(self.config.resolver_concurrency, |candidate| async move {
                match resolver.resolve(&candidate.hostname, scope.cancel).await {
                    Ok(host) => {
                        scope.stats.bump(|c| c.resolved += 1);
                        self.emit(scope, Record::Resolved(&host));
                        push(&scope.collected.resolved, host.clone());
                        forward(out_ref, host, scope.cancel).await;
                    }
                    Err(ResolveFailure::Failed(failure)) => {
                        scope.stats.bump(|c| c.resolution_failures += 1);
                        tracing::debug!("{} unresolved: {}", failure.hostname, failure.error);
                        push(&scope.collected.failures, failure);
                    }
                    Err(ResolveFailure::Cancelled) => {}
                }
            })
            .await;
        drop(out);
        self.advance_after(scope, PipelineState::Resolving);
    }

    async fn validate_stage(
        &self,
        scope: &RunScope<'_>,
        mut input: mpsc::Receiver<ResolvedHost>,
        out: mpsc::Sender<Arc<ResolvedHost>>,
    ) {
        let filter = self.plan.validate && !self.config.skip_wildcard_filter;
        while let Some(host) = receive(&mut input, scope.cancel).await {
            if filter && host.wildcard_suspect {
                scope.stats.bump(|c| c.wildcard_filtered += 1);
                tracing::debug!("{} filtered as wildcard", host.hostname);
                push(&scope.collected.wildcard, host.hostname);
                continue;
            }
            if self.plan.probe && !forward(&out, Arc::new(host), scope.cancel).await {
                break;
            }
        }
        drop(out);
        if self.plan.validate {
            self.advance_after(scope, PipelineState::Validating);
        }
    }

    async fn probe_stage(&self, scope: &RunScope<'_>, input: mpsc::Receiver<Arc<ResolvedHost>>) {
        if !self.plan.probe {
            return;
        }

        let prober = Prober::new(
            self.probe_http.clone(),
            self.config.prober_concurrency,
            self.config.skip_wildcard_filter,
        );
        let prober = &prober;
        ReceiverStream::new(input)
            .take_until(scope.cancel.cancelled())
            .for_each_concurrent(self.config.prober_concurrency, |host| async move {
                let hostname = host.hostname.clone();
                match prober.probe(host, scope.cancel).await {
                    Ok(result) => {
                        if result.error.is_some() {
                            scope.stats.bump(|c| c.probe_failures += 1);
                        } else {
                            scope.stats.bump(|c| c.probed += 1);
                        }
                        self.emit(scope, Record::Probe(&result));
                        push(&scope.collected.probes, result);
                    }
                    Err(ProbeRejected::WildcardSuspect) => {
                        scope.stats.bump(|c| c.wildcard_filtered += 1);
                        push(&scope.collected.wildcard, hostname);
                    }
                    Err(ProbeRejected::Cancelled) => {}
                }
            })
            .await;
        self.advance_after(scope, PipelineState::Probing);
    }
}

/// Sends unless the run is cancelled first. `false` means stop producing.
async fn forward<T>(out: &mpsc::Sender<T>, item: T, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        sent = out.send(item) => sent.is_ok(),
    }
}

async fn receive<T>(input: &mut mpsc::Receiver<T>, cancel: &CancellationToken) -> Option<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        item = input.recv() => item,
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
