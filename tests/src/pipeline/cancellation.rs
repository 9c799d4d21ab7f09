use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use sigma_common::config::Config;
use sigma_common::models::run::PipelineState;
use sigma_common::models::stats::SourceOutcome;
use sigma_core::pipeline::StagePlan;
use sigma_core::sink::Stage;
use sigma_core::source::SourceAdapter;
use tokio_util::sync::CancellationToken;

use crate::fakes::{FakeWeb, ScriptedSource, ZoneDns, harness, sources, target};

const SOURCE_IDS: [&str; 10] = ["s0", "s1", "s2", "s3", "s4", "s5", "s6", "s7", "s8", "s9"];

#[tokio::test(start_paused = true)]
async fn cancel_keeps_partial_results_consistent() {
    // 300 requests a minute per source: far too slow to finish 100 names in a second
    let cfg = Config {
        source_concurrency: SOURCE_IDS.len(),
        ..Config::default()
    };
    let h = harness(cfg, StagePlan::full(), ZoneDns::default(), FakeWeb::default());
    let list: Vec<Arc<dyn SourceAdapter>> = SOURCE_IDS
        .into_iter()
        .map(|id| Arc::new(ScriptedSource::generated(id, "example.com", 100)) as Arc<dyn SourceAdapter>)
        .collect();
    let list = sources(list);

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            cancel.cancel();
        });
    }

    let run = h.pipeline.run(target("example.com"), &list, &cancel).await.unwrap();

    assert_eq!(run.state(), PipelineState::Cancelled);
    let states: Vec<PipelineState> = run.transitions().iter().map(|t| t.state).collect();
    assert!(states.contains(&PipelineState::Cancelling));

    let found = run.candidates().len();
    assert!(found > 0 && found < 1000, "got {found} candidates");

    let unique: HashSet<&str> = run.candidates().iter().map(|c| c.hostname.as_str()).collect();
    assert_eq!(unique.len(), found);
    assert!(run.candidates().iter().all(|c| c.sources.contains(&c.primary_source)));

    let summary = run.cancel_summary().unwrap();
    assert_eq!(summary.completed + summary.abandoned, run.counters().candidates_unique);

    assert_eq!(run.source_stats().len(), SOURCE_IDS.len());
    assert!(
        run.source_stats()
            .values()
            .all(|s| s.outcome == SourceOutcome::Cancelled)
    );

    let sunk: HashSet<String> = h.sink.hostnames(Stage::Dedupe).into_iter().collect();
    assert_eq!(sunk.len(), h.sink.hostnames(Stage::Dedupe).len());
    assert!(sunk.len() <= found);
}

#[tokio::test(start_paused = true)]
async fn cancel_before_start_yields_an_empty_cancelled_run() {
    let h = harness(Config::default(), StagePlan::discover_only(), ZoneDns::default(), FakeWeb::default());
    let list = sources(vec![Arc::new(ScriptedSource::generated("early", "example.com", 10))]);

    let cancel = CancellationToken::new();
    cancel.cancel();
    let run = h.pipeline.run(target("example.com"), &list, &cancel).await.unwrap();

    assert_eq!(run.state(), PipelineState::Cancelled);
    assert!(run.candidates().is_empty());
    let summary = run.cancel_summary().unwrap();
    assert_eq!((summary.completed, summary.abandoned), (0, 0));
}

#[tokio::test(start_paused = true)]
async fn run_timeout_cancels_like_an_interrupt() {
    let cfg = Config {
        run_timeout_seconds: Some(1),
        ..Config::default()
    };
    let h = harness(cfg, StagePlan::discover_only(), ZoneDns::default(), FakeWeb::default());
    let list = sources(vec![
        Arc::new(ScriptedSource::generated("slow-a", "example.com", 100)),
        Arc::new(ScriptedSource::generated("slow-b", "example.com", 100)),
    ]);

    let cancel = CancellationToken::new();
    let run = h.pipeline.run(target("example.com"), &list, &cancel).await.unwrap();

    assert_eq!(run.state(), PipelineState::Cancelled);
    assert!(!cancel.is_cancelled(), "only the run's own token is cancelled");
    let found = run.candidates().len() as u64;
    assert!(found > 0 && found < 200, "got {found} candidates");
    let summary = run.cancel_summary().unwrap();
    assert_eq!(summary.completed, found);
    assert_eq!(summary.abandoned, 0);
}
