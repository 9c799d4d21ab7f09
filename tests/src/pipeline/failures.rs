use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use sigma_common::error::ErrorKind;
use sigma_common::models::candidate::SourceId;
use sigma_common::models::run::PipelineState;
use sigma_common::models::stats::SourceOutcome;
use sigma_core::pipeline::StagePlan;
use tokio_util::sync::CancellationToken;

use crate::fakes::{FakeWeb, FlakySource, ScriptedSource, ZoneDns, config, harness, sources, target};

#[tokio::test(start_paused = true)]
async fn failing_source_is_recorded_and_siblings_complete() {
    let attempts = Arc::new(AtomicU32::new(0));
    let h = harness(config(), StagePlan::discover_only(), ZoneDns::default(), FakeWeb::default());
    let sources = sources(vec![
        Arc::new(FlakySource {
            attempts: attempts.clone(),
        }),
        Arc::new(ScriptedSource::generated("steady", "example.com", 25)),
    ]);

    let run = h
        .pipeline
        .run(target("example.com"), &sources, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(run.state(), PipelineState::Completed);
    assert_eq!(attempts.load(Ordering::SeqCst), 4, "one attempt plus three retries");

    let flaky = &run.source_stats()[&SourceId::new("flaky")];
    assert_eq!(flaky.outcome, SourceOutcome::Failed);
    assert_eq!(flaky.error, Some(ErrorKind::SourceUnavailable));
    assert_eq!(flaky.candidates_found, 0);
    assert!(flaky.errors >= 4);

    let steady = &run.source_stats()[&SourceId::new("steady")];
    assert_eq!(steady.outcome, SourceOutcome::Completed);
    assert_eq!(steady.candidates_found, 25);
    assert_eq!(run.candidates().len(), 25);
    assert!(run.candidates().iter().all(|c| c.primary_source == SourceId::new("steady")));
    assert_eq!(run.failed_sources().count(), 1);
}

#[tokio::test(start_paused = true)]
async fn failure_after_partial_output_keeps_what_was_emitted() {
    let h = harness(config(), StagePlan::full(), ZoneDns::default().host("www.example.com", "192.0.2.1"), FakeWeb::default().up("www.example.com"));
    let sources = sources(vec![
        Arc::new(ScriptedSource::new("good", &["www.example.com"])),
        Arc::new(FlakySource {
            attempts: Arc::new(AtomicU32::new(0)),
        }),
    ]);

    let run = h
        .pipeline
        .run(target("example.com"), &sources, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(run.state(), PipelineState::Completed);
    assert_eq!(run.resolved().len(), 1);
    assert_eq!(run.probes().len(), 1);
    assert_eq!(run.probes()[0].http_status, Some(200));
    assert_eq!(run.probes()[0].title.as_deref(), Some("www.example.com"));
}
