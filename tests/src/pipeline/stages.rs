use std::sync::Arc;

use sigma_common::models::run::PipelineState;
use sigma_core::pipeline::StagePlan;
use sigma_core::sink::Stage;
use tokio_util::sync::CancellationToken;

use crate::fakes::{FakeWeb, ScriptedSource, ZoneDns, config, harness, sources, target};

fn zone() -> ZoneDns {
    ZoneDns::default()
        .host("www.example.com", "192.0.2.1")
        .host("api.example.com", "192.0.2.2")
}

#[tokio::test]
async fn discover_only_never_touches_dns() {
    let h = harness(config(), StagePlan::discover_only(), zone(), FakeWeb::default().up("www.example.com"));
    let list = sources(vec![Arc::new(ScriptedSource::new("scripted", &["www.example.com", "api.example.com"]))]);

    let run = h
        .pipeline
        .run(target("example.com"), &list, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(run.state(), PipelineState::Completed);
    assert_eq!(run.candidates().len(), 2);
    assert_eq!(h.dns.lookups(), 0);
    assert!(run.resolved().is_empty());
    assert!(h.sink.hostnames(Stage::Resolve).is_empty());
    assert!(h.sink.hostnames(Stage::Probe).is_empty());

    let states: Vec<PipelineState> = run.transitions().iter().map(|t| t.state).collect();
    assert_eq!(
        states,
        [
            PipelineState::Idle,
            PipelineState::Discovering,
            PipelineState::Deduping,
            PipelineState::Completed
        ]
    );
}

#[tokio::test]
async fn skipping_probe_stops_after_validation() {
    let plan = StagePlan::from_names(&[], &["probe".to_string()]).unwrap();
    let h = harness(config(), plan, zone(), FakeWeb::default().up("www.example.com"));
    let list = sources(vec![Arc::new(ScriptedSource::new(
        "scripted",
        &["www.example.com", "api.example.com", "gone.example.com"],
    ))]);

    let run = h
        .pipeline
        .run(target("example.com"), &list, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(run.resolved().len(), 2);
    assert_eq!(run.resolution_failures().len(), 1);
    assert_eq!(run.resolution_failures()[0].hostname, "gone.example.com");
    assert!(run.probes().is_empty());

    let states: Vec<PipelineState> = run.transitions().iter().map(|t| t.state).collect();
    assert!(states.contains(&PipelineState::Resolving));
    assert!(!states.contains(&PipelineState::Probing));
    assert_eq!(states.last(), Some(&PipelineState::Completed));
}

#[tokio::test]
async fn every_stage_reaches_the_sink_in_a_full_run() {
    let h = harness(config(), StagePlan::full(), zone(), FakeWeb::default().up("www.example.com"));
    let list = sources(vec![Arc::new(ScriptedSource::new("scripted", &["www.example.com", "api.example.com"]))]);

    let run = h
        .pipeline
        .run(target("example.com"), &list, &CancellationToken::new())
        .await
        .unwrap();

    for stage in Stage::ALL {
        assert!(!h.sink.hostnames(stage).is_empty(), "nothing written for {stage:?}");
    }
    let live: Vec<&str> = run.probes().iter().filter(|p| p.is_live()).map(|p| p.hostname.as_str()).collect();
    assert_eq!(live, ["www.example.com"]);
    assert_eq!(run.counters().probe_failures, 1);
}
