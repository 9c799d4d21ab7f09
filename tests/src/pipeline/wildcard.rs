use std::sync::Arc;

use sigma_common::config::Config;
use sigma_common::models::run::PipelineState;
use sigma_core::pipeline::StagePlan;
use sigma_core::sink::Stage;
use tokio_util::sync::CancellationToken;

use crate::fakes::{FakeWeb, Harness, ScriptedSource, ZoneDns, config, harness, sources, target};

fn wildcard_zone(cfg: Config) -> Harness {
    let dns = ZoneDns::default()
        .wildcard("example.com", "203.0.113.7")
        .host("www.example.com", "192.0.2.10");
    let web = FakeWeb::default().up("www.example.com").up("ghost.example.com");
    harness(cfg, StagePlan::full(), dns, web)
}

fn names() -> Vec<Arc<dyn sigma_core::source::SourceAdapter>> {
    sources(vec![Arc::new(ScriptedSource::new(
        "scripted",
        &["www.example.com", "ghost.example.com"],
    ))])
}

#[tokio::test]
async fn wildcard_answers_are_not_probed() {
    let h = wildcard_zone(config());

    let run = h
        .pipeline
        .run(target("example.com"), &names(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(run.state(), PipelineState::Completed);
    assert_eq!(run.resolved().len(), 2);

    let ghost = run.resolved().iter().find(|r| r.hostname == "ghost.example.com").unwrap();
    let www = run.resolved().iter().find(|r| r.hostname == "www.example.com").unwrap();
    assert!(ghost.wildcard_suspect);
    assert!(!www.wildcard_suspect);

    assert_eq!(run.wildcard_filtered(), ["ghost.example.com".to_string()]);
    assert_eq!(run.counters().wildcard_filtered, 1);
    assert_eq!(h.sink.hostnames(Stage::Probe), ["www.example.com"]);
    // three random labels plus the two real names
    assert!(h.dns.lookups() >= 5);
}

#[tokio::test]
async fn filter_can_be_switched_off() {
    let h = wildcard_zone(Config {
        skip_wildcard_filter: true,
        ..config()
    });

    let run = h
        .pipeline
        .run(target("example.com"), &names(), &CancellationToken::new())
        .await
        .unwrap();

    assert!(run.wildcard_filtered().is_empty());
    let mut probed = h.sink.hostnames(Stage::Probe);
    probed.sort();
    assert_eq!(probed, ["ghost.example.com", "www.example.com"]);

    let ghost = run.probes().iter().find(|p| p.hostname == "ghost.example.com").unwrap();
    assert!(ghost.resolved.wildcard_suspect, "the flag survives even when not filtered");
}

#[tokio::test]
async fn no_wildcard_without_detection() {
    let h = wildcard_zone(Config {
        wildcard_test_count: 0,
        ..config()
    });

    let run = h
        .pipeline
        .run(target("example.com"), &names(), &CancellationToken::new())
        .await
        .unwrap();

    assert!(run.resolved().iter().all(|r| !r.wildcard_suspect));
    assert_eq!(run.probes().len(), 2);
}
