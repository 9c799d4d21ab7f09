use std::sync::Arc;

use sigma_common::models::candidate::SourceId;
use sigma_core::pipeline::StagePlan;
use sigma_core::sink::Stage;
use sigma_plugins::sources::static_list::StaticList;
use tokio_util::sync::CancellationToken;

use crate::fakes::{FakeWeb, ScriptedSource, ZoneDns, config, harness, sources, target};

#[tokio::test]
async fn out_of_scope_names_are_rejected_before_dedup() {
    let h = harness(config(), StagePlan::discover_only(), ZoneDns::default(), FakeWeb::default());
    let sources = sources(vec![
        Arc::new(ScriptedSource::new(
            "mixed",
            &[
                "www.example.com",
                "example.com.evil.net",
                "notexample.com",
                "WWW.EXAMPLE.COM.",
                "example.com",
            ],
        )),
        Arc::new(ScriptedSource::new("other", &["Www.Example.Com", "mail.example.org"])),
    ]);

    let run = h
        .pipeline
        .run(target("Example.COM"), &sources, &CancellationToken::new())
        .await
        .unwrap();

    let counters = run.counters();
    assert_eq!(counters.candidates_received, 7);
    assert_eq!(counters.candidates_rejected, 3);
    assert_eq!(counters.candidates_unique, 2);

    let mut hosts: Vec<&str> = run.candidates().iter().map(|c| c.hostname.as_str()).collect();
    hosts.sort();
    assert_eq!(hosts, ["example.com", "www.example.com"]);

    let www = run.candidates().iter().find(|c| c.hostname == "www.example.com").unwrap();
    assert_eq!(www.sources.len(), 2);

    let mut unique = h.sink.hostnames(Stage::Dedupe);
    unique.sort();
    assert_eq!(unique, ["example.com", "www.example.com"]);
    assert_eq!(h.sink.hostnames(Stage::Discover).len(), 7);
}

#[tokio::test]
async fn seeds_merge_with_discovered_names() {
    let h = harness(config(), StagePlan::discover_only(), ZoneDns::default(), FakeWeb::default());
    let sources = sources(vec![
        Arc::new(StaticList::new(["api.example.com", "www.example.com", "example.net"])),
        Arc::new(ScriptedSource::new("scripted", &["API.example.com."])),
    ]);

    let run = h
        .pipeline
        .run(target("example.com"), &sources, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(run.counters().candidates_rejected, 1);
    assert_eq!(run.candidates().len(), 2);
    let api = run.candidates().iter().find(|c| c.hostname == "api.example.com").unwrap();
    assert!(api.sources.contains(&SourceId::new("static")));
    assert!(api.sources.contains(&SourceId::new("scripted")));
}
