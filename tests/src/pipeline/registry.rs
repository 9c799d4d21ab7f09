use sigma_common::config::Config;
use sigma_common::models::candidate::SourceId;
use sigma_common::models::run::PipelineState;
use sigma_common::models::stats::SourceOutcome;
use sigma_core::pipeline::StagePlan;
use sigma_plugins::SourceRegistry;
use tokio_util::sync::CancellationToken;

use crate::fakes::{FakeWeb, ZoneDns, config, harness, target};

const CRTSH_URL: &str = "https://crt.sh/?q=%25.example.com&output=json";

fn crtsh_only() -> Config {
    Config {
        sources: [SourceId::new("crtsh")].into_iter().collect(),
        ..config()
    }
}

#[tokio::test]
async fn registry_sources_run_through_the_pipeline() {
    let web = FakeWeb::default().page(
        CRTSH_URL,
        r#"[{"name_value":"www.example.com\n*.api.example.com"},{"name_value":"WWW.example.com"}]"#,
    );
    let h = harness(crtsh_only(), StagePlan::discover_only(), ZoneDns::default(), web);

    let enabled = SourceRegistry::builtin()
        .list_enabled(&h.pipeline.source_context())
        .unwrap();
    assert_eq!(enabled.len(), 1);

    let run = h
        .pipeline
        .run(target("example.com"), &enabled, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(run.state(), PipelineState::Completed);
    let mut hosts: Vec<&str> = run.candidates().iter().map(|c| c.hostname.as_str()).collect();
    hosts.sort();
    assert_eq!(hosts, ["api.example.com", "www.example.com"]);

    let crtsh = &run.source_stats()[&SourceId::new("crtsh")];
    assert_eq!(crtsh.outcome, SourceOutcome::Completed);
    assert_eq!(crtsh.candidates_found, 2);
}

#[tokio::test]
async fn unreachable_provider_fails_only_its_source() {
    let cfg = Config {
        sources: ["crtsh", "hackertarget"].into_iter().map(SourceId::new).collect(),
        retries: 0,
        ..config()
    };
    let web = FakeWeb::default().page(
        "https://api.hackertarget.com/hostsearch/?q=example.com",
        "mail.example.com,192.0.2.25\n",
    );
    let h = harness(cfg, StagePlan::discover_only(), ZoneDns::default(), web);

    let enabled = SourceRegistry::builtin()
        .list_enabled(&h.pipeline.source_context())
        .unwrap();
    let run = h
        .pipeline
        .run(target("example.com"), &enabled, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(run.state(), PipelineState::Completed);
    assert_eq!(run.failed_sources().map(|s| s.source_id.as_str()).collect::<Vec<_>>(), ["crtsh"]);
    assert_eq!(run.candidates().len(), 1);
    assert_eq!(run.candidates()[0].hostname, "mail.example.com");
}
