use std::sync::Arc;

use sigma_common::models::run::PipelineState;
use sigma_core::pipeline::{Pipeline, StagePlan};
use sigma_core::sink::Sink;
use tokio_util::sync::CancellationToken;

use crate::fakes::{FailingSink, FakeWeb, ScriptedSource, ZoneDns, config, sources, target};

#[tokio::test]
async fn broken_sink_is_counted_and_the_run_completes() {
    let web = Arc::new(FakeWeb::default().up("www.example.com"));
    let pipeline = Pipeline::builder(config())
        .with_dns(Arc::new(
            ZoneDns::default()
                .host("www.example.com", "192.0.2.1")
                .host("api.example.com", "192.0.2.2"),
        ))
        .with_http(web.clone())
        .with_source_http(web)
        .with_sink(Arc::new(FailingSink) as Arc<dyn Sink>)
        .with_plan(StagePlan::full())
        .build()
        .unwrap();
    let list = sources(vec![Arc::new(ScriptedSource::new(
        "scripted",
        &["www.example.com", "api.example.com"],
    ))]);

    let run = pipeline
        .run(target("example.com"), &list, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(run.state(), PipelineState::Completed);
    assert_eq!(run.candidates().len(), 2);
    assert_eq!(run.resolved().len(), 2);
    assert_eq!(run.probes().len(), 2);

    // 2 discovered + 2 unique + 2 resolved + 2 probes, plus the failed flush
    assert_eq!(run.counters().sink_failures, 9);
}
