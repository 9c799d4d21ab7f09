//! Drives one pipeline over every requested target, one run at a time.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use sigma_common::config::Config;
use sigma_common::models::target::{self, Target};
use sigma_core::pipeline::{Pipeline, StagePlan};
use sigma_core::sink::{Sink, Stage};
use sigma_core::source::SourceAdapter;
use sigma_plugins::SourceRegistry;
use sigma_plugins::sources::static_list::StaticList;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info_span};

use crate::commands::{CommandLine, OutputArgs};
use crate::output::{FanoutSink, FileSink, IntermediateSink};
use crate::terminal::input::InputHandle;
use crate::terminal::{print, results, spinner};

pub struct RunRequest {
    pub targets: Vec<Target>,
    pub plan: StagePlan,
    pub output: OutputArgs,
    pub intermediate_dir: Option<PathBuf>,
    /// Hostnames saved by an earlier run; they replace the registry's sources.
    pub seeds: Option<Vec<String>>,
}

impl RunRequest {
    /// The stage whose records make up the command's results.
    pub fn final_stage(&self) -> Stage {
        match self.plan {
            StagePlan { probe: true, .. } => Stage::Probe,
            StagePlan { resolve: true, .. } => Stage::Resolve,
            _ => Stage::Dedupe,
        }
    }
}

/// Targets named on the command line followed by those in `list`, deduplicated.
pub fn collect_targets(inline: &[Target], list: Option<&Path>) -> anyhow::Result<Vec<Target>> {
    let mut targets: Vec<Target> = Vec::new();
    let mut push = |t: Target| {
        if !targets.contains(&t) {
            targets.push(t);
        }
    };
    inline.iter().cloned().for_each(&mut push);

    if let Some(path) = list {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("could not read target list {}", path.display()))?;
        for line in raw.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            target::parse_commas(line)?.into_iter().for_each(&mut push);
        }
    }

    anyhow::ensure!(!targets.is_empty(), "no valid targets given");
    Ok(targets)
}

pub async fn execute(cli: &CommandLine, cfg: Config, request: RunRequest) -> anyhow::Result<()> {
    let final_stage = request.final_stage();
    let sink = build_sink(&request, final_stage)?;

    let pipeline = Pipeline::builder(cfg)
        .with_plan(request.plan)
        .with_sink(sink)
        .build()?;

    let sources: Vec<Arc<dyn SourceAdapter>> = match &request.seeds {
        Some(seeds) => vec![Arc::new(StaticList::named("resume", seeds.iter().cloned()))],
        None => SourceRegistry::builtin().list_enabled(&pipeline.source_context())?,
    };
    let names: Vec<String> = sources.iter().map(|s| s.id().to_string()).collect();
    print::print_status(format!("Sources: {}", names.join(", ")));
    print::print_status(format!("Stages: {}", request.plan.describe()));

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };
    let input = if cli.disable_input {
        None
    } else {
        InputHandle::start(cancel.clone())
    };

    let mut outcome = Ok(());
    for target in request.targets {
        if cancel.is_cancelled() {
            sigma_common::warn!("skipping {target}: cancelled");
            continue;
        }
        print::header(&format!("enumerating {target}"), cli.quiet);

        let span = info_span!("scan", indicatif.pb_show = true, target = %target);
        let follower = tokio::spawn(spinner::follow(span.clone(), pipeline.progress(), input.is_some()));
        let run = pipeline.run(target, &sources, &cancel).instrument(span).await;
        follower.abort();

        match run {
            Ok(run) => results::print_run(&run, final_stage, cli.quiet, request.output.output.is_none()),
            Err(err) => {
                outcome = Err(err.into());
                break;
            }
        }
    }

    drop(input);
    ctrl_c.abort();

    if let Some(path) = &request.output.output {
        if outcome.is_ok() {
            sigma_common::success!("results written to {}", path.display());
        }
    }
    outcome
}

fn build_sink(request: &RunRequest, final_stage: Stage) -> anyhow::Result<Arc<dyn Sink>> {
    let mut fanout = FanoutSink::default();
    if let Some(path) = &request.output.output {
        let file = FileSink::create(path, request.output.format, request.output.append, final_stage)?;
        fanout.push(Arc::new(file));
    }
    if let Some(dir) = &request.intermediate_dir {
        let intermediate = IntermediateSink::create(dir)?;
        sigma_common::info!("saving intermediate results under {}", intermediate.dir().display());
        fanout.push(Arc::new(intermediate));
    }
    Ok(Arc::new(fanout))
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
