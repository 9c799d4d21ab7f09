use sigma_common::config::Config;
use sigma_core::pipeline::StagePlan;
use sigma_core::sink::Stage;

use crate::commands::runner::{self, RunRequest};
use crate::commands::{CommandLine, ResumeStage, ScanArgs, ScanMode, config};
use crate::output;

/// `sigma scan`: every stage the plan leaves in.
pub async fn scan(cli: &CommandLine, args: &ScanArgs) -> anyhow::Result<()> {
    let targets = runner::collect_targets(&args.targets, args.target_list.as_deref())?;
    let mut cfg = config::load(cli.config_file.as_deref(), &args.sources)?;
    apply_scan_args(&mut cfg, args);

    let mut plan = StagePlan::from_names(&args.stages, &args.skip_stages)?;
    let mut seeds = None;
    if let Some(stage) = args.continue_from {
        plan = plan.starting_at(stage.as_str())?;
        let skip_suspects = stage == ResumeStage::Probe && !cfg.skip_wildcard_filter;
        let hosts = output::read_stage_hosts(&args.output_dir, seed_stage(stage), skip_suspects)?;
        sigma_common::info!("continuing from {} with {} saved hostnames", stage.as_str(), hosts.len());
        seeds = Some(hosts);
    }

    let request = RunRequest {
        targets,
        plan,
        output: args.output.clone(),
        intermediate_dir: args.save_intermediate.then(|| args.output_dir.clone()),
        seeds,
    };
    runner::execute(cli, cfg, request).await
}

/// The saved stage whose hostnames feed a scan continued from `stage`.
fn seed_stage(stage: ResumeStage) -> Stage {
    match stage {
        ResumeStage::Resolve => Stage::Dedupe,
        ResumeStage::Validate | ResumeStage::Probe => Stage::Resolve,
    }
}

/// Rate and pool presets. `Basic` keeps whatever the config file set.
fn apply_mode(cfg: &mut Config, mode: ScanMode) {
    let (rate, sources, resolvers, probers, global) = match mode {
        ScanMode::Basic => return,
        ScanMode::Comprehensive => (300, 16, 100, 50, 200),
        ScanMode::Stealth => (30, 2, 10, 5, 10),
        ScanMode::Aggressive => (1000, 32, 300, 100, 400),
    };
    cfg.rate_limit_per_source = rate;
    cfg.source_concurrency = sources;
    cfg.resolver_concurrency = resolvers;
    cfg.prober_concurrency = probers;
    cfg.global_max_concurrency = global;
}

fn apply_scan_args(cfg: &mut Config, args: &ScanArgs) {
    apply_mode(cfg, args.mode);
    if let Some(rate) = args.sources.rate_limit {
        cfg.rate_limit_per_source = rate;
    }
    if let Some(threads) = args.threads {
        cfg.resolver_concurrency = threads;
        cfg.prober_concurrency = threads;
    }
    if args.max_candidates.is_some() {
        cfg.max_candidates = args.max_candidates;
    }
    if let Some(tests) = args.wildcard_tests {
        cfg.wildcard_test_count = tests;
    }
    if args.run_timeout.is_some() {
        cfg.run_timeout_seconds = args.run_timeout;
    }
    if !args.resolvers.is_empty() {
        cfg.nameservers = args.resolvers.clone();
    }
    cfg.skip_wildcard_filter |= args.skip_wildcard_filter;
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
