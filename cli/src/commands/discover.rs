use sigma_core::pipeline::StagePlan;

use crate::commands::runner::{self, RunRequest};
use crate::commands::{CommandLine, DiscoverArgs, config};

/// `sigma discover`: source fan-out and deduplication only.
pub async fn discover(cli: &CommandLine, args: &DiscoverArgs) -> anyhow::Result<()> {
    let targets = runner::collect_targets(&args.domains, args.domain_list.as_deref())?;
    let cfg = config::load(cli.config_file.as_deref(), &args.sources)?;

    let request = RunRequest {
        targets,
        plan: StagePlan::discover_only(),
        output: args.output.clone(),
        intermediate_dir: None,
        seeds: None,
    };
    runner::execute(cli, cfg, request).await
}
