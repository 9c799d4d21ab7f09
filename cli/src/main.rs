mod commands;
mod output;
mod terminal;

use std::process::ExitCode;

use commands::{CommandLine, Commands, ConfigAction, config, discover, scan};
use terminal::{logging, print};

#[tokio::main]
async fn main() -> ExitCode {
    let commands = CommandLine::parse_args();

    if let Err(err) = logging::init(commands.verbose, commands.quiet, commands.log_level.as_deref()) {
        eprintln!("could not initialize logging: {err:#}");
        return ExitCode::FAILURE;
    }

    match run(&commands).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            sigma_common::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(commands: &CommandLine) -> anyhow::Result<()> {
    match &commands.command {
        Commands::Discover(args) => {
            print::banner(commands.no_banner, commands.quiet);
            print::header("getting ready for discovery", commands.quiet);
            discover::discover(commands, args).await
        }
        Commands::Scan(args) => {
            print::banner(commands.no_banner, commands.quiet);
            print::header("getting ready to scan", commands.quiet);
            scan::scan(commands, args).await
        }
        Commands::Config {
            action: ConfigAction::Show(args),
        } => config::show(commands.config_file.as_deref(), args),
    }
}
