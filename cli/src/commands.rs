pub mod config;
pub mod discover;
pub mod runner;
pub mod scan;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use sigma_common::models::target::Target;

#[derive(Parser)]
#[command(name = "sigma")]
#[command(about = "Attack-surface reconnaissance: discover, resolve and probe subdomains.")]
pub struct CommandLine {
    #[command(subcommand)]
    pub command: Commands,

    /// More output (-V for debug, -VV for trace)
    #[arg(short = 'V', long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Less output (-q hides banners and trees, -qq prints only results)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub quiet: u8,

    /// Explicit log filter (e.g. "debug" or "sigma_core=trace"); RUST_LOG wins over it
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// TOML file layered between the defaults and the flags
    #[arg(long, global = true)]
    pub config_file: Option<PathBuf>,

    #[arg(long, global = true)]
    pub no_banner: bool,

    /// Do not listen for 'q' on the terminal
    #[arg(long, global = true)]
    pub disable_input: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Enumerate subdomains from passive sources and merge them
    #[command(alias = "d")]
    Discover(DiscoverArgs),
    /// Discover, resolve, validate and probe subdomains
    #[command(alias = "s")]
    Scan(ScanArgs),
    /// Inspect the effective configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the configuration a run would use, as TOML
    Show(SourceArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct DiscoverArgs {
    /// Domain(s) to enumerate, comma separated
    #[arg(short = 'd', long = "domain", value_delimiter = ',', required_unless_present = "domain_list")]
    pub domains: Vec<Target>,

    /// File with one domain per line
    #[arg(long = "domain-list", visible_alias = "dL")]
    pub domain_list: Option<PathBuf>,

    #[command(flatten)]
    pub sources: SourceArgs,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ScanArgs {
    /// Domain(s) to scan, comma separated
    #[arg(short = 't', long = "target", value_delimiter = ',', required_unless_present = "target_list")]
    pub targets: Vec<Target>,

    /// File with one domain per line
    #[arg(long)]
    pub target_list: Option<PathBuf>,

    #[command(flatten)]
    pub sources: SourceArgs,

    #[command(flatten)]
    pub output: OutputArgs,

    /// Pacing preset; --rate-limit and --threads still win over it
    #[arg(long, value_enum, default_value_t = ScanMode::Basic)]
    pub mode: ScanMode,

    /// Seed the run from the previous stage's JSONL under --output-dir
    #[arg(long, value_enum)]
    pub continue_from: Option<ResumeStage>,

    /// Resolver and prober pool size
    #[arg(long)]
    pub threads: Option<usize>,

    /// Stop forwarding new hostnames after this many unique ones
    #[arg(long)]
    pub max_candidates: Option<usize>,

    /// Random labels queried per root to detect wildcard DNS
    #[arg(long)]
    pub wildcard_tests: Option<usize>,

    /// Only run these stages (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub stages: Vec<String>,

    /// Skip these stages (resolve, validate, probe)
    #[arg(long, value_delimiter = ',')]
    pub skip_stages: Vec<String>,

    /// Probe wildcard suspects too
    #[arg(long)]
    pub skip_wildcard_filter: bool,

    /// Write every stage's records to its own JSONL file under --output-dir
    #[arg(long)]
    pub save_intermediate: bool,

    #[arg(long, default_value = "scan_results")]
    pub output_dir: PathBuf,

    /// Cancel the run after this many seconds
    #[arg(long)]
    pub run_timeout: Option<u64>,

    /// Nameservers to query instead of the system configuration (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub resolvers: Vec<std::net::IpAddr>,
}

/// Flags that shape source selection and request behaviour.
#[derive(Args, Debug, Clone, Default)]
pub struct SourceArgs {
    #[arg(long, value_delimiter = ',')]
    pub sources: Vec<String>,

    #[arg(long, value_delimiter = ',')]
    pub exclude_sources: Vec<String>,

    /// Enable every registered source
    #[arg(long)]
    pub all_sources: bool,

    /// Requests per minute per source
    #[arg(long)]
    pub rate_limit: Option<u32>,

    /// Request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    #[arg(long)]
    pub retries: Option<u32>,

    /// JSON file of {"source": "key"} pairs
    #[arg(long)]
    pub api_keys: Option<PathBuf>,

    /// Leave out sources that need an API key
    #[arg(long)]
    pub no_api_keys: bool,

    /// Words for the DNS brute-force source
    #[arg(long)]
    pub wordlist: Option<PathBuf>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct OutputArgs {
    /// Write results to this file instead of the terminal
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Jsonl)]
    pub format: OutputFormat,

    /// Append to an existing output file
    #[arg(long)]
    pub append: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    #[value(alias = "ndjson")]
    Jsonl,
    Csv,
    Txt,
}

#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScanMode {
    #[default]
    Basic,
    Comprehensive,
    Stealth,
    Aggressive,
}

/// Stages a scan can be continued from.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeStage {
    Resolve,
    Validate,
    Probe,
}

impl ResumeStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResumeStage::Resolve => "resolve",
            ResumeStage::Validate => "validate",
            ResumeStage::Probe => "probe",
        }
    }
}

impl CommandLine {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CommandLine {
        CommandLine::try_parse_from(std::iter::once("sigma").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn discover_accepts_comma_lists_and_source_flags() {
        let cli = parse(&[
            "-V",
            "discover",
            "-d",
            "Example.com, example.org",
            "--sources",
            "crtsh,hackertarget",
            "--format",
            "txt",
        ]);
        assert_eq!(cli.verbose, 1);
        let Commands::Discover(args) = cli.command else {
            panic!("expected discover");
        };
        let domains: Vec<String> = args.domains.iter().map(|t| t.root().to_string()).collect();
        assert_eq!(domains, ["example.com", "example.org"]);
        assert_eq!(args.sources.sources, ["crtsh", "hackertarget"]);
        assert_eq!(args.output.format, OutputFormat::Txt);
    }

    #[test]
    fn scan_parses_stage_selection() {
        let cli = parse(&["scan", "-t", "example.com", "--skip-stages", "probe", "--resolvers", "1.1.1.1,9.9.9.9", "-q"]);
        assert_eq!(cli.quiet, 1);
        let Commands::Scan(args) = cli.command else {
            panic!("expected scan");
        };
        assert_eq!(args.skip_stages, ["probe"]);
        assert_eq!(args.resolvers.len(), 2);
        assert_eq!(args.output_dir, PathBuf::from("scan_results"));
        assert_eq!(args.mode, ScanMode::Basic);
        assert_eq!(args.continue_from, None);
    }

    #[test]
    fn scan_parses_mode_and_continue_from() {
        let cli = parse(&["scan", "-t", "example.com", "--mode", "stealth", "--continue-from", "validate"]);
        let Commands::Scan(args) = cli.command else {
            panic!("expected scan");
        };
        assert_eq!(args.mode, ScanMode::Stealth);
        assert_eq!(args.continue_from, Some(ResumeStage::Validate));

        let dedupe = ["sigma", "scan", "-t", "example.com", "--continue-from", "dedupe"];
        assert!(CommandLine::try_parse_from(dedupe).is_err());
    }

    #[test]
    fn discover_needs_a_domain_or_a_list() {
        assert!(CommandLine::try_parse_from(["sigma", "discover"]).is_err());
        assert!(CommandLine::try_parse_from(["sigma", "discover", "--dL", "domains.txt"]).is_ok());
        assert!(CommandLine::try_parse_from(["sigma", "discover", "-d", "10.0.0.1"]).is_err());
    }
}
