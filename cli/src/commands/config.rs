//! Builds the effective [`Config`]: defaults, then `--config-file`, then API
//! keys (`--api-keys` file and `SIGMA_<SOURCE>_API_KEY`), then flags.

use std::path::Path;

use anyhow::Context;
use sigma_common::config::Config;
use sigma_common::models::candidate::SourceId;

use crate::commands::SourceArgs;

pub fn load(config_file: Option<&Path>, args: &SourceArgs) -> anyhow::Result<Config> {
    let mut cfg = match config_file {
        Some(path) => Config::from_toml_file(path)?,
        None => Config::default(),
    };

    if let Some(path) = &args.api_keys {
        cfg.merge_api_keys_file(path)?;
    }
    cfg.merge_env_keys(std::env::vars());

    apply_source_args(&mut cfg, args);
    Ok(cfg)
}

pub fn apply_source_args(cfg: &mut Config, args: &SourceArgs) {
    if !args.sources.is_empty() {
        cfg.sources = ids(&args.sources);
    }
    cfg.exclude_sources.extend(ids(&args.exclude_sources));
    cfg.all_sources |= args.all_sources;
    cfg.no_api_keys |= args.no_api_keys;

    if let Some(rate) = args.rate_limit {
        cfg.rate_limit_per_source = rate;
    }
    if let Some(timeout) = args.timeout {
        cfg.timeout_seconds = timeout;
    }
    if let Some(retries) = args.retries {
        cfg.retries = retries;
    }
    if let Some(wordlist) = &args.wordlist {
        cfg.wordlist = Some(wordlist.clone());
    }
}

fn ids(raw: &[String]) -> std::collections::BTreeSet<SourceId> {
    raw.iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(SourceId::new)
        .collect()
}

/// `sigma config show`
pub fn show(config_file: Option<&Path>, args: &SourceArgs) -> anyhow::Result<()> {
    let cfg = load(config_file, args)?;
    cfg.validate()?;
    let rendered = cfg.to_toml_string().context("could not render configuration")?;
    println!("{rendered}");

    if !cfg.api_keys.is_empty() {
        let names: Vec<&str> = cfg.api_keys.keys().map(SourceId::as_str).collect();
        println!("# api keys configured for: {}", names.join(", "));
    }
    Ok(())
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
