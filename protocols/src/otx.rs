use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct PassiveDns {
    #[serde(default)]
    passive_dns: Vec<PassiveDnsRecord>,
}

#[derive(Debug, Deserialize)]
struct PassiveDnsRecord {
    hostname: String,
}

/// Hostnames from an AlienVault OTX `passive_dns` document.
pub fn parse_passive_dns(body: &str) -> anyhow::Result<Vec<String>> {
    let doc: PassiveDns = serde_json::from_str(body).context("Failed to parse OTX passive DNS")?;
    Ok(doc
        .passive_dns
        .iter()
        .filter_map(|record| crate::clean_reported_name(&record.hostname))
        .map(str::to_string)
        .collect())
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
