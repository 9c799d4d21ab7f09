use std::collections::HashSet;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct CertificateEntry {
    name_value: String,
    #[serde(default)]
    common_name: Option<String>,
}

/// Extracts hostnames from a crt.sh `output=json` body, in first-seen order.
///
/// `name_value` holds one SAN per line; wildcard prefixes are dropped.
pub fn parse_names(body: &str) -> anyhow::Result<Vec<String>> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }

    let entries: Vec<CertificateEntry> =
        serde_json::from_str(body).context("Failed to parse crt.sh response")?;

    let mut seen: HashSet<String> = HashSet::new();
    let mut names: Vec<String> = Vec::new();

    for entry in &entries {
        let sans = entry.name_value.lines();
        let common = entry.common_name.as_deref().into_iter();
        for raw in sans.chain(common) {
            if let Some(name) = crate::clean_reported_name(raw) {
                let name = name.to_ascii_lowercase();
                if seen.insert(name.clone()) {
                    names.push(name);
                }
            }
        }
    }

    Ok(names)
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
