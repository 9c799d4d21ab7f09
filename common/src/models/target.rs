//! # Scan Target Model
//!
//! A target is the root domain a run enumerates. It is normalized once when
//! parsed and never changes afterwards; every candidate is checked against it
//! before it may enter deduplication.
//!
//! Accepted spellings:
//! * A bare domain (`example.com`, `Example.COM.`).
//! * A URL (`https://example.com/login`), of which only the host is kept.
//! * A wildcard pattern (`*.example.com`), treated as its root.
//! * A comma separated list of any of the above (see [`parse_commas`]).

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

use crate::utils::hostname::{self, HostnameError};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Target {
    root: String,
}

/// Why a hostname was kept out of the run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScopeError {
    #[error(transparent)]
    Invalid(#[from] HostnameError),
    #[error("{host} is outside of {root}")]
    OutOfScope { host: String, root: String },
}

impl Target {
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Normalizes `raw` and checks that it is the target or one of its subdomains.
    pub fn scope(&self, raw: &str) -> Result<String, ScopeError> {
        let host = hostname::normalize(raw)?;
        if hostname::is_within(&host, &self.root) {
            Ok(host)
        } else {
            Err(ScopeError::OutOfScope {
                host,
                root: self.root.clone(),
            })
        }
    }

    pub fn contains(&self, raw: &str) -> bool {
        self.scope(raw).is_ok()
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.root)
    }
}

impl FromStr for Target {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let host = strip_url(s.trim());
        let host = host.strip_prefix("*.").unwrap_or(host);

        if parse_ip(host).is_some() {
            return Err(format!("invalid target: {s} is an IP address, expected a domain"));
        }

        let root = hostname::normalize(host).map_err(|e| format!("invalid target: {e}"))?;

        if !root.contains('.') {
            return Err(format!("invalid target: {s} has no parent domain"));
        }

        Ok(Target { root })
    }
}

/// Parses a comma-separated list of targets (e.g., "example.com, example.org").
pub fn parse_commas(s: &str) -> anyhow::Result<Vec<Target>> {
    let mut targets = Vec::new();

    for part in s.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        let target = Target::from_str(part)
            .map_err(|e| anyhow::anyhow!("Failed to parse target '{}': {}", part, e))?;

        if !targets.contains(&target) {
            targets.push(target);
        }
    }

    anyhow::ensure!(!targets.is_empty(), "no targets in '{s}'");
    Ok(targets)
}

/// Drops an optional scheme, userinfo, port and path, keeping only the host.
fn strip_url(s: &str) -> &str {
    let rest = s.split_once("://").map(|(_, rest)| rest).unwrap_or(s);
    let rest = rest.split(['/', '?', '#']).next().unwrap_or(rest);
    let rest = rest.rsplit_once('@').map(|(_, host)| host).unwrap_or(rest);
    match rest.rsplit_once(':') {
        Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) => host,
        _ => rest,
    }
}

fn parse_ip(s: &str) -> Option<IpAddr> {
    let s = s.trim_start_matches('[').trim_end_matches(']');
    s.parse::<IpAddr>().ok()
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

    #[test]
    fn test_strip_url_helper() {
        assert_eq!(strip_url("example.com"), "example.com");
        assert_eq!(strip_url("https://example.com/login?x=1"), "example.com");
        assert_eq!(strip_url("http://user:pw@example.com:8443/"), "example.com");
        assert_eq!(strip_url("example.com:443"), "example.com");
    }

    #[test]
    fn test_from_str_full_parsing() {
        let root = |s: &str| Target::from_str(s).map(|t| t.root().to_string());

        assert_eq!(root("example.com"), Ok("example.com".into()));
        assert_eq!(root("EXAMPLE.com."), Ok("example.com".into()));
        assert_eq!(root("*.example.com"), Ok("example.com".into()));
        assert_eq!(root("https://Shop.Example.com/cart"), Ok("shop.example.com".into()));

        // --- Error Cases ---
        assert!(Target::from_str("").is_err());
        assert!(Target::from_str("localhost").is_err());
        assert!(Target::from_str("10.0.0.1").is_err());
        assert!(Target::from_str("[::1]").is_err());
        assert!(Target::from_str("*.*.example.com").is_err());
    }

    #[test]
    fn scope_accepts_subdomains_only() {
        let target = Target::from_str("example.com").unwrap();
        assert_eq!(target.scope("API.Example.com."), Ok("api.example.com".into()));
        assert_eq!(target.scope("example.com"), Ok("example.com".into()));
        assert!(matches!(
            target.scope("notexample.com"),
            Err(ScopeError::OutOfScope { .. })
        ));
        assert!(matches!(target.scope("*.example.com"), Err(ScopeError::Invalid(_))));
    }

    #[test]
    fn comma_lists_deduplicate() {
        let targets = parse_commas("example.com, EXAMPLE.com., example.org").unwrap();
        assert_eq!(targets.len(), 2);
        assert!(parse_commas(" , ").is_err());
        assert!(parse_commas("example.com, 1.1.1.1").is_err());
    }
}
