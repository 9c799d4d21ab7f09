//! # Run Configuration
//!
//! Layering, lowest precedence first:
//! 1. Built-in defaults ([`Config::default`]).
//! 2. A TOML file ([`Config::from_toml_file`]).
//! 3. API keys from a JSON file and `SIGMA_<SOURCE>_API_KEY` variables.
//! 4. Command-line flags, applied by the CLI on top of the result.

use std::collections::{BTreeMap, BTreeSet};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::models::candidate::SourceId;
use crate::utils::retry::RetryPolicy;

const ENV_KEY_PREFIX: &str = "SIGMA_";
const ENV_KEY_SUFFIX: &str = "_API_KEY";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Requests per minute allowed for each source.
    pub rate_limit_per_source: u32,
    /// Per-source exceptions to `rate_limit_per_source`.
    pub rate_limit_overrides: BTreeMap<SourceId, u32>,
    /// Ceiling on outbound source requests in flight at once, across all sources.
    pub global_max_concurrency: usize,
    /// Longest a source request may wait for a rate-limit slot.
    pub rate_limit_wait_seconds: u64,
    pub timeout_seconds: u64,
    pub retries: u32,

    /// Explicit source selection. Empty means the registry's default set.
    pub sources: BTreeSet<SourceId>,
    pub exclude_sources: BTreeSet<SourceId>,
    pub all_sources: bool,
    /// Leave out every source that needs an API key.
    pub no_api_keys: bool,
    #[serde(skip_serializing)]
    pub api_keys: BTreeMap<SourceId, String>,
    /// Words for the DNS brute-force source. Builtin list when unset.
    pub wordlist: Option<PathBuf>,

    pub source_concurrency: usize,
    pub resolver_concurrency: usize,
    pub prober_concurrency: usize,

    /// Per-query DNS timeout. Derived from `timeout_seconds` when unset.
    pub dns_timeout_ms: Option<u64>,
    pub dns_retries: u32,
    /// Custom nameservers; system configuration when empty.
    pub nameservers: Vec<IpAddr>,
    pub wildcard_test_count: usize,
    pub skip_wildcard_filter: bool,

    /// Unique candidates forwarded past deduplication; the rest are dropped.
    pub max_candidates: Option<usize>,
    /// Cancels the run once this much wall time has passed.
    pub run_timeout_seconds: Option<u64>,
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rate_limit_per_source: 300,
            rate_limit_overrides: BTreeMap::new(),
            global_max_concurrency: 100,
            rate_limit_wait_seconds: 120,
            timeout_seconds: 30,
            retries: 3,
            sources: BTreeSet::new(),
            exclude_sources: BTreeSet::new(),
            all_sources: false,
            no_api_keys: false,
            api_keys: BTreeMap::new(),
            wordlist: None,
            source_concurrency: 8,
            resolver_concurrency: 50,
            prober_concurrency: 20,
            dns_timeout_ms: None,
            dns_retries: 2,
            nameservers: Vec::new(),
            wildcard_test_count: 3,
            skip_wildcard_filter: false,
            max_candidates: None,
            run_timeout_seconds: None,
            user_agent: format!("sigma/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Config {
    pub fn from_toml_str(raw: &str, origin: &str) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: origin.to_string(),
            source,
        })
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = read(path)?;
        Self::from_toml_str(&raw, &path.display().to_string())
    }

    /// Merges a JSON object of `{"source": "key"}` pairs. File keys win over existing ones.
    pub fn merge_api_keys_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let raw = read(path)?;
        let keys: BTreeMap<String, String> =
            serde_json::from_str(&raw).map_err(|source| ConfigError::ApiKeys {
                path: path.display().to_string(),
                source,
            })?;
        for (id, key) in keys {
            self.api_keys.insert(SourceId::new(id), key);
        }
        Ok(())
    }

    /// Picks up `SIGMA_<SOURCE>_API_KEY` variables without overriding keys already set.
    pub fn merge_env_keys<I>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (name, value) in vars {
            let Some(id) = name
                .strip_prefix(ENV_KEY_PREFIX)
                .and_then(|rest| rest.strip_suffix(ENV_KEY_SUFFIX))
            else {
                continue;
            };
            if id.is_empty() || value.trim().is_empty() {
                continue;
            }
            self.api_keys
                .entry(SourceId::new(id))
                .or_insert_with(|| value.trim().to_string());
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive: [(&'static str, usize); 6] = [
            ("rate_limit_per_source", self.rate_limit_per_source as usize),
            ("global_max_concurrency", self.global_max_concurrency),
            ("source_concurrency", self.source_concurrency),
            ("resolver_concurrency", self.resolver_concurrency),
            ("prober_concurrency", self.prober_concurrency),
            ("timeout_seconds", self.timeout_seconds as usize),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "must be greater than zero".into(),
                });
            }
        }
        if let Some((id, _)) = self.rate_limit_overrides.iter().find(|(_, rate)| **rate == 0) {
            return Err(ConfigError::Invalid {
                field: "rate_limit_overrides",
                reason: format!("rate for {id} must be greater than zero"),
            });
        }
        if self.dns_timeout_ms == Some(0) {
            return Err(ConfigError::Invalid {
                field: "dns_timeout_ms",
                reason: "must be greater than zero".into(),
            });
        }
        Ok(())
    }

    pub fn rate_limit_for(&self, source: &SourceId) -> u32 {
        self.rate_limit_overrides
            .get(source)
            .copied()
            .unwrap_or(self.rate_limit_per_source)
    }

    pub fn api_key(&self, source: &SourceId) -> Option<&str> {
        self.api_keys.get(source).map(String::as_str)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn rate_limit_wait(&self) -> Duration {
        Duration::from_secs(self.rate_limit_wait_seconds)
    }

    /// A sixth of the request timeout, kept within 1..=5 seconds.
    pub fn dns_timeout(&self) -> Duration {
        match self.dns_timeout_ms {
            Some(ms) => Duration::from_millis(ms),
            None => Duration::from_secs((self.timeout_seconds / 6).clamp(1, 5)),
        }
    }

    pub fn source_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::for_sources(self.retries)
    }

    pub fn dns_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::for_dns(self.dns_retries)
    }

    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout_seconds.map(Duration::from_secs)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

fn read(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
