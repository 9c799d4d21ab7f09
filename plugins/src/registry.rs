//! # Source Registry
//!
//! Maps a [`SourceId`] to a constructor and picks the adapters a run uses:
//!
//! 1. `sources` set → exactly those (unknown ids are fatal);
//!    otherwise `all_sources` → every registered source;
//!    otherwise the default set.
//! 2. `exclude_sources` is removed.
//! 3. Key-gated sources are removed under `no_api_keys`, and dropped
//!    silently from the default/all sets when no key is configured.

use std::collections::BTreeMap;
use std::sync::Arc;

use sigma_common::config::Config;
use sigma_common::error::PipelineError;
use sigma_common::models::candidate::SourceId;
use sigma_core::source::{SourceAdapter, SourceContext};

use crate::sources::{alienvault, crtsh, hackertarget, virustotal, wordlist};

pub type SourceFactory = fn(&SourceContext) -> Arc<dyn SourceAdapter>;

#[derive(Clone)]
pub struct SourceEntry {
    pub id: SourceId,
    pub description: &'static str,
    pub needs_key: bool,
    /// Whether the source joins a run that names no sources explicitly.
    pub default_when: fn(&Config) -> bool,
    pub factory: SourceFactory,
}

pub struct SourceRegistry {
    entries: BTreeMap<SourceId, SourceEntry>,
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl SourceRegistry {
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(SourceEntry {
            id: SourceId::new("crtsh"),
            description: "certificate transparency logs (crt.sh)",
            needs_key: false,
            default_when: |_| true,
            factory: |ctx| Arc::new(crtsh::CrtSh::new(ctx)),
        });
        registry.register(SourceEntry {
            id: SourceId::new("hackertarget"),
            description: "HackerTarget host search",
            needs_key: false,
            default_when: |_| true,
            factory: |ctx| Arc::new(hackertarget::HackerTarget::new(ctx)),
        });
        registry.register(SourceEntry {
            id: SourceId::new("alienvault"),
            description: "AlienVault OTX passive DNS",
            needs_key: false,
            default_when: |_| true,
            factory: |ctx| Arc::new(alienvault::AlienVault::new(ctx)),
        });
        registry.register(SourceEntry {
            id: SourceId::new("virustotal"),
            description: "VirusTotal subdomain relationship",
            needs_key: true,
            default_when: |_| true,
            factory: |ctx| Arc::new(virustotal::VirusTotal::new(ctx)),
        });
        registry.register(SourceEntry {
            id: SourceId::new("wordlist"),
            description: "DNS brute force over a wordlist",
            needs_key: false,
            default_when: |cfg| cfg.wordlist.is_some(),
            factory: |ctx| Arc::new(wordlist::Wordlist::new(ctx)),
        });
        registry
    }

    /// Adds or replaces an entry.
    pub fn register(&mut self, entry: SourceEntry) {
        self.entries.insert(entry.id.clone(), entry);
    }

    pub fn entries(&self) -> impl Iterator<Item = &SourceEntry> {
        self.entries.values()
    }

    pub fn contains(&self, id: &SourceId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn list_enabled(&self, ctx: &SourceContext) -> Result<Vec<Arc<dyn SourceAdapter>>, PipelineError> {
        let cfg = ctx.config.as_ref();

        if let Some(unknown) = cfg.sources.iter().find(|id| !self.contains(id)) {
            return Err(PipelineError::fatal(format!(
                "unknown source '{unknown}' (known: {})",
                self.known_ids()
            )));
        }
        for id in cfg.exclude_sources.iter().filter(|id| !self.contains(id)) {
            sigma_common::warn!("ignoring exclusion of unknown source '{id}'");
        }

        let explicit = !cfg.sources.is_empty();
        let selected = self.entries.values().filter(|entry| {
            if explicit {
                cfg.sources.contains(&entry.id)
            } else {
                cfg.all_sources || (entry.default_when)(cfg)
            }
        });

        let mut enabled = Vec::new();
        for entry in selected {
            if cfg.exclude_sources.contains(&entry.id) {
                continue;
            }
            if entry.needs_key {
                if cfg.no_api_keys {
                    tracing::debug!(source = %entry.id, "skipped: api-key sources disabled");
                    continue;
                }
                if !explicit && cfg.api_key(&entry.id).is_none() {
                    tracing::debug!(source = %entry.id, "skipped: no api key configured");
                    continue;
                }
            }
            enabled.push((entry.factory)(ctx));
        }

        if enabled.is_empty() {
            return Err(PipelineError::fatal("no sources enabled after applying filters"));
        }
        Ok(enabled)
    }

    fn known_ids(&self) -> String {
        self.entries.keys().map(SourceId::as_str).collect::<Vec<_>>().join(", ")
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
