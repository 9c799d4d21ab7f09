use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use hickory_resolver::TokioResolver;
use hickory_resolver::config::{NameServerConfig, ResolverConfig};
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::proto::rr::RData;
use hickory_resolver::proto::xfer::Protocol;
use sigma_common::config::Config;

use super::{DnsAnswer, DnsError, DnsLookup};

/// Slack given to hickory's own timer so ours fires first and is classified.
const INNER_TIMEOUT_SLACK: Duration = Duration::from_millis(500);

pub struct HickoryLookup {
    resolver: TokioResolver,
    query_timeout: Duration,
}

impl HickoryLookup {
    /// System resolver configuration, or `cfg.nameservers` when set. Falls back
    /// to Cloudflare and Google when the system configuration cannot be read.
    pub fn from_config(cfg: &Config) -> Self {
        let query_timeout = cfg.dns_timeout();

        let mut builder = if cfg.nameservers.is_empty() {
            match TokioResolver::builder(TokioConnectionProvider::default()) {
                Ok(builder) => builder,
                Err(e) => {
                    tracing::warn!("system resolver configuration unavailable ({e}), using cloudflare and google");
                    TokioResolver::builder_with_config(public_fallback(), TokioConnectionProvider::default())
                }
            }
        } else {
            let mut resolver_config = ResolverConfig::new();
            for ip in &cfg.nameservers {
                resolver_config.add_name_server(NameServerConfig::new(SocketAddr::new(*ip, 53), Protocol::Udp));
            }
            TokioResolver::builder_with_config(resolver_config, TokioConnectionProvider::default())
        };

        let opts = builder.options_mut();
        opts.timeout = query_timeout + INNER_TIMEOUT_SLACK;
        opts.attempts = 1;

        Self {
            resolver: builder.build(),
            query_timeout,
        }
    }
}

/// Cloudflare first, then Google.
fn public_fallback() -> ResolverConfig {
    let mut config = ResolverConfig::cloudflare();
    for server in ResolverConfig::google().name_servers() {
        config.add_name_server(server.clone());
    }
    config
}

#[async_trait]
impl DnsLookup for HickoryLookup {
    async fn lookup(&self, hostname: &str) -> Result<DnsAnswer, DnsError> {
        let response = match tokio::time::timeout(self.query_timeout, self.resolver.lookup_ip(hostname)).await {
            Err(_elapsed) => return Err(DnsError::Timeout),
            Ok(Err(e)) if e.is_nx_domain() => return Err(DnsError::Nxdomain),
            Ok(Err(e)) if e.is_no_records_found() => return Err(DnsError::NoRecords),
            Ok(Err(e)) => return Err(DnsError::Failed(e.to_string())),
            Ok(Ok(response)) => response,
        };

        let addresses: std::collections::BTreeSet<_> = response.iter().collect();
        if addresses.is_empty() {
            return Err(DnsError::NoRecords);
        }

        let cname = response.as_lookup().iter().find_map(|rdata| match rdata {
            RData::CNAME(name) => Some(name.to_string().trim_end_matches('.').to_ascii_lowercase()),
            _ => None,
        });

        Ok(DnsAnswer { addresses, cname })
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
