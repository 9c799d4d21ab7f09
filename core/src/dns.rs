//! # DNS Lookup Seam
//!
//! The resolver stage talks to DNS only through [`DnsLookup`], so tests can
//! swap in an in-memory table. [`HickoryLookup`] is the production backend.

use std::collections::BTreeSet;
use std::net::IpAddr;

use async_trait::async_trait;
use sigma_common::error::ErrorKind;
use thiserror::Error;

mod hickory;

pub use hickory::HickoryLookup;

/// Addresses a name resolved to, plus the first CNAME target in the chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DnsAnswer {
    pub addresses: BTreeSet<IpAddr>,
    pub cname: Option<String>,
}

impl DnsAnswer {
    pub fn new(addresses: impl IntoIterator<Item = IpAddr>) -> Self {
        Self {
            addresses: addresses.into_iter().collect(),
            cname: None,
        }
    }

    pub fn with_cname(mut self, cname: impl Into<String>) -> Self {
        self.cname = Some(cname.into());
        self
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DnsError {
    #[error("name does not exist")]
    Nxdomain,
    #[error("no address records")]
    NoRecords,
    #[error("query timed out")]
    Timeout,
    #[error("lookup failed: {0}")]
    Failed(String),
}

impl DnsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DnsError::Nxdomain => ErrorKind::Nxdomain,
            DnsError::Timeout => ErrorKind::Timeout,
            DnsError::NoRecords | DnsError::Failed(_) => ErrorKind::ResolutionError,
        }
    }

    /// A definitive negative answer will not change on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DnsError::Timeout | DnsError::Failed(_))
    }
}

#[async_trait]
pub trait DnsLookup: Send + Sync {
    /// One query for A/AAAA records of `hostname`. No retries.
    async fn lookup(&self, hostname: &str) -> Result<DnsAnswer, DnsError>;
}
