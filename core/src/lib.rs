//! # Discovery and Verification Pipeline
//!
//! The engine behind `sigma discover` and `sigma scan`.
//!
//! * **[`limiter`]**: per-source token buckets plus a global in-flight ceiling.
//! * **[`source`]**: the [`source::SourceAdapter`] port every data source implements.
//! * **[`dedup`]**: merges candidates from all sources, keeping provenance.
//! * **[`resolver`]**: DNS resolution with wildcard detection.
//! * **[`prober`]**: HTTP(S) probing of resolved hosts.
//! * **[`sink`]**: where records go as they are produced.
//! * **[`pipeline`]**: wires the stages together and owns a run's lifecycle.
//!
//! Network access sits behind two traits, [`dns::DnsLookup`] and
//! [`http::HttpFetcher`], so every stage can run against in-memory fakes.

pub mod dedup;
pub mod dns;
pub mod http;
pub mod limiter;
pub mod pipeline;
pub mod prober;
pub mod resolver;
pub mod retry;
pub mod sink;
pub mod source;
