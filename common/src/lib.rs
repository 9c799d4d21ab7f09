//! Shared building blocks for the `sigma` workspace.
//!
//! * **[`models`]**: the records a pipeline run produces and hands between stages.
//! * **[`config`]**: run configuration and its layering rules.
//! * **[`error`]**: the error taxonomy shared by every stage.
//! * **[`utils`]**: hostname normalization and the retry/backoff policy.

pub mod config;
pub mod error;
pub mod macros;
pub mod models;
pub mod utils;

#[doc(hidden)]
pub use tracing as __tracing;
