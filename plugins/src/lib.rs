//! Data sources for the discovery stage.
//!
//! Each module under [`sources`] implements
//! [`SourceAdapter`](sigma_core::source::SourceAdapter) for one provider. The
//! [`registry`] maps source ids to constructors and decides which ones a run
//! uses.

pub mod registry;
pub mod sources;

pub use registry::SourceRegistry;
