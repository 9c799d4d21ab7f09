pub mod candidate;
pub mod host;
pub mod probe;
pub mod run;
pub mod stats;
pub mod target;
