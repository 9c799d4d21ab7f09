mod cancellation;
mod failures;
mod registry;
mod scope;
mod sinks;
mod stages;
mod wildcard;
