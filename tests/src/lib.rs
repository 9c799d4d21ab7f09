//! End-to-end pipeline scenarios against in-memory sources, DNS and HTTP.

#[cfg(test)]
mod fakes;

#[cfg(test)]
mod pipeline;
