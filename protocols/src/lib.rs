//! Parsers for the formats the pipeline reads from the outside world.
//!
//! Source responses ([`crtsh`], [`hackertarget`], [`otx`], [`virustotal`]) are
//! reduced to raw hostname lists; scoping and normalization happen later in the
//! pipeline. [`html`] and [`fingerprint`] turn probe responses into a title and
//! technology tags.

pub mod crtsh;
pub mod fingerprint;
pub mod hackertarget;
pub mod html;
pub mod otx;
pub mod virustotal;

/// Drops a leading wildcard label and surrounding whitespace from a reported name.
pub fn clean_reported_name(name: &str) -> Option<&str> {
    let name = name.trim();
    let name = name.strip_prefix("*.").unwrap_or(name);
    let name = name.trim_start_matches('.');
    if name.is_empty() || name.contains('*') || name.contains(' ') {
        return None;
    }
    Some(name)
}
