//! # Hostname Normalization
//!
//! Every hostname that enters the pipeline is reduced to one canonical form
//! before it is compared with anything: surrounding whitespace removed, a single
//! trailing dot stripped, then IDNA-mapped (which also lowercases). Two names that
//! differ only in case, trailing dot or Unicode/punycode spelling normalize to
//! the same string.

use thiserror::Error;

const MAX_NAME_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostnameError {
    #[error("hostname is empty")]
    Empty,
    #[error("hostname '{0}' contains a wildcard")]
    Wildcard(String),
    #[error("hostname '{0}' is not a valid IDNA name")]
    Idna(String),
    #[error("hostname '{0}' is longer than {MAX_NAME_LEN} bytes")]
    TooLong(String),
    #[error("hostname '{0}' has an empty or oversized label")]
    BadLabel(String),
}

/// Returns the canonical form of `raw`.
pub fn normalize(raw: &str) -> Result<String, HostnameError> {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_suffix('.').unwrap_or(trimmed);
    if trimmed.is_empty() {
        return Err(HostnameError::Empty);
    }
    if trimmed.contains('*') {
        return Err(HostnameError::Wildcard(trimmed.to_string()));
    }

    let ascii = idna::domain_to_ascii(trimmed).map_err(|_| HostnameError::Idna(trimmed.to_string()))?;

    if ascii.len() > MAX_NAME_LEN {
        return Err(HostnameError::TooLong(ascii));
    }
    if ascii
        .split('.')
        .any(|label| label.is_empty() || label.len() > MAX_LABEL_LEN)
    {
        return Err(HostnameError::BadLabel(ascii));
    }

    Ok(ascii)
}

/// Whether the already-normalized `host` equals `root` or sits beneath it.
pub fn is_within(host: &str, root: &str) -> bool {
    match host.strip_suffix(root) {
        Some("") => true,
        Some(prefix) => prefix.ends_with('.'),
        None => false,
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
