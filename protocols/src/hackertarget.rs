use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HostSearchError {
    #[error("quota exhausted: {0}")]
    QuotaExceeded(String),
    #[error("api error: {0}")]
    Api(String),
}

/// Parses the `host,ip` CSV returned by the HackerTarget host search.
///
/// The API answers errors with a plain-text line and a 200 status.
pub fn parse_hostsearch(body: &str) -> Result<Vec<String>, HostSearchError> {
    let trimmed = body.trim();
    let lower = trimmed.to_ascii_lowercase();

    if lower.starts_with("api count exceeded") {
        return Err(HostSearchError::QuotaExceeded(trimmed.to_string()));
    }
    if lower.starts_with("error") {
        if lower.contains("no records found") {
            return Ok(Vec::new());
        }
        return Err(HostSearchError::Api(trimmed.to_string()));
    }

    Ok(trimmed
        .lines()
        .filter_map(|line| line.split(',').next())
        .filter_map(crate::clean_reported_name)
        .map(str::to_string)
        .collect())
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
