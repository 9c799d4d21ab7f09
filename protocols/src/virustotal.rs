use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct SubdomainPage {
    #[serde(default)]
    data: Vec<DomainObject>,
    #[serde(default)]
    meta: Option<PageMeta>,
}

#[derive(Debug, Deserialize)]
struct DomainObject {
    id: String,
}

#[derive(Debug, Deserialize)]
struct PageMeta {
    cursor: Option<String>,
}

/// One page of the v3 `domains/{domain}/subdomains` relationship.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Page {
    pub names: Vec<String>,
    /// Cursor for the next page; `None` on the last one.
    pub cursor: Option<String>,
}

pub fn parse_subdomain_page(body: &str) -> anyhow::Result<Page> {
    let page: SubdomainPage =
        serde_json::from_str(body).context("Failed to parse VirusTotal subdomain page")?;

    let names = page
        .data
        .iter()
        .filter_map(|object| crate::clean_reported_name(&object.id))
        .map(str::to_string)
        .collect();

    let cursor = page
        .meta
        .and_then(|meta| meta.cursor)
        .filter(|cursor| !cursor.is_empty());

    Ok(Page { names, cursor })
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_ids_and_cursor() {
        let body = r#"{
            "data": [{"id": "a.example.com", "type": "domain"}, {"id": "b.example.com", "type": "domain"}],
            "meta": {"count": 40, "cursor": "abc=="},
            "links": {"self": "..."}
        }"#;
        let page = parse_subdomain_page(body).unwrap();
        assert_eq!(page.names, vec!["a.example.com", "b.example.com"]);
        assert_eq!(page.cursor.as_deref(), Some("abc=="));
    }

    #[test]
    fn last_page_has_no_cursor() {
        let page = parse_subdomain_page(r#"{"data": [], "meta": {"cursor": ""}}"#).unwrap();
        assert_eq!(page, Page::default());
    }
}
