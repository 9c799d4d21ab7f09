use scraper::{Html, Selector};

const MAX_TITLE_CHARS: usize = 256;

/// Best-effort `<title>` extraction: entities decoded, whitespace collapsed.
pub fn extract_title(body: &str) -> Option<String> {
    let document = Html::parse_document(body);
    let selector = Selector::parse("title").ok()?;
    let raw: String = document.select(&selector).next()?.text().collect();
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return None;
    }
    Some(collapsed.chars().take(MAX_TITLE_CHARS).collect())
}

/// Content of `<meta name="generator">`, if any.
pub fn extract_generator(body: &str) -> Option<String> {
    let document = Html::parse_document(body);
    let selector = Selector::parse("meta[name]").ok()?;
    document
        .select(&selector)
        .filter(|meta| {
            meta.value()
                .attr("name")
                .is_some_and(|name| name.eq_ignore_ascii_case("generator"))
        })
        .filter_map(|meta| meta.value().attr("content"))
        .map(str::trim)
        .find(|content| !content.is_empty())
        .map(str::to_string)
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
    fn extracts_and_cleans_title() {
        let body = "<html><head><TITLE lang=\"en\">\n  Tom &amp; Jerry\n  Admin </TITLE></head></html>";
        assert_eq!(extract_title(body).as_deref(), Some("Tom & Jerry Admin"));
    }

    #[test]
    fn numeric_and_named_entities_are_decoded() {
        let body = "<title>Acme &#8211; Login &mdash; Portal &#x2F; x</title>";
        assert_eq!(extract_title(body).as_deref(), Some("Acme \u{2013} Login \u{2014} Portal / x"));
    }

    #[test]
    fn missing_or_blank_title_is_none() {
        assert_eq!(extract_title("<html><body>hi</body></html>"), None);
        assert_eq!(extract_title("<title>   </title>"), None);
        assert_eq!(extract_title(""), None);
    }

    #[test]
    fn title_inside_svg_is_not_the_page_title() {
        let body = "<html><head><title>Real</title></head><body><svg><title>icon</title></svg></body></html>";
        assert_eq!(extract_title(body).as_deref(), Some("Real"));
    }

    #[test]
    fn generator_meta_is_read_from_attributes() {
        let body = r#"<head><meta content="Hugo 0.120.4" name="Generator"><meta name="generator" content=""></head>"#;
        assert_eq!(extract_generator(body).as_deref(), Some("Hugo 0.120.4"));
        assert_eq!(extract_generator("<p>plain</p>"), None);
    }

    #[test]
    fn long_titles_are_truncated() {
        let body = format!("<title>{}</title>", "é".repeat(400));
        assert_eq!(extract_title(&body).unwrap().chars().count(), MAX_TITLE_CHARS);
    }
}
