//! Technology tags from response headers and body markers.
//!
//! Purely heuristic. Nothing here fails: an unknown header or an odd body
//! simply yields fewer tags.

use std::collections::BTreeSet;

use crate::html;

/// Headers whose mere presence identifies a platform.
const HEADER_MARKERS: &[(&str, &str)] = &[
    ("cf-ray", "cloudflare"),
    ("x-amz-cf-id", "cloudfront"),
    ("x-vercel-id", "vercel"),
    ("x-drupal-cache", "drupal"),
    ("x-shopify-stage", "shopify"),
    ("x-aspnet-version", "asp.net"),
    ("x-github-request-id", "github-pages"),
    ("x-served-by", "fastly"),
];

const COOKIE_MARKERS: &[(&str, &str)] = &[
    ("phpsessid", "php"),
    ("jsessionid", "java"),
    ("laravel_session", "laravel"),
    ("asp.net_sessionid", "asp.net"),
    ("csrftoken", "django"),
    ("_shopify", "shopify"),
    ("wordpress_", "wordpress"),
];

const BODY_MARKERS: &[(&str, &str)] = &[
    ("wp-content/", "wordpress"),
    ("/_next/static", "next.js"),
    ("window.__nuxt__", "nuxt"),
    ("ng-version=", "angular"),
    ("data-reactroot", "react"),
    ("drupal-settings-json", "drupal"),
    ("content=\"joomla", "joomla"),
    ("/static/js/main.", "react"),
];

/// Maps a `Server`/`X-Powered-By` product token to a tag.
fn product_tag(value: &str) -> Option<String> {
    let product = value
        .split(['/', ' ', '(', ';'])
        .next()?
        .trim()
        .to_ascii_lowercase();
    let tag = match product.as_str() {
        "" => return None,
        "microsoft-iis" => "iis".to_string(),
        "awselb" => "aws-elb".to_string(),
        "gws" => "google".to_string(),
        other => other.to_string(),
    };
    Some(tag)
}

pub fn fingerprint(headers: &[(String, String)], body: &str) -> BTreeSet<String> {
    let mut tags: BTreeSet<String> = BTreeSet::new();

    for (name, value) in headers {
        let name = name.to_ascii_lowercase();
        match name.as_str() {
            "server" | "x-powered-by" => {
                for part in value.split(',') {
                    if let Some(tag) = product_tag(part) {
                        tags.insert(tag);
                    }
                }
            }
            "set-cookie" => {
                let cookie = value.to_ascii_lowercase();
                for (marker, tag) in COOKIE_MARKERS {
                    if cookie.starts_with(marker) {
                        tags.insert(tag.to_string());
                    }
                }
            }
            _ => {}
        }
        for (marker, tag) in HEADER_MARKERS {
            if name == *marker {
                tags.insert(tag.to_string());
            }
        }
    }

    let lowered = body.to_ascii_lowercase();
    for (marker, tag) in BODY_MARKERS {
        if lowered.contains(marker) {
            tags.insert(tag.to_string());
        }
    }

    if let Some(generator) = html::extract_generator(body).and_then(|g| product_tag(&g)) {
        tags.insert(generator);
    }

    tags
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

    fn h(name: &str, value: &str) -> (String, String) {
        (name.to_string(), value.to_string())
    }

    #[test]
    fn headers_and_cookies() {
        let headers = vec![
            h("Server", "nginx/1.25.3"),
            h("X-Powered-By", "PHP/8.2.1"),
            h("Set-Cookie", "PHPSESSID=abc; path=/"),
            h("CF-RAY", "8a1b2c3d4e5f-AMS"),
        ];
        let tags = fingerprint(&headers, "");
        let expected: BTreeSet<String> = ["cloudflare", "nginx", "php"].iter().map(|s| s.to_string()).collect();
        assert_eq!(tags, expected);
    }

    #[test]
    fn iis_is_renamed() {
        let tags = fingerprint(&[h("server", "Microsoft-IIS/10.0")], "");
        assert!(tags.contains("iis"));
    }

    #[test]
    fn body_markers_and_generator() {
        let body = r#"<html><head><meta name="generator" content="WordPress 6.4.2" />
            <link href="/wp-content/themes/x.css"></head></html>"#;
        let tags = fingerprint(&[], body);
        assert_eq!(tags.len(), 1);
        assert!(tags.contains("wordpress"));
    }

    #[test]
    fn generator_with_reordered_attributes() {
        let tags = fingerprint(&[], r#"<meta content="Ghost 5.2" name="generator">"#);
        assert!(tags.contains("ghost"));
    }

    #[test]
    fn nothing_recognizable_is_empty() {
        assert!(fingerprint(&[h("content-type", "text/html")], "<p>hello</p>").is_empty());
    }
}
