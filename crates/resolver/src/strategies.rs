use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

pub fn is_google_host(host: &str) -> bool {
    host.eq_ignore_ascii_case("google.com")
        || host.ends_with(".google.com")
        || host.eq_ignore_ascii_case("news.google.com")
}

fn is_plausible_publisher_url(candidate: &str) -> bool {
    match Url::parse(candidate) {
        Ok(u) => {
            let scheme_ok = u.scheme() == "http" || u.scheme() == "https";
            let host_ok = u.host_str().map(|h| !is_google_host(h)).unwrap_or(false);
            scheme_ok && host_ok
        }
        Err(_) => false,
    }
}

/// Strategy 1: a `url=` query parameter, or the path form
/// `/articles/...url=...&`, pointing straight at the publisher URL. No
/// network call.
pub fn query_param_extraction(google_url: &str) -> Option<String> {
    if let Ok(parsed) = Url::parse(google_url) {
        for (key, value) in parsed.query_pairs() {
            if key == "url" && value.starts_with("http") && is_plausible_publisher_url(&value) {
                return Some(value.to_string());
            }
        }
    }

    static PATH_URL_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"[?&]url=(https?://[^&\s]+)").unwrap());
    if let Some(caps) = PATH_URL_RE.captures(google_url) {
        if let Ok(decoded) = urlencoding::decode(&caps[1]) {
            if is_plausible_publisher_url(&decoded) {
                return Some(decoded.to_string());
            }
        }
    }

    None
}

/// Strategy 3: decode the `/articles/<id>` segment as URL-safe base64 (with
/// padding repaired), URL-decode the result, and pull out an `http(s)://`
/// substring whose host is not Google.
pub fn decode_article_id(google_url: &str) -> Option<String> {
    let parsed = Url::parse(google_url).ok()?;
    let segments: Vec<&str> = parsed.path_segments()?.collect();
    let idx = segments.iter().position(|s| *s == "articles")?;
    let encoded = segments.get(idx + 1)?;

    let padded = repair_padding(encoded);
    let decoded_bytes = URL_SAFE_NO_PAD
        .decode(encoded)
        .or_else(|_| base64::engine::general_purpose::URL_SAFE.decode(&padded))
        .ok()?;
    let decoded_text = String::from_utf8_lossy(&decoded_bytes);

    let unescaped = urlencoding::decode(&decoded_text)
        .map(|c| c.to_string())
        .unwrap_or_else(|_| decoded_text.to_string());

    extract_http_substring(&unescaped).filter(|u| is_plausible_publisher_url(u))
}

fn repair_padding(s: &str) -> String {
    let rem = s.len() % 4;
    if rem == 0 {
        s.to_string()
    } else {
        format!("{}{}", s, "=".repeat(4 - rem))
    }
}

static HTTP_SUBSTRING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"https?://[^\s"'<>]+"#).unwrap());

fn extract_http_substring(text: &str) -> Option<String> {
    HTTP_SUBSTRING_RE
        .find(text)
        .map(|m| m.as_str().trim_end_matches(['.', ',', ')']).to_string())
}

const ASSET_EXTENSIONS: &[&str] = &[
    ".png", ".jpg", ".jpeg", ".gif", ".svg", ".css", ".woff", ".woff2", ".ttf", ".ico", ".js",
];

/// Strategy 4 (browser-rendered HTML scrape): scan for `href=`, `url=`,
/// `data-url=`, and bare-quoted URLs; filter out JS/CSS/image asset links.
pub fn scan_html_for_external_urls(html: &str) -> Vec<String> {
    static ATTR_URL_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r#"(?:href|url|data-url)\s*=\s*["']([^"']+)["']"#).unwrap()
    });
    static BARE_URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#""(https?://[^"]+)""#).unwrap());

    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();

    for caps in ATTR_URL_RE.captures_iter(html).chain(BARE_URL_RE.captures_iter(html)) {
        let candidate = &caps[1];
        if !candidate.starts_with("http") {
            continue;
        }
        if ASSET_EXTENSIONS.iter().any(|ext| candidate.ends_with(ext)) {
            continue;
        }
        if !is_plausible_publisher_url(candidate) {
            continue;
        }
        if seen.insert(candidate.to_string()) {
            out.push(candidate.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy1_extracts_url_param_without_network_call() {
        let google_url = "https://news.google.com/x?url=https%3A//ex.com/a";
        assert_eq!(
            query_param_extraction(google_url).as_deref(),
            Some("https://ex.com/a")
        );
    }

    #[test]
    fn strategy1_returns_none_without_url_param() {
        let google_url = "https://news.google.com/rss/articles/CBMixyZ";
        assert_eq!(query_param_extraction(google_url), None);
    }

    #[test]
    fn strategy3_decodes_base64_article_id() {
        let inner = "https://example.com/story/1";
        let encoded = URL_SAFE_NO_PAD.encode(inner.as_bytes());
        let google_url = format!("https://news.google.com/rss/articles/{encoded}");
        assert_eq!(decode_article_id(&google_url).as_deref(), Some(inner));
    }

    #[test]
    fn strategy4_filters_asset_links_and_keeps_publisher_links() {
        let html = r#"
            <html><body>
                <link rel="stylesheet" href="https://cdn.example.com/a.css">
                <img src="https://cdn.example.com/b.png">
                <a href="https://realpublisher.com/article/42">read</a>
            </body></html>
        "#;
        let found = scan_html_for_external_urls(html);
        assert_eq!(found, vec!["https://realpublisher.com/article/42".to_string()]);
    }

    #[test]
    fn is_google_host_matches_news_subdomain() {
        assert!(is_google_host("news.google.com"));
        assert!(!is_google_host("realpublisher.com"));
    }
}
