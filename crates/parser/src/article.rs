use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};

/// The fields the extraction pipeline needs out of a downloaded page,
/// independent of how the HTML was obtained (plain HTTP GET or a rendered
/// browser tab). Neither path knows about this struct's consumer; it is the
/// seam between "I have bytes of HTML" and "I have article metadata".
#[derive(Debug, Clone, Default)]
pub struct ParsedArticle {
    pub title: Option<String>,
    pub content: Option<String>,
    pub authors: Vec<String>,
    pub publish_date: Option<String>,
    pub top_image: Option<String>,
}

static META_PROPERTY: Lazy<Selector> = Lazy::new(|| Selector::parse("meta[property]").unwrap());
static META_NAME: Lazy<Selector> = Lazy::new(|| Selector::parse("meta[name]").unwrap());
static TITLE_TAG: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());
static ARTICLE_TAG: Lazy<Selector> = Lazy::new(|| Selector::parse("article").unwrap());
static MAIN_TAG: Lazy<Selector> = Lazy::new(|| Selector::parse("main").unwrap());
static PARAGRAPH: Lazy<Selector> = Lazy::new(|| Selector::parse("p").unwrap());
static TIME_TAG: Lazy<Selector> = Lazy::new(|| Selector::parse("time[datetime]").unwrap());
static REL_AUTHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("[rel='author']").unwrap());
static BYLINE_CLASS: Lazy<Selector> =
    Lazy::new(|| Selector::parse("[class*='byline'], [class*='author']").unwrap());
static JSON_LD: Lazy<Selector> =
    Lazy::new(|| Selector::parse("script[type='application/ld+json']").unwrap());
static DATE_PUBLISHED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""datePublished"\s*:\s*"([^"]+)""#).unwrap());
static AUTHOR_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""author"[^{]*\{[^}]*"name"\s*:\s*"([^"]+)""#).unwrap());

/// Builds `{title, content, author[], publish_date, top_image}` out of raw
/// HTML, mirroring the readability/metadata contract the original delegates
/// to a dedicated parsing library. Generalizes the same `scraper::Selector`
/// technique used for title/heading/meta/open-graph extraction elsewhere in
/// this workspace to a news-article field set instead of a form-detection one.
pub fn parse_article(html: &str) -> ParsedArticle {
    let document = Html::parse_document(html);

    let title = meta_content(&document, "og:title")
        .or_else(|| {
            document
                .select(&TITLE_TAG)
                .next()
                .map(|el| el.text().collect::<String>().trim().to_string())
        })
        .filter(|t| !t.is_empty());

    let content = extract_content(&document);
    let authors = extract_authors(&document);
    let publish_date = extract_publish_date(&document);
    let top_image = meta_content(&document, "og:image").or_else(|| meta_content(&document, "twitter:image"));

    ParsedArticle {
        title,
        content,
        authors,
        publish_date,
        top_image,
    }
}

fn meta_content(document: &Html, key: &str) -> Option<String> {
    for el in document.select(&META_PROPERTY) {
        if el.value().attr("property") == Some(key) {
            if let Some(c) = el.value().attr("content") {
                if !c.is_empty() {
                    return Some(c.to_string());
                }
            }
        }
    }
    for el in document.select(&META_NAME) {
        if el.value().attr("name") == Some(key) {
            if let Some(c) = el.value().attr("content") {
                if !c.is_empty() {
                    return Some(c.to_string());
                }
            }
        }
    }
    None
}

/// Largest-text-density heuristic: prefer an `<article>`/`<main>` container's
/// paragraph text; fall back to all `<p>` text on the page. Picks whichever
/// candidate has more text, since some templates wrap the article body in
/// neither landmark.
fn extract_content(document: &Html) -> Option<String> {
    let landmark_text = document
        .select(&ARTICLE_TAG)
        .chain(document.select(&MAIN_TAG))
        .map(|el| {
            el.select(&PARAGRAPH)
                .map(|p| p.text().collect::<String>())
                .collect::<Vec<_>>()
                .join("\n\n")
        })
        .max_by_key(|s| s.len());

    let page_text = document
        .select(&PARAGRAPH)
        .map(|p| p.text().collect::<String>())
        .collect::<Vec<_>>()
        .join("\n\n");

    let best = match landmark_text {
        Some(t) if t.len() > page_text.len() => t,
        _ => page_text,
    };
    let normalized = best.split_whitespace().collect::<Vec<_>>().join(" ");
    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}

fn extract_authors(document: &Html) -> Vec<String> {
    let mut authors: Vec<String> = Vec::new();

    if let Some(name) = meta_content(document, "author") {
        authors.push(name);
    }
    if let Some(name) = meta_content(document, "article:author") {
        authors.push(name);
    }
    for el in document.select(&REL_AUTHOR) {
        let text = el.text().collect::<String>().trim().to_string();
        if !text.is_empty() {
            authors.push(text);
        }
    }
    if authors.is_empty() {
        for el in document.select(&BYLINE_CLASS) {
            let text = el.text().collect::<String>().trim().to_string();
            if !text.is_empty() && text.len() < 200 {
                authors.push(text);
                break;
            }
        }
    }
    if authors.is_empty() {
        for script in document.select(&JSON_LD) {
            let raw = script.text().collect::<String>();
            if let Some(caps) = AUTHOR_NAME_RE.captures(&raw) {
                authors.push(caps[1].to_string());
                break;
            }
        }
    }

    let mut seen = std::collections::HashSet::new();
    authors.retain(|a| seen.insert(a.clone()));
    authors
}

fn extract_publish_date(document: &Html) -> Option<String> {
    if let Some(d) = meta_content(document, "article:published_time") {
        return Some(d);
    }
    if let Some(d) = meta_content(document, "og:article:published_time") {
        return Some(d);
    }
    if let Some(el) = document.select(&TIME_TAG).next() {
        if let Some(d) = el.value().attr("datetime") {
            return Some(d.to_string());
        }
    }
    for script in document.select(&JSON_LD) {
        let raw = script.text().collect::<String>();
        if let Some(caps) = DATE_PUBLISHED_RE.captures(&raw) {
            return Some(caps[1].to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_title_content_author_date_image() {
        let html = r#"
            <html><head>
                <title>Fallback Title</title>
                <meta property="og:title" content="Real Title"/>
                <meta property="og:image" content="https://cdn.example.com/a.jpg"/>
                <meta property="article:published_time" content="2024-01-05T10:00:00Z"/>
                <meta name="author" content="Jane Reporter"/>
            </head><body>
                <article><p>First paragraph of real substance here.</p><p>Second paragraph continues the story.</p></article>
            </body></html>
        "#;
        let parsed = parse_article(html);
        assert_eq!(parsed.title.as_deref(), Some("Real Title"));
        assert_eq!(parsed.authors, vec!["Jane Reporter".to_string()]);
        assert_eq!(parsed.publish_date.as_deref(), Some("2024-01-05T10:00:00Z"));
        assert_eq!(parsed.top_image.as_deref(), Some("https://cdn.example.com/a.jpg"));
        assert!(parsed.content.unwrap().contains("First paragraph"));
    }

    #[test]
    fn falls_back_to_title_tag_when_no_og_title() {
        let html = "<html><head><title>Only Title</title></head><body><p>some body text</p></body></html>";
        let parsed = parse_article(html);
        assert_eq!(parsed.title.as_deref(), Some("Only Title"));
    }

    #[test]
    fn empty_document_yields_no_title_and_no_content() {
        let parsed = parse_article("<html><head></head><body></body></html>");
        assert!(parsed.title.is_none());
        assert!(parsed.content.is_none());
    }
}
