use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use newsdesk_browser::HeadlessBrowser;
use newsdesk_core::{AppError, AppResult, Article};
use newsdesk_parser::ParsedArticle;
use newsdesk_reliability::{CircuitBreakerManager, RetryConfig};
use tracing::warn;

const CIRCUIT_BREAKER_SERVICE: &str = "article_extraction";

#[derive(Debug, Clone, Copy)]
pub struct ExtractionConfig {
    pub total_timeout: Duration,
    pub enable_js_rendering: bool,
    pub browser_wait_time: Duration,
    pub browser_nav_timeout: Duration,
    pub max_tabs_per_browser: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        ExtractionConfig {
            total_timeout: Duration::from_secs(30),
            enable_js_rendering: true,
            browser_wait_time: Duration::from_secs(4),
            browser_nav_timeout: Duration::from_secs(30),
            max_tabs_per_browser: 10,
        }
    }
}

/// Outcome of extracting one URL in a batch. Every input URL yields exactly
/// one record, success or annotated failure.
#[derive(Debug, Clone)]
pub struct ExtractedRecord {
    pub input_url: String,
    pub article: Option<Article>,
    pub extraction_success: bool,
    pub extraction_method: Option<String>,
    pub google_news_url: Option<String>,
    pub final_redirected_url: Option<String>,
    pub error: Option<String>,
}

/// Downloads and parses articles: a standard HTTP path with a headless
/// browser fallback, and a batched Google-News path that shares one browser
/// per 10-URL chunk.
pub struct ArticleExtractor {
    http: reqwest::Client,
    breakers: Arc<CircuitBreakerManager>,
    retry_cfg: RetryConfig,
    config: ExtractionConfig,
}

impl ArticleExtractor {
    pub fn new(breakers: Arc<CircuitBreakerManager>, config: ExtractionConfig) -> Self {
        ArticleExtractor {
            http: reqwest::Client::builder()
                .user_agent(newsdesk_browser::DESKTOP_USER_AGENT)
                .timeout(config.total_timeout)
                .build()
                .expect("reqwest client builds with static config"),
            breakers,
            retry_cfg: RetryConfig::external_service(),
            config,
        }
    }

    /// Single-URL path: standard download+parse behind Retrier + circuit
    /// breaker, falling back to a rendered browser pass if JS rendering is
    /// enabled. Any ultimate failure yields `None`, matching the contract
    /// `ExtractMetadata(url) -> Article?`.
    pub async fn extract_metadata(&self, url: &str, cid: &str) -> Option<Article> {
        match self.extract_via_standard_path(url, cid).await {
            Ok(article) => return Some(article),
            Err(e) => {
                warn!(cid = %cid, url = %url, error = %e, "standard extraction path failed");
            }
        }

        if self.config.enable_js_rendering {
            match self.extract_via_browser(url, cid).await {
                Ok(article) => return Some(article),
                Err(e) => {
                    warn!(cid = %cid, url = %url, error = %e, "browser fallback extraction failed");
                }
            }
        }

        None
    }

    async fn extract_via_standard_path(&self, url: &str, cid: &str) -> AppResult<Article> {
        let http = self.http.clone();
        let config = self.config;
        let breakers = self.breakers.clone();
        let retry_cfg = self.retry_cfg;
        let url_owned = url.to_string();
        let cid_owned = cid.to_string();

        newsdesk_reliability::retry::run(
            move || {
                let http = http.clone();
                let breakers = breakers.clone();
                let url = url_owned.clone();
                let cid = cid_owned.clone();
                async move {
                    breakers
                        .call_with_breaker(CIRCUIT_BREAKER_SERVICE, Some(config.total_timeout), || {
                            let http = http.clone();
                            let url = url.clone();
                            async move { standard_path(&http, &url, config.total_timeout).await }
                        })
                        .await
                        .map_err(|e| {
                            warn!(cid = %cid, "article extraction attempt failed");
                            e
                        })
                }
            },
            &retry_cfg,
            cid,
        )
        .await
    }

    async fn extract_via_browser(&self, url: &str, cid: &str) -> AppResult<Article> {
        let url_owned = url.to_string();
        let wait = self.config.browser_wait_time;
        let nav_timeout = self.config.browser_nav_timeout;

        let (final_url, html) = tokio::task::spawn_blocking(move || -> AppResult<(String, String)> {
            let browser =
                HeadlessBrowser::launch().map_err(|e| AppError::ExtractionNetwork(e.to_string()))?;
            let tab = browser
                .new_tab()
                .map_err(|e| AppError::ExtractionNetwork(e.to_string()))?;
            tab.goto(&url_owned, nav_timeout)
                .map_err(|e| AppError::ExtractionNetwork(e.to_string()))?;
            std::thread::sleep(wait);
            let final_url = tab.final_url();
            let html = tab
                .content()
                .map_err(|e| AppError::ExtractionParsing(e.to_string()))?;
            Ok((final_url, html))
        })
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

        let parsed = newsdesk_parser::parse_article(&html);
        assemble_article(parsed, &final_url).map_err(|e| {
            warn!(cid = %cid, "browser fallback parse failed");
            e
        })
    }

    /// Batched Google-News path: regular URLs process sequentially via the
    /// single-URL path; `news.google.com` URLs are split into 10-URL chunks,
    /// each run through one shared headless browser.
    pub async fn extract_batch(&self, urls: &[String], cid: &str) -> Vec<ExtractedRecord> {
        let mut google_urls = Vec::new();
        let mut regular_urls = Vec::new();
        for u in urls {
            if is_google_host_url(u) {
                google_urls.push(u.clone());
            } else {
                regular_urls.push(u.clone());
            }
        }

        let mut out = Vec::with_capacity(urls.len());

        for url in &regular_urls {
            let record = match self.extract_metadata(url, cid).await {
                Some(article) => ExtractedRecord {
                    input_url: url.clone(),
                    article: Some(article),
                    extraction_success: true,
                    extraction_method: Some("standard".to_string()),
                    google_news_url: None,
                    final_redirected_url: None,
                    error: None,
                },
                None => ExtractedRecord {
                    input_url: url.clone(),
                    article: None,
                    extraction_success: false,
                    extraction_method: Some("standard".to_string()),
                    google_news_url: None,
                    final_redirected_url: None,
                    error: Some("extraction_failed".to_string()),
                },
            };
            out.push(record);
        }

        let chunks: Vec<&[String]> = google_urls.chunks(10).collect();
        for (i, chunk) in chunks.iter().enumerate() {
            let mut records = self.process_batch_with_single_browser(chunk, cid).await;
            out.append(&mut records);
            if i + 1 < chunks.len() {
                newsdesk_browser::jittered_sleep(5.0, 10.0).await;
            }
        }

        out
    }

    async fn process_batch_with_single_browser(&self, batch: &[String], cid: &str) -> Vec<ExtractedRecord> {
        let browser = match tokio::task::spawn_blocking(HeadlessBrowser::launch).await {
            Ok(Ok(b)) => Arc::new(b),
            _ => {
                return batch
                    .iter()
                    .map(|u| ExtractedRecord {
                        input_url: u.clone(),
                        article: None,
                        extraction_success: false,
                        extraction_method: Some("google_news_playwright".to_string()),
                        google_news_url: Some(u.clone()),
                        final_redirected_url: None,
                        error: Some("browser_launch_failed".to_string()),
                    })
                    .collect();
            }
        };

        let nav_timeout = self.config.browser_nav_timeout;
        let mut handles = Vec::with_capacity(batch.len());
        for (i, url) in batch.iter().enumerate() {
            let browser = browser.clone();
            let url = url.clone();
            handles.push(tokio::task::spawn_blocking(move || {
                if i > 0 {
                    std::thread::sleep(Duration::from_secs_f64(1.0 + (i as f64 % 2.0)));
                }
                resolve_one_tab(&browser, &url, nav_timeout)
            }));
        }

        let mut tab_results = Vec::with_capacity(handles.len());
        for h in handles {
            tab_results.push(h.await.unwrap_or(None));
        }

        let mut out = Vec::with_capacity(batch.len());
        for (url, tab_result) in batch.iter().zip(tab_results.into_iter()) {
            let record = match tab_result {
                Some(final_url) if !is_google_host_url(&final_url) => {
                    match self.extract_via_standard_path(&final_url, cid).await {
                        Ok(mut article) => {
                            article.source_url = final_url.clone();
                            article.url_hash = Article::url_hash_for(&final_url);
                            ExtractedRecord {
                                input_url: url.clone(),
                                article: Some(article),
                                extraction_success: true,
                                extraction_method: Some("google_news_playwright".to_string()),
                                google_news_url: Some(url.clone()),
                                final_redirected_url: Some(final_url),
                                error: None,
                            }
                        }
                        Err(e) => ExtractedRecord {
                            input_url: url.clone(),
                            article: None,
                            extraction_success: false,
                            extraction_method: Some("google_news_playwright".to_string()),
                            google_news_url: Some(url.clone()),
                            final_redirected_url: Some(final_url),
                            error: Some(e.to_string()),
                        },
                    }
                }
                Some(final_url) => ExtractedRecord {
                    input_url: url.clone(),
                    article: None,
                    extraction_success: false,
                    extraction_method: Some("google_news_playwright".to_string()),
                    google_news_url: Some(url.clone()),
                    final_redirected_url: Some(final_url),
                    error: Some("google_news_no_redirect".to_string()),
                },
                None => ExtractedRecord {
                    input_url: url.clone(),
                    article: None,
                    extraction_success: false,
                    extraction_method: Some("google_news_playwright".to_string()),
                    google_news_url: Some(url.clone()),
                    final_redirected_url: None,
                    error: Some("navigation_failed".to_string()),
                },
            };
            out.push(record);
        }
        out
    }
}

fn resolve_one_tab(browser: &HeadlessBrowser, url: &str, nav_timeout: Duration) -> Option<String> {
    let tab = browser.new_tab().ok()?;
    tab.set_user_agent(newsdesk_browser::DESKTOP_USER_AGENT).ok();
    tab.block_resource_extensions(newsdesk_browser::BLOCKED_RESOURCE_EXTENSIONS).ok();
    tab.goto(url, nav_timeout).ok()?;
    std::thread::sleep(Duration::from_secs(4));
    let mut final_url = tab.final_url();
    if final_url == url || is_google_host_url(&final_url) {
        tab.wait_network_idle(Duration::from_secs(15)).ok();
        std::thread::sleep(Duration::from_secs(5));
        final_url = tab.final_url();
    }
    Some(final_url)
}

fn is_google_host_url(url: &str) -> bool {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.contains("google.com")))
        .unwrap_or(false)
}

async fn standard_path(http: &reqwest::Client, url: &str, total_timeout: Duration) -> AppResult<Article> {
    let half = total_timeout / 2;
    let url_owned = url.to_string();
    let html = tokio::time::timeout(half, download(http, &url_owned))
        .await
        .map_err(|_| AppError::ExtractionTimeout(half))??;
    let parsed = tokio::time::timeout(half, parse_blocking(html))
        .await
        .map_err(|_| AppError::ExtractionTimeout(half))?;
    assemble_article(parsed, url)
}

async fn download(http: &reqwest::Client, url: &str) -> AppResult<String> {
    let resp = http
        .get(url)
        .send()
        .await
        .map_err(|e| AppError::ExtractionNetwork(e.to_string()))?;
    if !resp.status().is_success() {
        return Err(AppError::ExtractionNetwork(format!("status {}", resp.status())));
    }
    resp.text().await.map_err(|e| AppError::ExtractionNetwork(e.to_string()))
}

async fn parse_blocking(html: String) -> ParsedArticle {
    tokio::task::spawn_blocking(move || newsdesk_parser::parse_article(&html))
        .await
        .unwrap_or_default()
}

/// Builds an `Article` from parsed fields, per the assembly rules: empty
/// title fails with `ExtractionParsing`; short content (<=50 chars) is
/// dropped rather than failing the whole record.
fn assemble_article(parsed: ParsedArticle, source_url: &str) -> AppResult<Article> {
    let title = parsed
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::ExtractionParsing("missing title".to_string()))?;

    let content = parsed.content.filter(|c| c.len() > 50);
    let author = if parsed.authors.is_empty() {
        None
    } else {
        Some(parsed.authors.join(", "))
    };
    let publish_date = parsed.publish_date.and_then(|d| parse_date_best_effort(&d));
    let image_url = parsed.top_image.filter(|u| u.starts_with("http"));
    let content_hash = content.as_deref().map(Article::content_hash_for);

    Ok(Article {
        id: None,
        title,
        content,
        author,
        publish_date,
        source_url: source_url.to_string(),
        image_url,
        url_hash: Article::url_hash_for(source_url),
        content_hash,
        first_seen: None,
        last_seen: None,
        keywords_matched: Vec::new(),
        relevance_score: 0.0,
    })
}

fn parse_date_best_effort(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(DateTime::from_naive_utc_and_offset(dt, Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(DateTime::from_naive_utc_and_offset(date.and_hms_opt(0, 0, 0)?, Utc));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assembles_article_with_hashes_and_trims_short_content() {
        let parsed = ParsedArticle {
            title: Some(" Headline ".to_string()),
            content: Some("short".to_string()),
            authors: vec!["Jane".to_string(), "John".to_string()],
            publish_date: Some("2024-01-05T10:00:00Z".to_string()),
            top_image: Some("https://cdn.example.com/a.jpg".to_string()),
        };
        let article = assemble_article(parsed, "https://example.com/a").unwrap();
        assert_eq!(article.title, "Headline");
        assert_eq!(article.content, None);
        assert_eq!(article.author.as_deref(), Some("Jane, John"));
        assert_eq!(article.url_hash, Article::url_hash_for("https://example.com/a"));
        assert!(article.publish_date.is_some());
    }

    #[test]
    fn missing_title_fails_with_extraction_parsing() {
        let parsed = ParsedArticle::default();
        let err = assemble_article(parsed, "https://example.com/a").unwrap_err();
        assert!(matches!(err, AppError::ExtractionParsing(_)));
    }

    #[test]
    fn is_google_host_url_detects_news_domain() {
        assert!(is_google_host_url("https://news.google.com/rss/articles/abc"));
        assert!(!is_google_host_url("https://realpublisher.com/a"));
    }
}
