use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use newsdesk_core::{AppError, AppResult};
use newsdesk_reliability::{CircuitBreakerManager, RetryConfig};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::query::build_advanced;

const SERVICE_NAME: &str = "google_news_search";

/// One call to `Search`: either a `period` recency token or an explicit
/// `[start_date, end_date]` range, never both (period wins if both are set).
#[derive(Debug, Clone, Default)]
pub struct SearchParams {
    pub keywords: Vec<String>,
    pub excludes: Vec<String>,
    pub max_results: u32,
    pub language: String,
    pub country: String,
    pub period: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

static ITEM_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<item>(.*?)</item>").unwrap());
static LINK_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<link>\s*(.*?)\s*</link>").unwrap());

/// Google News RSS search transport, the same wire contract the `gnews`
/// Python package scrapes over `news.google.com/rss/search`.
pub struct SearchClient {
    http: reqwest::Client,
    breakers: Arc<CircuitBreakerManager>,
    retry_cfg: RetryConfig,
}

impl SearchClient {
    pub fn new(breakers: Arc<CircuitBreakerManager>) -> Self {
        SearchClient {
            http: reqwest::Client::builder()
                .user_agent("Mozilla/5.0 (compatible; newsdesk-crawler/1.0)")
                .timeout(Duration::from_secs(15))
                .build()
                .expect("reqwest client builds with static config"),
            breakers,
            retry_cfg: RetryConfig::external_service(),
        }
    }

    /// Builds the query, calls Google News, and returns the raw redirect URLs
    /// found in the feed. Wrapped in the `google_news_search` circuit breaker
    /// and an `EXTERNAL_SERVICE` retry policy.
    pub async fn search(&self, params: &SearchParams, cid: &str) -> AppResult<Vec<String>> {
        let query = build_advanced(&params.keywords, &params.excludes);
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let url = build_rss_url(&query, params);
        let http = self.http.clone();
        let breakers = self.breakers.clone();
        let retry_cfg = self.retry_cfg;
        let cid_owned = cid.to_string();

        newsdesk_reliability::retry::run(
            move || {
                let http = http.clone();
                let breakers = breakers.clone();
                let url = url.clone();
                let cid = cid_owned.clone();
                async move {
                    breakers
                        .call_with_breaker(SERVICE_NAME, Some(Duration::from_secs(15)), || {
                            let http = http.clone();
                            let url = url.clone();
                            async move { fetch_and_parse(&http, &url).await }
                        })
                        .await
                        .map_err(|e| {
                            debug!(cid = %cid, "google news search attempt failed");
                            e
                        })
                }
            },
            &retry_cfg,
            cid,
        )
        .await
    }

    /// Splits `[start, end]` into single-day buckets, searches each with
    /// `period` unset, and aggregates unique (string-equal) URLs in insertion
    /// order. A single bucket failure logs a warning and the sweep continues.
    pub async fn search_daily_sliding_window(
        &self,
        base: &SearchParams,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        max_total: u32,
        cid: &str,
    ) -> AppResult<Vec<String>> {
        if end < start {
            warn!(cid = %cid, "daily sliding window called with end < start");
            return Ok(Vec::new());
        }

        let day_count = ((end - start).num_seconds() / 86_400) as u32 + 1;
        let per_bucket_cap = (max_total / day_count.max(1)).max(1);

        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();

        for i in 0..day_count {
            let bucket_start = start + ChronoDuration::days(i as i64);
            let bucket_end = bucket_start + ChronoDuration::days(1) - ChronoDuration::seconds(1);

            let mut bucket_params = base.clone();
            bucket_params.period = None;
            bucket_params.start_date = Some(bucket_start);
            bucket_params.end_date = Some(bucket_end);
            bucket_params.max_results = per_bucket_cap;

            match self.search(&bucket_params, cid).await {
                Ok(urls) => {
                    for u in urls {
                        if seen.insert(u.clone()) {
                            out.push(u);
                        }
                    }
                }
                Err(e) => {
                    warn!(cid = %cid, bucket = i, error = %e, "daily sliding window bucket failed, continuing");
                }
            }
        }

        Ok(out)
    }
}

fn build_rss_url(query: &str, params: &SearchParams) -> String {
    let ceid = format!("{}-{}", params.country, params.country);
    let mut url = format!(
        "https://news.google.com/rss/search?q={}&hl={}&gl={}&ceid={}",
        urlencoding_encode(query),
        params.language,
        params.country,
        ceid
    );

    if let Some(period) = &params.period {
        if params.start_date.is_some() || params.end_date.is_some() {
            warn!(period = %period, "both period and date range supplied, period wins");
        }
        url.push_str(&format!("&when={period}"));
    } else if let (Some(start), Some(end)) = (params.start_date, params.end_date) {
        url.push_str(&format!(
            "&after={}&before={}",
            start.format("%Y-%m-%d"),
            end.format("%Y-%m-%d")
        ));
    }

    url
}

fn urlencoding_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

async fn fetch_and_parse(http: &reqwest::Client, url: &str) -> AppResult<Vec<String>> {
    let resp = http
        .get(url)
        .send()
        .await
        .map_err(|e| AppError::GoogleNewsUnavailable(e.to_string()))?;

    if !resp.status().is_success() {
        return Err(AppError::GoogleNewsUnavailable(format!(
            "status {}",
            resp.status()
        )));
    }

    let body = resp
        .text()
        .await
        .map_err(|e| AppError::GoogleNewsUnavailable(e.to_string()))?;

    Ok(parse_feed_links(&body))
}

fn parse_feed_links(body: &str) -> Vec<String> {
    let mut out = Vec::new();
    for item_caps in ITEM_BLOCK.captures_iter(body) {
        let item_body = &item_caps[1];
        if let Some(link_caps) = LINK_TAG.captures(item_body) {
            let link = link_caps[1].trim();
            if !link.is_empty() {
                out.push(link.to_string());
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_links_out_of_rss_items() {
        let body = r#"
            <rss><channel>
                <item><title>A</title><link>https://news.google.com/rss/articles/AAA</link></item>
                <item><title>B</title><link>https://news.google.com/rss/articles/BBB</link></item>
            </channel></rss>
        "#;
        let links = parse_feed_links(body);
        assert_eq!(
            links,
            vec![
                "https://news.google.com/rss/articles/AAA".to_string(),
                "https://news.google.com/rss/articles/BBB".to_string(),
            ]
        );
    }

    #[test]
    fn builds_rss_url_with_period_token() {
        let params = SearchParams {
            keywords: vec!["bitcoin".to_string()],
            excludes: vec![],
            max_results: 10,
            language: "vi".to_string(),
            country: "VN".to_string(),
            period: Some("1d".to_string()),
            start_date: None,
            end_date: None,
        };
        let url = build_rss_url("bitcoin", &params);
        assert!(url.contains("hl=vi"));
        assert!(url.contains("gl=VN"));
        assert!(url.contains("ceid=VN-VN"));
        assert!(url.contains("when=1d"));
    }
}
