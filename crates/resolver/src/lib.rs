mod strategies;

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use newsdesk_browser::HeadlessBrowser;
use tracing::{error, info, warn};

pub use strategies::is_google_host;

/// Hard budgets for a single resolve batch, matching the reference
/// workspace's `MAX_URLS_TO_PROCESS` / `MAX_URL_PROCESSING_TIME` knobs.
#[derive(Debug, Clone, Copy)]
pub struct ResolverConfig {
    pub per_url_timeout: Duration,
    pub per_batch_timeout: Duration,
    pub per_batch_url_cap: usize,
    pub enable_browser_fallback: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        ResolverConfig {
            per_url_timeout: Duration::from_secs(5),
            per_batch_timeout: Duration::from_secs(75),
            per_batch_url_cap: 15,
            enable_browser_fallback: true,
        }
    }
}

#[derive(Debug, Default)]
pub struct ResolverMetrics {
    pub strategy1_hits: AtomicU64,
    pub strategy2_hits: AtomicU64,
    pub strategy3_hits: AtomicU64,
    pub strategy4_hits: AtomicU64,
    pub attempts: AtomicU64,
    pub successes: AtomicU64,
}

impl ResolverMetrics {
    pub fn success_rate(&self) -> f64 {
        let attempts = self.attempts.load(Ordering::Relaxed);
        if attempts == 0 {
            return 1.0;
        }
        self.successes.load(Ordering::Relaxed) as f64 / attempts as f64
    }
}

/// Resolves Google News redirect URLs to canonical publisher URLs via an
/// ordered strategy pipeline, short-circuiting on the first non-Google hit.
pub struct UrlResolver {
    http: reqwest::Client,
    config: ResolverConfig,
    pub metrics: ResolverMetrics,
}

impl UrlResolver {
    pub fn new(config: ResolverConfig) -> Self {
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
            )
            .build()
            .expect("reqwest client builds with static config");
        UrlResolver {
            http,
            config,
            metrics: ResolverMetrics::default(),
        }
    }

    /// Resolves one URL, bounded by `per_url_timeout`, trying each strategy
    /// in order until one returns a non-Google publisher URL.
    pub async fn resolve_one(&self, google_url: &str, cid: &str) -> Option<String> {
        self.metrics.attempts.fetch_add(1, Ordering::Relaxed);
        match tokio::time::timeout(self.config.per_url_timeout, self.resolve_inner(google_url, cid)).await {
            Ok(Some(resolved)) => {
                self.metrics.successes.fetch_add(1, Ordering::Relaxed);
                Some(resolved)
            }
            Ok(None) => None,
            Err(_) => {
                warn!(cid = %cid, url = %google_url, "url resolve timed out");
                None
            }
        }
    }

    async fn resolve_inner(&self, google_url: &str, cid: &str) -> Option<String> {
        if let Some(resolved) = strategies::query_param_extraction(google_url) {
            self.metrics.strategy1_hits.fetch_add(1, Ordering::Relaxed);
            return Some(resolved);
        }

        if let Some(resolved) = self.redirect_chase(google_url).await {
            self.metrics.strategy2_hits.fetch_add(1, Ordering::Relaxed);
            return Some(resolved);
        }

        if let Some(resolved) = strategies::decode_article_id(google_url) {
            self.metrics.strategy3_hits.fetch_add(1, Ordering::Relaxed);
            return Some(resolved);
        }

        if self.config.enable_browser_fallback {
            if let Some(resolved) = self.browser_fallback(google_url, cid).await {
                self.metrics.strategy4_hits.fetch_add(1, Ordering::Relaxed);
                return Some(resolved);
            }
        }

        None
    }

    /// Strategy 2: HEAD with browser-like headers, manual redirect following,
    /// at most 3 hops, 3s timeout per hop. Returns the first non-Google
    /// Location; rejects obvious data/file-asset extensions.
    async fn redirect_chase(&self, start_url: &str) -> Option<String> {
        let mut current = start_url.to_string();

        for _ in 0..3 {
            let resp = tokio::time::timeout(Duration::from_secs(3), self.http.head(&current).send())
                .await
                .ok()?
                .ok()?;

            if resp.status().is_redirection() {
                let location = resp.headers().get("location")?.to_str().ok()?.to_string();
                let next = resolve_relative(&current, &location)?;
                if let Ok(parsed) = url::Url::parse(&next) {
                    if let Some(host) = parsed.host_str() {
                        if !is_google_host(host) && !is_asset_url(&next) {
                            return Some(next);
                        }
                    }
                }
                current = next;
                continue;
            }

            let final_url = resp.url().as_str();
            if let Ok(parsed) = url::Url::parse(final_url) {
                if let Some(host) = parsed.host_str() {
                    if !is_google_host(host) && !is_asset_url(final_url) {
                        return Some(final_url.to_string());
                    }
                }
            }
            break;
        }
        None
    }

    /// Strategy 4: headless-browser navigate-and-wait; if the final URL is
    /// still Google, scan the rendered HTML for an external article link. All
    /// browser control is synchronous, so the whole probe runs on a blocking
    /// worker thread rather than the async control loop.
    async fn browser_fallback(&self, google_url: &str, cid: &str) -> Option<String> {
        let google_url = google_url.to_string();
        let cid = cid.to_string();
        tokio::task::spawn_blocking(move || browse_and_scan(&google_url, &cid))
            .await
            .ok()?
    }

    /// Resolves a batch under a global wall-clock budget and a URL count cap.
    /// Returns `(google_url, Option<resolved>)` pairs in input order; stops
    /// early (remaining URLs map to `None`) if the batch budget is exhausted.
    /// Logs an ERROR if the batch success rate is below 20%.
    pub async fn resolve_batch(
        &self,
        urls: &[String],
        cid: &str,
    ) -> Vec<(String, Option<String>)> {
        let capped: Vec<&String> = urls.iter().take(self.config.per_batch_url_cap).collect();
        let mut out = Vec::with_capacity(capped.len());

        let budget = tokio::time::Instant::now() + self.config.per_batch_timeout;
        let mut hits = 0usize;

        for url in &capped {
            if tokio::time::Instant::now() >= budget {
                warn!(cid = %cid, "url resolve batch budget exhausted, stopping early");
                out.push(((*url).clone(), None));
                continue;
            }
            let resolved = self.resolve_one(url, cid).await;
            if resolved.is_some() {
                hits += 1;
            }
            out.push(((*url).clone(), resolved));
        }

        let rate = if capped.is_empty() {
            1.0
        } else {
            hits as f64 / capped.len() as f64
        };
        if rate < 0.2 {
            error!(cid = %cid, success_rate = rate, "url resolve batch success rate below 20%");
        } else {
            info!(cid = %cid, success_rate = rate, "url resolve batch complete");
        }

        out
    }
}

fn browse_and_scan(google_url: &str, cid: &str) -> Option<String> {
    let browser = HeadlessBrowser::launch()
        .map_err(|e| warn!(cid = %cid, error = %e, "failed to launch fallback browser"))
        .ok()?;
    let tab = browser.new_tab().ok()?;
    tab.goto(google_url, Duration::from_secs(10)).ok()?;
    std::thread::sleep(Duration::from_secs(2));

    let final_url = tab.final_url();
    if let Ok(parsed) = url::Url::parse(&final_url) {
        if let Some(host) = parsed.host_str() {
            if !is_google_host(host) {
                return Some(final_url);
            }
        }
    }

    let html = tab.content().ok()?;
    strategies::scan_html_for_external_urls(&html).into_iter().next()
}

fn resolve_relative(base: &str, location: &str) -> Option<String> {
    if location.starts_with("http") {
        Some(location.to_string())
    } else {
        url::Url::parse(base).ok()?.join(location).ok().map(|u| u.to_string())
    }
}

fn is_asset_url(url: &str) -> bool {
    const EXTS: &[&str] = &[".png", ".jpg", ".jpeg", ".gif", ".css", ".js", ".ico", ".pdf", ".zip"];
    EXTS.iter().any(|ext| url.ends_with(ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolve_one_short_circuits_on_strategy1_without_network() {
        let resolver = UrlResolver::new(ResolverConfig::default());
        let url = "https://news.google.com/x?url=https%3A//ex.com/a";
        let resolved = resolver.resolve_one(url, "cid").await;
        assert_eq!(resolved.as_deref(), Some("https://ex.com/a"));
        assert_eq!(resolver.metrics.strategy1_hits.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn success_rate_is_one_with_no_attempts() {
        let metrics = ResolverMetrics::default();
        assert_eq!(metrics.success_rate(), 1.0);
    }
}
