use std::sync::Arc;

use chrono::Utc;
use newsdesk_core::{representative_keywords, AppResult, Category};
use newsdesk_extraction::ArticleExtractor;
use newsdesk_reliability::AlertManager;
use newsdesk_resolver::UrlResolver;
use newsdesk_search::{SearchClient, SearchParams};
use newsdesk_storage::Storage;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::relevance;

#[derive(Debug, Clone, Copy, Default)]
pub struct CrawlOutcome {
    pub articles_found: i64,
    pub articles_saved: i64,
}

/// Orchestrates Search -> Resolve -> Extract -> Relevance/Dedup -> Persist
/// for one category, all steps sharing `cid`.
pub struct CrawlEngine {
    search: Arc<SearchClient>,
    resolver: Arc<UrlResolver>,
    extractor: Arc<ArticleExtractor>,
    storage: Storage,
    alerts: Arc<AlertManager>,
    concurrency_limit: usize,
    relevance_threshold: f64,
}

impl CrawlEngine {
    pub fn new(
        search: Arc<SearchClient>,
        resolver: Arc<UrlResolver>,
        extractor: Arc<ArticleExtractor>,
        storage: Storage,
        alerts: Arc<AlertManager>,
        concurrency_limit: usize,
        relevance_threshold: f64,
    ) -> Self {
        CrawlEngine {
            search,
            resolver,
            extractor,
            storage,
            alerts,
            concurrency_limit: concurrency_limit.clamp(1, 15),
            relevance_threshold,
        }
    }

    /// Runs one crawl of `category`. `advanced_mode` gates whether articles
    /// scoring below the category threshold are dropped before persistence.
    /// `job_id`, if given, receives a heartbeat at each step boundary.
    pub async fn crawl(
        &self,
        category: &Category,
        advanced_mode: bool,
        job_id: Option<i64>,
        cid: &str,
    ) -> AppResult<CrawlOutcome> {
        let query = newsdesk_search::build_advanced(&category.keywords, &category.exclude_keywords);

        let params = SearchParams {
            keywords: category.keywords.clone(),
            excludes: category.exclude_keywords.clone(),
            max_results: 100,
            language: category.language.clone(),
            country: category.country.clone(),
            period: category.crawl_period.clone(),
            start_date: None,
            end_date: None,
        };

        let urls = if category.crawl_period.is_some() {
            self.search.search(&params, cid).await?
        } else {
            let end = Utc::now();
            let start = end - chrono::Duration::days(1);
            self.search
                .search_daily_sliding_window(&params, start, end, params.max_results, cid)
                .await?
        };

        self.heartbeat(job_id).await;
        info!(cid = %cid, category = %category.name, urls_found = urls.len(), "search complete");

        if urls.is_empty() {
            return Ok(CrawlOutcome::default());
        }

        let resolved: Vec<String> = self
            .resolver
            .resolve_batch(&urls, cid)
            .await
            .into_iter()
            .filter_map(|(_, resolved)| resolved)
            .collect();

        self.heartbeat(job_id).await;
        info!(cid = %cid, category = %category.name, resolved = resolved.len(), "url resolve complete");

        if resolved.is_empty() {
            return Ok(CrawlOutcome::default());
        }

        let semaphore = Arc::new(Semaphore::new(self.concurrency_limit));
        let mut handles = Vec::with_capacity(resolved.len());
        for url in resolved {
            let semaphore = semaphore.clone();
            let extractor = self.extractor.clone();
            let cid = cid.to_string();
            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok()?;
                extractor.extract_metadata(&url, &cid).await
            }));
        }

        let mut articles = Vec::with_capacity(handles.len());
        for handle in handles {
            if let Ok(Some(article)) = handle.await {
                articles.push(article);
            }
        }

        self.heartbeat(job_id).await;
        let articles_found = articles.len() as i64;
        info!(cid = %cid, category = %category.name, articles_found, "extraction complete");

        let mut scored = Vec::with_capacity(articles.len());
        for mut article in articles {
            let (relevance_score, matched) = relevance::score(&article, category);
            article.relevance_score = relevance_score;
            article.keywords_matched = matched;
            if advanced_mode && relevance_score < self.relevance_threshold {
                continue;
            }
            scored.push(article);
        }

        if scored.is_empty() {
            return Ok(CrawlOutcome {
                articles_found,
                articles_saved: 0,
            });
        }

        let keyword_matched = representative_keywords(
            &scored
                .iter()
                .flat_map(|a| a.keywords_matched.iter().cloned())
                .collect(),
        );

        let (new, updated, skipped) = self
            .storage
            .bulk_upsert_with_dedup(&scored, category.id, keyword_matched.as_deref(), Some(&query))
            .await?;

        self.heartbeat(job_id).await;
        info!(cid = %cid, category = %category.name, new, updated, skipped, "persistence complete");

        Ok(CrawlOutcome {
            articles_found,
            articles_saved: new + updated,
        })
    }

    async fn heartbeat(&self, job_id: Option<i64>) {
        if let Some(id) = job_id {
            if let Err(e) = self.storage.heartbeat_job(id).await {
                warn!(job_id = id, error = %e, "job heartbeat failed");
            }
        }
    }

    /// Whether the emitted alert history should note an extraction circuit
    /// being open; exposed so JobRunner/Scheduler can surface health without
    /// reaching into the breaker manager directly.
    pub async fn alert_service_degraded(&self, service: &str, detail: &str) {
        self.alerts
            .dispatch(newsdesk_core::Alert {
                alert_type: newsdesk_core::AlertType::ServiceDegraded,
                severity: newsdesk_core::AlertSeverity::Medium,
                message: detail.to_string(),
                details: serde_json::json!({ "service": service }),
                correlation_id: None,
                service_name: Some(service.to_string()),
                timestamp: Utc::now(),
            })
            .await;
    }
}
