use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use newsdesk_core::AppConfig;
use newsdesk_engine::{CrawlEngine, JobRunner, RecoveryConfig, RecoveryEngine, Scheduler, SchedulerConfig};
use newsdesk_extraction::{ArticleExtractor, ExtractionConfig};
use newsdesk_reliability::{AlertManager, CircuitBreakerManager, CircuitBreakerConfig};
use newsdesk_resolver::{ResolverConfig, UrlResolver};
use newsdesk_search::SearchClient;
use newsdesk_storage::Storage;

/// Every shared service the binary needs, constructed once at startup and
/// handed to commands as `Arc`s rather than reached for through globals.
pub struct Context {
    pub config: AppConfig,
    pub storage: Storage,
    pub breakers: Arc<CircuitBreakerManager>,
    pub alerts: Arc<AlertManager>,
    pub engine: Arc<CrawlEngine>,
    pub job_runner: Arc<JobRunner>,
}

impl Context {
    pub async fn build(config: AppConfig) -> Result<Self> {
        let storage = Storage::with_pool_size(&config.database.postgres_url, config.database.max_connections).await?;
        storage.run_migrations().await?;

        let breaker_config = CircuitBreakerConfig {
            failure_threshold: config.reliability.circuit_breaker_failure_threshold,
            recovery_timeout: Duration::from_secs(config.reliability.circuit_breaker_recovery_timeout_secs),
            success_threshold: config.reliability.circuit_breaker_success_threshold,
        };
        let breakers = Arc::new(CircuitBreakerManager::new(breaker_config));
        let alerts = Arc::new(AlertManager::new(
            config.alerts.max_alerts_per_hour,
            config.alerts.webhook_urls.clone(),
        ));

        let search = Arc::new(SearchClient::new(breakers.clone()));
        let resolver = Arc::new(UrlResolver::new(ResolverConfig {
            per_url_timeout: Duration::from_secs(config.resolver.per_url_timeout_secs),
            per_batch_timeout: Duration::from_secs(config.resolver.max_url_processing_time_secs),
            per_batch_url_cap: config.resolver.max_urls_to_process,
            enable_browser_fallback: true,
        }));
        let extractor = Arc::new(ArticleExtractor::new(
            breakers.clone(),
            ExtractionConfig {
                total_timeout: Duration::from_secs(config.extraction.extraction_timeout_secs),
                enable_js_rendering: config.extraction.enable_javascript_rendering,
                browser_wait_time: Duration::from_secs(config.browser.wait_time_secs),
                browser_nav_timeout: Duration::from_secs(config.browser.timeout_secs),
                max_tabs_per_browser: config.browser.max_tabs_per_browser,
            },
        ));

        let engine = Arc::new(CrawlEngine::new(
            search,
            resolver,
            extractor,
            storage.clone(),
            alerts.clone(),
            config.general.crawler_concurrency_limit,
            config.general.category_relevance_threshold,
        ));

        let job_runner = Arc::new(JobRunner::new(
            storage.clone(),
            engine.clone(),
            Duration::from_secs(config.scheduler.job_execution_timeout_secs),
        ));

        Ok(Context {
            config,
            storage,
            breakers,
            alerts,
            engine,
            job_runner,
        })
    }

    pub fn scheduler(&self) -> Scheduler {
        Scheduler::new(
            self.storage.clone(),
            self.job_runner.clone(),
            self.alerts.clone(),
            SchedulerConfig {
                poll_interval: Duration::from_secs(self.config.scheduler.poll_interval_secs),
                max_concurrent_jobs: self.config.scheduler.max_concurrent_jobs,
                job_cleanup_days: self.config.scheduler.job_cleanup_days,
                stuck_job_threshold_hours: self.config.scheduler.stuck_job_threshold_hours,
            },
        )
    }

    pub fn recovery_engine(&self) -> RecoveryEngine {
        RecoveryEngine::new(self.storage.clone(), self.alerts.clone(), RecoveryConfig::default())
    }
}
