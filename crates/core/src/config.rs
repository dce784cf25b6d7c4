use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub database: DatabaseConfig,
    pub search: SearchConfig,
    pub resolver: ResolverConfig,
    pub extraction: ExtractionConfig,
    pub browser: BrowserConfig,
    pub scheduler: SchedulerConfig,
    pub reliability: ReliabilityConfig,
    pub alerts: AlertConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeneralConfig {
    #[serde(default = "default_crawler_concurrency")]
    pub crawler_concurrency_limit: usize,
    #[serde(default = "default_relevance_threshold")]
    pub category_relevance_threshold: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub postgres_url: String,
    #[serde(default = "default_pool_size")]
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_max_results")]
    pub max_results_per_search: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ResolverConfig {
    #[serde(default = "default_max_urls")]
    pub max_urls_to_process: usize,
    #[serde(default = "default_max_url_processing_time")]
    pub max_url_processing_time_secs: u64,
    #[serde(default = "default_per_url_timeout")]
    pub per_url_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractionConfig {
    #[serde(default = "default_extraction_timeout")]
    pub extraction_timeout_secs: u64,
    #[serde(default = "default_extraction_max_retries")]
    pub extraction_max_retries: u32,
    #[serde(default = "default_extraction_retry_base_delay")]
    pub extraction_retry_base_delay_secs: f64,
    #[serde(default = "default_extraction_retry_multiplier")]
    pub extraction_retry_multiplier: f64,
    #[serde(default = "default_true")]
    pub enable_javascript_rendering: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BrowserConfig {
    #[serde(default = "default_true")]
    pub headless: bool,
    #[serde(default = "default_playwright_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_playwright_wait_time")]
    pub wait_time_secs: u64,
    #[serde(default = "default_max_tabs")]
    pub max_tabs_per_browser: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,
    #[serde(default = "default_job_execution_timeout")]
    pub job_execution_timeout_secs: u64,
    #[serde(default = "default_job_cleanup_days")]
    pub job_cleanup_days: i64,
    #[serde(default = "default_stuck_threshold_hours")]
    pub stuck_job_threshold_hours: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReliabilityConfig {
    #[serde(default = "default_cb_failure_threshold")]
    pub circuit_breaker_failure_threshold: u32,
    #[serde(default = "default_cb_recovery_timeout")]
    pub circuit_breaker_recovery_timeout_secs: u64,
    #[serde(default = "default_cb_success_threshold")]
    pub circuit_breaker_success_threshold: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AlertConfig {
    #[serde(default = "default_alert_max_per_hour")]
    pub max_alerts_per_hour: u32,
    #[serde(default)]
    pub webhook_urls: Vec<String>,
}

fn default_crawler_concurrency() -> usize { 10 }
fn default_relevance_threshold() -> f64 { 0.3 }
fn default_pool_size() -> u32 { 20 }
fn default_max_results() -> u32 { 100 }
fn default_max_urls() -> usize { 15 }
fn default_max_url_processing_time() -> u64 { 75 }
fn default_per_url_timeout() -> u64 { 5 }
fn default_extraction_timeout() -> u64 { 30 }
fn default_extraction_max_retries() -> u32 { 3 }
fn default_extraction_retry_base_delay() -> f64 { 1.0 }
fn default_extraction_retry_multiplier() -> f64 { 2.0 }
fn default_true() -> bool { true }
fn default_playwright_timeout() -> u64 { 30 }
fn default_playwright_wait_time() -> u64 { 4 }
fn default_max_tabs() -> usize { 10 }
fn default_poll_interval() -> u64 { 60 }
fn default_max_concurrent_jobs() -> usize { 10 }
fn default_job_execution_timeout() -> u64 { 1800 }
fn default_job_cleanup_days() -> i64 { 30 }
fn default_stuck_threshold_hours() -> i64 { 2 }
fn default_cb_failure_threshold() -> u32 { 5 }
fn default_cb_recovery_timeout() -> u64 { 300 }
fn default_cb_success_threshold() -> u32 { 3 }
fn default_alert_max_per_hour() -> u32 { 10 }
