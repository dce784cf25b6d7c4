use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A discovered, extracted news article.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: Option<i64>,
    pub title: String,
    pub content: Option<String>,
    pub author: Option<String>,
    pub publish_date: Option<DateTime<Utc>>,
    pub source_url: String,
    pub image_url: Option<String>,
    pub url_hash: String,
    pub content_hash: Option<String>,
    pub first_seen: Option<DateTime<Utc>>,
    pub last_seen: Option<DateTime<Utc>>,
    pub keywords_matched: Vec<String>,
    pub relevance_score: f64,
}

impl Article {
    pub fn url_hash_for(source_url: &str) -> String {
        hex_sha256(source_url.as_bytes())
    }

    pub fn content_hash_for(content: &str) -> String {
        hex_sha256(content.as_bytes())
    }
}

fn hex_sha256(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// A bundle of keywords, excludes and locale defining what to crawl.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub keywords: Vec<String>,
    pub exclude_keywords: Vec<String>,
    pub language: String,
    pub country: String,
    pub is_active: bool,
    pub schedule_enabled: bool,
    pub schedule_interval_minutes: Option<u32>,
    pub crawl_period: Option<String>,
    pub last_scheduled_run_at: Option<DateTime<Utc>>,
    pub next_scheduled_run_at: Option<DateTime<Utc>>,
    pub disabled_until: Option<DateTime<Utc>>,
}

impl Category {
    pub fn default_language() -> String {
        "vi".to_string()
    }

    pub fn default_country() -> String {
        "VN".to_string()
    }

    /// Allowed schedule granularities, expanded in a later migration to include 5 and 15.
    pub const ALLOWED_SCHEDULE_MINUTES: [u32; 6] = [1, 5, 15, 30, 60, 1440];

    /// Allowed GNews recency-window tokens.
    pub const ALLOWED_PERIOD_TOKENS: [&'static str; 11] = [
        "1h", "2h", "6h", "12h", "1d", "2d", "7d", "1m", "3m", "6m", "1y",
    ];

    pub fn is_disabled_now(&self, now: DateTime<Utc>) -> bool {
        match self.disabled_until {
            Some(until) => now < until,
            None => false,
        }
    }
}

/// Row of the article<->category many-to-many association.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleCategoryAssociation {
    pub article_id: i64,
    pub category_id: i64,
    pub relevance_score: f64,
    pub keyword_matched: Option<String>,
    pub search_query_used: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobType {
    Scheduled,
    OnDemand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Stuck,
    ManualReview,
}

impl JobStatus {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Running => "RUNNING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
            JobStatus::Stuck => "STUCK",
            JobStatus::ManualReview => "MANUAL_REVIEW",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(JobStatus::Pending),
            "RUNNING" => Some(JobStatus::Running),
            "COMPLETED" => Some(JobStatus::Completed),
            "FAILED" => Some(JobStatus::Failed),
            "STUCK" => Some(JobStatus::Stuck),
            "MANUAL_REVIEW" => Some(JobStatus::ManualReview),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlJob {
    pub id: i64,
    pub category_id: i64,
    pub job_type: JobType,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub articles_found: i64,
    pub articles_saved: i64,
    pub error_message: Option<String>,
    pub correlation_id: String,
    pub task_id: Option<String>,
    pub priority: i32,
    pub metadata: serde_json::Value,
}

/// In-process, non-persisted runtime entities.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertType {
    CircuitBreakerOpened,
    CircuitBreakerClosed,
    TaskFailure,
    RateLimitExceeded,
    DatabaseConnectionFailed,
    ExternalServiceUnavailable,
    ServiceDegraded,
    ServiceRecovered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertChannel {
    Log,
    Email,
    Webhook,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub message: String,
    pub details: serde_json::Value,
    pub correlation_id: Option<String>,
    pub service_name: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecoveryAction {
    RetryImmediately,
    RetryDelayed,
    MarkFailed,
    DisableCategory,
    Escalate,
    NoAction,
}

/// Dominant failure pattern classified from an error message by keyword match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePattern {
    RateLimit,
    Network,
    Parsing,
    Authentication,
    ServiceUnavailable,
    Unknown,
}

impl FailurePattern {
    /// Classify a raw error message by keyword match, mirroring the original's
    /// failure_patterns table. Order matters: checked in this order, first match wins.
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();
        const RATE_LIMIT: [&str; 3] = ["rate limit", "too many requests", "429"];
        const NETWORK: [&str; 4] = ["timeout", "connection", "network", "unreachable"];
        const PARSING: [&str; 4] = ["parsing", "extraction", "invalid html", "no content"];
        const AUTH: [&str; 4] = ["unauthorized", "forbidden", "401", "403"];
        const SERVICE_UNAVAILABLE: [&str; 3] = ["unavailable", "503", "502"];

        if RATE_LIMIT.iter().any(|k| lower.contains(k)) {
            FailurePattern::RateLimit
        } else if NETWORK.iter().any(|k| lower.contains(k)) {
            FailurePattern::Network
        } else if PARSING.iter().any(|k| lower.contains(k)) {
            FailurePattern::Parsing
        } else if AUTH.iter().any(|k| lower.contains(k)) {
            FailurePattern::Authentication
        } else if SERVICE_UNAVAILABLE.iter().any(|k| lower.contains(k)) {
            FailurePattern::ServiceUnavailable
        } else {
            FailurePattern::Unknown
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobFailureAnalysis {
    pub category_id: i64,
    pub failure_count: u32,
    pub dominant_pattern: FailurePattern,
    pub pattern_counts: std::collections::HashMap<String, u32>,
    pub confidence_score: f64,
    pub sample_job_ids: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryPlan {
    pub category_id: i64,
    pub action: RecoveryAction,
    pub delay_seconds: Option<u64>,
    pub reason: String,
}

/// Representative keywords an article matched for a category, used as the
/// `keyword_matched` field on the association row.
pub fn representative_keywords(matched: &HashSet<String>) -> Option<String> {
    if matched.is_empty() {
        None
    } else {
        let mut v: Vec<&String> = matched.iter().collect();
        v.sort();
        Some(v.into_iter().cloned().collect::<Vec<_>>().join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_hash_matches_raw_sha256() {
        let url = "https://example.com/a";
        let mut hasher = Sha256::new();
        hasher.update(url.as_bytes());
        let expected = format!("{:x}", hasher.finalize());
        assert_eq!(Article::url_hash_for(url), expected);
    }

    #[test]
    fn url_hash_is_deterministic_and_distinct() {
        let a = Article::url_hash_for("https://example.com/a");
        let b = Article::url_hash_for("https://example.com/a");
        let c = Article::url_hash_for("https://example.com/b");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn category_disabled_until_future() {
        let mut cat = sample_category();
        let now = Utc::now();
        cat.disabled_until = Some(now + chrono::Duration::hours(1));
        assert!(cat.is_disabled_now(now));
        cat.disabled_until = Some(now - chrono::Duration::hours(1));
        assert!(!cat.is_disabled_now(now));
        cat.disabled_until = None;
        assert!(!cat.is_disabled_now(now));
    }

    #[test]
    fn failure_pattern_classifies_rate_limit_before_network() {
        assert_eq!(
            FailurePattern::classify("429 Too Many Requests"),
            FailurePattern::RateLimit
        );
        assert_eq!(
            FailurePattern::classify("connection timeout"),
            FailurePattern::Network
        );
        assert_eq!(
            FailurePattern::classify("401 Unauthorized"),
            FailurePattern::Authentication
        );
        assert_eq!(
            FailurePattern::classify("service 503 unavailable"),
            FailurePattern::ServiceUnavailable
        );
        assert_eq!(
            FailurePattern::classify("something odd happened"),
            FailurePattern::Unknown
        );
    }

    #[test]
    fn representative_keywords_sorts_and_joins() {
        let mut set = HashSet::new();
        set.insert("zeta".to_string());
        set.insert("alpha".to_string());
        assert_eq!(
            representative_keywords(&set),
            Some("alpha, zeta".to_string())
        );
        assert_eq!(representative_keywords(&HashSet::new()), None);
    }

    fn sample_category() -> Category {
        Category {
            id: 1,
            name: "bitcoin".to_string(),
            keywords: vec!["bitcoin".to_string()],
            exclude_keywords: vec![],
            language: Category::default_language(),
            country: Category::default_country(),
            is_active: true,
            schedule_enabled: false,
            schedule_interval_minutes: None,
            crawl_period: None,
            last_scheduled_run_at: None,
            next_scheduled_run_at: None,
            disabled_until: None,
        }
    }
}
