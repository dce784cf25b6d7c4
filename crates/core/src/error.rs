use std::time::Duration;

use serde_json::Value as JsonValue;
use thiserror::Error;

/// Tagged error kind for the crawl pipeline. Retry and circuit-breaker
/// logic branch on the variant, never on the message text.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("category not found: {0}")]
    CategoryNotFound(String),

    #[error("category invalid: {0}")]
    CategoryInvalid(String),

    #[error("google news unavailable: {0}")]
    GoogleNewsUnavailable(String),

    #[error("rate limit exceeded: {message}")]
    RateLimitExceeded {
        message: String,
        retry_after: Option<Duration>,
    },

    #[error("extraction timed out after {0:?}")]
    ExtractionTimeout(Duration),

    #[error("extraction network error: {0}")]
    ExtractionNetwork(String),

    #[error("extraction parsing error: {0}")]
    ExtractionParsing(String),

    #[error("database connection error: {0}")]
    DatabaseConnection(String),

    /// Reserved for a future cache-backed rate limiter; unused by the crawl
    /// path today but kept in the taxonomy so alert rule wiring lines up
    /// with the original's full `DATABASE_CONNECTION_FAILED`-adjacent set.
    #[error("cache connection error: {0}")]
    RedisConnection(String),

    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("circuit breaker open for {service}, retry in {next_retry_in:?}")]
    CircuitBreakerOpen {
        service: String,
        next_retry_in: Duration,
    },

    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Whether a Retrier should ever attempt this kind again.
    pub fn retryable(&self) -> bool {
        match self {
            AppError::Validation(_)
            | AppError::CategoryNotFound(_)
            | AppError::CategoryInvalid(_)
            | AppError::ExtractionParsing(_)
            | AppError::Internal(_) => false,
            AppError::GoogleNewsUnavailable(_)
            | AppError::RateLimitExceeded { .. }
            | AppError::ExtractionTimeout(_)
            | AppError::ExtractionNetwork(_)
            | AppError::DatabaseConnection(_)
            | AppError::RedisConnection(_)
            | AppError::ServiceUnavailable(_)
            | AppError::CircuitBreakerOpen { .. } => true,
            AppError::Other(_) => false,
        }
    }

    /// Server/caller-provided retry hint, if any. Overrides the Retrier's
    /// own computed backoff when present.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            AppError::GoogleNewsUnavailable(_) => Some(Duration::from_secs(300)),
            AppError::RateLimitExceeded { retry_after, .. } => {
                Some(retry_after.unwrap_or(Duration::from_secs(60)))
            }
            AppError::DatabaseConnection(_) => Some(Duration::from_secs(30)),
            AppError::RedisConnection(_) => Some(Duration::from_secs(30)),
            AppError::ServiceUnavailable(_) => Some(Duration::from_secs(300)),
            AppError::CircuitBreakerOpen { next_retry_in, .. } => Some(*next_retry_in),
            _ => None,
        }
    }

    /// Stable identifier for logs/metrics, mirroring the original's ErrorCode.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::CategoryNotFound(_) => "CATEGORY_NOT_FOUND",
            AppError::CategoryInvalid(_) => "CATEGORY_VALIDATION_FAILED",
            AppError::GoogleNewsUnavailable(_) => "GOOGLE_NEWS_UNAVAILABLE",
            AppError::RateLimitExceeded { .. } => "RATE_LIMIT_EXCEEDED",
            AppError::ExtractionTimeout(_) => "EXTRACTION_TIMEOUT",
            AppError::ExtractionNetwork(_) => "EXTRACTION_NETWORK_ERROR",
            AppError::ExtractionParsing(_) => "EXTRACTION_FAILED",
            AppError::DatabaseConnection(_) => "DATABASE_CONNECTION_ERROR",
            AppError::RedisConnection(_) => "DATABASE_CONNECTION_ERROR",
            AppError::ServiceUnavailable(_) => "EXTERNAL_SERVICE_UNAVAILABLE",
            AppError::CircuitBreakerOpen { .. } => "INTERNAL_SERVER_ERROR",
            AppError::Internal(_) => "INTERNAL_SERVER_ERROR",
            AppError::Other(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    /// Structured detail map for logging/alert payloads.
    pub fn details(&self) -> JsonValue {
        match self {
            AppError::RateLimitExceeded { retry_after, .. } => {
                serde_json::json!({ "retry_after_secs": retry_after.map(|d| d.as_secs()) })
            }
            AppError::CircuitBreakerOpen {
                service,
                next_retry_in,
            } => serde_json::json!({
                "service": service,
                "next_retry_in_secs": next_retry_in.as_secs(),
            }),
            _ => JsonValue::Null,
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_and_parsing_errors_are_not_retryable() {
        assert!(!AppError::Validation("bad".into()).retryable());
        assert!(!AppError::CategoryNotFound("x".into()).retryable());
        assert!(!AppError::ExtractionParsing("empty title".into()).retryable());
        assert!(!AppError::Internal("boom".into()).retryable());
    }

    #[test]
    fn transient_errors_are_retryable() {
        assert!(AppError::GoogleNewsUnavailable("down".into()).retryable());
        assert!(AppError::ExtractionNetwork("reset".into()).retryable());
        assert!(AppError::DatabaseConnection("down".into()).retryable());
        assert!(AppError::RateLimitExceeded {
            message: "slow down".into(),
            retry_after: None,
        }
        .retryable());
        assert!(AppError::CircuitBreakerOpen {
            service: "search".into(),
            next_retry_in: Duration::from_secs(5),
        }
        .retryable());
    }

    #[test]
    fn rate_limit_retry_after_falls_back_to_default_when_absent() {
        let err = AppError::RateLimitExceeded {
            message: "slow down".into(),
            retry_after: None,
        };
        assert_eq!(err.retry_after(), Some(Duration::from_secs(60)));

        let err = AppError::RateLimitExceeded {
            message: "slow down".into(),
            retry_after: Some(Duration::from_secs(120)),
        };
        assert_eq!(err.retry_after(), Some(Duration::from_secs(120)));
    }

    #[test]
    fn google_news_unavailable_defaults_to_300s() {
        let err = AppError::GoogleNewsUnavailable("5xx".into());
        assert_eq!(err.retry_after(), Some(Duration::from_secs(300)));
    }

    #[test]
    fn circuit_breaker_open_carries_next_retry_as_hint() {
        let err = AppError::CircuitBreakerOpen {
            service: "search".into(),
            next_retry_in: Duration::from_secs(42),
        };
        assert_eq!(err.retry_after(), Some(Duration::from_secs(42)));
        assert_eq!(err.code(), "INTERNAL_SERVER_ERROR");
    }

    #[test]
    fn codes_are_stable_identifiers() {
        assert_eq!(
            AppError::CategoryNotFound("x".into()).code(),
            "CATEGORY_NOT_FOUND"
        );
        assert_eq!(
            AppError::ExtractionParsing("x".into()).code(),
            "EXTRACTION_FAILED"
        );
    }
}
