use std::future::Future;
use std::time::Duration;

use newsdesk_core::{AppError, AppResult};
use rand::Rng;
use tracing::warn;

/// Backoff policy for a single `Retrier::run` invocation.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub exponential_base: f64,
    /// Symmetric jitter fraction, e.g. 0.5 means +/-50%.
    pub jitter_range: f64,
}

impl RetryConfig {
    /// For calls to external HTTP services (search, extraction).
    pub const fn external_service() -> Self {
        RetryConfig {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(300),
            exponential_base: 2.0,
            jitter_range: 0.5,
        }
    }

    /// For database operations.
    pub const fn database() -> Self {
        RetryConfig {
            max_retries: 2,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            exponential_base: 2.0,
            jitter_range: 0.3,
        }
    }

    /// For explicit rate-limit backoffs.
    pub const fn rate_limit() -> Self {
        RetryConfig {
            max_retries: 5,
            base_delay: Duration::from_secs(60),
            max_delay: Duration::from_secs(3600),
            exponential_base: 1.5,
            jitter_range: 0.2,
        }
    }

    /// Delay before retry attempt `k` (0-indexed), before jitter.
    fn base_delay_for(&self, k: u32) -> Duration {
        let raw = self.base_delay.as_secs_f64() * self.exponential_base.powi(k as i32);
        Duration::from_secs_f64(raw.min(self.max_delay.as_secs_f64()))
    }

    fn jittered_delay(&self, k: u32) -> Duration {
        let base = self.base_delay_for(k).as_secs_f64();
        let jitter = rand::thread_rng().gen_range(-self.jitter_range..=self.jitter_range);
        let with_jitter = base * (1.0 + jitter);
        Duration::from_secs_f64(with_jitter.max(0.0)).max(Duration::from_millis(100))
    }
}

/// Runs `op` up to `cfg.max_retries + 1` times with exponential backoff and
/// jitter, honoring any server-provided `retry_after` hint on the error.
pub async fn run<F, Fut, T>(mut op: F, cfg: &RetryConfig, cid: &str) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let mut attempt: u32 = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let exhausted = attempt >= cfg.max_retries;
                let retryable = err.retryable();
                warn!(
                    cid = %cid,
                    attempt,
                    code = err.code(),
                    retryable,
                    "retrier attempt failed"
                );
                if exhausted || !retryable {
                    return Err(err);
                }
                let delay = err.retry_after().unwrap_or_else(|| cfg.jittered_delay(attempt));
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Type alias kept for call sites that prefer a struct-shaped entry point.
pub struct Retrier;

impl Retrier {
    pub async fn run<F, Fut, T>(op: F, cfg: &RetryConfig, cid: &str) -> AppResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        run(op, cfg, cid).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn exhausts_all_attempts_on_permanent_failure() {
        let calls = AtomicU32::new(0);
        let cfg = RetryConfig {
            max_retries: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
            exponential_base: 2.0,
            jitter_range: 0.0,
        };
        let result: AppResult<()> = run(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(AppError::ExtractionNetwork("boom".into())) }
            },
            &cfg,
            "test-cid",
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn stops_immediately_on_non_retryable_error() {
        let calls = AtomicU32::new(0);
        let cfg = RetryConfig {
            max_retries: 5,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
            exponential_base: 2.0,
            jitter_range: 0.0,
        };
        let result: AppResult<()> = run(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(AppError::ExtractionParsing("bad shape".into())) }
            },
            &cfg,
            "test-cid",
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn succeeds_without_retry_when_first_call_ok() {
        let result: AppResult<i32> =
            run(|| async { Ok(7) }, &RetryConfig::external_service(), "cid").await;
        assert_eq!(result.unwrap(), 7);
    }

    #[test]
    fn delay_floors_at_100ms_and_caps_at_max_delay() {
        let cfg = RetryConfig {
            max_retries: 10,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_secs(5),
            exponential_base: 2.0,
            jitter_range: 0.0,
        };
        assert_eq!(cfg.jittered_delay(0), Duration::from_millis(100));
        let big = RetryConfig {
            max_retries: 10,
            base_delay: Duration::from_secs(1000),
            max_delay: Duration::from_secs(5),
            exponential_base: 2.0,
            jitter_range: 0.0,
        };
        assert_eq!(big.jittered_delay(0), Duration::from_secs(5));
    }
}
