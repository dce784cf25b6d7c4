use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use newsdesk_core::{AppError, AppResult};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub recovery_timeout: Duration,
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        CircuitBreakerConfig {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(300),
            success_threshold: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerMetrics {
    pub state: CircuitState,
    pub total_calls: u64,
    pub total_successes: u64,
    pub total_failures: u64,
    pub failure_count: u32,
    pub success_count: u32,
    pub state_change_time: Instant,
}

struct Inner {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_failure_time: Option<Instant>,
    state_change_time: Instant,
    half_open_inflight: bool,
    total_calls: u64,
    total_successes: u64,
    total_failures: u64,
}

/// A single named circuit breaker. Closed -> Open -> Half-Open -> Closed.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        CircuitBreaker {
            name: name.into(),
            config,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                last_failure_time: None,
                state_change_time: Instant::now(),
                half_open_inflight: false,
                total_calls: 0,
                total_successes: 0,
                total_failures: 0,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn metrics(&self) -> CircuitBreakerMetrics {
        let g = self.inner.lock().await;
        CircuitBreakerMetrics {
            state: g.state,
            total_calls: g.total_calls,
            total_successes: g.total_successes,
            total_failures: g.total_failures,
            failure_count: g.failure_count,
            success_count: g.success_count,
            state_change_time: g.state_change_time,
        }
    }

    /// Admit a call, returning the pre-call gate decision. `Ok(probing)` means
    /// the op should run; `probing` is true iff this is the single Half-Open probe.
    async fn admit(&self) -> Result<bool, AppError> {
        let mut g = self.inner.lock().await;
        match g.state {
            CircuitState::Closed => Ok(false),
            CircuitState::Open => {
                let next_retry = g.last_failure_time.unwrap_or(g.state_change_time)
                    + self.config.recovery_timeout;
                if Instant::now() >= next_retry {
                    g.state = CircuitState::HalfOpen;
                    g.state_change_time = Instant::now();
                    g.success_count = 0;
                    g.half_open_inflight = true;
                    info!(service = %self.name, "circuit breaker half-open probe admitted");
                    Ok(true)
                } else {
                    Err(AppError::CircuitBreakerOpen {
                        service: self.name.clone(),
                        next_retry_in: next_retry.saturating_duration_since(Instant::now()).into(),
                    })
                }
            }
            CircuitState::HalfOpen => {
                if g.half_open_inflight {
                    let next_retry = g.state_change_time + self.config.recovery_timeout;
                    Err(AppError::CircuitBreakerOpen {
                        service: self.name.clone(),
                        next_retry_in: next_retry.saturating_duration_since(Instant::now()).into(),
                    })
                } else {
                    g.half_open_inflight = true;
                    Ok(true)
                }
            }
        }
    }

    async fn record_success(&self, was_probe: bool) {
        let mut g = self.inner.lock().await;
        g.total_calls += 1;
        g.total_successes += 1;
        if was_probe {
            g.half_open_inflight = false;
        }
        match g.state {
            CircuitState::Closed => {
                g.failure_count = 0;
            }
            CircuitState::HalfOpen => {
                g.success_count += 1;
                if g.success_count >= self.config.success_threshold {
                    g.state = CircuitState::Closed;
                    g.state_change_time = Instant::now();
                    g.failure_count = 0;
                    g.success_count = 0;
                    info!(service = %self.name, "circuit breaker closed after recovery");
                }
            }
            CircuitState::Open => {}
        }
    }

    /// Releases the half-open probe slot for a non-monitored error without
    /// touching failure/success counts or state — the breaker only reacts to
    /// the monitored (transient) error set.
    async fn record_passthrough(&self, was_probe: bool) {
        let mut g = self.inner.lock().await;
        g.total_calls += 1;
        if was_probe {
            g.half_open_inflight = false;
        }
    }

    async fn record_failure(&self, was_probe: bool) {
        let mut g = self.inner.lock().await;
        g.total_calls += 1;
        g.total_failures += 1;
        g.last_failure_time = Some(Instant::now());
        if was_probe {
            g.half_open_inflight = false;
        }
        match g.state {
            CircuitState::Closed => {
                g.failure_count += 1;
                if g.failure_count >= self.config.failure_threshold {
                    g.state = CircuitState::Open;
                    g.state_change_time = Instant::now();
                    warn!(service = %self.name, "circuit breaker opened");
                }
            }
            CircuitState::HalfOpen => {
                g.state = CircuitState::Open;
                g.state_change_time = Instant::now();
                g.success_count = 0;
                warn!(service = %self.name, "circuit breaker re-opened after failed probe");
            }
            CircuitState::Open => {}
        }
    }

    /// Run `op` behind the breaker, optionally bounding it with `timeout`.
    /// A timeout is counted as a monitored failure synthesized as `ExtractionTimeout`.
    /// Errors outside the monitored (retryable) set — validation, bad category,
    /// parse failures — pass through without affecting breaker state.
    pub async fn call<F, Fut, T>(
        &self,
        op: F,
        timeout: Option<Duration>,
    ) -> AppResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let probing = self.admit().await?;
        let result = match timeout {
            Some(d) => match tokio::time::timeout(d, op()).await {
                Ok(inner) => inner,
                Err(_) => Err(AppError::ExtractionTimeout(d)),
            },
            None => op().await,
        };
        match &result {
            Ok(_) => self.record_success(probing).await,
            Err(e) if e.retryable() => self.record_failure(probing).await,
            Err(_) => self.record_passthrough(probing).await,
        }
        result
    }
}

/// Registry of named breakers, keyed by service name.
pub struct CircuitBreakerManager {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    default_config: CircuitBreakerConfig,
}

impl CircuitBreakerManager {
    pub fn new(default_config: CircuitBreakerConfig) -> Self {
        CircuitBreakerManager {
            breakers: DashMap::new(),
            default_config,
        }
    }

    pub fn get_or_create(&self, service: &str) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(service.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(service, self.default_config)))
            .clone()
    }

    pub async fn call_with_breaker<F, Fut, T>(
        &self,
        service: &str,
        timeout: Option<Duration>,
        op: F,
    ) -> AppResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let breaker = self.get_or_create(service);
        breaker.call(op, timeout).await
    }

    pub async fn all_metrics(&self) -> Vec<(String, CircuitBreakerMetrics)> {
        let mut out = Vec::with_capacity(self.breakers.len());
        for entry in self.breakers.iter() {
            out.push((entry.key().clone(), entry.value().metrics().await));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn opens_after_threshold_failures_and_fails_fast() {
        let cb = CircuitBreaker::new(
            "svc",
            CircuitBreakerConfig {
                failure_threshold: 3,
                recovery_timeout: Duration::from_secs(300),
                success_threshold: 2,
            },
        );
        for _ in 0..3 {
            let res: AppResult<()> = cb
                .call(|| async { Err(AppError::GoogleNewsUnavailable("down".into())) }, None)
                .await;
            assert!(res.is_err());
        }
        let start = Instant::now();
        let res: AppResult<()> = cb.call(|| async { Ok(()) }, None).await;
        let elapsed = start.elapsed();
        assert!(matches!(res, Err(AppError::CircuitBreakerOpen { .. })));
        assert!(elapsed < Duration::from_millis(5));
    }

    #[tokio::test]
    async fn half_open_closes_after_success_threshold() {
        let cb = CircuitBreaker::new(
            "svc2",
            CircuitBreakerConfig {
                failure_threshold: 1,
                recovery_timeout: Duration::from_millis(1),
                success_threshold: 2,
            },
        );
        let _: AppResult<()> = cb
            .call(|| async { Err(AppError::GoogleNewsUnavailable("down".into())) }, None)
            .await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        let _: AppResult<()> = cb.call(|| async { Ok(()) }, None).await;
        let _: AppResult<()> = cb.call(|| async { Ok(()) }, None).await;
        let m = cb.metrics().await;
        assert_eq!(m.state, CircuitState::Closed);
    }

    #[tokio::test]
    async fn non_monitored_errors_pass_through_uncounted() {
        let cb = CircuitBreaker::new(
            "svc3",
            CircuitBreakerConfig {
                failure_threshold: 3,
                recovery_timeout: Duration::from_secs(300),
                success_threshold: 2,
            },
        );
        for _ in 0..10 {
            let res: AppResult<()> = cb
                .call(|| async { Err(AppError::Validation("bad input".into())) }, None)
                .await;
            assert!(res.is_err());
        }
        let m = cb.metrics().await;
        assert_eq!(m.state, CircuitState::Closed);
        assert_eq!(m.failure_count, 0);
        assert_eq!(m.total_calls, 10);
    }
}
