pub mod alert;
pub mod circuit_breaker;
pub mod retry;

pub use alert::{AlertManager, AlertRule};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerManager, CircuitState};
pub use retry::{RetryConfig, Retrier};
