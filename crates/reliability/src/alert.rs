use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use newsdesk_core::{Alert, AlertChannel, AlertSeverity, AlertType};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

const HISTORY_HARD_CAP: usize = 1000;
const HISTORY_TRIM_TO: usize = 500;

#[derive(Debug, Clone)]
pub struct AlertRule {
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub channels: Vec<AlertChannel>,
    pub enabled: bool,
    pub cooldown_period: Duration,
}

fn default_rules() -> Vec<AlertRule> {
    use AlertChannel::*;
    use AlertType::*;
    vec![
        AlertRule {
            alert_type: CircuitBreakerOpened,
            severity: AlertSeverity::High,
            channels: vec![Log, Webhook],
            enabled: true,
            cooldown_period: Duration::from_secs(300),
        },
        AlertRule {
            alert_type: CircuitBreakerClosed,
            severity: AlertSeverity::Low,
            channels: vec![Log],
            enabled: true,
            cooldown_period: Duration::from_secs(60),
        },
        AlertRule {
            alert_type: TaskFailure,
            severity: AlertSeverity::Medium,
            channels: vec![Log],
            enabled: true,
            cooldown_period: Duration::from_secs(60),
        },
        AlertRule {
            alert_type: RateLimitExceeded,
            severity: AlertSeverity::Medium,
            channels: vec![Log],
            enabled: true,
            cooldown_period: Duration::from_secs(120),
        },
        AlertRule {
            alert_type: DatabaseConnectionFailed,
            severity: AlertSeverity::Critical,
            channels: vec![Log, Webhook],
            enabled: true,
            cooldown_period: Duration::from_secs(60),
        },
        AlertRule {
            alert_type: ExternalServiceUnavailable,
            severity: AlertSeverity::High,
            channels: vec![Log, Webhook],
            enabled: true,
            cooldown_period: Duration::from_secs(300),
        },
        AlertRule {
            alert_type: ServiceDegraded,
            severity: AlertSeverity::Medium,
            channels: vec![Log],
            enabled: true,
            cooldown_period: Duration::from_secs(300),
        },
        AlertRule {
            alert_type: ServiceRecovered,
            severity: AlertSeverity::Low,
            channels: vec![Log],
            enabled: true,
            cooldown_period: Duration::from_secs(60),
        },
    ]
}

#[async_trait::async_trait]
pub trait AlertChannelHandler: Send + Sync {
    async fn send(&self, alert: &Alert) -> bool;
}

pub struct LogChannel;

#[async_trait::async_trait]
impl AlertChannelHandler for LogChannel {
    async fn send(&self, alert: &Alert) -> bool {
        match alert.severity {
            AlertSeverity::Critical | AlertSeverity::High => {
                error!(alert_type = ?alert.alert_type, service = ?alert.service_name, "{}", alert.message)
            }
            AlertSeverity::Medium => {
                warn!(alert_type = ?alert.alert_type, service = ?alert.service_name, "{}", alert.message)
            }
            AlertSeverity::Low => {
                info!(alert_type = ?alert.alert_type, service = ?alert.service_name, "{}", alert.message)
            }
        }
        true
    }
}

pub struct WebhookChannel {
    client: reqwest::Client,
    urls: Vec<String>,
}

impl WebhookChannel {
    pub fn new(urls: Vec<String>) -> Self {
        WebhookChannel {
            client: reqwest::Client::new(),
            urls,
        }
    }
}

#[async_trait::async_trait]
impl AlertChannelHandler for WebhookChannel {
    async fn send(&self, alert: &Alert) -> bool {
        if self.urls.is_empty() {
            return false;
        }
        let mut any_ok = false;
        for url in &self.urls {
            let res = self.client.post(url).json(alert).send().await;
            match res {
                Ok(resp) if resp.status().is_success() => any_ok = true,
                Ok(resp) => warn!(status = %resp.status(), url, "webhook alert delivery rejected"),
                Err(e) => warn!(error = %e, url, "webhook alert delivery failed"),
            }
        }
        any_ok
    }
}

pub struct EmailChannel;

#[async_trait::async_trait]
impl AlertChannelHandler for EmailChannel {
    async fn send(&self, _alert: &Alert) -> bool {
        warn!("email alert channel not configured; dropping alert");
        false
    }
}

struct RateLimitState {
    // (alert_type, service_key) -> timestamps within the last hour
    sent_at: HashMap<(AlertType, String), Vec<DateTime<Utc>>>,
    last_sent: HashMap<(AlertType, String), DateTime<Utc>>,
}

/// Dispatches alerts to configured rules/channels with rate limiting, cooldowns,
/// and a bounded history ring buffer.
pub struct AlertManager {
    rules: HashMap<AlertType, AlertRule>,
    max_alerts_per_hour: u32,
    log_channel: LogChannel,
    webhook_channel: WebhookChannel,
    email_channel: EmailChannel,
    history: Mutex<Vec<Alert>>,
    rate_limit: Mutex<RateLimitState>,
}

impl AlertManager {
    pub fn new(max_alerts_per_hour: u32, webhook_urls: Vec<String>) -> Self {
        let rules = default_rules()
            .into_iter()
            .map(|r| (r.alert_type, r))
            .collect();
        AlertManager {
            rules,
            max_alerts_per_hour,
            log_channel: LogChannel,
            webhook_channel: WebhookChannel::new(webhook_urls),
            email_channel: EmailChannel,
            history: Mutex::new(Vec::new()),
            rate_limit: Mutex::new(RateLimitState {
                sent_at: HashMap::new(),
                last_sent: HashMap::new(),
            }),
        }
    }

    fn service_key(service_name: &Option<String>) -> String {
        service_name.clone().unwrap_or_else(|| "global".to_string())
    }

    /// Evaluate rules, rate limit and cooldown, then fan out. Returns true if
    /// at least one channel accepted the alert.
    pub async fn dispatch(&self, alert: Alert) -> bool {
        let rule = match self.rules.get(&alert.alert_type) {
            Some(r) if r.enabled => r,
            _ => return false,
        };

        let key = (alert.alert_type, Self::service_key(&alert.service_name));
        let now = alert.timestamp;

        {
            let mut rl = self.rate_limit.lock().await;
            let window_start = now - chrono::Duration::hours(1);
            let entry = rl.sent_at.entry(key.clone()).or_default();
            entry.retain(|t| *t >= window_start);
            if entry.len() as u32 >= self.max_alerts_per_hour {
                warn!(alert_type = ?alert.alert_type, "alert rate limit exceeded, dropping");
                return false;
            }
            if let Some(last) = rl.last_sent.get(&key) {
                let since = now.signed_duration_since(*last);
                if since < chrono::Duration::from_std(rule.cooldown_period).unwrap_or_default() {
                    return false;
                }
            }
        }

        let mut any_ok = false;
        for channel in &rule.channels {
            let ok = match channel {
                AlertChannel::Log => self.log_channel.send(&alert).await,
                AlertChannel::Webhook => self.webhook_channel.send(&alert).await,
                AlertChannel::Email => self.email_channel.send(&alert).await,
            };
            any_ok = any_ok || ok;
        }

        if any_ok {
            let mut rl = self.rate_limit.lock().await;
            rl.sent_at.entry(key.clone()).or_default().push(now);
            rl.last_sent.insert(key, now);
            drop(rl);

            let mut history = self.history.lock().await;
            history.push(alert);
            if history.len() > HISTORY_HARD_CAP {
                let drain_to = history.len() - HISTORY_TRIM_TO;
                history.drain(0..drain_to);
            }
        }
        any_ok
    }

    pub async fn history(&self, limit: usize) -> Vec<Alert> {
        let history = self.history.lock().await;
        let start = history.len().saturating_sub(limit);
        history[start..].to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_alert(service: &str) -> Alert {
        Alert {
            alert_type: AlertType::TaskFailure,
            severity: AlertSeverity::Medium,
            message: "task failed".to_string(),
            details: json!({}),
            correlation_id: None,
            service_name: Some(service.to_string()),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn enforces_hourly_rate_limit_per_service() {
        let mgr = AlertManager::new(2, vec![]);
        assert!(mgr.dispatch(make_alert("svc")).await);
        // second alert is within cooldown window (60s) for TaskFailure rule, so it is dropped
        assert!(!mgr.dispatch(make_alert("svc")).await);
    }

    #[tokio::test]
    async fn history_is_retained_after_dispatch() {
        let mgr = AlertManager::new(100, vec![]);
        mgr.dispatch(make_alert("svc-a")).await;
        let hist = mgr.history(10).await;
        assert_eq!(hist.len(), 1);
    }
}
