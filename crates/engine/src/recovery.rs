use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use newsdesk_core::{
    Alert, AlertSeverity, AlertType, AppResult, FailurePattern, JobFailureAnalysis, RecoveryAction,
    RecoveryPlan,
};
use newsdesk_reliability::AlertManager;
use newsdesk_storage::Storage;
use tracing::{info, warn};

pub struct RecoveryConfig {
    pub max_retries: u32,
    pub escalation_threshold: u32,
    pub lookback_hours: i64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        RecoveryConfig {
            max_retries: 3,
            escalation_threshold: 5,
            lookback_hours: 24,
        }
    }
}

/// Classifies recent job failures per category and decides a
/// `RecoveryAction`, optionally executing it (`dry_run = false`).
pub struct RecoveryEngine {
    storage: Storage,
    alerts: Arc<AlertManager>,
    config: RecoveryConfig,
}

impl RecoveryEngine {
    pub fn new(storage: Storage, alerts: Arc<AlertManager>, config: RecoveryConfig) -> Self {
        RecoveryEngine { storage, alerts, config }
    }

    pub async fn run_automatic_recovery(&self, dry_run: bool, cid: &str) -> AppResult<Vec<RecoveryPlan>> {
        let since: DateTime<Utc> = Utc::now() - chrono::Duration::hours(self.config.lookback_hours);
        let failed_jobs = self.storage.get_failed_jobs_since(since).await?;

        let mut by_category: HashMap<i64, Vec<(i64, FailurePattern)>> = HashMap::new();
        for job in &failed_jobs {
            let pattern = FailurePattern::classify(job.error_message.as_deref().unwrap_or(""));
            by_category.entry(job.category_id).or_default().push((job.id, pattern));
        }

        let mut plans = Vec::with_capacity(by_category.len());
        for (category_id, entries) in by_category {
            let analysis = analyze(category_id, &entries);
            let plan = decide(&analysis, &self.config);
            info!(
                cid = %cid,
                category_id,
                action = ?plan.action,
                confidence = analysis.confidence_score,
                "recovery plan computed"
            );

            if !dry_run {
                self.execute(&plan, &analysis).await?;
            }
            plans.push(plan);
        }

        Ok(plans)
    }

    async fn execute(&self, plan: &RecoveryPlan, analysis: &JobFailureAnalysis) -> AppResult<()> {
        match plan.action {
            RecoveryAction::Escalate => {
                for job_id in &analysis.sample_job_ids {
                    self.storage.mark_for_manual_review(*job_id, &plan.reason).await?;
                }
                self.alerts
                    .dispatch(Alert {
                        alert_type: AlertType::TaskFailure,
                        severity: AlertSeverity::Critical,
                        message: plan.reason.clone(),
                        details: serde_json::json!({ "category_id": plan.category_id }),
                        correlation_id: None,
                        service_name: Some("recovery_engine".to_string()),
                        timestamp: Utc::now(),
                    })
                    .await;
            }
            RecoveryAction::DisableCategory => {
                let until = Utc::now() + chrono::Duration::hours(24);
                self.storage
                    .disable_category_temporarily(plan.category_id, &plan.reason, until)
                    .await?;
                self.alerts
                    .dispatch(Alert {
                        alert_type: AlertType::ServiceDegraded,
                        severity: AlertSeverity::High,
                        message: plan.reason.clone(),
                        details: serde_json::json!({ "category_id": plan.category_id, "disabled_until": until }),
                        correlation_id: None,
                        service_name: Some("recovery_engine".to_string()),
                        timestamp: Utc::now(),
                    })
                    .await;
            }
            RecoveryAction::RetryDelayed | RecoveryAction::RetryImmediately | RecoveryAction::NoAction => {
                warn!(category_id = plan.category_id, action = ?plan.action, "recovery plan is informational only");
            }
        }
        Ok(())
    }
}

fn analyze(category_id: i64, entries: &[(i64, FailurePattern)]) -> JobFailureAnalysis {
    let failure_count = entries.len() as u32;
    let mut pattern_counts: HashMap<String, u32> = HashMap::new();
    for (_, pattern) in entries {
        *pattern_counts.entry(pattern_key(*pattern).to_string()).or_insert(0) += 1;
    }

    let dominant_pattern = pattern_counts
        .iter()
        .max_by_key(|(_, count)| **count)
        .map(|(key, _)| pattern_from_key(key))
        .unwrap_or(FailurePattern::Unknown);

    let dominant_count = pattern_counts
        .get(pattern_key(dominant_pattern))
        .copied()
        .unwrap_or(0) as f64;

    let mut confidence = 0.5;
    confidence += (failure_count as f64 / 10.0).min(0.3);
    confidence += if matches!(dominant_pattern, FailurePattern::Unknown) {
        -0.1
    } else {
        0.2
    };
    if failure_count > 0 {
        confidence += (dominant_count / failure_count as f64) * 0.3;
    }
    let confidence_score = confidence.clamp(0.1, 1.0);

    let sample_job_ids = entries.iter().take(5).map(|(id, _)| *id).collect();

    JobFailureAnalysis {
        category_id,
        failure_count,
        dominant_pattern,
        pattern_counts,
        confidence_score,
        sample_job_ids,
    }
}

fn decide(analysis: &JobFailureAnalysis, config: &RecoveryConfig) -> RecoveryPlan {
    let category_id = analysis.category_id;
    let failure_count = analysis.failure_count;
    let pattern = analysis.dominant_pattern;

    let (action, reason) = if failure_count >= config.max_retries
        && matches!(pattern, FailurePattern::Authentication | FailurePattern::ServiceUnavailable)
    {
        (
            RecoveryAction::Escalate,
            format!("{failure_count} failures with dominant pattern {pattern:?}, exceeding max retries"),
        )
    } else if failure_count >= config.max_retries {
        (
            RecoveryAction::DisableCategory,
            format!("{failure_count} failures exceeded max retries, disabling for 24h"),
        )
    } else if matches!(
        pattern,
        FailurePattern::RateLimit | FailurePattern::Network | FailurePattern::ServiceUnavailable
    ) {
        (
            RecoveryAction::RetryDelayed,
            format!("transient pattern {pattern:?} observed {failure_count} times"),
        )
    } else if matches!(pattern, FailurePattern::Authentication | FailurePattern::Parsing)
        && failure_count >= config.escalation_threshold
    {
        (
            RecoveryAction::Escalate,
            format!("persistent {pattern:?} pattern across {failure_count} failures"),
        )
    } else if matches!(pattern, FailurePattern::Unknown) && failure_count >= config.escalation_threshold {
        (
            RecoveryAction::Escalate,
            format!("unclassified failures ({failure_count}) reached escalation threshold"),
        )
    } else if failure_count <= 2 {
        (RecoveryAction::RetryImmediately, format!("only {failure_count} failure(s), retrying immediately"))
    } else {
        (RecoveryAction::RetryDelayed, format!("{failure_count} failures, deferring retry"))
    };

    let delay_seconds = match action {
        RecoveryAction::RetryDelayed => Some(match pattern {
            FailurePattern::RateLimit => 1800 + 300 * failure_count as u64,
            _ => 300 + 60 * failure_count as u64,
        }),
        _ => None,
    };

    RecoveryPlan {
        category_id,
        action,
        delay_seconds,
        reason,
    }
}

fn pattern_key(pattern: FailurePattern) -> &'static str {
    match pattern {
        FailurePattern::RateLimit => "rate_limit",
        FailurePattern::Network => "network",
        FailurePattern::Parsing => "parsing",
        FailurePattern::Authentication => "authentication",
        FailurePattern::ServiceUnavailable => "service_unavailable",
        FailurePattern::Unknown => "unknown",
    }
}

fn pattern_from_key(key: &str) -> FailurePattern {
    match key {
        "rate_limit" => FailurePattern::RateLimit,
        "network" => FailurePattern::Network,
        "parsing" => FailurePattern::Parsing,
        "authentication" => FailurePattern::Authentication,
        "service_unavailable" => FailurePattern::ServiceUnavailable,
        _ => FailurePattern::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn few_failures_retry_immediately() {
        let entries = vec![(1, FailurePattern::Network)];
        let analysis = analyze(7, &entries);
        let plan = decide(&analysis, &RecoveryConfig::default());
        assert_eq!(plan.action, RecoveryAction::RetryImmediately);
    }

    #[test]
    fn max_retries_with_auth_pattern_escalates() {
        let entries = vec![
            (1, FailurePattern::Authentication),
            (2, FailurePattern::Authentication),
            (3, FailurePattern::Authentication),
        ];
        let analysis = analyze(7, &entries);
        let plan = decide(&analysis, &RecoveryConfig::default());
        assert_eq!(plan.action, RecoveryAction::Escalate);
    }

    #[test]
    fn max_retries_with_other_pattern_disables_category() {
        let entries = vec![
            (1, FailurePattern::Parsing),
            (2, FailurePattern::Parsing),
            (3, FailurePattern::Parsing),
        ];
        let analysis = analyze(7, &entries);
        let plan = decide(&analysis, &RecoveryConfig::default());
        assert_eq!(plan.action, RecoveryAction::DisableCategory);
    }

    #[test]
    fn rate_limit_pattern_retries_delayed_with_long_backoff() {
        let entries = vec![(1, FailurePattern::RateLimit), (2, FailurePattern::RateLimit)];
        let analysis = analyze(9, &entries);
        let plan = decide(&analysis, &RecoveryConfig::default());
        assert_eq!(plan.action, RecoveryAction::RetryDelayed);
        assert_eq!(plan.delay_seconds, Some(1800 + 300 * 2));
    }

    #[test]
    fn confidence_score_stays_within_bounds() {
        let entries: Vec<(i64, FailurePattern)> = (0..50).map(|i| (i, FailurePattern::Unknown)).collect();
        let analysis = analyze(3, &entries);
        assert!(analysis.confidence_score >= 0.1 && analysis.confidence_score <= 1.0);
    }
}
