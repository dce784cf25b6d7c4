use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use newsdesk_core::{Alert, AlertSeverity, AlertType, AppResult, JobType};
use newsdesk_reliability::AlertManager;
use newsdesk_storage::Storage;
use tracing::{info, warn};
use uuid::Uuid;

use crate::job_runner::JobRunner;

pub struct SchedulerConfig {
    pub poll_interval: Duration,
    pub max_concurrent_jobs: usize,
    pub job_cleanup_days: i64,
    pub stuck_job_threshold_hours: i64,
}

/// Periodic sweep: dispatches due categories (bounded by
/// `max_concurrent_jobs`), cleans up old jobs, resets stuck ones, and emits
/// a health alert when any are found stuck.
pub struct Scheduler {
    storage: Storage,
    job_runner: Arc<JobRunner>,
    alerts: Arc<AlertManager>,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(storage: Storage, job_runner: Arc<JobRunner>, alerts: Arc<AlertManager>, config: SchedulerConfig) -> Self {
        Scheduler {
            storage,
            job_runner,
            alerts,
            config,
        }
    }

    /// Runs sweeps forever at `poll_interval`. Intended for the `schedule`
    /// CLI subcommand's foreground loop.
    pub async fn run_forever(&self) {
        loop {
            if let Err(e) = self.sweep_once().await {
                warn!(error = %e, "scheduler sweep failed");
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    pub async fn sweep_once(&self) -> AppResult<()> {
        self.dispatch_sweep().await?;
        // health must observe the stuck set before cleanup resets it back to PENDING
        self.health_sweep().await?;
        self.cleanup_sweep().await?;
        Ok(())
    }

    async fn dispatch_sweep(&self) -> AppResult<()> {
        let running = self.storage.count_running_jobs().await?;
        let mut capacity = self.config.max_concurrent_jobs.saturating_sub(running as usize);
        if capacity == 0 {
            return Ok(());
        }

        let due = self.storage.list_schedulable_categories().await?;
        for category in due {
            if capacity == 0 {
                break;
            }
            if self.job_runner.has_running_job(category.id).await? {
                continue;
            }

            let cid = Uuid::new_v4().to_string();
            let job = self
                .storage
                .create_job(category.id, JobType::Scheduled, &cid)
                .await?;

            let now = Utc::now();
            let interval_minutes = category.schedule_interval_minutes.unwrap_or(1440) as i64;
            let next_run = now + chrono::Duration::minutes(interval_minutes);
            self.storage
                .update_category_schedule(category.id, now, next_run)
                .await?;

            info!(cid = %cid, category = %category.name, job_id = job.id, "dispatching scheduled job");

            let job_runner = self.job_runner.clone();
            let category_id = category.id;
            let job_id = job.id;
            tokio::spawn(async move {
                if let Err(e) = job_runner.run_job(category_id, job_id, &cid).await {
                    warn!(cid = %cid, error = %e, "dispatched job returned an error");
                }
            });

            capacity -= 1;
        }

        Ok(())
    }

    async fn cleanup_sweep(&self) -> AppResult<()> {
        let deleted = self
            .storage
            .cleanup_jobs_older_than(self.config.job_cleanup_days)
            .await?;
        if deleted > 0 {
            info!(deleted, "cleaned up old completed/failed jobs");
        }

        let reset = self
            .storage
            .reset_stuck_jobs(self.config.stuck_job_threshold_hours)
            .await?;
        if reset > 0 {
            warn!(reset, "reset stuck running jobs back to pending");
        }

        Ok(())
    }

    async fn health_sweep(&self) -> AppResult<()> {
        let stuck = self
            .storage
            .get_stuck_jobs(self.config.stuck_job_threshold_hours)
            .await?;

        if !stuck.is_empty() {
            self.alerts
                .dispatch(Alert {
                    alert_type: AlertType::ServiceDegraded,
                    severity: AlertSeverity::Medium,
                    message: format!("{} job(s) stuck past the heartbeat threshold", stuck.len()),
                    details: serde_json::json!({ "stuck_job_ids": stuck.iter().map(|j| j.id).collect::<Vec<_>>() }),
                    correlation_id: None,
                    service_name: Some("scheduler".to_string()),
                    timestamp: Utc::now(),
                })
                .await;
        }

        Ok(())
    }
}
