use std::sync::Arc;
use std::time::Duration;

use newsdesk_core::{AppError, AppResult, Category, JobStatus};
use newsdesk_storage::Storage;
use tracing::{error, info, warn};

use crate::crawl::CrawlEngine;

/// A category has at most one `RUNNING` job at a time; job dispatch must
/// check-and-skip rather than let two jobs race for the same category.
const RATE_LIMIT_RETRY_FLOOR: Duration = Duration::from_secs(900);

pub struct JobRunner {
    storage: Storage,
    engine: Arc<CrawlEngine>,
    job_execution_timeout: Duration,
}

impl JobRunner {
    pub fn new(storage: Storage, engine: Arc<CrawlEngine>, job_execution_timeout: Duration) -> Self {
        JobRunner {
            storage,
            engine,
            job_execution_timeout,
        }
    }

    /// Whether `category_id` already has a `RUNNING` job — dispatchers must
    /// check this before creating a new one.
    pub async fn has_running_job(&self, category_id: i64) -> AppResult<bool> {
        self.storage.has_running_job_for_category(category_id).await
    }

    /// Runs one job end to end: loads category + validates, transitions
    /// `PENDING -> RUNNING`, invokes `CrawlEngine`, and resolves the
    /// terminal/retry status.
    pub async fn run_job(&self, category_id: i64, job_id: i64, cid: &str) -> AppResult<()> {
        let category = match self.storage.get_category_by_id(category_id).await? {
            Some(c) => c,
            None => {
                warn!(cid = %cid, category_id, "job references unknown category");
                self.storage
                    .update_job_status(job_id, JobStatus::Failed, None, None, Some("category not found"))
                    .await?;
                return Ok(());
            }
        };

        if !category.is_active {
            info!(cid = %cid, category_id, "category not active, completing job as no-op");
            self.storage
                .update_job_status(job_id, JobStatus::Completed, Some(0), Some(0), Some("not active"))
                .await?;
            return Ok(());
        }

        self.storage
            .update_job_status(job_id, JobStatus::Running, None, None, None)
            .await?;

        let outcome = tokio::time::timeout(
            self.job_execution_timeout,
            self.engine.crawl(&category, true, Some(job_id), cid),
        )
        .await;

        match outcome {
            Err(_elapsed) => {
                error!(cid = %cid, category_id, "job exceeded execution timeout");
                self.storage
                    .update_job_status(job_id, JobStatus::Failed, None, None, Some("job execution timed out"))
                    .await?;
            }
            Ok(Ok(result)) => {
                info!(cid = %cid, category_id, found = result.articles_found, saved = result.articles_saved, "job completed");
                self.storage
                    .update_job_status(
                        job_id,
                        JobStatus::Completed,
                        Some(result.articles_found),
                        Some(result.articles_saved),
                        None,
                    )
                    .await?;
            }
            Ok(Err(e)) => self.handle_failure(job_id, &category, e, cid).await?,
        }

        Ok(())
    }

    async fn handle_failure(
        &self,
        job_id: i64,
        category: &Category,
        err: AppError,
        cid: &str,
    ) -> AppResult<()> {
        match err {
            AppError::RateLimitExceeded { retry_after, message } => {
                let countdown = retry_after.unwrap_or(RATE_LIMIT_RETRY_FLOOR).max(RATE_LIMIT_RETRY_FLOOR);
                warn!(
                    cid = %cid,
                    category_id = category.id,
                    countdown_secs = countdown.as_secs(),
                    "job rate limited, returning to pending for later retry"
                );
                self.storage
                    .update_job_status(
                        job_id,
                        JobStatus::Pending,
                        None,
                        None,
                        Some(&format!("rate limited: {message}, retry in {}s", countdown.as_secs())),
                    )
                    .await?;
            }
            e if e.retryable() => {
                warn!(cid = %cid, category_id = category.id, error = %e, "retryable job failure, returning to pending");
                self.storage
                    .update_job_status(job_id, JobStatus::Pending, None, None, Some(&e.to_string()))
                    .await?;
            }
            e => {
                error!(cid = %cid, category_id = category.id, error = %e, "job failed permanently");
                self.storage
                    .update_job_status(job_id, JobStatus::Failed, None, None, Some(&e.to_string()))
                    .await?;
            }
        }
        Ok(())
    }
}
