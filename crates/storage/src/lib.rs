use chrono::{DateTime, Utc};
use newsdesk_core::{Article, AppError, AppResult, Category, CrawlJob, JobStatus, JobType};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::{info, warn};

/// Maps a `sqlx::Error` onto the tagged error model; every query in this
/// crate fails as a `DatabaseConnection` kind, matching the original's
/// treatment of Postgres errors as transient/retryable.
fn db_err(e: sqlx::Error) -> AppError {
    AppError::DatabaseConnection(e.to_string())
}

#[derive(Clone)]
pub struct Storage {
    pool: PgPool,
}

impl Storage {
    pub async fn new(database_url: &str) -> AppResult<Self> {
        Self::with_pool_size(database_url, 20).await
    }

    pub async fn with_pool_size(database_url: &str, max_connections: u32) -> AppResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(db_err)?;

        info!(max_connections, "connected to postgres");
        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> AppResult<()> {
        sqlx::raw_sql(include_str!("../migrations/001_init.sql"))
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        sqlx::raw_sql(include_str!("../migrations/002_jobs.sql"))
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        info!("migrations complete");
        Ok(())
    }

    pub async fn check_connectivity(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await.map_err(db_err)?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // --- Articles -----------------------------------------------------

    pub async fn get_article_by_url_hash(&self, url_hash: &str) -> AppResult<Option<Article>> {
        let row = sqlx::query(
            "SELECT id, title, content, author, publish_date, source_url, image_url, url_hash,
                    content_hash, first_seen, last_seen, keywords_matched, relevance_score
             FROM articles WHERE url_hash = $1",
        )
        .bind(url_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.map(article_from_row))
    }

    /// Inserts a new article. Fails with `Internal` if one with the same
    /// `url_hash` already exists — callers that want dedup semantics should
    /// go through `bulk_upsert_with_dedup`.
    pub async fn insert_article(&self, article: &Article) -> AppResult<Article> {
        let row = sqlx::query(
            "INSERT INTO articles (title, content, author, publish_date, source_url, image_url,
                                    url_hash, content_hash, keywords_matched, relevance_score)
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10)
             RETURNING id, title, content, author, publish_date, source_url, image_url, url_hash,
                       content_hash, first_seen, last_seen, keywords_matched, relevance_score",
        )
        .bind(&article.title)
        .bind(&article.content)
        .bind(&article.author)
        .bind(article.publish_date)
        .bind(&article.source_url)
        .bind(&article.image_url)
        .bind(&article.url_hash)
        .bind(&article.content_hash)
        .bind(&article.keywords_matched)
        .bind(article.relevance_score)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(article_from_row(row))
    }

    pub async fn update_article_last_seen(&self, article_id: i64) -> AppResult<()> {
        sqlx::query("UPDATE articles SET last_seen = now() WHERE id = $1")
            .bind(article_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Idempotent upsert of the (article, category) association row.
    pub async fn ensure_category_association(
        &self,
        article_id: i64,
        category_id: i64,
        relevance_score: Option<f64>,
        keyword_matched: Option<&str>,
        search_query_used: Option<&str>,
    ) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO article_category_associations
                 (article_id, category_id, relevance_score, keyword_matched, search_query_used)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (article_id, category_id) DO UPDATE SET
                 relevance_score = COALESCE(EXCLUDED.relevance_score, article_category_associations.relevance_score),
                 keyword_matched = COALESCE(EXCLUDED.keyword_matched, article_category_associations.keyword_matched),
                 search_query_used = COALESCE(EXCLUDED.search_query_used, article_category_associations.search_query_used)",
        )
        .bind(article_id)
        .bind(category_id)
        .bind(relevance_score.unwrap_or(0.0))
        .bind(keyword_matched)
        .bind(search_query_used)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    /// Upserts a batch of articles against `category_id` with dedup
    /// semantics: an existing `url_hash` only bumps `last_seen` and ensures
    /// the association; a new one inserts the row and creates the
    /// association. Duplicate `url_hash`es within the input batch itself are
    /// counted as `skipped` after the first occurrence (Postgres errors if a
    /// single `ON CONFLICT` statement touches the same row twice). Runs as
    /// two `UNNEST`-based set-oriented statements inside one transaction —
    /// one round trip for the articles, one for the associations — the same
    /// batching idiom `store_page` uses for headings/entities/links, instead
    /// of one round trip per article.
    pub async fn bulk_upsert_with_dedup(
        &self,
        articles: &[Article],
        category_id: i64,
        keyword_matched: Option<&str>,
        search_query_used: Option<&str>,
    ) -> AppResult<(i64, i64, i64)> {
        let mut seen = std::collections::HashSet::new();
        let mut skipped_count = 0i64;
        let deduped: Vec<&Article> = articles
            .iter()
            .filter(|a| {
                let first = seen.insert(a.url_hash.clone());
                if !first {
                    skipped_count += 1;
                }
                first
            })
            .collect();

        if deduped.is_empty() {
            return Ok((0, 0, skipped_count));
        }

        let titles: Vec<&str> = deduped.iter().map(|a| a.title.as_str()).collect();
        let contents: Vec<Option<&str>> = deduped.iter().map(|a| a.content.as_deref()).collect();
        let authors: Vec<Option<&str>> = deduped.iter().map(|a| a.author.as_deref()).collect();
        let publish_dates: Vec<Option<DateTime<Utc>>> = deduped.iter().map(|a| a.publish_date).collect();
        let source_urls: Vec<&str> = deduped.iter().map(|a| a.source_url.as_str()).collect();
        let image_urls: Vec<Option<&str>> = deduped.iter().map(|a| a.image_url.as_deref()).collect();
        let url_hashes: Vec<&str> = deduped.iter().map(|a| a.url_hash.as_str()).collect();
        let content_hashes: Vec<Option<&str>> = deduped.iter().map(|a| a.content_hash.as_deref()).collect();
        let keywords: Vec<&[String]> = deduped.iter().map(|a| a.keywords_matched.as_slice()).collect();
        let scores: Vec<f64> = deduped.iter().map(|a| a.relevance_score).collect();

        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let rows = sqlx::query(
            "INSERT INTO articles (title, content, author, publish_date, source_url, image_url,
                                    url_hash, content_hash, keywords_matched, relevance_score)
             SELECT * FROM UNNEST(
                 $1::text[], $2::text[], $3::text[], $4::timestamptz[], $5::text[], $6::text[],
                 $7::text[], $8::text[], $9::text[][], $10::double precision[])
             ON CONFLICT (url_hash) DO UPDATE SET last_seen = now()
             RETURNING id, url_hash, (xmax = 0) AS inserted",
        )
        .bind(&titles)
        .bind(&contents)
        .bind(&authors)
        .bind(&publish_dates)
        .bind(&source_urls)
        .bind(&image_urls)
        .bind(&url_hashes)
        .bind(&content_hashes)
        .bind(&keywords)
        .bind(&scores)
        .fetch_all(&mut *tx)
        .await
        .map_err(db_err)?;

        let mut article_id_by_hash: std::collections::HashMap<String, i64> = std::collections::HashMap::new();
        let (mut new_count, mut updated_count) = (0i64, 0i64);
        for row in &rows {
            let url_hash: String = row.try_get("url_hash").map_err(db_err)?;
            let id: i64 = row.try_get("id").map_err(db_err)?;
            let inserted: bool = row.try_get("inserted").map_err(db_err)?;
            if inserted {
                new_count += 1;
            } else {
                updated_count += 1;
            }
            article_id_by_hash.insert(url_hash, id);
        }

        let article_ids: Vec<i64> = deduped
            .iter()
            .map(|a| article_id_by_hash[&a.url_hash])
            .collect();
        let category_ids: Vec<i64> = std::iter::repeat(category_id).take(deduped.len()).collect();
        let assoc_scores: Vec<f64> = deduped.iter().map(|a| a.relevance_score).collect();
        let matched_repeat: Vec<Option<&str>> = std::iter::repeat(keyword_matched).take(deduped.len()).collect();
        let query_repeat: Vec<Option<&str>> = std::iter::repeat(search_query_used).take(deduped.len()).collect();

        sqlx::query(
            "INSERT INTO article_category_associations
                 (article_id, category_id, relevance_score, keyword_matched, search_query_used)
             SELECT * FROM UNNEST($1::bigint[], $2::bigint[], $3::double precision[], $4::text[], $5::text[])
             ON CONFLICT (article_id, category_id) DO UPDATE SET
                 relevance_score = EXCLUDED.relevance_score,
                 keyword_matched = COALESCE(EXCLUDED.keyword_matched, article_category_associations.keyword_matched),
                 search_query_used = COALESCE(EXCLUDED.search_query_used, article_category_associations.search_query_used)",
        )
        .bind(&article_ids)
        .bind(&category_ids)
        .bind(&assoc_scores)
        .bind(&matched_repeat)
        .bind(&query_repeat)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok((new_count, updated_count, skipped_count))
    }

    pub async fn count_articles(&self) -> AppResult<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM articles")
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.0)
    }

    // --- Categories -----------------------------------------------------

    pub async fn get_category_by_id(&self, id: i64) -> AppResult<Option<Category>> {
        let row = sqlx::query(
            "SELECT id, name, keywords, exclude_keywords, language, country, is_active,
                    schedule_enabled, schedule_interval_minutes, crawl_period,
                    last_scheduled_run_at, next_scheduled_run_at, disabled_until
             FROM categories WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(row.map(category_from_row))
    }

    pub async fn get_category_by_name(&self, name: &str) -> AppResult<Option<Category>> {
        let row = sqlx::query(
            "SELECT id, name, keywords, exclude_keywords, language, country, is_active,
                    schedule_enabled, schedule_interval_minutes, crawl_period,
                    last_scheduled_run_at, next_scheduled_run_at, disabled_until
             FROM categories WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(row.map(category_from_row))
    }

    pub async fn list_categories(&self) -> AppResult<Vec<Category>> {
        let rows = sqlx::query(
            "SELECT id, name, keywords, exclude_keywords, language, country, is_active,
                    schedule_enabled, schedule_interval_minutes, crawl_period,
                    last_scheduled_run_at, next_scheduled_run_at, disabled_until
             FROM categories ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.into_iter().map(category_from_row).collect())
    }

    /// Categories due for a scheduler sweep: enabled, active, past their next
    /// run time, and not currently disabled.
    pub async fn list_schedulable_categories(&self) -> AppResult<Vec<Category>> {
        let rows = sqlx::query(
            "SELECT id, name, keywords, exclude_keywords, language, country, is_active,
                    schedule_enabled, schedule_interval_minutes, crawl_period,
                    last_scheduled_run_at, next_scheduled_run_at, disabled_until
             FROM categories
             WHERE schedule_enabled = true
               AND is_active = true
               AND (next_scheduled_run_at IS NULL OR now() >= next_scheduled_run_at)
               AND (disabled_until IS NULL OR now() >= disabled_until)
             ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.into_iter().map(category_from_row).collect())
    }

    pub async fn insert_category(&self, category: &Category) -> AppResult<Category> {
        let row = sqlx::query(
            "INSERT INTO categories (name, keywords, exclude_keywords, language, country,
                                      is_active, schedule_enabled, schedule_interval_minutes, crawl_period)
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9)
             RETURNING id, name, keywords, exclude_keywords, language, country, is_active,
                       schedule_enabled, schedule_interval_minutes, crawl_period,
                       last_scheduled_run_at, next_scheduled_run_at, disabled_until",
        )
        .bind(&category.name)
        .bind(&category.keywords)
        .bind(&category.exclude_keywords)
        .bind(&category.language)
        .bind(&category.country)
        .bind(category.is_active)
        .bind(category.schedule_enabled)
        .bind(category.schedule_interval_minutes.map(|m| m as i32))
        .bind(&category.crawl_period)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(category_from_row(row))
    }

    /// Marks a category unschedulable until `until`, matching the
    /// `DISABLE_CATEGORY` recovery action. `reason` is logged, not stored —
    /// there is no dedicated column for it.
    pub async fn disable_category_temporarily(
        &self,
        id: i64,
        reason: &str,
        until: DateTime<Utc>,
    ) -> AppResult<()> {
        warn!(category_id = id, reason, until = %until, "disabling category temporarily");
        sqlx::query("UPDATE categories SET disabled_until = $2 WHERE id = $1")
            .bind(id)
            .bind(until)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    pub async fn update_category_schedule(
        &self,
        id: i64,
        last_run: DateTime<Utc>,
        next_run: DateTime<Utc>,
    ) -> AppResult<()> {
        sqlx::query(
            "UPDATE categories SET last_scheduled_run_at = $2, next_scheduled_run_at = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(last_run)
        .bind(next_run)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    pub async fn count_categories(&self) -> AppResult<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM categories")
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.0)
    }

    // --- Jobs -----------------------------------------------------------

    pub async fn create_job(
        &self,
        category_id: i64,
        job_type: JobType,
        correlation_id: &str,
    ) -> AppResult<CrawlJob> {
        let job_type_str = match job_type {
            JobType::Scheduled => "SCHEDULED",
            JobType::OnDemand => "ON_DEMAND",
        };
        let row = sqlx::query(
            "INSERT INTO crawl_jobs (category_id, job_type, status, correlation_id)
             VALUES ($1, $2, $3, $4)
             RETURNING id, category_id, job_type, status, created_at, started_at, completed_at,
                       articles_found, articles_saved, error_message, correlation_id, task_id,
                       priority, metadata",
        )
        .bind(category_id)
        .bind(job_type_str)
        .bind(JobStatus::Pending.as_db_str())
        .bind(correlation_id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        job_from_row(row)
    }

    pub async fn get_job(&self, id: i64) -> AppResult<Option<CrawlJob>> {
        let row = sqlx::query(
            "SELECT id, category_id, job_type, status, created_at, started_at, completed_at,
                    articles_found, articles_saved, error_message, correlation_id, task_id,
                    priority, metadata
             FROM crawl_jobs WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.map(job_from_row).transpose()
    }

    /// Transitions `status`, stamping `updated_at` always, `started_at` on
    /// the first move into `RUNNING`, and `completed_at` on any terminal
    /// status. Optional counts/error message are set when provided.
    pub async fn update_job_status(
        &self,
        id: i64,
        status: JobStatus,
        articles_found: Option<i64>,
        articles_saved: Option<i64>,
        error_message: Option<&str>,
    ) -> AppResult<()> {
        let is_running = matches!(status, JobStatus::Running);
        let is_terminal = matches!(
            status,
            JobStatus::Completed | JobStatus::Failed | JobStatus::ManualReview
        );

        sqlx::query(
            "UPDATE crawl_jobs SET
                 status = $2,
                 updated_at = now(),
                 started_at = CASE WHEN $3 AND started_at IS NULL THEN now() ELSE started_at END,
                 completed_at = CASE WHEN $4 THEN now() ELSE completed_at END,
                 articles_found = COALESCE($5, articles_found),
                 articles_saved = COALESCE($6, articles_saved),
                 error_message = COALESCE($7, error_message)
             WHERE id = $1",
        )
        .bind(id)
        .bind(status.as_db_str())
        .bind(is_running)
        .bind(is_terminal)
        .bind(articles_found)
        .bind(articles_saved)
        .bind(error_message)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    /// Touches `updated_at` without changing status; the heartbeat a
    /// long-running job emits at step boundaries so the stuck-job sweep
    /// doesn't reclaim it mid-flight.
    pub async fn heartbeat_job(&self, id: i64) -> AppResult<()> {
        sqlx::query("UPDATE crawl_jobs SET updated_at = now() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    pub async fn mark_for_manual_review(&self, id: i64, reason: &str) -> AppResult<()> {
        sqlx::query(
            "UPDATE crawl_jobs SET status = $2, error_message = $3, updated_at = now(), completed_at = now()
             WHERE id = $1",
        )
        .bind(id)
        .bind(JobStatus::ManualReview.as_db_str())
        .bind(reason)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    pub async fn get_failed_jobs_since(&self, since: DateTime<Utc>) -> AppResult<Vec<CrawlJob>> {
        let rows = sqlx::query(
            "SELECT id, category_id, job_type, status, created_at, started_at, completed_at,
                    articles_found, articles_saved, error_message, correlation_id, task_id,
                    priority, metadata
             FROM crawl_jobs WHERE status = $1 AND updated_at >= $2
             ORDER BY updated_at DESC",
        )
        .bind(JobStatus::Failed.as_db_str())
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.into_iter().map(job_from_row).collect()
    }

    pub async fn get_stuck_jobs(&self, threshold_hours: i64) -> AppResult<Vec<CrawlJob>> {
        let rows = sqlx::query(
            "SELECT id, category_id, job_type, status, created_at, started_at, completed_at,
                    articles_found, articles_saved, error_message, correlation_id, task_id,
                    priority, metadata
             FROM crawl_jobs
             WHERE status = $1 AND updated_at < now() - make_interval(hours => $2)
             ORDER BY updated_at",
        )
        .bind(JobStatus::Running.as_db_str())
        .bind(threshold_hours as i32)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.into_iter().map(job_from_row).collect()
    }

    /// Resets `RUNNING` jobs with no heartbeat in `threshold_hours` back to
    /// `PENDING` so the scheduler picks them up again. Returns the count reset.
    pub async fn reset_stuck_jobs(&self, threshold_hours: i64) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE crawl_jobs SET status = $1, updated_at = now()
             WHERE status = $2 AND updated_at < now() - make_interval(hours => $3)",
        )
        .bind(JobStatus::Pending.as_db_str())
        .bind(JobStatus::Running.as_db_str())
        .bind(threshold_hours as i32)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(result.rows_affected())
    }

    /// Deletes completed/failed jobs older than `days`. Returns the count deleted.
    pub async fn cleanup_jobs_older_than(&self, days: i64) -> AppResult<u64> {
        let result = sqlx::query(
            "DELETE FROM crawl_jobs
             WHERE status IN ($1, $2) AND completed_at < now() - make_interval(days => $3)",
        )
        .bind(JobStatus::Completed.as_db_str())
        .bind(JobStatus::Failed.as_db_str())
        .bind(days as i32)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(result.rows_affected())
    }

    pub async fn count_jobs_by_status(&self) -> AppResult<Vec<(String, i64)>> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM crawl_jobs GROUP BY status ORDER BY status")
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?;
        Ok(rows)
    }

    /// Total `RUNNING` jobs across all categories, for the scheduler's
    /// `MAX_CONCURRENT_JOBS` cap.
    pub async fn count_running_jobs(&self) -> AppResult<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM crawl_jobs WHERE status = $1")
            .bind(JobStatus::Running.as_db_str())
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.0)
    }

    /// Whether `category_id` already has a `RUNNING` job, enforcing the
    /// one-running-job-per-category serialization rule.
    pub async fn has_running_job_for_category(&self, category_id: i64) -> AppResult<bool> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM crawl_jobs WHERE category_id = $1 AND status = $2")
                .bind(category_id)
                .bind(JobStatus::Running.as_db_str())
                .fetch_one(&self.pool)
                .await
                .map_err(db_err)?;
        Ok(row.0 > 0)
    }
}

fn article_from_row(row: sqlx::postgres::PgRow) -> Article {
    Article {
        id: row.try_get("id").ok(),
        title: row.try_get("title").unwrap_or_default(),
        content: row.try_get("content").ok().flatten(),
        author: row.try_get("author").ok().flatten(),
        publish_date: row.try_get("publish_date").ok().flatten(),
        source_url: row.try_get("source_url").unwrap_or_default(),
        image_url: row.try_get("image_url").ok().flatten(),
        url_hash: row.try_get("url_hash").unwrap_or_default(),
        content_hash: row.try_get("content_hash").ok().flatten(),
        first_seen: row.try_get("first_seen").ok(),
        last_seen: row.try_get("last_seen").ok(),
        keywords_matched: row.try_get("keywords_matched").unwrap_or_default(),
        relevance_score: row.try_get("relevance_score").unwrap_or_default(),
    }
}

fn category_from_row(row: sqlx::postgres::PgRow) -> Category {
    Category {
        id: row.try_get("id").unwrap_or_default(),
        name: row.try_get("name").unwrap_or_default(),
        keywords: row.try_get("keywords").unwrap_or_default(),
        exclude_keywords: row.try_get("exclude_keywords").unwrap_or_default(),
        language: row.try_get("language").unwrap_or_default(),
        country: row.try_get("country").unwrap_or_default(),
        is_active: row.try_get("is_active").unwrap_or_default(),
        schedule_enabled: row.try_get("schedule_enabled").unwrap_or_default(),
        schedule_interval_minutes: row
            .try_get::<Option<i32>, _>("schedule_interval_minutes")
            .ok()
            .flatten()
            .map(|m| m as u32),
        crawl_period: row.try_get("crawl_period").ok().flatten(),
        last_scheduled_run_at: row.try_get("last_scheduled_run_at").ok().flatten(),
        next_scheduled_run_at: row.try_get("next_scheduled_run_at").ok().flatten(),
        disabled_until: row.try_get("disabled_until").ok().flatten(),
    }
}

fn job_from_row(row: sqlx::postgres::PgRow) -> AppResult<CrawlJob> {
    let job_type_str: String = row.try_get("job_type").map_err(db_err)?;
    let job_type = match job_type_str.as_str() {
        "SCHEDULED" => JobType::Scheduled,
        _ => JobType::OnDemand,
    };
    let status_str: String = row.try_get("status").map_err(db_err)?;
    let status = JobStatus::from_db_str(&status_str)
        .ok_or_else(|| AppError::Internal(format!("unknown job status in database: {status_str}")))?;

    Ok(CrawlJob {
        id: row.try_get("id").map_err(db_err)?,
        category_id: row.try_get("category_id").map_err(db_err)?,
        job_type,
        status,
        created_at: row.try_get("created_at").map_err(db_err)?,
        started_at: row.try_get("started_at").ok().flatten(),
        completed_at: row.try_get("completed_at").ok().flatten(),
        articles_found: row.try_get("articles_found").unwrap_or_default(),
        articles_saved: row.try_get("articles_saved").unwrap_or_default(),
        error_message: row.try_get("error_message").ok().flatten(),
        correlation_id: row.try_get("correlation_id").unwrap_or_default(),
        task_id: row.try_get("task_id").ok().flatten(),
        priority: row.try_get("priority").unwrap_or_default(),
        metadata: row.try_get("metadata").unwrap_or(serde_json::Value::Null),
    })
}
