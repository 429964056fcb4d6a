//! Database operations for `scraping_jobs` and `scraping_logs`.
//!
//! A job row moves `idle|completed|failed -> running -> completed|failed`.
//! The `running` guard is enforced in SQL so a second start is rejected
//! even across processes.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

const JOB_COLUMNS: &str = "id, marketplace, status, schedule_frequency_hours, last_run, next_run, \
     items_scraped, duration_seconds, error_message, created_at, updated_at";

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `scraping_jobs` table. One per known marketplace.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ScrapingJobRow {
    pub id: i64,
    pub marketplace: String,
    /// One of `idle`, `running`, `completed`, `failed`.
    pub status: String,
    pub schedule_frequency_hours: i32,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: DateTime<Utc>,
    pub items_scraped: i32,
    pub duration_seconds: f64,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A row from the append-only `scraping_logs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct JobLogRow {
    pub id: i64,
    pub job_id: i64,
    /// Groups the entries written by one execution.
    pub run_id: Uuid,
    pub marketplace: String,
    pub level: String,
    pub message: String,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Outcome written when a running job finishes.
#[derive(Debug, Clone, PartialEq)]
pub struct JobCompletion {
    pub succeeded: bool,
    pub items_scraped: i32,
    pub duration_seconds: f64,
    pub error_message: Option<String>,
    pub next_run: DateTime<Utc>,
}

impl JobCompletion {
    #[must_use]
    pub fn status(&self) -> &'static str {
        if self.succeeded {
            "completed"
        } else {
            "failed"
        }
    }
}

// ---------------------------------------------------------------------------
// scraping_jobs operations
// ---------------------------------------------------------------------------

/// Creates the job row for `marketplace` in `idle` status if it does not
/// exist yet. An existing row is returned untouched.
///
/// Returns the row and whether it was created by this call.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert or fetch fails.
pub async fn ensure_job(
    pool: &PgPool,
    marketplace: &str,
    schedule_frequency_hours: i32,
    next_run: DateTime<Utc>,
) -> Result<(ScrapingJobRow, bool), DbError> {
    let inserted = sqlx::query_as::<_, ScrapingJobRow>(&format!(
        "INSERT INTO scraping_jobs (marketplace, status, schedule_frequency_hours, next_run) \
         VALUES ($1, 'idle', $2, $3) \
         ON CONFLICT (marketplace) DO NOTHING \
         RETURNING {JOB_COLUMNS}"
    ))
    .bind(marketplace)
    .bind(schedule_frequency_hours)
    .bind(next_run)
    .fetch_optional(pool)
    .await?;

    if let Some(row) = inserted {
        return Ok((row, true));
    }

    let existing = get_job(pool, marketplace).await?.ok_or(DbError::NotFound)?;
    Ok((existing, false))
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_job(pool: &PgPool, marketplace: &str) -> Result<Option<ScrapingJobRow>, DbError> {
    let row = sqlx::query_as::<_, ScrapingJobRow>(&format!(
        "SELECT {JOB_COLUMNS} FROM scraping_jobs WHERE marketplace = $1"
    ))
    .bind(marketplace)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// All job rows ordered by marketplace name.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_jobs(pool: &PgPool) -> Result<Vec<ScrapingJobRow>, DbError> {
    let rows = sqlx::query_as::<_, ScrapingJobRow>(&format!(
        "SELECT {JOB_COLUMNS} FROM scraping_jobs ORDER BY marketplace"
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Moves a job to `running` and clears the previous error.
///
/// # Errors
///
/// Returns [`DbError::InvalidJobTransition`] if the job is missing or
/// already running, or [`DbError::Sqlx`] if the update fails.
pub async fn start_job(pool: &PgPool, marketplace: &str) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE scraping_jobs \
         SET status = 'running', error_message = NULL, updated_at = NOW() \
         WHERE marketplace = $1 AND status <> 'running'",
    )
    .bind(marketplace)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidJobTransition {
            marketplace: marketplace.to_string(),
            expected: "not running",
        });
    }
    Ok(())
}

/// Records the end of a running job: status, `last_run = NOW()`, the next
/// fire time and run stats.
///
/// # Errors
///
/// Returns [`DbError::InvalidJobTransition`] if the job is not running,
/// or [`DbError::Sqlx`] if the update fails.
pub async fn complete_job(
    pool: &PgPool,
    marketplace: &str,
    completion: &JobCompletion,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE scraping_jobs SET \
             status           = $1, \
             last_run         = NOW(), \
             next_run         = $2, \
             items_scraped    = $3, \
             duration_seconds = $4, \
             error_message    = $5, \
             updated_at       = NOW() \
         WHERE marketplace = $6 AND status = 'running'",
    )
    .bind(completion.status())
    .bind(completion.next_run)
    .bind(completion.items_scraped)
    .bind(completion.duration_seconds)
    .bind(&completion.error_message)
    .bind(marketplace)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidJobTransition {
            marketplace: marketplace.to_string(),
            expected: "running",
        });
    }
    Ok(())
}

/// Persists a new interval and next fire time. Does not touch `status`, so
/// an in-flight run is unaffected.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the job does not exist, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn update_job_schedule(
    pool: &PgPool,
    marketplace: &str,
    schedule_frequency_hours: i32,
    next_run: DateTime<Utc>,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE scraping_jobs \
         SET schedule_frequency_hours = $1, next_run = $2, updated_at = NOW() \
         WHERE marketplace = $3",
    )
    .bind(schedule_frequency_hours)
    .bind(next_run)
    .bind(marketplace)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Marks jobs left `running` by a previous process as `failed`.
///
/// Returns the number of rows reset.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn reset_stale_running_jobs(pool: &PgPool) -> Result<u64, DbError> {
    let result = sqlx::query(
        "UPDATE scraping_jobs \
         SET status = 'failed', error_message = 'interrupted before completion', \
             updated_at = NOW() \
         WHERE status = 'running'",
    )
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

// ---------------------------------------------------------------------------
// scraping_logs operations
// ---------------------------------------------------------------------------

/// Appends an audit entry. Returns its `id`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_job_log(
    pool: &PgPool,
    job_id: i64,
    run_id: Uuid,
    marketplace: &str,
    level: &str,
    message: &str,
    details: &serde_json::Value,
) -> Result<i64, DbError> {
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO scraping_logs (job_id, run_id, marketplace, level, message, details) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING id",
    )
    .bind(job_id)
    .bind(run_id)
    .bind(marketplace)
    .bind(level)
    .bind(message)
    .bind(details)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Most recent audit entries for a marketplace, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_job_logs(
    pool: &PgPool,
    marketplace: &str,
    limit: i64,
) -> Result<Vec<JobLogRow>, DbError> {
    let rows = sqlx::query_as::<_, JobLogRow>(
        "SELECT id, job_id, run_id, marketplace, level, message, details, created_at \
         FROM scraping_logs WHERE marketplace = $1 \
         ORDER BY created_at DESC, id DESC \
         LIMIT $2",
    )
    .bind(marketplace)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_status_follows_outcome() {
        let mut completion = JobCompletion {
            succeeded: true,
            items_scraped: 12,
            duration_seconds: 3.5,
            error_message: None,
            next_run: Utc::now(),
        };
        assert_eq!(completion.status(), "completed");
        completion.succeeded = false;
        assert_eq!(completion.status(), "failed");
    }
}
