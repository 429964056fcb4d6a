//! Persistence seam for job records and the run audit trail.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use phonedb_db::{DbError, JobCompletion, ScrapingJobRow};
use sqlx::PgPool;
use uuid::Uuid;

/// Audit entry severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl LogLevel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Creates the job row if missing. Returns `true` when it was created.
    async fn ensure_job(
        &self,
        marketplace: &str,
        schedule_hours: u32,
        next_run: DateTime<Utc>,
    ) -> Result<bool, DbError>;

    /// Marks jobs left `running` by a previous process as failed.
    async fn reset_stale(&self) -> Result<u64, DbError>;

    async fn start(&self, marketplace: &str) -> Result<(), DbError>;

    async fn complete(&self, marketplace: &str, completion: &JobCompletion) -> Result<(), DbError>;

    async fn reschedule(
        &self,
        marketplace: &str,
        schedule_hours: u32,
        next_run: DateTime<Utc>,
    ) -> Result<(), DbError>;

    async fn list(&self) -> Result<Vec<ScrapingJobRow>, DbError>;

    async fn append_log(
        &self,
        marketplace: &str,
        run_id: Uuid,
        level: LogLevel,
        message: &str,
        details: &serde_json::Value,
    ) -> Result<(), DbError>;
}

/// [`JobStore`] backed by the `scraping_jobs` and `scraping_logs` tables.
#[derive(Debug, Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn hours_i32(hours: u32) -> i32 {
    i32::try_from(hours).unwrap_or(i32::MAX)
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn ensure_job(
        &self,
        marketplace: &str,
        schedule_hours: u32,
        next_run: DateTime<Utc>,
    ) -> Result<bool, DbError> {
        let (_, created) =
            phonedb_db::ensure_job(&self.pool, marketplace, hours_i32(schedule_hours), next_run)
                .await?;
        Ok(created)
    }

    async fn reset_stale(&self) -> Result<u64, DbError> {
        phonedb_db::reset_stale_running_jobs(&self.pool).await
    }

    async fn start(&self, marketplace: &str) -> Result<(), DbError> {
        phonedb_db::start_job(&self.pool, marketplace).await
    }

    async fn complete(&self, marketplace: &str, completion: &JobCompletion) -> Result<(), DbError> {
        phonedb_db::complete_job(&self.pool, marketplace, completion).await
    }

    async fn reschedule(
        &self,
        marketplace: &str,
        schedule_hours: u32,
        next_run: DateTime<Utc>,
    ) -> Result<(), DbError> {
        phonedb_db::update_job_schedule(&self.pool, marketplace, hours_i32(schedule_hours), next_run)
            .await
    }

    async fn list(&self) -> Result<Vec<ScrapingJobRow>, DbError> {
        phonedb_db::list_jobs(&self.pool).await
    }

    async fn append_log(
        &self,
        marketplace: &str,
        run_id: Uuid,
        level: LogLevel,
        message: &str,
        details: &serde_json::Value,
    ) -> Result<(), DbError> {
        let job = phonedb_db::get_job(&self.pool, marketplace)
            .await?
            .ok_or(DbError::NotFound)?;
        phonedb_db::insert_job_log(
            &self.pool,
            job.id,
            run_id,
            marketplace,
            level.as_str(),
            message,
            details,
        )
        .await?;
        Ok(())
    }
}
