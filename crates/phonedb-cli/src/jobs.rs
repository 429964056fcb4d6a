//! Job status and audit log listings.

use chrono::{DateTime, Utc};

fn fmt_time(at: Option<DateTime<Utc>>) -> String {
    at.map_or_else(|| "-".to_string(), |t| t.format("%Y-%m-%d %H:%M").to_string())
}

/// # Errors
///
/// Returns an error if the job table cannot be read.
pub(crate) async fn print_jobs(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let jobs = phonedb_db::list_jobs(pool).await?;
    if jobs.is_empty() {
        println!("no jobs yet; start the scheduler to create them");
        return Ok(());
    }

    println!(
        "{:<18} {:<10} {:>5} {:<17} {:<17} {:>6} {:>8}  error",
        "marketplace", "status", "every", "last run", "next run", "items", "secs"
    );
    for job in &jobs {
        println!(
            "{:<18} {:<10} {:>4}h {:<17} {:<17} {:>6} {:>8.1}  {}",
            job.marketplace,
            job.status,
            job.schedule_frequency_hours,
            fmt_time(job.last_run),
            fmt_time(Some(job.next_run)),
            job.items_scraped,
            job.duration_seconds,
            job.error_message.as_deref().unwrap_or("")
        );
    }

    for job in &jobs {
        if let Some(stats) = phonedb_db::get_marketplace_stats(pool, &job.marketplace).await? {
            println!(
                "{}: {} listings saved in total, last scraped {}",
                stats.marketplace_name,
                stats.total_listings,
                fmt_time(stats.last_scraped_at)
            );
        }
    }
    Ok(())
}

/// # Errors
///
/// Returns an error if the log table cannot be read.
pub(crate) async fn print_job_logs(
    pool: &sqlx::PgPool,
    marketplace: &str,
    limit: i64,
) -> anyhow::Result<()> {
    let logs = phonedb_db::list_job_logs(pool, marketplace, limit).await?;
    if logs.is_empty() {
        println!("no runs logged for {marketplace}");
        return Ok(());
    }
    for entry in &logs {
        println!(
            "{} [{}] {} {}",
            fmt_time(Some(entry.created_at)),
            entry.level,
            entry.message,
            entry.details
        );
    }
    Ok(())
}
