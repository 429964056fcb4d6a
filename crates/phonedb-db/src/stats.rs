//! Per-marketplace rollup in `marketplace_stats`.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MarketplaceStatsRow {
    pub marketplace_name: String,
    /// Cumulative count of listings saved across all runs.
    pub total_listings: i64,
    pub last_scraped_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// Adds `saved` to the marketplace's cumulative total and stamps
/// `last_scraped_at`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn record_marketplace_scrape(
    pool: &PgPool,
    marketplace: &str,
    saved: i64,
    scraped_at: DateTime<Utc>,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO marketplace_stats (marketplace_name, total_listings, last_scraped_at) \
         VALUES ($1, $2, $3) \
         ON CONFLICT (marketplace_name) DO UPDATE SET \
             total_listings  = marketplace_stats.total_listings + EXCLUDED.total_listings, \
             last_scraped_at = EXCLUDED.last_scraped_at, \
             updated_at      = NOW()",
    )
    .bind(marketplace)
    .bind(saved)
    .bind(scraped_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_marketplace_stats(
    pool: &PgPool,
    marketplace: &str,
) -> Result<Option<MarketplaceStatsRow>, DbError> {
    let row = sqlx::query_as::<_, MarketplaceStatsRow>(
        "SELECT marketplace_name, total_listings, last_scraped_at, updated_at \
         FROM marketplace_stats WHERE marketplace_name = $1",
    )
    .bind(marketplace)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}
