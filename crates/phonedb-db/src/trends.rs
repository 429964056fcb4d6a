//! Daily time series: `price_trends` and `phone_populations`.
//!
//! Both tables hold at most one row per (phone, marketplace, day). Repeated
//! writes on the same day merge into that row instead of adding another.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use crate::DbError;

/// A row from the `price_trends` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PriceTrendRow {
    pub id: i64,
    pub phone_id: i64,
    pub marketplace_name: String,
    /// Latest price observed that day.
    pub price: Decimal,
    pub recorded_date: NaiveDate,
    /// Number of observations merged into this row.
    pub observation_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A row from the `phone_populations` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PopulationRow {
    pub id: i64,
    pub phone_id: i64,
    pub marketplace_name: String,
    pub recorded_date: NaiveDate,
    pub total_listings: i32,
    pub stock_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Records today's price for a phone. A second write on the same day
/// overwrites the price and increments `observation_count`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn record_price_trend(
    conn: &mut PgConnection,
    phone_id: i64,
    marketplace: &str,
    price: Decimal,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO price_trends (phone_id, marketplace_name, price, recorded_date) \
         VALUES ($1, $2, $3, CURRENT_DATE) \
         ON CONFLICT (phone_id, marketplace_name, recorded_date) DO UPDATE SET \
             price             = EXCLUDED.price, \
             observation_count = price_trends.observation_count + 1, \
             updated_at        = NOW()",
    )
    .bind(phone_id)
    .bind(marketplace)
    .bind(price)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Adds one listing and `stock_count` units to today's population row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn record_population(
    conn: &mut PgConnection,
    phone_id: i64,
    marketplace: &str,
    stock_count: i32,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO phone_populations \
             (phone_id, marketplace_name, recorded_date, total_listings, stock_count) \
         VALUES ($1, $2, CURRENT_DATE, 1, $3) \
         ON CONFLICT (phone_id, marketplace_name, recorded_date) DO UPDATE SET \
             total_listings = phone_populations.total_listings + 1, \
             stock_count    = phone_populations.stock_count + EXCLUDED.stock_count, \
             updated_at     = NOW()",
    )
    .bind(phone_id)
    .bind(marketplace)
    .bind(stock_count)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Price history for a phone, oldest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_price_trends(pool: &PgPool, phone_id: i64) -> Result<Vec<PriceTrendRow>, DbError> {
    let rows = sqlx::query_as::<_, PriceTrendRow>(
        "SELECT id, phone_id, marketplace_name, price, recorded_date, observation_count, \
                created_at, updated_at \
         FROM price_trends WHERE phone_id = $1 \
         ORDER BY recorded_date ASC",
    )
    .bind(phone_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Population history for a phone, oldest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_populations(pool: &PgPool, phone_id: i64) -> Result<Vec<PopulationRow>, DbError> {
    let rows = sqlx::query_as::<_, PopulationRow>(
        "SELECT id, phone_id, marketplace_name, recorded_date, total_listings, stock_count, \
                created_at, updated_at \
         FROM phone_populations WHERE phone_id = $1 \
         ORDER BY recorded_date ASC",
    )
    .bind(phone_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
