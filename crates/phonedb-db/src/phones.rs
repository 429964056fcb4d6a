//! Database operations for the `phones` catalog table.

use chrono::{DateTime, Utc};
use phonedb_core::{Availability, Category, RawListing};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use crate::DbError;

const PHONE_COLUMNS: &str = "id, model, raw_title, brand, category, condition, price, currency, \
     image_url, source_url, marketplace_name, listing_count, stock_level, \
     availability_status, location, seller_name, seller_type, scraped_at, created_at, updated_at";

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `phones` table: one catalog entry per
/// (marketplace, fuzzy-distinct model).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PhoneRow {
    pub id: i64,
    pub model: String,
    pub raw_title: Option<String>,
    pub brand: String,
    pub category: String,
    pub condition: String,
    /// `NULL` when the listing carried no readable price.
    pub price: Option<Decimal>,
    pub currency: String,
    pub image_url: Option<String>,
    pub source_url: Option<String>,
    pub marketplace_name: String,
    pub listing_count: i32,
    pub stock_level: i32,
    pub availability_status: String,
    pub location: Option<String>,
    pub seller_name: Option<String>,
    pub seller_type: Option<String>,
    pub scraped_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Corrections produced by the classification cleanup pass. `None` leaves
/// the stored value alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhoneFix {
    pub category: Option<Category>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub availability: Option<Availability>,
}

impl PhoneFix {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.category.is_none()
            && self.brand.is_none()
            && self.model.is_none()
            && self.availability.is_none()
    }
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// Returns the phone with `id`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row matches, or [`DbError::Sqlx`]
/// if the query fails.
pub async fn get_phone(pool: &PgPool, id: i64) -> Result<PhoneRow, DbError> {
    sqlx::query_as::<_, PhoneRow>(&format!("SELECT {PHONE_COLUMNS} FROM phones WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}

/// Most recently created phones sharing exactly `brand` and `marketplace`,
/// newest first. `id DESC` breaks ties between rows created in the same
/// instant.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_recent_candidates(
    pool: &PgPool,
    brand: &str,
    marketplace: &str,
    limit: i64,
) -> Result<Vec<PhoneRow>, DbError> {
    let rows = sqlx::query_as::<_, PhoneRow>(&format!(
        "SELECT {PHONE_COLUMNS} FROM phones \
         WHERE brand = $1 AND marketplace_name = $2 \
         ORDER BY created_at DESC, id DESC \
         LIMIT $3"
    ))
    .bind(brand)
    .bind(marketplace)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Most recently created phones, optionally restricted to one marketplace.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_recent_phones(
    pool: &PgPool,
    marketplace: Option<&str>,
    limit: i64,
) -> Result<Vec<PhoneRow>, DbError> {
    let rows = sqlx::query_as::<_, PhoneRow>(&format!(
        "SELECT {PHONE_COLUMNS} FROM phones \
         WHERE ($1::text IS NULL OR marketplace_name = $1) \
         ORDER BY created_at DESC, id DESC \
         LIMIT $2"
    ))
    .bind(marketplace)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// Inserts a new catalog entry from a raw listing with `listing_count = 1`.
///
/// Returns the new row's `id`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_phone(conn: &mut PgConnection, item: &RawListing) -> Result<i64, DbError> {
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO phones \
             (model, raw_title, brand, category, condition, price, currency, image_url, \
              source_url, marketplace_name, listing_count, stock_level, availability_status, \
              location, seller_name, seller_type, scraped_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, \
                 $9, $10, 1, $11, $12, \
                 $13, $14, $15, NOW()) \
         RETURNING id",
    )
    .bind(&item.model)
    .bind(&item.raw_title)
    .bind(&item.brand)
    .bind(item.category.as_str())
    .bind(item.condition.as_str())
    .bind(item.price)
    .bind(&item.currency)
    .bind(&item.image_url)
    .bind(&item.source_url)
    .bind(&item.marketplace)
    .bind(item.stock_level)
    .bind(item.availability_status.as_str())
    .bind(&item.location)
    .bind(&item.seller_name)
    .bind(&item.seller_type)
    .fetch_one(&mut *conn)
    .await?;

    Ok(id)
}

/// Merges a matched observation into an existing catalog entry.
///
/// `price`, `image_url`, `source_url`, `stock_level` and
/// `availability_status` are replaced only when the incoming value is
/// non-null. `listing_count` always increases by one. The marketplace is
/// never touched.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if `id` does not exist, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn merge_into_phone(
    conn: &mut PgConnection,
    id: i64,
    item: &RawListing,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE phones SET \
             price               = COALESCE($1, price), \
             image_url           = COALESCE($2, image_url), \
             source_url          = COALESCE($3, source_url), \
             stock_level         = COALESCE($4, stock_level), \
             availability_status = COALESCE($5, availability_status), \
             listing_count       = listing_count + 1, \
             scraped_at          = NOW(), \
             updated_at          = NOW() \
         WHERE id = $6",
    )
    .bind(item.price)
    .bind(&item.image_url)
    .bind(&item.source_url)
    .bind(item.stock_level)
    .bind(item.availability_status.as_str())
    .bind(id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Applies classification corrections to one phone. An empty fix is a no-op.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if `id` does not exist, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn apply_phone_fix(pool: &PgPool, id: i64, fix: &PhoneFix) -> Result<(), DbError> {
    if fix.is_empty() {
        return Ok(());
    }

    let result = sqlx::query(
        "UPDATE phones SET \
             category            = COALESCE($1, category), \
             brand               = COALESCE($2, brand), \
             model               = COALESCE($3, model), \
             availability_status = COALESCE($4, availability_status), \
             updated_at          = NOW() \
         WHERE id = $5",
    )
    .bind(fix.category.map(Category::as_str))
    .bind(&fix.brand)
    .bind(&fix.model)
    .bind(fix.availability.map(Availability::as_str))
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}
