//! Deduplication and persistence of scraped listings.
//!
//! Incoming listings are matched against recent catalog entries of the same
//! brand on the same marketplace. Identity never crosses marketplaces: the
//! same handset on two sites is two catalog entries.

use chrono::Utc;
use phonedb_core::RawListing;
use sqlx::PgPool;

use crate::phones::{insert_phone, list_recent_candidates, merge_into_phone, PhoneRow};
use crate::stats::record_marketplace_scrape;
use crate::trends::{record_population, record_price_trend};
use crate::DbError;

/// How many recent same-brand entries are considered for a match.
pub const CANDIDATE_LIMIT: i64 = 20;

/// A candidate matches when its ratio is strictly greater than this.
pub const SIMILARITY_THRESHOLD: u8 = 85;

/// Tally returned by [`save_scraped_data`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveSummary {
    pub new_listings: usize,
    pub updated_listings: usize,
    /// Items that hit a persistence error; counted in neither total above.
    pub failed: usize,
}

impl SaveSummary {
    #[must_use]
    pub fn saved(&self) -> usize {
        self.new_listings + self.updated_listings
    }
}

/// Lowercases, replaces every non-alphanumeric character with a space and
/// trims the ends.
fn preprocess(s: &str) -> Vec<char> {
    let mapped: String = s
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    mapped.to_lowercase().trim().chars().collect()
}

/// Length of the longest common subsequence of `a` and `b`.
fn lcs_len(a: &[char], b: &[char]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for &ca in a {
        for (j, &cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Case-insensitive similarity of two model strings on a 0–100 scale.
///
/// This is the Indel ratio `100 × (la + lb − indel) / (la + lb)`, where
/// insertions and deletions cost one and substitutions are not allowed.
/// Appending a suffix costs only the suffix length, so "Redmi Note" and
/// "Redmi Note 9" score 91. Either string being empty after preprocessing
/// scores 0.
#[must_use]
pub fn similarity_ratio(a: &str, b: &str) -> u8 {
    let (a, b) = (preprocess(a), preprocess(b));
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let total = a.len() + b.len();
    let matched = 2 * lcs_len(&a, &b);
    // round half up in integers
    let ratio = (200 * matched + total) / (2 * total);
    u8::try_from(ratio).unwrap_or(100)
}

/// First candidate, in the order given, whose ratio against `model` exceeds
/// [`SIMILARITY_THRESHOLD`]. A later candidate with a higher ratio is not
/// preferred.
#[must_use]
pub fn first_similar<'a>(model: &str, candidates: &'a [PhoneRow]) -> Option<&'a PhoneRow> {
    candidates
        .iter()
        .find(|candidate| similarity_ratio(model, &candidate.model) > SIMILARITY_THRESHOLD)
}

/// Looks up an existing catalog entry for `model` among the
/// [`CANDIDATE_LIMIT`] most recently created rows with the same `brand` and
/// `marketplace`, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the candidate query fails.
pub async fn find_similar_phone(
    pool: &PgPool,
    model: &str,
    brand: &str,
    marketplace: &str,
) -> Result<Option<PhoneRow>, DbError> {
    let candidates = list_recent_candidates(pool, brand, marketplace, CANDIDATE_LIMIT).await?;
    Ok(first_similar(model, &candidates).cloned())
}

/// Creates a catalog entry and today's time-series rows in one transaction.
///
/// Returns the new phone `id`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any write fails; nothing is persisted in
/// that case.
pub async fn create_phone(pool: &PgPool, item: &RawListing) -> Result<i64, DbError> {
    let mut tx = pool.begin().await?;

    let id = insert_phone(&mut *tx, item).await?;
    if let Some(price) = item.price {
        record_price_trend(&mut *tx, id, &item.marketplace, price).await?;
    }
    record_population(&mut *tx, id, &item.marketplace, item.stock_level).await?;

    tx.commit().await?;
    Ok(id)
}

/// Merges an observation into phone `id` and upserts today's time-series
/// rows in one transaction.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the phone vanished, or [`DbError::Sqlx`]
/// if any write fails; nothing is persisted in either case.
pub async fn update_phone(pool: &PgPool, id: i64, item: &RawListing) -> Result<(), DbError> {
    let mut tx = pool.begin().await?;

    merge_into_phone(&mut *tx, id, item).await?;
    if let Some(price) = item.price {
        record_price_trend(&mut *tx, id, &item.marketplace, price).await?;
    }
    record_population(&mut *tx, id, &item.marketplace, item.stock_level).await?;

    tx.commit().await?;
    Ok(())
}

async fn save_one(pool: &PgPool, item: &RawListing) -> Result<bool, DbError> {
    match find_similar_phone(pool, &item.model, &item.brand, &item.marketplace).await? {
        Some(existing) => {
            update_phone(pool, existing.id, item).await?;
            Ok(false)
        }
        None => {
            create_phone(pool, item).await?;
            Ok(true)
        }
    }
}

/// Persists a batch of listings scraped by `marketplace`.
///
/// Each item is matched or created independently; a failing item is logged
/// and skipped without affecting the rest. Afterwards the marketplace rollup
/// is advanced by the number of items saved.
pub async fn save_scraped_data(
    pool: &PgPool,
    items: &[RawListing],
    marketplace: &str,
) -> SaveSummary {
    let mut summary = SaveSummary::default();

    for item in items {
        match save_one(pool, item).await {
            Ok(true) => summary.new_listings += 1,
            Ok(false) => summary.updated_listings += 1,
            Err(e) => {
                summary.failed += 1;
                tracing::error!(
                    marketplace,
                    model = %item.model,
                    brand = %item.brand,
                    error = %e,
                    "failed to save listing"
                );
            }
        }
    }

    let saved = i64::try_from(summary.saved()).unwrap_or(i64::MAX);
    if let Err(e) = record_marketplace_scrape(pool, marketplace, saved, Utc::now()).await {
        tracing::error!(marketplace, error = %e, "failed to update marketplace stats");
    }

    tracing::info!(
        marketplace,
        new = summary.new_listings,
        updated = summary.updated_listings,
        failed = summary.failed,
        "listings saved"
    );
    summary
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn row(id: i64, model: &str) -> PhoneRow {
        let now = Utc::now();
        PhoneRow {
            id,
            model: model.to_string(),
            raw_title: None,
            brand: "Samsung".to_string(),
            category: "smartphone".to_string(),
            condition: "used".to_string(),
            price: None,
            currency: "DZD".to_string(),
            image_url: None,
            source_url: None,
            marketplace_name: "ouedkniss".to_string(),
            listing_count: 1,
            stock_level: 1,
            availability_status: "in_stock".to_string(),
            location: None,
            seller_name: None,
            seller_type: None,
            scraped_at: now,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn ratio_is_case_and_punctuation_insensitive() {
        assert_eq!(similarity_ratio("Galaxy S21", "galaxy s21"), 100);
        assert_eq!(similarity_ratio("iPhone 12-Pro", "iphone 12 pro"), 100);
        assert_eq!(similarity_ratio("abc", "xyz"), 0);
    }

    #[test]
    fn empty_input_scores_zero() {
        assert_eq!(similarity_ratio("", ""), 0);
        assert_eq!(similarity_ratio("Galaxy", "  --  "), 0);
    }

    #[test]
    fn suffix_variant_scores_on_indel_distance() {
        // 2 × 10 shared / 22 total -> 90.9
        assert_eq!(similarity_ratio("Redmi Note", "Redmi Note 9"), 91);
        // 2 × 10 shared / 26 total -> 76.9
        assert_eq!(similarity_ratio("Galaxy S21", "Galaxy S21 Ultra"), 77);
    }

    #[test]
    fn suffix_variant_merges_into_existing_entry() {
        let candidates = [row(4, "Redmi Note")];
        assert_eq!(first_similar("Redmi Note 9", &candidates).map(|r| r.id), Some(4));
    }

    #[test]
    fn ratio_boundary_around_threshold() {
        // 2 × 6 / 14 -> 85.7
        assert_eq!(similarity_ratio("abcdefg", "abcdefx"), 86);
        // 2 × 17 / 40 -> exactly 85
        let twenty = "a".repeat(20);
        let three_off = format!("{}xyz", "a".repeat(17));
        assert_eq!(similarity_ratio(&twenty, &three_off), 85);
        // 2 × 21 / 50 -> 84
        let twenty_five = "a".repeat(25);
        let four_off = format!("{}wxyz", "a".repeat(21));
        assert_eq!(similarity_ratio(&twenty_five, &four_off), 84);
        // 2 × 6 / 13 -> 92.3; a dropped character is one edit
        assert_eq!(similarity_ratio("abcdefg", "abcdef"), 92);
    }

    #[test]
    fn ratio_86_matches_and_84_does_not() {
        let at_86 = [row(1, "abcdefx")];
        assert_eq!(first_similar("abcdefg", &at_86).map(|r| r.id), Some(1));

        let at_84 = [row(2, &format!("{}wxyz", "a".repeat(21)))];
        assert!(first_similar(&"a".repeat(25), &at_84).is_none());
    }

    #[test]
    fn exactly_85_does_not_match() {
        let candidates = [row(3, &format!("{}xyz", "a".repeat(17)))];
        assert!(first_similar(&"a".repeat(20), &candidates).is_none());
    }

    #[test]
    fn first_match_wins_over_better_later_match() {
        // newest first: a close-enough match precedes an exact one
        let candidates = [
            row(10, "Galaxy S2"),
            row(11, "Galaxy S21 Ultra"),
            row(12, "Galaxy S21"),
        ];
        let hit = first_similar("Galaxy S21", &candidates).map(|r| r.id);
        assert_eq!(hit, Some(10));
    }

    #[test]
    fn no_candidates_means_no_match() {
        assert!(first_similar("Galaxy S21", &[]).is_none());
    }

    #[test]
    fn summary_saved_excludes_failures() {
        let summary = SaveSummary {
            new_listings: 2,
            updated_listings: 3,
            failed: 4,
        };
        assert_eq!(summary.saved(), 5);
    }
}
