//! Marketplace extraction state machines.
//!
//! Each variant implements [`Extractor`] and composes the shared session,
//! extraction, and normalization helpers. Page-level failures are logged and
//! the loop moves on; only session acquisition failures abort a scrape.

mod catalog;
mod feed;
mod general;
mod stores;

use std::time::Duration;

use async_trait::async_trait;
use phonedb_core::{
    Availability, Condition, ExtractorKind, MarketplaceConfig, RawListing, SelectorStrategy,
};

use crate::error::ScraperError;
use crate::extract::Card;
use crate::normalize::{
    clean_model_name, detect_category, detect_condition, extract_brand, normalize_price,
};
use crate::session::Session;

pub use catalog::PaginatedCatalog;
pub use feed::InfiniteFeed;
pub use general::GeneralSearch;
pub use stores::StoreCrawl;

const CURRENCY: &str = "DZD";

#[async_trait]
pub trait Extractor: Send + Sync {
    /// Job name this extractor runs under.
    fn marketplace(&self) -> &str;

    /// Collect listings using `session`. The caller owns session teardown.
    ///
    /// # Errors
    ///
    /// Returns an error only when the session itself cannot be acquired;
    /// per-page failures are absorbed.
    async fn scrape(&self, session: &mut Session) -> Result<Vec<RawListing>, ScraperError>;
}

/// Fixed waits inside the extraction loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    /// After loading a search or catalog page.
    pub page_settle: Duration,
    /// After loading a store page.
    pub store_settle: Duration,
    /// Between two stores.
    pub inter_store: Duration,
    /// After each scroll of an infinite feed.
    pub scroll_settle: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            page_settle: Duration::from_secs(5),
            store_settle: Duration::from_secs(3),
            inter_store: Duration::from_secs(5),
            scroll_settle: Duration::from_secs(3),
        }
    }
}

impl Pacing {
    #[must_use]
    pub fn immediate() -> Self {
        Self {
            page_settle: Duration::ZERO,
            store_settle: Duration::ZERO,
            inter_store: Duration::ZERO,
            scroll_settle: Duration::ZERO,
        }
    }
}

pub(crate) async fn settle(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}

/// Build the extractor configured for `config`.
#[must_use]
pub fn build_extractor(config: &MarketplaceConfig, pacing: Pacing) -> Box<dyn Extractor> {
    match config.extractor {
        ExtractorKind::GeneralSearch => Box::new(GeneralSearch::from_config(config, pacing)),
        ExtractorKind::StoreCrawl => Box::new(StoreCrawl::from_config(config, pacing)),
        ExtractorKind::PaginatedCatalog => Box::new(PaginatedCatalog::from_config(config)),
        ExtractorKind::InfiniteFeed => Box::new(InfiniteFeed::from_config(config, pacing)),
    }
}

/// Configured strategies, or `builtin` when none are configured.
pub(crate) fn strategies_or(
    configured: &[SelectorStrategy],
    builtin: &[&str],
) -> Vec<SelectorStrategy> {
    if configured.is_empty() {
        crate::extract::containers(builtin)
    } else {
        configured.to_vec()
    }
}

/// Append `page=N` to `url`.
pub(crate) fn with_page_param(url: &str, page: u32) -> String {
    let sep = if url.contains('?') { '&' } else { '?' };
    format!("{url}{sep}page={page}")
}

/// Fixed attributes stamped on every listing a given extractor emits.
pub(crate) struct ListingTemplate<'a> {
    pub marketplace: &'a str,
    pub stock_level: i32,
    /// `None` means detect from the title.
    pub condition: Option<Condition>,
    pub seller_name: Option<&'a str>,
    pub seller_type: Option<&'a str>,
}

impl ListingTemplate<'_> {
    pub(crate) fn build(&self, card: Card) -> RawListing {
        let Card {
            title,
            price_text,
            link,
            image,
            location,
        } = card;

        RawListing {
            model: clean_model_name(&title),
            brand: extract_brand(&title),
            category: detect_category(&title, ""),
            price: normalize_price(&price_text),
            currency: CURRENCY.to_string(),
            condition: self
                .condition
                .unwrap_or_else(|| detect_condition(&title, "")),
            image_url: image,
            source_url: link,
            marketplace: self.marketplace.to_string(),
            listing_count: 1,
            stock_level: self.stock_level,
            availability_status: Availability::InStock,
            location: location.filter(|l| !l.is_empty()),
            seller_name: self.seller_name.map(str::to_string),
            seller_type: self.seller_type.map(str::to_string),
            raw_title: title,
        }
    }
}
