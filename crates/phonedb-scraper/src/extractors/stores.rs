use async_trait::async_trait;
use phonedb_core::{MarketplaceConfig, RawListing, SelectorStrategy, StoreConfig};

use super::general::CLASSIFIED_FIELDS;
use super::{settle, strategies_or, with_page_param, Extractor, ListingTemplate, Pacing};
use crate::error::ScraperError;
use crate::extract::extract_cards;
use crate::session::{close_page, BrowserPage, Session, NAVIGATION_TIMEOUT};

const MAX_PAGES_PER_STORE: u32 = 3;

const CONTAINERS: [&str; 4] = ["[class*=\"card\"]", ".o-announ", "article", "[data-id]"];

/// Shorter titles are navigation chrome, not listings.
const MIN_TITLE_CHARS: usize = 4;

/// Crawls a fixed list of curated storefronts, three pages each.
pub struct StoreCrawl {
    name: String,
    catalog_marketplace: String,
    base_url: String,
    stores: Vec<StoreConfig>,
    strategies: Vec<SelectorStrategy>,
    pacing: Pacing,
}

impl StoreCrawl {
    #[must_use]
    pub fn from_config(config: &MarketplaceConfig, pacing: Pacing) -> Self {
        Self {
            name: config.name.clone(),
            catalog_marketplace: config.catalog_marketplace().to_string(),
            base_url: config.base_url.clone(),
            stores: config.stores.clone(),
            strategies: strategies_or(&config.selector_strategies, &CONTAINERS),
            pacing,
        }
    }

    async fn scrape_store_page(
        &self,
        session: &Session,
        page: &dyn BrowserPage,
        store: &StoreConfig,
        url: &str,
    ) -> Result<Vec<RawListing>, ScraperError> {
        session.goto(page, url, NAVIGATION_TIMEOUT).await?;
        settle(self.pacing.store_settle).await;
        let html = page.content().await?;

        let extraction = extract_cards(&html, &self.strategies, &CLASSIFIED_FIELDS, &self.base_url)?;
        let template = ListingTemplate {
            marketplace: &self.catalog_marketplace,
            stock_level: 5,
            condition: None,
            seller_name: Some(&store.name),
            seller_type: Some("store"),
        };
        Ok(extraction
            .cards
            .into_iter()
            .filter(|card| card.title.chars().count() >= MIN_TITLE_CHARS)
            .map(|card| template.build(card))
            .collect())
    }

    async fn scrape_store(
        &self,
        session: &Session,
        page: &dyn BrowserPage,
        store: &StoreConfig,
    ) -> Vec<RawListing> {
        let mut listings = Vec::new();
        tracing::info!(marketplace = %self.name, store = %store.name, store_id = store.id, "scraping store");

        for page_num in 1..=MAX_PAGES_PER_STORE {
            let url = if page_num == 1 {
                store.url.clone()
            } else {
                with_page_param(&store.url, page_num)
            };

            match self.scrape_store_page(session, page, store, &url).await {
                Ok(items) if items.is_empty() => {
                    tracing::info!(store = %store.name, page = page_num, "no more items for store");
                    break;
                }
                Ok(items) => {
                    tracing::info!(store = %store.name, page = page_num, items = items.len(), "store page scraped");
                    listings.extend(items);
                    if page_num < MAX_PAGES_PER_STORE {
                        session.pause().await;
                    }
                }
                Err(e) => {
                    tracing::error!(store = %store.name, page = page_num, error = %e, "store page failed");
                    break;
                }
            }
        }

        listings
    }
}

#[async_trait]
impl Extractor for StoreCrawl {
    fn marketplace(&self) -> &str {
        &self.name
    }

    async fn scrape(&self, session: &mut Session) -> Result<Vec<RawListing>, ScraperError> {
        let page = session.new_page().await?;
        let mut listings = Vec::new();

        for (idx, store) in self.stores.iter().enumerate() {
            listings.extend(self.scrape_store(session, page.as_ref(), store).await);
            if idx + 1 < self.stores.len() {
                settle(self.pacing.inter_store).await;
            }
        }

        tracing::info!(marketplace = %self.name, items = listings.len(), "all stores scraped");
        close_page(page.as_ref()).await;
        Ok(listings)
    }
}
