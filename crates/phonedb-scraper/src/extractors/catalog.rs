use async_trait::async_trait;
use phonedb_core::{Condition, MarketplaceConfig, RawListing, SelectorStrategy};

use super::{strategies_or, with_page_param, Extractor, ListingTemplate};
use crate::error::ScraperError;
use crate::extract::{extract_cards, has_enabled_control, FieldSelectors};
use crate::session::{close_page, BrowserPage, Session, NAVIGATION_TIMEOUT, SELECTOR_TIMEOUT};

const MAX_PAGES: u32 = 10;

const PRODUCT_GRID: &str = ".prd, article.prd";

const NEXT_PAGE: &str = "a[aria-label=\"Next Page\"]";

const CATALOG_FIELDS: FieldSelectors<'static> = FieldSelectors {
    title: ".name, .info h3 a",
    price: ".prc, .price",
    link: "a.core, a",
    image: "img.img",
    image_attrs: &["data-src", "src"],
    location: None,
};

/// Retail catalog with explicit pagination. Everything sold is new.
pub struct PaginatedCatalog {
    name: String,
    catalog_marketplace: String,
    base_url: String,
    search_url: String,
    strategies: Vec<SelectorStrategy>,
}

struct CatalogPage {
    listings: Vec<RawListing>,
    has_next: bool,
}

impl PaginatedCatalog {
    #[must_use]
    pub fn from_config(config: &MarketplaceConfig) -> Self {
        Self {
            name: config.name.clone(),
            catalog_marketplace: config.catalog_marketplace().to_string(),
            base_url: config.base_url.clone(),
            search_url: config.search_url.clone(),
            strategies: strategies_or(&config.selector_strategies, &[PRODUCT_GRID]),
        }
    }

    async fn scrape_page(
        &self,
        session: &Session,
        page: &dyn BrowserPage,
        url: &str,
    ) -> Result<CatalogPage, ScraperError> {
        session.goto(page, url, NAVIGATION_TIMEOUT).await?;
        page.wait_for_selector(PRODUCT_GRID, SELECTOR_TIMEOUT).await?;
        let html = page.content().await?;

        let extraction = extract_cards(&html, &self.strategies, &CATALOG_FIELDS, &self.base_url)?;
        let template = ListingTemplate {
            marketplace: &self.catalog_marketplace,
            stock_level: 5,
            condition: Some(Condition::New),
            seller_name: None,
            seller_type: None,
        };
        Ok(CatalogPage {
            listings: extraction
                .cards
                .into_iter()
                .map(|card| template.build(card))
                .collect(),
            has_next: has_enabled_control(&html, NEXT_PAGE)?,
        })
    }
}

#[async_trait]
impl Extractor for PaginatedCatalog {
    fn marketplace(&self) -> &str {
        &self.name
    }

    async fn scrape(&self, session: &mut Session) -> Result<Vec<RawListing>, ScraperError> {
        let page = session.new_page().await?;
        let mut listings = Vec::new();

        for page_num in 1..=MAX_PAGES {
            let url = with_page_param(&self.search_url, page_num);
            tracing::info!(marketplace = %self.name, page = page_num, "scraping catalog page");

            match self.scrape_page(session, page.as_ref(), &url).await {
                Ok(CatalogPage { listings: items, has_next }) => {
                    let found = items.len();
                    tracing::info!(marketplace = %self.name, page = page_num, items = found, "page scraped");
                    listings.extend(items);
                    if !has_next || found == 0 {
                        tracing::info!(marketplace = %self.name, page = page_num, "no more pages");
                        break;
                    }
                    if page_num < MAX_PAGES {
                        session.pause().await;
                    }
                }
                Err(e) => {
                    tracing::error!(marketplace = %self.name, page = page_num, error = %e, "page failed");
                }
            }
        }

        close_page(page.as_ref()).await;
        Ok(listings)
    }
}
