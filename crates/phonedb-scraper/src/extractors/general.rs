use async_trait::async_trait;
use phonedb_core::{MarketplaceConfig, RawListing, SelectorStrategy};

use super::{settle, strategies_or, with_page_param, Extractor, ListingTemplate, Pacing};
use crate::error::ScraperError;
use crate::extract::{extract_cards, FieldSelectors};
use crate::session::{close_page, BrowserPage, Session, NAVIGATION_TIMEOUT};

pub(crate) const MAX_PAGES: u32 = 5;

const CONTAINERS: [&str; 8] = [
    ".card-container .o-announ",
    "article.o-announ",
    ".classified-card",
    "[data-id]",
    "a[href*=\"/annonce/\"]",
    ".css-1sw7q4x",
    "[class*=\"listing\"]",
    "[class*=\"card\"]",
];

const DEFAULT_SIGNATURES: [&str; 3] = ["captcha", "blocked", "Access Denied"];

pub(crate) const CLASSIFIED_FIELDS: FieldSelectors<'static> = FieldSelectors {
    title: ".card-title a, h3 a, .title, [class*=\"title\"]",
    price: ".price, [class*=\"price\"]",
    link: "a[href*=\"/annonce/\"], a",
    image: "img",
    image_attrs: &["src", "data-src", "data-lazy-src"],
    location: Some(".card-address, [class*=\"location\"], [class*=\"address\"]"),
};

/// Open classifieds search: up to five result pages, multi-strategy
/// selectors, stops on an empty page or an anti-bot wall.
pub struct GeneralSearch {
    name: String,
    catalog_marketplace: String,
    base_url: String,
    search_url: String,
    strategies: Vec<SelectorStrategy>,
    anti_bot_signatures: Vec<String>,
    max_pages: u32,
    pacing: Pacing,
}

enum PageOutcome {
    Listings(Vec<RawListing>),
    Blocked(String),
}

impl GeneralSearch {
    #[must_use]
    pub fn from_config(config: &MarketplaceConfig, pacing: Pacing) -> Self {
        let anti_bot_signatures = if config.anti_bot_signatures.is_empty() {
            DEFAULT_SIGNATURES.iter().map(|s| (*s).to_string()).collect()
        } else {
            config.anti_bot_signatures.clone()
        };
        Self {
            name: config.name.clone(),
            catalog_marketplace: config.catalog_marketplace().to_string(),
            base_url: config.base_url.clone(),
            search_url: config.search_url.clone(),
            strategies: strategies_or(&config.selector_strategies, &CONTAINERS),
            anti_bot_signatures,
            max_pages: MAX_PAGES,
            pacing,
        }
    }

    fn page_url(&self, page_num: u32) -> String {
        if page_num == 1 {
            self.search_url.clone()
        } else {
            with_page_param(&self.search_url, page_num)
        }
    }

    async fn scrape_page(
        &self,
        session: &Session,
        page: &dyn BrowserPage,
        url: &str,
    ) -> Result<PageOutcome, ScraperError> {
        session.goto(page, url, NAVIGATION_TIMEOUT).await?;
        settle(self.pacing.page_settle).await;

        let html = page.content().await?;
        tracing::debug!(marketplace = %self.name, url, bytes = html.len(), "page loaded");

        if let Some(signature) = self
            .anti_bot_signatures
            .iter()
            .find(|sig| html.contains(sig.as_str()))
        {
            return Ok(PageOutcome::Blocked(signature.clone()));
        }

        let extraction = extract_cards(&html, &self.strategies, &CLASSIFIED_FIELDS, &self.base_url)?;
        tracing::info!(
            marketplace = %self.name,
            selector = extraction.strategy.as_deref().unwrap_or("none"),
            elements = extraction.matched,
            "selector strategy result"
        );

        let template = ListingTemplate {
            marketplace: &self.catalog_marketplace,
            stock_level: 1,
            condition: None,
            seller_name: None,
            seller_type: None,
        };
        Ok(PageOutcome::Listings(
            extraction
                .cards
                .into_iter()
                .map(|card| template.build(card))
                .collect(),
        ))
    }
}

#[async_trait]
impl Extractor for GeneralSearch {
    fn marketplace(&self) -> &str {
        &self.name
    }

    async fn scrape(&self, session: &mut Session) -> Result<Vec<RawListing>, ScraperError> {
        let page = session.new_page().await?;
        let mut listings = Vec::new();

        for page_num in 1..=self.max_pages {
            let url = self.page_url(page_num);
            tracing::info!(marketplace = %self.name, page = page_num, "scraping search page");

            match self.scrape_page(session, page.as_ref(), &url).await {
                Ok(PageOutcome::Blocked(signature)) => {
                    tracing::warn!(
                        marketplace = %self.name,
                        page = page_num,
                        signature = %signature,
                        "anti-bot protection detected, stopping"
                    );
                    break;
                }
                Ok(PageOutcome::Listings(items)) if items.is_empty() => {
                    tracing::info!(marketplace = %self.name, page = page_num, "no listings on page");
                    break;
                }
                Ok(PageOutcome::Listings(items)) => {
                    tracing::info!(
                        marketplace = %self.name,
                        page = page_num,
                        items = items.len(),
                        "page scraped"
                    );
                    listings.extend(items);
                    if page_num < self.max_pages {
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
