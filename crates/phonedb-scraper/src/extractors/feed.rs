use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use phonedb_core::{Credentials, MarketplaceConfig, RawListing, SelectorStrategy};

use super::{settle, strategies_or, Extractor, ListingTemplate, Pacing};
use crate::error::ScraperError;
use crate::extract::{extract_cards, FieldSelectors};
use crate::session::{close_page, BrowserPage, Session, NAVIGATION_TIMEOUT};

const MAX_SCROLLS: u32 = 20;

const LOGIN_URL: &str = "https://www.facebook.com/login";

const LOGIN_NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);

const SEARCH_QUERY: &str = "query=phone%20smartphone";

const CONTAINERS: [&str; 3] = [
    "div[data-testid=\"marketplace_feed\"] > div",
    "div[role=\"list\"] > div",
    "a[href*=\"/marketplace/item/\"]",
];

const FEED_FIELDS: FieldSelectors<'static> = FieldSelectors {
    title: "[role=\"heading\"], span > span",
    price: "span[aria-label*=\"Price\"]",
    link: "a[href*=\"/marketplace/item/\"]",
    image: "img",
    image_attrs: &["src"],
    location: None,
};

/// Authenticated infinite-scroll feed. Login is attempted once per run and a
/// failed login falls back to anonymous browsing.
pub struct InfiniteFeed {
    name: String,
    catalog_marketplace: String,
    base_url: String,
    search_url: String,
    login_url: String,
    strategies: Vec<SelectorStrategy>,
    credentials: Option<Credentials>,
    pacing: Pacing,
}

impl InfiniteFeed {
    #[must_use]
    pub fn from_config(config: &MarketplaceConfig, pacing: Pacing) -> Self {
        Self {
            name: config.name.clone(),
            catalog_marketplace: config.catalog_marketplace().to_string(),
            base_url: config.base_url.clone(),
            search_url: config.search_url.clone(),
            login_url: LOGIN_URL.to_string(),
            strategies: strategies_or(&config.selector_strategies, &CONTAINERS),
            credentials: config.credentials.clone(),
            pacing,
        }
    }

    #[must_use]
    pub fn with_login_url(mut self, login_url: impl Into<String>) -> Self {
        self.login_url = login_url.into();
        self
    }

    fn feed_url(&self) -> String {
        let sep = if self.search_url.contains('?') { '&' } else { '?' };
        format!("{}{sep}{SEARCH_QUERY}", self.search_url)
    }

    /// Returns `true` when the session is authenticated.
    async fn login(&self, session: &Session, page: &dyn BrowserPage) -> bool {
        let Some(credentials) = &self.credentials else {
            tracing::warn!(marketplace = %self.name, "credentials not configured, browsing anonymously");
            return false;
        };

        match self.try_login(session, page, credentials).await {
            Ok(()) => {
                tracing::info!(marketplace = %self.name, "logged in");
                true
            }
            Err(e) => {
                tracing::error!(marketplace = %self.name, error = %e, "login failed, browsing anonymously");
                false
            }
        }
    }

    async fn try_login(
        &self,
        session: &Session,
        page: &dyn BrowserPage,
        credentials: &Credentials,
    ) -> Result<(), ScraperError> {
        session.goto(page, &self.login_url, NAVIGATION_TIMEOUT).await?;
        page.type_into("#email", &credentials.email).await?;
        page.type_into("#pass", &credentials.password).await?;
        page.click("button[name=\"login\"]").await?;
        page.wait_for_navigation(LOGIN_NAVIGATION_TIMEOUT).await?;

        let landed = page.current_url().await?;
        if landed.contains("checkpoint") || landed.contains("login") {
            return Err(ScraperError::Navigation {
                url: landed,
                reason: "verification required or invalid credentials".to_string(),
            });
        }
        Ok(())
    }

    fn visible_listings(&self, html: &str) -> Result<Vec<RawListing>, ScraperError> {
        let extraction = extract_cards(html, &self.strategies, &FEED_FIELDS, &self.base_url)?;
        let template = ListingTemplate {
            marketplace: &self.catalog_marketplace,
            stock_level: 1,
            condition: None,
            seller_name: None,
            seller_type: None,
        };
        Ok(extraction
            .cards
            .into_iter()
            .filter(|card| card.link.is_some())
            .map(|card| template.build(card))
            .collect())
    }

    async fn crawl(
        &self,
        session: &Session,
        page: &dyn BrowserPage,
    ) -> Result<Vec<RawListing>, ScraperError> {
        let logged_in = self.login(session, page).await;
        tracing::info!(marketplace = %self.name, logged_in, "opening feed");

        session.goto(page, &self.feed_url(), NAVIGATION_TIMEOUT).await?;
        settle(self.pacing.page_settle).await;

        let mut listings: Vec<RawListing> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut previous_height = 0u64;

        for scroll in 1..=MAX_SCROLLS {
            tracing::info!(marketplace = %self.name, scroll, max = MAX_SCROLLS, "reading feed");

            match page.content().await.and_then(|html| self.visible_listings(&html)) {
                Ok(visible) => {
                    for listing in visible {
                        let key = listing.source_url.clone().unwrap_or_default();
                        if seen.insert(key) {
                            listings.push(listing);
                        }
                    }
                }
                Err(e) => {
                    tracing::error!(marketplace = %self.name, scroll, error = %e, "feed read failed");
                }
            }

            let height = page.scroll_height().await?;
            page.scroll_to_bottom().await?;
            settle(self.pacing.scroll_settle).await;

            if height == previous_height {
                tracing::info!(marketplace = %self.name, scroll, "reached bottom of feed");
                break;
            }
            previous_height = height;
            session.pause().await;
        }

        Ok(listings)
    }
}

#[async_trait]
impl Extractor for InfiniteFeed {
    fn marketplace(&self) -> &str {
        &self.name
    }

    async fn scrape(&self, session: &mut Session) -> Result<Vec<RawListing>, ScraperError> {
        let page = session.new_page().await?;
        let result = self.crawl(session, page.as_ref()).await;
        close_page(page.as_ref()).await;

        let listings = result?;
        tracing::info!(marketplace = %self.name, items = listings.len(), "feed scraping completed");
        Ok(listings)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use phonedb_core::{ExtractorKind, ScrapingSettings, SessionBackend};

    use super::*;
    use crate::testing::ScriptedLauncher;

    const SEARCH: &str = "https://www.facebook.com/marketplace/category/cell-phones";
    const LOGIN: &str = "https://fb.test/login";

    fn feed_url() -> String {
        format!("{SEARCH}?{SEARCH_QUERY}")
    }

    fn config(credentials: Option<Credentials>) -> MarketplaceConfig {
        MarketplaceConfig {
            name: "facebook".to_string(),
            extractor: ExtractorKind::InfiniteFeed,
            session: SessionBackend::Browser,
            base_url: "https://www.facebook.com".to_string(),
            search_url: SEARCH.to_string(),
            schedule_hours: 8,
            enabled: true,
            listing_marketplace: None,
            stores: vec![],
            selector_strategies: vec![],
            anti_bot_signatures: vec![],
            credentials,
        }
    }

    fn creds() -> Credentials {
        Credentials {
            email: "ops@example.dz".to_string(),
            password: "pw".to_string(),
        }
    }

    fn feed(items: &[(u32, &str)]) -> String {
        let cards: String = items
            .iter()
            .map(|(id, title)| {
                format!(
                    r#"<div><a href="/marketplace/item/{id}/"><span role="heading">{title}</span>
                       <span aria-label="Price">35 000 DA</span></a></div>"#
                )
            })
            .collect();
        format!(r#"<html><body><div role="list">{cards}</div></body></html>"#)
    }

    fn session(launcher: &Arc<ScriptedLauncher>) -> Session {
        let settings = ScrapingSettings {
            delay_min_ms: 0,
            delay_max_ms: 0,
            max_retries: 1,
            ..ScrapingSettings::default()
        };
        Session::new(launcher.clone(), &settings).with_backoff(0, 0)
    }

    #[tokio::test]
    async fn scrolls_until_height_stops_growing_and_dedups() {
        let frames = [
            feed(&[(1, "iPhone 11")]),
            feed(&[(1, "iPhone 11"), (2, "Samsung Galaxy S20")]),
            feed(&[(1, "iPhone 11"), (2, "Samsung Galaxy S20"), (3, "Pixel 6")]),
            feed(&[(4, "never reached")]),
        ];
        let frame_refs: Vec<&str> = frames.iter().map(String::as_str).collect();
        let launcher = Arc::new(
            ScriptedLauncher::new()
                .frames(&feed_url(), &frame_refs)
                .scroll_heights(&[1000, 2000, 2000, 3000]),
        );
        let extractor = InfiniteFeed::from_config(&config(None), Pacing::immediate());
        let listings = extractor.scrape(&mut session(&launcher)).await.unwrap();

        let brands: Vec<&str> = listings.iter().map(|l| l.brand.as_str()).collect();
        assert_eq!(brands, vec!["Apple", "Samsung", "Google"]);
        assert_eq!(
            listings[0].source_url.as_deref(),
            Some("https://www.facebook.com/marketplace/item/1/")
        );
    }

    #[tokio::test]
    async fn scroll_bound_is_twenty() {
        let heights: Vec<u64> = (1..=30).map(|h| h * 1000).collect();
        let launcher = Arc::new(
            ScriptedLauncher::new()
                .page(&feed_url(), &feed(&[(1, "Nokia 3310")]))
                .scroll_heights(&heights),
        );
        let extractor = InfiniteFeed::from_config(&config(None), Pacing::immediate());
        let listings = extractor.scrape(&mut session(&launcher)).await.unwrap();
        assert_eq!(listings.len(), 1);
    }

    #[tokio::test]
    async fn login_fills_form_when_credentials_present() {
        let launcher = Arc::new(
            ScriptedLauncher::new()
                .page(LOGIN, "<form></form>")
                .page(&feed_url(), &feed(&[(1, "Redmi 9")]))
                .login_redirect("https://www.facebook.com/"),
        );
        let extractor =
            InfiniteFeed::from_config(&config(Some(creds())), Pacing::immediate()).with_login_url(LOGIN);
        let listings = extractor.scrape(&mut session(&launcher)).await.unwrap();

        assert_eq!(listings.len(), 1);
        assert_eq!(
            launcher.typed(),
            vec![
                ("#email".to_string(), "ops@example.dz".to_string()),
                ("#pass".to_string(), "pw".to_string()),
            ]
        );
        assert_eq!(launcher.clicked(), vec!["button[name=\"login\"]".to_string()]);
    }

    #[tokio::test]
    async fn login_failure_is_not_fatal() {
        let launcher = Arc::new(
            ScriptedLauncher::new()
                .page(LOGIN, "<form></form>")
                .page(&feed_url(), &feed(&[(7, "Honor 90")]))
                .login_redirect("https://www.facebook.com/checkpoint/1"),
        );
        let extractor =
            InfiniteFeed::from_config(&config(Some(creds())), Pacing::immediate()).with_login_url(LOGIN);
        let listings = extractor.scrape(&mut session(&launcher)).await.unwrap();
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].brand, "Honor");
    }

    #[tokio::test]
    async fn anonymous_run_skips_login_page() {
        let launcher = Arc::new(ScriptedLauncher::new().page(&feed_url(), &feed(&[])));
        let extractor = InfiniteFeed::from_config(&config(None), Pacing::immediate()).with_login_url(LOGIN);
        let listings = extractor.scrape(&mut session(&launcher)).await.unwrap();
        assert!(listings.is_empty());
        assert_eq!(launcher.visits(LOGIN), 0);
        assert_eq!(launcher.page_close_count(), 1);
    }
}
