//! Outbound run notifications.

use async_trait::async_trait;
use phonedb_scraper::ScrapeRun;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn scrape_succeeded(&self, run: &ScrapeRun);

    async fn scrape_failed(&self, marketplace: &str, error: &str);
}

/// Writes notifications to the structured log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn scrape_succeeded(&self, run: &ScrapeRun) {
        tracing::info!(
            marketplace = %run.marketplace,
            items = run.stats.items_scraped,
            duration_secs = run.stats.duration_secs,
            new = run.stats.new_listings,
            updated = run.stats.updated_listings,
            "notify: scraping completed"
        );
    }

    async fn scrape_failed(&self, marketplace: &str, error: &str) {
        tracing::error!(marketplace, error, "notify: scraping failed");
    }
}
