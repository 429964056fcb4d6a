//! One scrape end to end: extract, persist, notify.

use std::sync::Arc;

use async_trait::async_trait;
use phonedb_core::{MarketplacesFile, ScrapingSettings};
use phonedb_scraper::{
    build_extractor, launcher_for, BrowserLauncher, Pacing, RunOutcome, ScrapeRun, Session,
};
use sqlx::PgPool;

use crate::error::SchedulerError;
use crate::manager::JobRunner;
use crate::notify::{LogNotifier, Notifier};

pub struct Pipeline {
    pool: PgPool,
    marketplaces: Arc<MarketplacesFile>,
    settings: ScrapingSettings,
    pacing: Pacing,
    notifier: Arc<dyn Notifier>,
    launcher: Option<Arc<dyn BrowserLauncher>>,
}

impl Pipeline {
    #[must_use]
    pub fn new(
        pool: PgPool,
        marketplaces: Arc<MarketplacesFile>,
        settings: ScrapingSettings,
    ) -> Self {
        Self {
            pool,
            marketplaces,
            settings,
            pacing: Pacing::default(),
            notifier: Arc::new(LogNotifier),
            launcher: None,
        }
    }

    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    #[must_use]
    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    /// Use `launcher` for every marketplace instead of the configured
    /// session backend.
    #[must_use]
    pub fn with_launcher(mut self, launcher: Arc<dyn BrowserLauncher>) -> Self {
        self.launcher = Some(launcher);
        self
    }

    #[must_use]
    pub fn marketplaces(&self) -> &MarketplacesFile {
        &self.marketplaces
    }

    /// Scrapes `name`, saves what was found and sends a notification.
    ///
    /// A scrape failure is not an error here; it comes back as a failed
    /// [`ScrapeRun`].
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::UnknownMarketplace`] if `name` is not in
    /// the marketplace table.
    pub async fn run_marketplace(&self, name: &str) -> Result<ScrapeRun, SchedulerError> {
        let config = self
            .marketplaces
            .get(name)
            .ok_or_else(|| SchedulerError::UnknownMarketplace(name.to_string()))?;

        tracing::info!(marketplace = name, "pipeline: starting");

        let extractor = build_extractor(config, self.pacing);
        let launcher = self
            .launcher
            .clone()
            .unwrap_or_else(|| launcher_for(config, &self.settings));
        let mut session = Session::new(launcher, &self.settings);

        let mut run = phonedb_scraper::run(extractor.as_ref(), &mut session).await;

        match &run.outcome {
            RunOutcome::Success(listings) => {
                tracing::info!(marketplace = name, items = listings.len(), "pipeline: saving listings");
                let summary = phonedb_db::save_scraped_data(&self.pool, listings, name).await;
                run.stats.new_listings = summary.new_listings;
                run.stats.updated_listings = summary.updated_listings;
                self.notifier.scrape_succeeded(&run).await;
            }
            RunOutcome::Failure(error) => {
                self.notifier.scrape_failed(name, error).await;
            }
        }

        Ok(run)
    }

    /// Runs every enabled marketplace one after another.
    pub async fn run_all(&self) -> Vec<ScrapeRun> {
        let names: Vec<String> = self.marketplaces.enabled().map(|m| m.name.clone()).collect();
        tracing::info!(count = names.len(), "pipeline: running all enabled marketplaces");

        let mut runs = Vec::with_capacity(names.len());
        for name in &names {
            let run = match self.run_marketplace(name).await {
                Ok(run) => run,
                Err(e) => {
                    tracing::error!(marketplace = %name, error = %e, "pipeline: run failed");
                    ScrapeRun::failed(name, e.to_string())
                }
            };
            runs.push(run);
        }
        runs
    }
}

#[async_trait]
impl JobRunner for Pipeline {
    async fn run(&self, marketplace: &str) -> ScrapeRun {
        match self.run_marketplace(marketplace).await {
            Ok(run) => run,
            Err(e) => ScrapeRun::failed(marketplace, e.to_string()),
        }
    }
}
