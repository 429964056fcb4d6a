//! The `run()` boundary: times a scrape, always tears the session down, and
//! turns every failure into a [`ScrapeRun`] value.

use std::sync::Arc;
use std::time::Instant;

use phonedb_core::{MarketplaceConfig, RawListing, ScrapingSettings, SessionBackend};

use crate::chrome::ChromeLauncher;
use crate::extractors::Extractor;
use crate::http_session::HttpLauncher;
use crate::session::{BrowserLauncher, Session};

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Success(Vec<RawListing>),
    Failure(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunStats {
    pub items_scraped: usize,
    pub duration_secs: f64,
    /// Filled in by the pipeline after persistence.
    pub new_listings: usize,
    pub updated_listings: usize,
}

/// Result of one extractor run.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapeRun {
    pub marketplace: String,
    pub outcome: RunOutcome,
    pub stats: RunStats,
}

impl ScrapeRun {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, RunOutcome::Success(_))
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            RunOutcome::Failure(message) => Some(message),
            RunOutcome::Success(_) => None,
        }
    }

    /// A failed run that never reached an extractor.
    #[must_use]
    pub fn failed(marketplace: &str, error: impl Into<String>) -> Self {
        Self {
            marketplace: marketplace.to_string(),
            outcome: RunOutcome::Failure(error.into()),
            stats: RunStats::default(),
        }
    }
}

/// Session backend configured for `config`.
#[must_use]
pub fn launcher_for(
    config: &MarketplaceConfig,
    settings: &ScrapingSettings,
) -> Arc<dyn BrowserLauncher> {
    match config.session {
        SessionBackend::Browser => Arc::new(ChromeLauncher::new(settings)),
        SessionBackend::Http => Arc::new(HttpLauncher::new(settings)),
    }
}

/// Run `extractor` to completion. The session is closed on every path.
pub async fn run(extractor: &dyn Extractor, session: &mut Session) -> ScrapeRun {
    let marketplace = extractor.marketplace().to_string();
    let started = Instant::now();
    tracing::info!(marketplace = %marketplace, "starting scrape");

    let result = extractor.scrape(session).await;
    session.close().await;
    let duration_secs = started.elapsed().as_secs_f64();

    match result {
        Ok(listings) => {
            tracing::info!(
                marketplace = %marketplace,
                items = listings.len(),
                duration_secs,
                "scrape completed"
            );
            ScrapeRun {
                marketplace,
                stats: RunStats {
                    items_scraped: listings.len(),
                    duration_secs,
                    ..RunStats::default()
                },
                outcome: RunOutcome::Success(listings),
            }
        }
        Err(e) => {
            tracing::error!(marketplace = %marketplace, error = %e, duration_secs, "scrape failed");
            ScrapeRun {
                marketplace,
                outcome: RunOutcome::Failure(e.to_string()),
                stats: RunStats {
                    duration_secs,
                    ..RunStats::default()
                },
            }
        }
    }
}
