//! One-shot scrape runs outside the scheduler.

use std::sync::Arc;

use phonedb_core::{AppConfig, MarketplacesFile};
use phonedb_scheduler::Pipeline;
use phonedb_scraper::ScrapeRun;

/// Runs `target` (a marketplace name or `all`) and prints one summary line
/// per marketplace. Disabled marketplaces can be run by name.
///
/// # Errors
///
/// Returns an error if `target` is unknown or any run failed.
pub(crate) async fn run_scrape(
    pool: sqlx::PgPool,
    config: &AppConfig,
    marketplaces: Arc<MarketplacesFile>,
    target: &str,
) -> anyhow::Result<()> {
    let pipeline = Pipeline::new(pool, marketplaces, config.scraping());

    let runs = if target == "all" {
        pipeline.run_all().await
    } else {
        if pipeline.marketplaces().get(target).is_none() {
            let known: Vec<&str> = pipeline
                .marketplaces()
                .marketplaces
                .iter()
                .map(|m| m.name.as_str())
                .collect();
            anyhow::bail!(
                "unknown marketplace '{target}' (available: {}, all)",
                known.join(", ")
            );
        }
        vec![pipeline.run_marketplace(target).await?]
    };

    for run in &runs {
        println!("{}", summary_line(run));
    }

    let failed = runs.iter().filter(|r| !r.is_success()).count();
    if failed > 0 {
        anyhow::bail!("{failed} of {} scrape run(s) failed", runs.len());
    }
    Ok(())
}

pub(crate) fn summary_line(run: &ScrapeRun) -> String {
    match run.error() {
        Some(error) => format!("{}: failed: {error}", run.marketplace),
        None => format!(
            "{}: {} scraped, {} new, {} updated in {:.1}s",
            run.marketplace,
            run.stats.items_scraped,
            run.stats.new_listings,
            run.stats.updated_listings,
            run.stats.duration_secs
        ),
    }
}
