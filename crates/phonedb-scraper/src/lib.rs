pub mod chrome;
pub mod delay;
pub mod error;
pub mod extract;
pub mod extractors;
pub mod http_session;
pub mod normalize;
mod retry;
pub mod runner;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use chrome::ChromeLauncher;
pub use delay::{DelayPolicy, UserAgentPool};
pub use error::ScraperError;
pub use extractors::{
    build_extractor, Extractor, GeneralSearch, InfiniteFeed, PaginatedCatalog, Pacing, StoreCrawl,
};
pub use http_session::HttpLauncher;
pub use normalize::{
    clean_model_name, detect_category, detect_condition, extract_brand, normalize_price,
};
pub use runner::{launcher_for, run, RunOutcome, RunStats, ScrapeRun};
pub use session::{Browser, BrowserLauncher, BrowserPage, Session};
