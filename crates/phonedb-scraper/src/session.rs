//! Page-session capability shared by every extractor.
//!
//! A [`Session`] owns one lazily launched [`Browser`] for the lifetime of a
//! scrape run. Backends (headless Chrome, plain HTTP, scripted fixtures)
//! implement the three traits below.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use phonedb_core::ScrapingSettings;

use crate::delay::{DelayPolicy, UserAgentPool};
use crate::error::ScraperError;
use crate::retry::retry_with_backoff;

/// Launch attempts before a run is aborted with [`ScraperError::SessionLaunch`].
pub const LAUNCH_ATTEMPTS: u32 = 3;

const LAUNCH_BACKOFF_MS: u64 = 2000;
const FETCH_BACKOFF_BASE_MS: u64 = 1000;

/// Navigation timeout for a single page load.
pub const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Timeout when waiting for a selector to appear.
pub const SELECTOR_TIMEOUT: Duration = Duration::from_secs(10);

/// One open tab.
#[async_trait]
pub trait BrowserPage: Send + Sync {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), ScraperError>;

    /// Serialized HTML of the current document.
    async fn content(&self) -> Result<String, ScraperError>;

    async fn wait_for_selector(&self, selector: &str, timeout: Duration)
        -> Result<(), ScraperError>;

    async fn scroll_height(&self) -> Result<u64, ScraperError>;

    async fn scroll_to_bottom(&self) -> Result<(), ScraperError>;

    async fn type_into(&self, selector: &str, text: &str) -> Result<(), ScraperError>;

    async fn click(&self, selector: &str) -> Result<(), ScraperError>;

    async fn wait_for_navigation(&self, timeout: Duration) -> Result<(), ScraperError>;

    async fn current_url(&self) -> Result<String, ScraperError>;

    async fn close(&self) -> Result<(), ScraperError>;
}

#[async_trait]
pub trait Browser: Send + Sync {
    async fn new_page(&self, user_agent: &str) -> Result<Box<dyn BrowserPage>, ScraperError>;

    async fn close(&mut self) -> Result<(), ScraperError>;
}

#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn Browser>, ScraperError>;
}

/// Per-run session: lazy browser, pacing, UA rotation, fetch retry.
pub struct Session {
    launcher: Arc<dyn BrowserLauncher>,
    browser: Option<Box<dyn Browser>>,
    delay: DelayPolicy,
    user_agents: UserAgentPool,
    max_retries: u32,
    launch_backoff_ms: u64,
    fetch_backoff_base_ms: u64,
}

impl Session {
    #[must_use]
    pub fn new(launcher: Arc<dyn BrowserLauncher>, settings: &ScrapingSettings) -> Self {
        Self {
            launcher,
            browser: None,
            delay: DelayPolicy::new(settings.delay_min_ms, settings.delay_max_ms),
            user_agents: UserAgentPool::new(settings.user_agents.clone()),
            max_retries: settings.max_retries,
            launch_backoff_ms: LAUNCH_BACKOFF_MS,
            fetch_backoff_base_ms: FETCH_BACKOFF_BASE_MS,
        }
    }

    /// Override launch and fetch backoff bases (tests use zero).
    #[must_use]
    pub fn with_backoff(mut self, launch_backoff_ms: u64, fetch_backoff_base_ms: u64) -> Self {
        self.launch_backoff_ms = launch_backoff_ms;
        self.fetch_backoff_base_ms = fetch_backoff_base_ms;
        self
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.browser.is_some()
    }

    /// Returns the browser, launching it on first use.
    ///
    /// Launch is attempted [`LAUNCH_ATTEMPTS`] times, sleeping
    /// `2000ms × attempt` between failures.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::SessionLaunch`] once every attempt has failed.
    pub async fn browser(&mut self) -> Result<&dyn Browser, ScraperError> {
        if self.browser.is_none() {
            let browser = self.launch().await?;
            self.browser = Some(browser);
        }
        self.browser
            .as_deref()
            .ok_or_else(|| ScraperError::Browser("browser slot empty after launch".to_string()))
    }

    async fn launch(&self) -> Result<Box<dyn Browser>, ScraperError> {
        let mut attempt = 1u32;
        loop {
            match self.launcher.launch().await {
                Ok(browser) => {
                    tracing::info!(attempt, "browser launched");
                    return Ok(browser);
                }
                Err(err) if attempt >= LAUNCH_ATTEMPTS => {
                    tracing::error!(attempt, error = %err, "browser launch failed, giving up");
                    return Err(ScraperError::SessionLaunch {
                        attempts: attempt,
                        reason: err.to_string(),
                    });
                }
                Err(err) => {
                    let delay_ms = self.launch_backoff_ms * u64::from(attempt);
                    tracing::warn!(attempt, delay_ms, error = %err, "browser launch failed, retrying");
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Open a fresh tab with a randomly chosen user agent.
    ///
    /// # Errors
    ///
    /// Propagates launch failures and backend page-creation errors.
    pub async fn new_page(&mut self) -> Result<Box<dyn BrowserPage>, ScraperError> {
        let user_agent = self.user_agents.pick().to_string();
        let browser = self.browser().await?;
        browser.new_page(&user_agent).await
    }

    /// Navigate `page` to `url`, retrying transient failures with
    /// exponential backoff.
    ///
    /// # Errors
    ///
    /// Returns the error from the final attempt.
    pub async fn goto(
        &self,
        page: &dyn BrowserPage,
        url: &str,
        timeout: Duration,
    ) -> Result<(), ScraperError> {
        retry_with_backoff(self.max_retries, self.fetch_backoff_base_ms, || {
            page.goto(url, timeout)
        })
        .await
    }

    /// Sleep for a randomized inter-request delay.
    pub async fn pause(&self) {
        self.delay.wait().await;
    }

    /// Release the browser if one was launched. Safe to call repeatedly.
    pub async fn close(&mut self) {
        if let Some(mut browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                tracing::warn!(error = %e, "failed to close browser cleanly");
            } else {
                tracing::debug!("browser closed");
            }
        }
    }
}

/// Close a page, logging instead of failing.
pub(crate) async fn close_page(page: &dyn BrowserPage) {
    if let Err(e) = page.close().await {
        tracing::warn!(error = %e, "failed to close page");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedLauncher;

    fn settings() -> ScrapingSettings {
        ScrapingSettings {
            delay_min_ms: 0,
            delay_max_ms: 0,
            ..ScrapingSettings::default()
        }
    }

    #[tokio::test]
    async fn browser_is_launched_once_and_reused() {
        let launcher = Arc::new(ScriptedLauncher::new());
        let mut session = Session::new(launcher.clone(), &settings()).with_backoff(0, 0);
        assert!(!session.is_open());

        let first = session.new_page().await.unwrap();
        let second = session.new_page().await.unwrap();
        close_page(first.as_ref()).await;
        close_page(second.as_ref()).await;

        assert_eq!(launcher.launch_count(), 1);
        assert!(session.is_open());
    }

    #[tokio::test]
    async fn launch_retries_then_succeeds() {
        let launcher = Arc::new(ScriptedLauncher::new().failing_launches(2));
        let mut session = Session::new(launcher.clone(), &settings()).with_backoff(0, 0);
        assert!(session.browser().await.is_ok());
        assert_eq!(launcher.launch_count(), 3);
    }

    #[tokio::test]
    async fn launch_gives_up_after_three_attempts() {
        let launcher = Arc::new(ScriptedLauncher::new().failing_launches(5));
        let mut session = Session::new(launcher.clone(), &settings()).with_backoff(0, 0);
        let err = session.browser().await.err().unwrap();
        assert!(matches!(err, ScraperError::SessionLaunch { attempts: 3, .. }));
        assert_eq!(launcher.launch_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn launch_backoff_is_linear() {
        let launcher = Arc::new(ScriptedLauncher::new().failing_launches(5));
        let mut session = Session::new(launcher, &settings());
        let start = tokio::time::Instant::now();
        let _ = session.browser().await;
        // 2s after attempt 1, 4s after attempt 2
        assert_eq!(start.elapsed(), Duration::from_secs(6));
    }

    #[tokio::test]
    async fn close_is_idempotent_and_closes_browser() {
        let launcher = Arc::new(ScriptedLauncher::new());
        let mut session = Session::new(launcher.clone(), &settings());
        session.browser().await.unwrap();
        session.close().await;
        session.close().await;
        assert!(!session.is_open());
        assert_eq!(launcher.close_count(), 1);
    }

    #[tokio::test]
    async fn goto_retries_failed_navigation() {
        let launcher = Arc::new(ScriptedLauncher::new().page("https://m.test/p", "<html></html>"));
        launcher.fail_navigation("https://m.test/p", 2);
        let mut session = Session::new(launcher.clone(), &settings()).with_backoff(0, 0);
        let page = session.new_page().await.unwrap();
        session
            .goto(page.as_ref(), "https://m.test/p", NAVIGATION_TIMEOUT)
            .await
            .unwrap();
        assert_eq!(launcher.visits("https://m.test/p"), 3);
    }

    #[tokio::test]
    async fn goto_surfaces_last_error() {
        let launcher = Arc::new(ScriptedLauncher::new());
        let mut session = Session::new(launcher, &settings()).with_backoff(0, 0);
        let page = session.new_page().await.unwrap();
        let result = session
            .goto(page.as_ref(), "https://m.test/missing", NAVIGATION_TIMEOUT)
            .await;
        assert!(matches!(result, Err(ScraperError::NotFound { .. })));
    }
}
