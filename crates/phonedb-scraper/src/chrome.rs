//! Headless Chrome session backend.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use phonedb_core::ScrapingSettings;
use tokio::task::JoinHandle;

use crate::error::ScraperError;
use crate::session::{Browser, BrowserLauncher, BrowserPage};

const SELECTOR_POLL: Duration = Duration::from_millis(250);

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Launches a local headless Chrome via the DevTools protocol.
#[derive(Debug, Clone, Default)]
pub struct ChromeLauncher {
    executable: Option<PathBuf>,
    proxy: Option<String>,
}

impl ChromeLauncher {
    #[must_use]
    pub fn new(settings: &ScrapingSettings) -> Self {
        Self {
            executable: settings.chrome_path.clone(),
            proxy: settings.proxy.clone(),
        }
    }

    fn config(&self) -> Result<BrowserConfig, ScraperError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .window_size(1920, 1080)
            .arg("--disable-dev-shm-usage")
            .arg("--disable-blink-features=AutomationControlled");
        if let Some(path) = &self.executable {
            builder = builder.chrome_executable(path);
        }
        if let Some(proxy) = &self.proxy {
            builder = builder.arg(format!("--proxy-server={proxy}"));
        }
        builder.build().map_err(ScraperError::Browser)
    }
}

#[async_trait]
impl BrowserLauncher for ChromeLauncher {
    async fn launch(&self) -> Result<Box<dyn Browser>, ScraperError> {
        let (browser, mut handler) = CdpBrowser::launch(self.config()?).await?;
        let events = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!(error = %e, "devtools handler stopped");
                    break;
                }
            }
        });
        Ok(Box::new(ChromeBrowser { browser, events }))
    }
}

struct ChromeBrowser {
    browser: CdpBrowser,
    events: JoinHandle<()>,
}

#[async_trait]
impl Browser for ChromeBrowser {
    async fn new_page(&self, user_agent: &str) -> Result<Box<dyn BrowserPage>, ScraperError> {
        let page = self.browser.new_page("about:blank").await?;
        page.enable_stealth_mode_with_agent(user_agent).await?;
        Ok(Box::new(ChromePage { page }))
    }

    async fn close(&mut self) -> Result<(), ScraperError> {
        let closed = self.browser.close().await;
        let _ = self.browser.wait().await;
        self.events.abort();
        closed.map(|_| ()).map_err(ScraperError::from)
    }
}

struct ChromePage {
    page: Page,
}

impl ChromePage {
    async fn eval<T: serde::de::DeserializeOwned>(&self, script: &str) -> Result<T, ScraperError> {
        self.page
            .evaluate(script)
            .await?
            .into_value::<T>()
            .map_err(|e| ScraperError::Browser(format!("evaluate `{script}`: {e}")))
    }
}

#[async_trait]
impl BrowserPage for ChromePage {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), ScraperError> {
        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(ScraperError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(ScraperError::Timeout {
                what: format!("navigation to {url}"),
                millis: millis(timeout),
            }),
        }
    }

    async fn content(&self) -> Result<String, ScraperError> {
        Ok(self.page.content().await?)
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), ScraperError> {
        let poll = async {
            loop {
                if self.page.find_element(selector).await.is_ok() {
                    return;
                }
                tokio::time::sleep(SELECTOR_POLL).await;
            }
        };
        tokio::time::timeout(timeout, poll)
            .await
            .map_err(|_| ScraperError::Timeout {
                what: format!("selector {selector}"),
                millis: millis(timeout),
            })
    }

    async fn scroll_height(&self) -> Result<u64, ScraperError> {
        self.eval("document.body.scrollHeight").await
    }

    async fn scroll_to_bottom(&self) -> Result<(), ScraperError> {
        self.page
            .evaluate("window.scrollTo(0, document.body.scrollHeight)")
            .await?;
        Ok(())
    }

    async fn type_into(&self, selector: &str, text: &str) -> Result<(), ScraperError> {
        self.page
            .find_element(selector)
            .await?
            .click()
            .await?
            .type_str(text)
            .await?;
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<(), ScraperError> {
        self.page.find_element(selector).await?.click().await?;
        Ok(())
    }

    async fn wait_for_navigation(&self, timeout: Duration) -> Result<(), ScraperError> {
        match tokio::time::timeout(timeout, self.page.wait_for_navigation()).await {
            Ok(result) => result.map(|_| ()).map_err(ScraperError::from),
            Err(_) => Err(ScraperError::Timeout {
                what: "navigation".to_string(),
                millis: millis(timeout),
            }),
        }
    }

    async fn current_url(&self) -> Result<String, ScraperError> {
        Ok(self.page.url().await?.unwrap_or_default())
    }

    async fn close(&self) -> Result<(), ScraperError> {
        self.page.clone().close().await?;
        Ok(())
    }
}
