//! Plain HTTP session backend for marketplaces that render server-side.
//!
//! Pages are fetched once per navigation; there is no script execution, so
//! scrolling is a no-op and form interaction is unsupported.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use phonedb_core::ScrapingSettings;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, RETRY_AFTER, USER_AGENT};
use reqwest::{Client, StatusCode};

use crate::error::ScraperError;
use crate::session::{Browser, BrowserLauncher, BrowserPage};

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const ACCEPT_LANGUAGES: &str = "fr-FR,fr;q=0.9,en-US;q=0.8,en;q=0.7,ar;q=0.6";

/// Fallback wait when a 429 carries no usable `Retry-After`.
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Builds cookie-keeping `reqwest` clients, one per launched "browser".
#[derive(Debug, Clone)]
pub struct HttpLauncher {
    request_timeout: Duration,
    proxy: Option<String>,
}

impl HttpLauncher {
    #[must_use]
    pub fn new(settings: &ScrapingSettings) -> Self {
        Self {
            request_timeout: Duration::from_millis(settings.request_timeout_ms),
            proxy: settings.proxy.clone(),
        }
    }

    fn client(&self) -> Result<Client, ScraperError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(ACCEPT_LANGUAGES));

        let mut builder = Client::builder()
            .cookie_store(true)
            .timeout(self.request_timeout)
            .connect_timeout(Duration::from_secs(10))
            .default_headers(headers);
        if let Some(proxy) = &self.proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy)?);
        }
        Ok(builder.build()?)
    }
}

#[async_trait]
impl BrowserLauncher for HttpLauncher {
    async fn launch(&self) -> Result<Box<dyn Browser>, ScraperError> {
        Ok(Box::new(HttpBrowser {
            client: self.client()?,
        }))
    }
}

struct HttpBrowser {
    client: Client,
}

#[async_trait]
impl Browser for HttpBrowser {
    async fn new_page(&self, user_agent: &str) -> Result<Box<dyn BrowserPage>, ScraperError> {
        let user_agent = HeaderValue::from_str(user_agent)
            .map_err(|e| ScraperError::Browser(format!("invalid user agent: {e}")))?;
        Ok(Box::new(HttpPage {
            client: self.client.clone(),
            user_agent,
            document: Mutex::new(Document::default()),
        }))
    }

    async fn close(&mut self) -> Result<(), ScraperError> {
        Ok(())
    }
}

#[derive(Default)]
struct Document {
    url: String,
    html: String,
}

struct HttpPage {
    client: Client,
    user_agent: HeaderValue,
    document: Mutex<Document>,
}

impl HttpPage {
    fn document(&self) -> MutexGuard<'_, Document> {
        self.document.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn fetch(&self, url: &str) -> Result<String, ScraperError> {
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, self.user_agent.clone())
            .send()
            .await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
            return Err(ScraperError::RateLimited {
                url: url.to_string(),
                retry_after_secs,
            });
        }

        if status == StatusCode::NOT_FOUND {
            return Err(ScraperError::NotFound {
                url: url.to_string(),
            });
        }

        if !status.is_success() {
            return Err(ScraperError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(response.text().await?)
    }

    fn unsupported(action: &str) -> ScraperError {
        ScraperError::Browser(format!("{action} is not supported by the HTTP session"))
    }
}

#[async_trait]
impl BrowserPage for HttpPage {
    async fn goto(&self, url: &str, _timeout: Duration) -> Result<(), ScraperError> {
        let html = self.fetch(url).await?;
        tracing::debug!(url, bytes = html.len(), "fetched page");
        let mut document = self.document();
        document.url = url.to_string();
        document.html = html;
        Ok(())
    }

    async fn content(&self) -> Result<String, ScraperError> {
        Ok(self.document().html.clone())
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), ScraperError> {
        let parsed = crate::extract::parse_selector(selector)?;
        let html = self.document().html.clone();
        if scraper::Html::parse_document(&html)
            .select(&parsed)
            .next()
            .is_some()
        {
            Ok(())
        } else {
            Err(ScraperError::Timeout {
                what: format!("selector {selector}"),
                millis: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            })
        }
    }

    async fn scroll_height(&self) -> Result<u64, ScraperError> {
        Ok(u64::try_from(self.document().html.len()).unwrap_or(u64::MAX))
    }

    async fn scroll_to_bottom(&self) -> Result<(), ScraperError> {
        Ok(())
    }

    async fn type_into(&self, _selector: &str, _text: &str) -> Result<(), ScraperError> {
        Err(Self::unsupported("typing"))
    }

    async fn click(&self, _selector: &str) -> Result<(), ScraperError> {
        Err(Self::unsupported("clicking"))
    }

    async fn wait_for_navigation(&self, _timeout: Duration) -> Result<(), ScraperError> {
        Ok(())
    }

    async fn current_url(&self) -> Result<String, ScraperError> {
        Ok(self.document().url.clone())
    }

    async fn close(&self) -> Result<(), ScraperError> {
        *self.document() = Document::default();
        Ok(())
    }
}
