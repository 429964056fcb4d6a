//! In-memory session backend serving canned HTML per URL.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::ScraperError;
use crate::session::{Browser, BrowserLauncher, BrowserPage};

#[derive(Default)]
struct State {
    /// url -> successive frames; a page advances one frame per scroll.
    pages: HashMap<String, Vec<String>>,
    scroll_heights: Vec<u64>,
    launches: u32,
    failing_launches: u32,
    browser_closes: u32,
    page_closes: u32,
    visits: HashMap<String, u32>,
    nav_failures: HashMap<String, u32>,
    typed: Vec<(String, String)>,
    clicked: Vec<String>,
    login_redirect: Option<String>,
}

#[derive(Clone, Default)]
pub(crate) struct ScriptedLauncher {
    state: Arc<Mutex<State>>,
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

impl ScriptedLauncher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn page(self, url: &str, html: &str) -> Self {
        lock(&self.state)
            .pages
            .insert(url.to_string(), vec![html.to_string()]);
        self
    }

    pub(crate) fn frames(self, url: &str, frames: &[&str]) -> Self {
        lock(&self.state).pages.insert(
            url.to_string(),
            frames.iter().map(|f| (*f).to_string()).collect(),
        );
        self
    }

    pub(crate) fn scroll_heights(self, heights: &[u64]) -> Self {
        lock(&self.state).scroll_heights = heights.to_vec();
        self
    }

    pub(crate) fn failing_launches(self, n: u32) -> Self {
        lock(&self.state).failing_launches = n;
        self
    }

    pub(crate) fn login_redirect(self, url: &str) -> Self {
        lock(&self.state).login_redirect = Some(url.to_string());
        self
    }

    pub(crate) fn fail_navigation(&self, url: &str, times: u32) {
        lock(&self.state).nav_failures.insert(url.to_string(), times);
    }

    pub(crate) fn launch_count(&self) -> u32 {
        lock(&self.state).launches
    }

    pub(crate) fn close_count(&self) -> u32 {
        lock(&self.state).browser_closes
    }

    pub(crate) fn page_close_count(&self) -> u32 {
        lock(&self.state).page_closes
    }

    pub(crate) fn visits(&self, url: &str) -> u32 {
        lock(&self.state).visits.get(url).copied().unwrap_or(0)
    }

    pub(crate) fn typed(&self) -> Vec<(String, String)> {
        lock(&self.state).typed.clone()
    }

    pub(crate) fn clicked(&self) -> Vec<String> {
        lock(&self.state).clicked.clone()
    }
}

#[async_trait]
impl BrowserLauncher for ScriptedLauncher {
    async fn launch(&self) -> Result<Box<dyn Browser>, ScraperError> {
        let mut state = lock(&self.state);
        state.launches += 1;
        if state.failing_launches > 0 {
            state.failing_launches -= 1;
            return Err(ScraperError::Browser("chrome exited during startup".to_string()));
        }
        Ok(Box::new(ScriptedBrowser {
            state: Arc::clone(&self.state),
        }))
    }
}

struct ScriptedBrowser {
    state: Arc<Mutex<State>>,
}

#[async_trait]
impl Browser for ScriptedBrowser {
    async fn new_page(&self, _user_agent: &str) -> Result<Box<dyn BrowserPage>, ScraperError> {
        Ok(Box::new(ScriptedPage {
            state: Arc::clone(&self.state),
            tab: Mutex::new(Tab::default()),
        }))
    }

    async fn close(&mut self) -> Result<(), ScraperError> {
        lock(&self.state).browser_closes += 1;
        Ok(())
    }
}

#[derive(Default)]
struct Tab {
    url: String,
    scrolls: usize,
}

struct ScriptedPage {
    state: Arc<Mutex<State>>,
    tab: Mutex<Tab>,
}

impl ScriptedPage {
    fn tab(&self) -> MutexGuard<'_, Tab> {
        self.tab.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn current_html(&self) -> Result<String, ScraperError> {
        let (url, scrolls) = {
            let tab = self.tab();
            (tab.url.clone(), tab.scrolls)
        };
        let state = lock(&self.state);
        let frames = state
            .pages
            .get(&url)
            .ok_or_else(|| ScraperError::Browser(format!("no document loaded for {url}")))?;
        let idx = scrolls.min(frames.len().saturating_sub(1));
        Ok(frames.get(idx).cloned().unwrap_or_default())
    }
}

fn selector_matches(html: &str, selector: &str) -> bool {
    let Ok(sel) = scraper::Selector::parse(selector) else {
        return false;
    };
    scraper::Html::parse_document(html).select(&sel).next().is_some()
}

#[async_trait]
impl BrowserPage for ScriptedPage {
    async fn goto(&self, url: &str, _timeout: Duration) -> Result<(), ScraperError> {
        let mut state = lock(&self.state);
        *state.visits.entry(url.to_string()).or_insert(0) += 1;
        if let Some(remaining) = state.nav_failures.get_mut(url) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(ScraperError::Navigation {
                    url: url.to_string(),
                    reason: "net::ERR_CONNECTION_RESET".to_string(),
                });
            }
        }
        if !state.pages.contains_key(url) {
            return Err(ScraperError::NotFound {
                url: url.to_string(),
            });
        }
        drop(state);
        let mut tab = self.tab();
        tab.url = url.to_string();
        tab.scrolls = 0;
        Ok(())
    }

    async fn content(&self) -> Result<String, ScraperError> {
        self.current_html()
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), ScraperError> {
        let html = self.current_html()?;
        if selector_matches(&html, selector) {
            Ok(())
        } else {
            Err(ScraperError::Timeout {
                what: format!("selector {selector}"),
                millis: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            })
        }
    }

    async fn scroll_height(&self) -> Result<u64, ScraperError> {
        let scrolls = self.tab().scrolls;
        let state = lock(&self.state);
        if state.scroll_heights.is_empty() {
            return Ok(1000);
        }
        let idx = scrolls.min(state.scroll_heights.len() - 1);
        Ok(state.scroll_heights[idx])
    }

    async fn scroll_to_bottom(&self) -> Result<(), ScraperError> {
        self.tab().scrolls += 1;
        Ok(())
    }

    async fn type_into(&self, selector: &str, text: &str) -> Result<(), ScraperError> {
        lock(&self.state)
            .typed
            .push((selector.to_string(), text.to_string()));
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<(), ScraperError> {
        let redirect = {
            let mut state = lock(&self.state);
            state.clicked.push(selector.to_string());
            state.login_redirect.clone()
        };
        if let Some(url) = redirect {
            self.tab().url = url;
        }
        Ok(())
    }

    async fn wait_for_navigation(&self, _timeout: Duration) -> Result<(), ScraperError> {
        Ok(())
    }

    async fn current_url(&self) -> Result<String, ScraperError> {
        Ok(self.tab().url.clone())
    }

    async fn close(&self) -> Result<(), ScraperError> {
        lock(&self.state).page_closes += 1;
        Ok(())
    }
}
