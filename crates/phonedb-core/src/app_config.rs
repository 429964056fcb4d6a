use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Desktop Chrome user agents rotated when `PHONEDB_USER_AGENTS` is unset.
pub const DEFAULT_USER_AGENTS: [&str; 3] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
];

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub log_level: String,
    pub marketplaces_path: PathBuf,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub scrape_delay_min_ms: u64,
    pub scrape_delay_max_ms: u64,
    pub scraper_max_retries: u32,
    pub scraper_request_timeout_ms: u64,
    pub scraper_proxy: Option<String>,
    pub user_agents: Vec<String>,
    pub chrome_path: Option<PathBuf>,
    pub ai_url: String,
    pub ai_model: String,
    pub timezone_offset_hours: i32,
    pub facebook_email: Option<String>,
    pub facebook_password: Option<String>,
}

impl AppConfig {
    /// The global scraping knobs handed to every extractor session.
    #[must_use]
    pub fn scraping(&self) -> ScrapingSettings {
        ScrapingSettings {
            delay_min_ms: self.scrape_delay_min_ms,
            delay_max_ms: self.scrape_delay_max_ms,
            max_retries: self.scraper_max_retries,
            request_timeout_ms: self.scraper_request_timeout_ms,
            proxy: self.scraper_proxy.clone(),
            user_agents: self.user_agents.clone(),
            chrome_path: self.chrome_path.clone(),
        }
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("marketplaces_path", &self.marketplaces_path)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("scrape_delay_min_ms", &self.scrape_delay_min_ms)
            .field("scrape_delay_max_ms", &self.scrape_delay_max_ms)
            .field("scraper_max_retries", &self.scraper_max_retries)
            .field(
                "scraper_request_timeout_ms",
                &self.scraper_request_timeout_ms,
            )
            .field(
                "scraper_proxy",
                &self.scraper_proxy.as_ref().map(|_| "[redacted]"),
            )
            .field("user_agents", &self.user_agents.len())
            .field("chrome_path", &self.chrome_path)
            .field("ai_url", &self.ai_url)
            .field("ai_model", &self.ai_model)
            .field("timezone_offset_hours", &self.timezone_offset_hours)
            .field(
                "facebook_email",
                &self.facebook_email.as_ref().map(|_| "[redacted]"),
            )
            .field(
                "facebook_password",
                &self.facebook_password.as_ref().map(|_| "[redacted]"),
            )
            .finish()
    }
}

/// Global scraping settings shared by every marketplace.
#[derive(Clone)]
pub struct ScrapingSettings {
    pub delay_min_ms: u64,
    pub delay_max_ms: u64,
    pub max_retries: u32,
    pub request_timeout_ms: u64,
    pub proxy: Option<String>,
    pub user_agents: Vec<String>,
    pub chrome_path: Option<PathBuf>,
}

impl Default for ScrapingSettings {
    fn default() -> Self {
        Self {
            delay_min_ms: 2000,
            delay_max_ms: 5000,
            max_retries: 3,
            request_timeout_ms: 30_000,
            proxy: None,
            user_agents: DEFAULT_USER_AGENTS.iter().map(|s| (*s).to_string()).collect(),
            chrome_path: None,
        }
    }
}

impl std::fmt::Debug for ScrapingSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScrapingSettings")
            .field("delay_min_ms", &self.delay_min_ms)
            .field("delay_max_ms", &self.delay_max_ms)
            .field("max_retries", &self.max_retries)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("proxy", &self.proxy.as_ref().map(|_| "[redacted]"))
            .field("user_agents", &self.user_agents.len())
            .field("chrome_path", &self.chrome_path)
            .finish()
    }
}
