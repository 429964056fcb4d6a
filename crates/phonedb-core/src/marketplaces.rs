use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Which extraction state machine drives a marketplace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractorKind {
    GeneralSearch,
    StoreCrawl,
    PaginatedCatalog,
    InfiniteFeed,
}

/// Session backend used to load pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionBackend {
    #[default]
    Browser,
    Http,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    pub id: u64,
    pub name: String,
    pub url: String,
}

/// One candidate extraction rule. `container` selects listing cards; the
/// remaining selectors are evaluated inside each card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorStrategy {
    pub container: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &"[redacted]")
            .field("password", &"[redacted]")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketplaceConfig {
    pub name: String,
    pub extractor: ExtractorKind,
    #[serde(default)]
    pub session: SessionBackend,
    pub base_url: String,
    pub search_url: String,
    pub schedule_hours: u32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Marketplace name recorded on emitted listings when it differs from
    /// the job name (curated stores feed the parent marketplace's catalog).
    #[serde(default)]
    pub listing_marketplace: Option<String>,
    #[serde(default)]
    pub stores: Vec<StoreConfig>,
    /// Overrides the extractor's built-in selector table when non-empty.
    #[serde(default)]
    pub selector_strategies: Vec<SelectorStrategy>,
    #[serde(default)]
    pub anti_bot_signatures: Vec<String>,
    #[serde(default)]
    pub credentials: Option<Credentials>,
}

fn default_enabled() -> bool {
    true
}

impl MarketplaceConfig {
    /// Marketplace name written on catalog rows produced by this job.
    #[must_use]
    pub fn catalog_marketplace(&self) -> &str {
        self.listing_marketplace.as_deref().unwrap_or(&self.name)
    }

    /// Environment variable that overrides `schedule_hours` for this entry.
    #[must_use]
    pub fn schedule_env_var(&self) -> String {
        let upper: String = self
            .name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect();
        format!("PHONEDB_{upper}_SCHEDULE_HOURS")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketplacesFile {
    pub marketplaces: Vec<MarketplaceConfig>,
}

impl MarketplacesFile {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&MarketplaceConfig> {
        self.marketplaces.iter().find(|m| m.name == name)
    }

    pub fn enabled(&self) -> impl Iterator<Item = &MarketplaceConfig> {
        self.marketplaces.iter().filter(|m| m.enabled)
    }

    /// Apply per-marketplace schedule overrides and merge feed credentials
    /// from the environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if a schedule override does not
    /// parse or falls outside 1..=24 hours.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Result<String, std::env::VarError>,
    {
        let email = lookup("FACEBOOK_EMAIL").ok().filter(|v| !v.trim().is_empty());
        let password = lookup("FACEBOOK_PASSWORD")
            .ok()
            .filter(|v| !v.trim().is_empty());

        for marketplace in &mut self.marketplaces {
            let var = marketplace.schedule_env_var();
            if let Ok(raw) = lookup(&var) {
                let hours = raw.trim().parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
                    var: var.clone(),
                    reason: e.to_string(),
                })?;
                if !(1..=24).contains(&hours) {
                    return Err(ConfigError::InvalidEnvVar {
                        var,
                        reason: format!("{hours} is outside 1..=24"),
                    });
                }
                marketplace.schedule_hours = hours;
            }

            if marketplace.extractor == ExtractorKind::InfiniteFeed
                && marketplace.credentials.is_none()
            {
                if let (Some(email), Some(password)) = (&email, &password) {
                    marketplace.credentials = Some(Credentials {
                        email: email.clone(),
                        password: password.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}

/// Load and validate the marketplace table from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_marketplaces(path: &Path) -> Result<MarketplacesFile, ConfigError> {
    let content =
        std::fs::read_to_string(path).map_err(|e| ConfigError::MarketplacesFileIo {
            path: path.display().to_string(),
            source: e,
        })?;

    let file: MarketplacesFile = serde_yaml::from_str(&content)?;

    validate_marketplaces(&file)?;

    Ok(file)
}

fn validate_marketplaces(file: &MarketplacesFile) -> Result<(), ConfigError> {
    let mut seen_names = HashSet::new();

    for marketplace in &file.marketplaces {
        let name = marketplace.name.trim();
        if name.is_empty() {
            return Err(ConfigError::Validation(
                "marketplace name must be non-empty".to_string(),
            ));
        }

        if !seen_names.insert(name.to_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "duplicate marketplace name: '{name}'"
            )));
        }

        for (field, value) in [
            ("base_url", &marketplace.base_url),
            ("search_url", &marketplace.search_url),
        ] {
            if !(value.starts_with("http://") || value.starts_with("https://")) {
                return Err(ConfigError::Validation(format!(
                    "marketplace '{name}' has invalid {field} '{value}'; must be an http(s) URL"
                )));
            }
        }

        if !(1..=24).contains(&marketplace.schedule_hours) {
            return Err(ConfigError::Validation(format!(
                "marketplace '{name}' has invalid schedule_hours {}; must be 1..=24",
                marketplace.schedule_hours
            )));
        }

        if marketplace.extractor == ExtractorKind::StoreCrawl && marketplace.stores.is_empty() {
            return Err(ConfigError::Validation(format!(
                "marketplace '{name}' uses store_crawl but lists no stores"
            )));
        }

        let mut seen_stores = HashSet::new();
        for store in &marketplace.stores {
            if !seen_stores.insert(store.id) {
                return Err(ConfigError::Validation(format!(
                    "marketplace '{name}' lists store {} more than once",
                    store.id
                )));
            }
        }

        if marketplace
            .selector_strategies
            .iter()
            .any(|s| s.container.trim().is_empty())
        {
            return Err(ConfigError::Validation(format!(
                "marketplace '{name}' has a selector strategy with an empty container"
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "marketplaces_test.rs"]
mod tests;
