//! Shared configuration and listing vocabulary for the phonedb workspace.

pub mod app_config;
pub mod config;
pub mod listings;
pub mod marketplaces;

pub use app_config::{AppConfig, Environment, ScrapingSettings};
pub use config::{load_app_config, load_app_config_from_env};
pub use listings::{Availability, Category, Condition, ParseVocabularyError, RawListing};
pub use marketplaces::{
    load_marketplaces, Credentials, ExtractorKind, MarketplaceConfig, MarketplacesFile,
    SelectorStrategy, SessionBackend, StoreConfig,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for environment variable {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read marketplaces file at {path}: {source}")]
    MarketplacesFileIo {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse marketplaces file: {0}")]
    MarketplacesFileParse(#[from] serde_yaml::Error),

    #[error("configuration validation error: {0}")]
    Validation(String),
}
