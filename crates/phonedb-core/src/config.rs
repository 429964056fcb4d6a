use crate::app_config::{AppConfig, Environment, DEFAULT_USER_AGENTS};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so tests can drive it from a
/// plain `HashMap`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let optional = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_i32 = |var: &str, default: &str| -> Result<i32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<i32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let database_url = require("DATABASE_URL")?;

    let env = parse_environment(&or_default("PHONEDB_ENV", "development"));
    let log_level = or_default("PHONEDB_LOG_LEVEL", "info");
    let marketplaces_path = PathBuf::from(or_default(
        "PHONEDB_MARKETPLACES_PATH",
        "./config/marketplaces.yaml",
    ));

    let db_max_connections = parse_u32("PHONEDB_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("PHONEDB_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("PHONEDB_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let scrape_delay_min_ms = parse_u64("PHONEDB_SCRAPE_DELAY_MIN_MS", "2000")?;
    let scrape_delay_max_ms = parse_u64("PHONEDB_SCRAPE_DELAY_MAX_MS", "5000")?;
    if scrape_delay_min_ms > scrape_delay_max_ms {
        return Err(ConfigError::InvalidEnvVar {
            var: "PHONEDB_SCRAPE_DELAY_MIN_MS".to_string(),
            reason: format!(
                "minimum delay {scrape_delay_min_ms}ms exceeds maximum {scrape_delay_max_ms}ms"
            ),
        });
    }

    let scraper_max_retries = parse_u32("PHONEDB_SCRAPER_MAX_RETRIES", "3")?;
    if scraper_max_retries == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "PHONEDB_SCRAPER_MAX_RETRIES".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    let scraper_request_timeout_ms = parse_u64("PHONEDB_SCRAPER_REQUEST_TIMEOUT_MS", "30000")?;
    let scraper_proxy = optional("PHONEDB_SCRAPER_PROXY");

    let user_agents = parse_user_agents(optional("PHONEDB_USER_AGENTS").as_deref());
    let chrome_path = optional("PHONEDB_CHROME_PATH").map(PathBuf::from);

    let ai_url = or_default("PHONEDB_AI_URL", "http://localhost:11434");
    let ai_model = or_default("PHONEDB_AI_MODEL", "llama3.2:3b");

    let timezone_offset_hours = parse_i32("PHONEDB_TIMEZONE_OFFSET_HOURS", "1")?;
    if !(-12..=14).contains(&timezone_offset_hours) {
        return Err(ConfigError::InvalidEnvVar {
            var: "PHONEDB_TIMEZONE_OFFSET_HOURS".to_string(),
            reason: format!("offset {timezone_offset_hours} is outside -12..=14"),
        });
    }

    let facebook_email = optional("FACEBOOK_EMAIL");
    let facebook_password = optional("FACEBOOK_PASSWORD");

    Ok(AppConfig {
        database_url,
        env,
        log_level,
        marketplaces_path,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        scrape_delay_min_ms,
        scrape_delay_max_ms,
        scraper_max_retries,
        scraper_request_timeout_ms,
        scraper_proxy,
        user_agents,
        chrome_path,
        ai_url,
        ai_model,
        timezone_offset_hours,
        facebook_email,
        facebook_password,
    })
}

/// Parse a string into an `Environment` variant.
///
/// Unrecognized values default to `Environment::Development`.
fn parse_environment(s: &str) -> Environment {
    match s {
        "production" => Environment::Production,
        "test" => Environment::Test,
        _ => Environment::Development,
    }
}

/// Split a comma-separated user-agent list, falling back to the built-in set
/// when nothing usable is supplied.
fn parse_user_agents(raw: Option<&str>) -> Vec<String> {
    let parsed: Vec<String> = raw
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|ua| !ua.is_empty())
        .map(ToString::to_string)
        .collect();

    if parsed.is_empty() {
        DEFAULT_USER_AGENTS.iter().map(|s| (*s).to_string()).collect()
    } else {
        parsed
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
