use chrono::Weekday;

use crate::app_config::{AppConfig, Environment};
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
/// This is the core parsing/validation logic, decoupled from the actual environment
/// so it can be tested with a pure `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
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

    let database_url = require("DATABASE_URL")?;
    let env = parse_environment(&or_default("SHOPTRACK_ENV", "development"));
    let log_level = or_default("SHOPTRACK_LOG_LEVEL", "info");

    let db_max_connections = parse_u32("SHOPTRACK_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("SHOPTRACK_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("SHOPTRACK_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let source_base_url = or_default("SHOPTRACK_SOURCE_BASE_URL", "https://www.etsy.com")
        .trim_end_matches('/')
        .to_string();
    let scraper_request_timeout_secs =
        parse_u64("SHOPTRACK_SCRAPER_REQUEST_TIMEOUT_SECS", "30")?;
    let scraper_min_delay_ms = parse_u64("SHOPTRACK_SCRAPER_MIN_DELAY_MS", "1500")?;
    let scraper_jitter_ms = parse_u64("SHOPTRACK_SCRAPER_JITTER_MS", "1500")?;
    let scraper_backoff_min_secs = parse_u64("SHOPTRACK_SCRAPER_BACKOFF_MIN_SECS", "10")?;
    let scraper_backoff_max_secs = parse_u64("SHOPTRACK_SCRAPER_BACKOFF_MAX_SECS", "89")?;
    if scraper_backoff_max_secs < scraper_backoff_min_secs {
        return Err(ConfigError::InvalidEnvVar {
            var: "SHOPTRACK_SCRAPER_BACKOFF_MAX_SECS".to_string(),
            reason: format!("must be >= SHOPTRACK_SCRAPER_BACKOFF_MIN_SECS ({scraper_backoff_min_secs})"),
        });
    }
    let scraper_max_retries = parse_u32("SHOPTRACK_SCRAPER_MAX_RETRIES", "3")?;
    let scraper_proxies = parse_list(&or_default("SHOPTRACK_SCRAPER_PROXIES", ""));
    let scraper_user_agents = parse_list(&or_default("SHOPTRACK_SCRAPER_USER_AGENTS", ""));

    let sold_max_page_limit = parse_u32("SHOPTRACK_SOLD_MAX_PAGE_LIMIT", "10")?;
    let sold_items_per_page = parse_u32("SHOPTRACK_SOLD_ITEMS_PER_PAGE", "24")?;
    if sold_max_page_limit == 0 || sold_items_per_page == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "SHOPTRACK_SOLD_MAX_PAGE_LIMIT/SHOPTRACK_SOLD_ITEMS_PER_PAGE".to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }

    let update_cron = or_default("SHOPTRACK_UPDATE_CRON", "0 0 3 * * *");
    let weekday_raw = or_default("SHOPTRACK_FULL_REFRESH_WEEKDAY", "Sun");
    let full_refresh_weekday =
        weekday_raw
            .parse::<Weekday>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: "SHOPTRACK_FULL_REFRESH_WEEKDAY".to_string(),
                reason: e.to_string(),
            })?;
    let continuation_max_attempts = parse_u32("SHOPTRACK_CONTINUATION_MAX_ATTEMPTS", "30")?;

    Ok(AppConfig {
        database_url,
        env,
        log_level,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        source_base_url,
        scraper_request_timeout_secs,
        scraper_min_delay_ms,
        scraper_jitter_ms,
        scraper_backoff_min_secs,
        scraper_backoff_max_secs,
        scraper_max_retries,
        scraper_proxies,
        scraper_user_agents,
        sold_max_page_limit,
        sold_items_per_page,
        update_cron,
        full_refresh_weekday,
        continuation_max_attempts,
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

/// Splits a comma-separated list, dropping blank entries.
fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
