use chrono::Weekday;

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

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub log_level: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    /// Origin of the storefront site, e.g. `"https://www.etsy.com"`.
    pub source_base_url: String,
    pub scraper_request_timeout_secs: u64,
    /// Minimum delay between two requests to the same domain.
    pub scraper_min_delay_ms: u64,
    /// Upper bound of the random delay added on top of `scraper_min_delay_ms`.
    pub scraper_jitter_ms: u64,
    pub scraper_backoff_min_secs: u64,
    pub scraper_backoff_max_secs: u64,
    pub scraper_max_retries: u32,
    pub scraper_proxies: Vec<String>,
    /// Empty means the built-in browser user-agent pool.
    pub scraper_user_agents: Vec<String>,
    pub sold_max_page_limit: u32,
    pub sold_items_per_page: u32,
    /// Six-field cron expression (seconds first) for the daily update pass.
    pub update_cron: String,
    pub full_refresh_weekday: Weekday,
    pub continuation_max_attempts: u32,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("source_base_url", &self.source_base_url)
            .field(
                "scraper_request_timeout_secs",
                &self.scraper_request_timeout_secs,
            )
            .field("scraper_min_delay_ms", &self.scraper_min_delay_ms)
            .field("scraper_jitter_ms", &self.scraper_jitter_ms)
            .field("scraper_backoff_min_secs", &self.scraper_backoff_min_secs)
            .field("scraper_backoff_max_secs", &self.scraper_backoff_max_secs)
            .field("scraper_max_retries", &self.scraper_max_retries)
            .field(
                "scraper_proxies",
                &format!("[{} redacted]", self.scraper_proxies.len()),
            )
            .field("scraper_user_agents", &self.scraper_user_agents.len())
            .field("sold_max_page_limit", &self.sold_max_page_limit)
            .field("sold_items_per_page", &self.sold_items_per_page)
            .field("update_cron", &self.update_cron)
            .field("full_refresh_weekday", &self.full_refresh_weekday)
            .field("continuation_max_attempts", &self.continuation_max_attempts)
            .finish()
    }
}
