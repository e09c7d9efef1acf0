mod app_config;
mod config;
pub mod items;
pub mod shop;
pub mod task;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use items::{
    ItemChange, MenuCategory, MenuSnapshot, ScrapedCategory, ScrapedItem, SoldItem,
    ALL_CATEGORY, ON_SALE_CATEGORY, OUT_OF_PRODUCTION_CATEGORY, UNCATEGORIZED_CATEGORY,
};
pub use shop::{ReviewSummary, ShopMember, ShopSnapshot, ShopStatus, ShopTotals, NOT_AVAILABLE};
pub use task::{ContinuationStatus, TaskSchedule};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
