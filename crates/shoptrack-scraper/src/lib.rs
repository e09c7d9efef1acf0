pub mod client;
pub mod error;
mod menu;
mod pagination;
mod parse_helpers;
mod queue;
pub mod rate_limit;
pub mod shop;
mod sold;
pub mod traits;

pub use client::{CrawlSession, ScraperConfig, StorefrontClient};
pub use error::ScraperError;
pub use menu::assign_uncategorized;
pub use shop::{parse_shop_counters, parse_shop_page};
pub use sold::{parse_sold_page, SoldPage};
pub use traits::ShopScraper;
