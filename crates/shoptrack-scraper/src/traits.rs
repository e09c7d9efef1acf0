//! The scraping capability the sync engine and binaries depend on.

use async_trait::async_trait;

use shoptrack_core::{MenuSnapshot, ShopSnapshot, SoldItem, TaskSchedule};

use crate::client::StorefrontClient;
use crate::error::ScraperError;

/// Everything the update pipeline needs from a storefront source.
///
/// [`StorefrontClient`] is the production implementation; tests substitute
/// canned doubles.
#[async_trait]
pub trait ShopScraper: Send + Sync {
    /// Shop landing-page snapshot with an empty menu.
    async fn scrape_shop(&self, name: &str) -> Result<ShopSnapshot, ScraperError>;

    /// Full item snapshot for a shop previously returned by `scrape_shop`.
    async fn scrape_menu(&self, shop: &ShopSnapshot) -> MenuSnapshot;

    /// One window of sales history plus the schedule to resume from.
    async fn scrape_sales_history(
        &self,
        shop: &str,
        task: TaskSchedule,
    ) -> (Vec<SoldItem>, TaskSchedule);

    /// Counters only, or the full snapshot with menu when
    /// `need_item_refresh` is set.
    async fn check_for_updates(
        &self,
        shop: &str,
        need_item_refresh: bool,
    ) -> Result<ShopSnapshot, ScraperError>;
}

#[async_trait]
impl ShopScraper for StorefrontClient {
    async fn scrape_shop(&self, name: &str) -> Result<ShopSnapshot, ScraperError> {
        StorefrontClient::scrape_shop(self, name).await
    }

    async fn scrape_menu(&self, shop: &ShopSnapshot) -> MenuSnapshot {
        self.scrape_all_menu_items(shop).await
    }

    async fn scrape_sales_history(
        &self,
        shop: &str,
        task: TaskSchedule,
    ) -> (Vec<SoldItem>, TaskSchedule) {
        StorefrontClient::scrape_sales_history(self, shop, task).await
    }

    async fn check_for_updates(
        &self,
        shop: &str,
        need_item_refresh: bool,
    ) -> Result<ShopSnapshot, ScraperError> {
        StorefrontClient::check_for_updates(self, shop, need_item_refresh).await
    }
}
