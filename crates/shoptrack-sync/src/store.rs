//! Persistence seams used by the update pipeline.
//!
//! [`crate::PgStore`] implements both traits against Postgres; tests run the
//! pipeline against an in-memory double.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

use shoptrack_core::{
    ContinuationStatus, ItemChange, MenuCategory, ScrapedItem, ShopSnapshot, ShopStatus,
    ShopTotals, SoldItem, TaskSchedule,
};

use crate::error::StoreError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCategory {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredItem {
    pub id: i64,
    pub listing_id: String,
    pub price: Decimal,
    pub available: bool,
    pub menu_item_id: i64,
}

/// The persisted category tree of one shop.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    pub categories: Vec<StoredCategory>,
    pub items: Vec<StoredItem>,
}

impl Catalog {
    #[must_use]
    pub fn category_id(&self, name: &str) -> Option<i64> {
        self.categories
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedShop {
    pub id: i64,
    pub name: String,
    pub totals: ShopTotals,
    pub has_sold_history: bool,
    pub status: ShopStatus,
}

/// A persisted sales-history crawl waiting for its next window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Continuation {
    pub id: i64,
    pub shop_id: i64,
    pub shop_name: String,
    pub schedule: TaskSchedule,
    pub status: ContinuationStatus,
    /// Windows already run.
    pub attempts: u32,
    pub next_run_at: DateTime<Utc>,
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn load_catalog(&self, shop_id: i64) -> Result<Catalog, StoreError>;

    /// Returns the id of the category named `category.category`, creating it
    /// when absent.
    async fn create_category(&self, shop_id: i64, category: &MenuCategory)
        -> Result<i64, StoreError>;

    async fn create_item(
        &self,
        shop_id: i64,
        menu_item_id: i64,
        item: &ScrapedItem,
    ) -> Result<i64, StoreError>;

    /// Overwrites the scraped fields of an item and files it under
    /// `menu_item_id`.
    async fn update_item(
        &self,
        item_id: i64,
        menu_item_id: i64,
        item: &ScrapedItem,
    ) -> Result<(), StoreError>;

    /// Moves an item without touching its scraped fields.
    async fn move_item(
        &self,
        item_id: i64,
        menu_item_id: i64,
        available: bool,
    ) -> Result<(), StoreError>;

    async fn record_change(&self, shop_id: i64, change: &ItemChange) -> Result<(), StoreError>;
}

#[async_trait]
pub trait TrackingStore: Send + Sync {
    /// Shops due for a refresh; shops marked `not_found` are excluded.
    async fn tracked_shops(&self) -> Result<Vec<TrackedShop>, StoreError>;

    async fn find_shop(&self, name: &str) -> Result<Option<TrackedShop>, StoreError>;

    /// Inserts or refreshes the full shop record and marks it active.
    async fn save_shop(&self, shop: &ShopSnapshot) -> Result<i64, StoreError>;

    async fn save_totals(
        &self,
        shop_id: i64,
        totals: ShopTotals,
        has_sold_history: bool,
    ) -> Result<(), StoreError>;

    async fn set_status(
        &self,
        shop_id: i64,
        status: ShopStatus,
        error: Option<&str>,
    ) -> Result<(), StoreError>;

    async fn record_daily_sales(
        &self,
        shop_id: i64,
        date: NaiveDate,
        totals: ShopTotals,
    ) -> Result<(), StoreError>;

    /// Queues a new sales-history crawl from page 1 with its own budget.
    async fn queue_continuation(
        &self,
        shop_id: i64,
        budget: u32,
        next_run_at: DateTime<Utc>,
    ) -> Result<Continuation, StoreError>;

    async fn continuation(&self, id: i64) -> Result<Option<Continuation>, StoreError>;

    async fn pending_continuations(&self) -> Result<Vec<Continuation>, StoreError>;

    /// Stores the schedule after one window and bumps `attempts`.
    async fn save_continuation(
        &self,
        id: i64,
        schedule: &TaskSchedule,
        status: ContinuationStatus,
        next_run_at: DateTime<Utc>,
        error: Option<&str>,
    ) -> Result<(), StoreError>;

    async fn insert_sold_items(&self, shop_id: i64, items: &[SoldItem]) -> Result<u64, StoreError>;

    /// Adds the catalog price of every sale to the shop's rollup for `date`
    /// and returns the amount added.
    async fn add_revenue(
        &self,
        shop_id: i64,
        date: NaiveDate,
        sales: &[SoldItem],
    ) -> Result<Decimal, StoreError>;
}
