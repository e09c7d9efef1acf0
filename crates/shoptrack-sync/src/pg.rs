//! Postgres-backed stores built on the `shoptrack-db` query functions.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use shoptrack_core::{
    ContinuationStatus, ItemChange, MenuCategory, ScrapedItem, ShopSnapshot, ShopStatus,
    ShopTotals, SoldItem, TaskSchedule,
};
use shoptrack_db::{ShopRow, SoldItemTaskRow};

use crate::error::StoreError;
use crate::store::{
    Catalog, CatalogStore, Continuation, StoredCategory, StoredItem, TrackedShop, TrackingStore,
};

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn to_continuation(&self, row: SoldItemTaskRow) -> Result<Continuation, StoreError> {
        let shop = shoptrack_db::get_shop_by_id(&self.pool, row.shop_id)
            .await?
            .ok_or(StoreError::Missing {
                entity: "shop",
                id: row.shop_id,
            })?;
        Ok(Continuation {
            id: row.id,
            shop_id: row.shop_id,
            shop_name: shop.name,
            schedule: row.schedule(),
            status: row.status()?,
            attempts: u32::try_from(row.attempts).unwrap_or(0),
            next_run_at: row.next_run_at,
        })
    }
}

fn tracked(row: ShopRow) -> Result<TrackedShop, StoreError> {
    Ok(TrackedShop {
        id: row.id,
        totals: row.totals(),
        has_sold_history: row.has_sold_history,
        status: row.status()?,
        name: row.name,
    })
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn load_catalog(&self, shop_id: i64) -> Result<Catalog, StoreError> {
        let categories = shoptrack_db::list_menu_items(&self.pool, shop_id)
            .await?
            .into_iter()
            .map(|row| StoredCategory {
                id: row.id,
                name: row.category,
            })
            .collect();
        let items = shoptrack_db::list_items(&self.pool, shop_id)
            .await?
            .into_iter()
            .map(|row| StoredItem {
                id: row.id,
                listing_id: row.listing_id,
                price: row.price,
                available: row.available,
                menu_item_id: row.menu_item_id,
            })
            .collect();
        Ok(Catalog { categories, items })
    }

    async fn create_category(
        &self,
        shop_id: i64,
        category: &MenuCategory,
    ) -> Result<i64, StoreError> {
        Ok(shoptrack_db::insert_menu_item(&self.pool, shop_id, category).await?)
    }

    async fn create_item(
        &self,
        shop_id: i64,
        menu_item_id: i64,
        item: &ScrapedItem,
    ) -> Result<i64, StoreError> {
        Ok(shoptrack_db::insert_item(&self.pool, shop_id, menu_item_id, item).await?)
    }

    async fn update_item(
        &self,
        item_id: i64,
        menu_item_id: i64,
        item: &ScrapedItem,
    ) -> Result<(), StoreError> {
        Ok(shoptrack_db::update_item(&self.pool, item_id, menu_item_id, item).await?)
    }

    async fn move_item(
        &self,
        item_id: i64,
        menu_item_id: i64,
        available: bool,
    ) -> Result<(), StoreError> {
        Ok(shoptrack_db::move_item(&self.pool, item_id, menu_item_id, available).await?)
    }

    async fn record_change(&self, shop_id: i64, change: &ItemChange) -> Result<(), StoreError> {
        shoptrack_db::insert_history_change(&self.pool, shop_id, change).await?;
        Ok(())
    }
}

#[async_trait]
impl TrackingStore for PgStore {
    async fn tracked_shops(&self) -> Result<Vec<TrackedShop>, StoreError> {
        shoptrack_db::list_tracked_shops(&self.pool)
            .await?
            .into_iter()
            .map(tracked)
            .collect()
    }

    async fn find_shop(&self, name: &str) -> Result<Option<TrackedShop>, StoreError> {
        shoptrack_db::get_shop_by_name(&self.pool, name)
            .await?
            .map(tracked)
            .transpose()
    }

    async fn save_shop(&self, shop: &ShopSnapshot) -> Result<i64, StoreError> {
        Ok(shoptrack_db::upsert_shop(&self.pool, shop).await?)
    }

    async fn save_totals(
        &self,
        shop_id: i64,
        totals: ShopTotals,
        has_sold_history: bool,
    ) -> Result<(), StoreError> {
        Ok(shoptrack_db::update_shop_totals(&self.pool, shop_id, totals, has_sold_history).await?)
    }

    async fn set_status(
        &self,
        shop_id: i64,
        status: ShopStatus,
        error: Option<&str>,
    ) -> Result<(), StoreError> {
        Ok(shoptrack_db::set_shop_status(&self.pool, shop_id, status, error).await?)
    }

    async fn record_daily_sales(
        &self,
        shop_id: i64,
        date: NaiveDate,
        totals: ShopTotals,
    ) -> Result<(), StoreError> {
        Ok(shoptrack_db::upsert_daily_sales(&self.pool, shop_id, date, totals).await?)
    }

    async fn queue_continuation(
        &self,
        shop_id: i64,
        budget: u32,
        next_run_at: DateTime<Utc>,
    ) -> Result<Continuation, StoreError> {
        let row =
            shoptrack_db::enqueue_sold_item_task(&self.pool, shop_id, budget, next_run_at).await?;
        self.to_continuation(row).await
    }

    async fn continuation(&self, id: i64) -> Result<Option<Continuation>, StoreError> {
        match shoptrack_db::get_sold_item_task(&self.pool, id).await? {
            Some(row) => Ok(Some(self.to_continuation(row).await?)),
            None => Ok(None),
        }
    }

    async fn pending_continuations(&self) -> Result<Vec<Continuation>, StoreError> {
        let rows = shoptrack_db::list_pending_sold_item_tasks(&self.pool).await?;
        let mut pending = Vec::with_capacity(rows.len());
        for row in rows {
            pending.push(self.to_continuation(row).await?);
        }
        Ok(pending)
    }

    async fn save_continuation(
        &self,
        id: i64,
        schedule: &TaskSchedule,
        status: ContinuationStatus,
        next_run_at: DateTime<Utc>,
        error: Option<&str>,
    ) -> Result<(), StoreError> {
        Ok(shoptrack_db::record_sold_item_task_run(
            &self.pool,
            id,
            schedule,
            status,
            next_run_at,
            error,
        )
        .await?)
    }

    async fn insert_sold_items(&self, shop_id: i64, items: &[SoldItem]) -> Result<u64, StoreError> {
        Ok(shoptrack_db::insert_sold_items(&self.pool, shop_id, items).await?)
    }

    async fn add_revenue(
        &self,
        shop_id: i64,
        date: NaiveDate,
        sales: &[SoldItem],
    ) -> Result<Decimal, StoreError> {
        let listing_ids: Vec<String> = sales.iter().map(|s| s.listing_id.clone()).collect();
        let amount = shoptrack_db::sum_listing_prices(&self.pool, shop_id, &listing_ids).await?;
        if !amount.is_zero() {
            shoptrack_db::add_daily_revenue(&self.pool, shop_id, date, amount).await?;
        }
        Ok(amount)
    }
}
