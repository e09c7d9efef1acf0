//! In-memory doubles for the sync pipeline tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

use shoptrack_core::{
    ContinuationStatus, ItemChange, MenuCategory, MenuSnapshot, ScrapedItem, ShopSnapshot,
    ShopStatus, ShopTotals, SoldItem, TaskSchedule,
};
use shoptrack_scraper::rate_limit::BackoffWindow;
use shoptrack_scraper::{ScraperError, ShopScraper};
use shoptrack_sync::{
    Catalog, CatalogStore, Continuation, ContinuationOptions, StoreError, StoredCategory,
    StoredItem, TrackedShop, TrackingStore, UpdateOptions,
};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
}

pub fn light_options() -> UpdateOptions {
    UpdateOptions {
        today: today(),
        full_refresh: false,
        continuation_delay: BackoffWindow::new(0, 0),
    }
}

pub fn full_options() -> UpdateOptions {
    UpdateOptions {
        full_refresh: true,
        ..light_options()
    }
}

pub fn continuation_options(max_attempts: u32) -> ContinuationOptions {
    ContinuationOptions {
        max_attempts,
        delay: BackoffWindow::new(0, 0),
        today: today(),
    }
}

pub fn item(listing_id: &str, price: i64) -> ScrapedItem {
    ScrapedItem {
        listing_id: listing_id.to_string(),
        name: format!("Listing {listing_id}"),
        price: Decimal::from(price),
        sale_price: Decimal::ZERO,
        discount: String::new(),
        available: true,
        link: format!("/listing/{listing_id}"),
    }
}

pub fn category(name: &str, items: Vec<ScrapedItem>) -> MenuCategory {
    let mut category = MenuCategory::synthetic(name);
    category.items = items;
    category
}

pub fn menu(categories: Vec<MenuCategory>) -> MenuSnapshot {
    MenuSnapshot {
        categories,
        incomplete: false,
    }
}

pub fn sold(listing_id: &str) -> SoldItem {
    SoldItem {
        listing_id: listing_id.to_string(),
        external_shop_id: "5544".to_string(),
        name: format!("Sold {listing_id}"),
        link: String::new(),
    }
}

pub fn shop(name: &str, total_sales: i64, admirers: i64) -> ShopSnapshot {
    let mut shop = ShopSnapshot::empty(name);
    shop.total_sales = total_sales;
    shop.admirers = admirers;
    shop.has_sold_history = true;
    shop
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MemShop {
    pub id: i64,
    pub snapshot: ShopSnapshot,
    pub status: ShopStatus,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MemItem {
    pub shop_id: i64,
    pub stored: StoredItem,
    pub sale_price: Decimal,
}

#[derive(Debug, Clone)]
pub struct MemContinuation {
    pub continuation: Continuation,
    pub last_error: Option<String>,
}

#[derive(Debug, Default)]
pub struct MemState {
    next_id: i64,
    pub shops: Vec<MemShop>,
    pub categories: Vec<(i64, StoredCategory)>,
    pub items: Vec<MemItem>,
    pub history: Vec<(i64, ItemChange)>,
    pub daily: HashMap<(i64, NaiveDate), (ShopTotals, Decimal)>,
    pub continuations: Vec<MemContinuation>,
    pub sold: Vec<(i64, SoldItem)>,
    pub totals_writes: u32,
    /// Makes `record_change` fail, to exercise persistence failures.
    pub fail_history: bool,
}

impl MemState {
    fn id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn shop_mut(&mut self, id: i64) -> Result<&mut MemShop, StoreError> {
        self.shops
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(StoreError::Missing { entity: "shop", id })
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    pub state: Mutex<MemState>,
}

impl MemoryStore {
    pub fn lock(&self) -> std::sync::MutexGuard<'_, MemState> {
        self.state.lock().unwrap()
    }

    /// Stores a shop directly, bypassing the pipeline.
    pub fn seed_shop(&self, snapshot: ShopSnapshot) -> i64 {
        let mut state = self.lock();
        let id = state.id();
        state.shops.push(MemShop {
            id,
            snapshot,
            status: ShopStatus::Active,
            last_error: None,
        });
        id
    }

    pub fn history_len(&self) -> usize {
        self.lock().history.len()
    }

    pub fn shop_status(&self, id: i64) -> ShopStatus {
        self.lock()
            .shops
            .iter()
            .find(|s| s.id == id)
            .unwrap()
            .status
    }

    pub fn shop_totals(&self, id: i64) -> ShopTotals {
        self.lock()
            .shops
            .iter()
            .find(|s| s.id == id)
            .unwrap()
            .snapshot
            .totals()
    }

    /// `(listing_id, category name, price, available)` for every item of a
    /// shop, sorted by listing id.
    pub fn items_of(&self, shop_id: i64) -> Vec<(String, String, Decimal, bool)> {
        let state = self.lock();
        let mut rows: Vec<_> = state
            .items
            .iter()
            .filter(|i| i.shop_id == shop_id)
            .map(|i| {
                let name = state
                    .categories
                    .iter()
                    .find(|(_, c)| c.id == i.stored.menu_item_id)
                    .map(|(_, c)| c.name.clone())
                    .unwrap_or_default();
                (
                    i.stored.listing_id.clone(),
                    name,
                    i.stored.price,
                    i.stored.available,
                )
            })
            .collect();
        rows.sort();
        rows
    }

    pub fn continuations(&self) -> Vec<Continuation> {
        self.lock()
            .continuations
            .iter()
            .map(|c| c.continuation.clone())
            .collect()
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn load_catalog(&self, shop_id: i64) -> Result<Catalog, StoreError> {
        let state = self.lock();
        Ok(Catalog {
            categories: state
                .categories
                .iter()
                .filter(|(owner, _)| *owner == shop_id)
                .map(|(_, c)| c.clone())
                .collect(),
            items: state
                .items
                .iter()
                .filter(|i| i.shop_id == shop_id)
                .map(|i| i.stored.clone())
                .collect(),
        })
    }

    async fn create_category(
        &self,
        shop_id: i64,
        category: &MenuCategory,
    ) -> Result<i64, StoreError> {
        let mut state = self.lock();
        if let Some((_, existing)) = state
            .categories
            .iter()
            .find(|(owner, c)| *owner == shop_id && c.name == category.category)
        {
            return Ok(existing.id);
        }
        let id = state.id();
        state.categories.push((
            shop_id,
            StoredCategory {
                id,
                name: category.category.clone(),
            },
        ));
        Ok(id)
    }

    async fn create_item(
        &self,
        shop_id: i64,
        menu_item_id: i64,
        item: &ScrapedItem,
    ) -> Result<i64, StoreError> {
        let mut state = self.lock();
        let id = state.id();
        state.items.push(MemItem {
            shop_id,
            stored: StoredItem {
                id,
                listing_id: item.listing_id.clone(),
                price: item.price,
                available: item.available,
                menu_item_id,
            },
            sale_price: item.sale_price,
        });
        Ok(id)
    }

    async fn update_item(
        &self,
        item_id: i64,
        menu_item_id: i64,
        item: &ScrapedItem,
    ) -> Result<(), StoreError> {
        let mut state = self.lock();
        let row = state
            .items
            .iter_mut()
            .find(|i| i.stored.id == item_id)
            .ok_or(StoreError::Missing {
                entity: "item",
                id: item_id,
            })?;
        row.stored.price = item.price;
        row.stored.available = item.available;
        row.stored.menu_item_id = menu_item_id;
        row.sale_price = item.sale_price;
        Ok(())
    }

    async fn move_item(
        &self,
        item_id: i64,
        menu_item_id: i64,
        available: bool,
    ) -> Result<(), StoreError> {
        let mut state = self.lock();
        let row = state
            .items
            .iter_mut()
            .find(|i| i.stored.id == item_id)
            .ok_or(StoreError::Missing {
                entity: "item",
                id: item_id,
            })?;
        row.stored.menu_item_id = menu_item_id;
        row.stored.available = available;
        Ok(())
    }

    async fn record_change(&self, shop_id: i64, change: &ItemChange) -> Result<(), StoreError> {
        let mut state = self.lock();
        if state.fail_history {
            return Err(StoreError::Missing {
                entity: "history table",
                id: shop_id,
            });
        }
        state.history.push((shop_id, change.clone()));
        Ok(())
    }
}

fn tracked(shop: &MemShop) -> TrackedShop {
    TrackedShop {
        id: shop.id,
        name: shop.snapshot.name.clone(),
        totals: shop.snapshot.totals(),
        has_sold_history: shop.snapshot.has_sold_history,
        status: shop.status,
    }
}

#[async_trait]
impl TrackingStore for MemoryStore {
    async fn tracked_shops(&self) -> Result<Vec<TrackedShop>, StoreError> {
        Ok(self
            .lock()
            .shops
            .iter()
            .filter(|s| s.status != ShopStatus::NotFound)
            .map(tracked)
            .collect())
    }

    async fn find_shop(&self, name: &str) -> Result<Option<TrackedShop>, StoreError> {
        Ok(self
            .lock()
            .shops
            .iter()
            .find(|s| s.snapshot.name == name)
            .map(tracked))
    }

    async fn save_shop(&self, shop: &ShopSnapshot) -> Result<i64, StoreError> {
        let mut state = self.lock();
        if let Some(existing) = state
            .shops
            .iter_mut()
            .find(|s| s.snapshot.name == shop.name)
        {
            existing.snapshot = shop.clone();
            existing.snapshot.menu = MenuSnapshot::default();
            existing.status = ShopStatus::Active;
            existing.last_error = None;
            return Ok(existing.id);
        }
        let id = state.id();
        let mut snapshot = shop.clone();
        snapshot.menu = MenuSnapshot::default();
        state.shops.push(MemShop {
            id,
            snapshot,
            status: ShopStatus::Active,
            last_error: None,
        });
        Ok(id)
    }

    async fn save_totals(
        &self,
        shop_id: i64,
        totals: ShopTotals,
        has_sold_history: bool,
    ) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.totals_writes += 1;
        let shop = state.shop_mut(shop_id)?;
        shop.snapshot.total_sales = totals.total_sales;
        shop.snapshot.admirers = totals.admirers;
        shop.snapshot.on_vacation = totals.on_vacation;
        shop.snapshot.has_sold_history = has_sold_history;
        Ok(())
    }

    async fn set_status(
        &self,
        shop_id: i64,
        status: ShopStatus,
        error: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut state = self.lock();
        let shop = state.shop_mut(shop_id)?;
        shop.status = status;
        shop.last_error = error.map(str::to_string);
        Ok(())
    }

    async fn record_daily_sales(
        &self,
        shop_id: i64,
        date: NaiveDate,
        totals: ShopTotals,
    ) -> Result<(), StoreError> {
        let mut state = self.lock();
        let entry = state
            .daily
            .entry((shop_id, date))
            .or_insert((totals, Decimal::ZERO));
        entry.0 = totals;
        Ok(())
    }

    async fn queue_continuation(
        &self,
        shop_id: i64,
        budget: u32,
        next_run_at: DateTime<Utc>,
    ) -> Result<Continuation, StoreError> {
        let mut state = self.lock();
        let shop_name = state.shop_mut(shop_id)?.snapshot.name.clone();
        let id = state.id();
        let continuation = Continuation {
            id,
            shop_id,
            shop_name,
            schedule: TaskSchedule::with_budget(budget),
            status: ContinuationStatus::Pending,
            attempts: 0,
            next_run_at,
        };
        state.continuations.push(MemContinuation {
            continuation: continuation.clone(),
            last_error: None,
        });
        Ok(continuation)
    }

    async fn continuation(&self, id: i64) -> Result<Option<Continuation>, StoreError> {
        Ok(self
            .lock()
            .continuations
            .iter()
            .find(|c| c.continuation.id == id)
            .map(|c| c.continuation.clone()))
    }

    async fn pending_continuations(&self) -> Result<Vec<Continuation>, StoreError> {
        Ok(self
            .lock()
            .continuations
            .iter()
            .filter(|c| c.continuation.status == ContinuationStatus::Pending)
            .map(|c| c.continuation.clone())
            .collect())
    }

    async fn save_continuation(
        &self,
        id: i64,
        schedule: &TaskSchedule,
        status: ContinuationStatus,
        next_run_at: DateTime<Utc>,
        error: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut state = self.lock();
        let row = state
            .continuations
            .iter_mut()
            .find(|c| c.continuation.id == id)
            .ok_or(StoreError::Missing {
                entity: "continuation",
                id,
            })?;
        row.continuation.schedule = *schedule;
        row.continuation.status = status;
        row.continuation.next_run_at = next_run_at;
        row.continuation.attempts += 1;
        row.last_error = error.map(str::to_string);
        Ok(())
    }

    async fn insert_sold_items(&self, shop_id: i64, items: &[SoldItem]) -> Result<u64, StoreError> {
        let mut state = self.lock();
        state
            .sold
            .extend(items.iter().map(|item| (shop_id, item.clone())));
        Ok(items.len() as u64)
    }

    async fn add_revenue(
        &self,
        shop_id: i64,
        date: NaiveDate,
        sales: &[SoldItem],
    ) -> Result<Decimal, StoreError> {
        let mut state = self.lock();
        let amount: Decimal = sales
            .iter()
            .filter_map(|sale| {
                state
                    .items
                    .iter()
                    .find(|i| i.shop_id == shop_id && i.stored.listing_id == sale.listing_id)
            })
            .map(|i| {
                if i.sale_price > Decimal::ZERO {
                    i.sale_price
                } else {
                    i.stored.price
                }
            })
            .sum();
        let totals = state.shop_mut(shop_id)?.snapshot.totals();
        state
            .daily
            .entry((shop_id, date))
            .or_insert((totals, Decimal::ZERO))
            .1 += amount;
        Ok(amount)
    }
}

// ---------------------------------------------------------------------------
// FakeScraper
// ---------------------------------------------------------------------------

/// Serves canned shop snapshots and scripted sales-history windows.
#[derive(Debug, Default)]
pub struct FakeScraper {
    pub shops: Mutex<HashMap<String, ShopSnapshot>>,
    pub sales: Mutex<VecDeque<(Vec<SoldItem>, TaskSchedule)>>,
    pub sales_calls: Mutex<Vec<TaskSchedule>>,
}

impl FakeScraper {
    pub fn set_shop(&self, shop: ShopSnapshot) {
        self.shops.lock().unwrap().insert(shop.name.clone(), shop);
    }

    pub fn remove_shop(&self, name: &str) {
        self.shops.lock().unwrap().remove(name);
    }

    pub fn push_window(&self, items: Vec<SoldItem>, schedule: TaskSchedule) {
        self.sales.lock().unwrap().push_back((items, schedule));
    }

    fn snapshot(&self, name: &str) -> Result<ShopSnapshot, ScraperError> {
        self.shops
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| ScraperError::ShopNotFound {
                shop: name.to_string(),
            })
    }
}

#[async_trait]
impl ShopScraper for FakeScraper {
    async fn scrape_shop(&self, name: &str) -> Result<ShopSnapshot, ScraperError> {
        let mut shop = self.snapshot(name)?;
        shop.menu = MenuSnapshot::default();
        Ok(shop)
    }

    async fn scrape_menu(&self, shop: &ShopSnapshot) -> MenuSnapshot {
        self.snapshot(&shop.name)
            .map(|s| s.menu)
            .unwrap_or_default()
    }

    async fn scrape_sales_history(
        &self,
        _shop: &str,
        task: TaskSchedule,
    ) -> (Vec<SoldItem>, TaskSchedule) {
        self.sales_calls.lock().unwrap().push(task);
        self.sales.lock().unwrap().pop_front().unwrap_or_else(|| {
            let mut finished = task;
            finished.finish();
            (Vec::new(), finished)
        })
    }

    async fn check_for_updates(
        &self,
        shop: &str,
        need_item_refresh: bool,
    ) -> Result<ShopSnapshot, ScraperError> {
        let mut snapshot = self.snapshot(shop)?;
        if !need_item_refresh {
            snapshot.categories.clear();
            snapshot.menu = MenuSnapshot::default();
        }
        Ok(snapshot)
    }
}
