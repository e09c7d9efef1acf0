//! The scheduled refresh of tracked shops.
//!
//! Each shop is checked in turn. Failures are recorded on the shop row and
//! logged, and the pass moves on to the next shop.

use chrono::{Datelike, NaiveDate, Utc};

use shoptrack_core::{AppConfig, ShopStatus, ShopTotals};
use shoptrack_scraper::rate_limit::BackoffWindow;
use shoptrack_scraper::ShopScraper;

use crate::continuation::next_run_at;
use crate::error::SyncError;
use crate::reconcile::{shop_items_update, ReconcileSummary};
use crate::store::{CatalogStore, Continuation, TrackedShop, TrackingStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Date the daily rollup is filed under.
    pub today: NaiveDate,
    /// Run the menu crawl and reconciliation, not just the counter check.
    pub full_refresh: bool,
    /// Delay before a queued continuation first runs.
    pub continuation_delay: BackoffWindow,
}

impl UpdateOptions {
    /// Options for a pass run now. The menu is refreshed on the configured
    /// weekday, or always when `force_full` is set.
    #[must_use]
    pub fn for_today(config: &AppConfig, force_full: bool) -> Self {
        let today = Utc::now().date_naive();
        Self {
            today,
            full_refresh: force_full || today.weekday() == config.full_refresh_weekday,
            continuation_delay: BackoffWindow::new(
                config.scraper_backoff_min_secs,
                config.scraper_backoff_max_secs,
            ),
        }
    }
}

/// What one refresh decided to persist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShopUpdatePlan {
    /// Totals to persist and to file in the daily rollup.
    pub totals: ShopTotals,
    pub sales_delta: i64,
    pub admirers_delta: i64,
    /// Whether `totals` differ from what is stored.
    pub totals_changed: bool,
    /// Item budget of the sales-history crawl to queue, if any.
    pub sold_item_budget: Option<u32>,
}

/// Compares freshly observed counters against the stored ones.
///
/// While a shop is on vacation the observed counters are discarded and the
/// previous totals are kept, so vacation activity never shows up as sales.
#[must_use]
pub fn plan_shop_update(
    previous: ShopTotals,
    observed: ShopTotals,
    tracks_sold_history: bool,
) -> ShopUpdatePlan {
    let totals = if observed.on_vacation {
        ShopTotals {
            on_vacation: true,
            ..previous
        }
    } else {
        observed
    };
    let sales_delta = totals.total_sales - previous.total_sales;
    let admirers_delta = totals.admirers - previous.admirers;
    let sold_item_budget = (tracks_sold_history && sales_delta > 0)
        .then(|| u32::try_from(sales_delta).unwrap_or(u32::MAX));

    ShopUpdatePlan {
        totals,
        sales_delta,
        admirers_delta,
        totals_changed: totals != previous,
        sold_item_budget,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShopUpdate {
    pub shop_id: i64,
    pub plan: ShopUpdatePlan,
    /// Present on a full refresh.
    pub reconcile: Option<ReconcileSummary>,
    pub continuation: Option<Continuation>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdatePassSummary {
    pub shops_updated: u32,
    pub shops_failed: u32,
    pub shops_not_found: u32,
    /// History rows written across all reconciliations.
    pub item_changes: u32,
    /// Continuations queued during the pass.
    pub continuations: Vec<Continuation>,
}

/// Refreshes every tracked shop once.
///
/// # Errors
///
/// Returns an error only if the tracked shops cannot be listed. Per-shop
/// failures are logged, recorded on the shop row, and counted in the summary.
pub async fn run_update_pass<Sc, C, T>(
    scraper: &Sc,
    catalog: &C,
    tracking: &T,
    options: &UpdateOptions,
) -> Result<UpdatePassSummary, SyncError>
where
    Sc: ShopScraper + ?Sized,
    C: CatalogStore + ?Sized,
    T: TrackingStore + ?Sized,
{
    let shops = tracking.tracked_shops().await?;
    tracing::info!(
        shops = shops.len(),
        full_refresh = options.full_refresh,
        date = %options.today,
        "starting update pass"
    );

    let mut summary = UpdatePassSummary::default();
    for shop in &shops {
        match update_shop(scraper, catalog, tracking, shop, options).await {
            Ok(update) => {
                summary.shops_updated += 1;
                if let Some(reconcile) = update.reconcile {
                    summary.item_changes += reconcile.changes();
                }
                summary.continuations.extend(update.continuation);
            }
            Err(e) if e.is_shop_not_found() => {
                summary.shops_not_found += 1;
                tracing::warn!(shop = %shop.name, "shop page is gone; no longer tracked");
            }
            Err(e) => {
                summary.shops_failed += 1;
                tracing::error!(shop = %shop.name, error = %e, "shop update failed; skipping");
            }
        }
    }

    tracing::info!(
        updated = summary.shops_updated,
        failed = summary.shops_failed,
        not_found = summary.shops_not_found,
        item_changes = summary.item_changes,
        continuations = summary.continuations.len(),
        "update pass complete"
    );
    Ok(summary)
}

/// Refreshes one tracked shop and records the outcome in its status.
///
/// # Errors
///
/// Returns the scrape or persistence failure after marking the shop
/// `not_found` (for a missing shop page) or `failed`.
pub async fn update_shop<Sc, C, T>(
    scraper: &Sc,
    catalog: &C,
    tracking: &T,
    shop: &TrackedShop,
    options: &UpdateOptions,
) -> Result<ShopUpdate, SyncError>
where
    Sc: ShopScraper + ?Sized,
    C: CatalogStore + ?Sized,
    T: TrackingStore + ?Sized,
{
    let result = refresh(scraper, catalog, tracking, shop, options).await;
    if let Err(e) = &result {
        mark_failure(tracking, shop.id, e).await;
    }
    result
}

async fn refresh<Sc, C, T>(
    scraper: &Sc,
    catalog: &C,
    tracking: &T,
    shop: &TrackedShop,
    options: &UpdateOptions,
) -> Result<ShopUpdate, SyncError>
where
    Sc: ShopScraper + ?Sized,
    C: CatalogStore + ?Sized,
    T: TrackingStore + ?Sized,
{
    let mut snapshot = scraper
        .check_for_updates(&shop.name, options.full_refresh)
        .await?;
    let plan = plan_shop_update(shop.totals, snapshot.totals(), snapshot.has_sold_history);
    if snapshot.on_vacation && plan.totals.total_sales != snapshot.total_sales {
        tracing::info!(
            shop = %shop.name,
            observed = snapshot.total_sales,
            kept = plan.totals.total_sales,
            "shop is on vacation; keeping previous totals"
        );
    }

    tracking
        .record_daily_sales(shop.id, options.today, plan.totals)
        .await?;

    let reconcile = if options.full_refresh {
        snapshot.name.clone_from(&shop.name);
        snapshot.total_sales = plan.totals.total_sales;
        snapshot.admirers = plan.totals.admirers;
        tracking.save_shop(&snapshot).await?;
        Some(shop_items_update(catalog, shop.id, &snapshot.menu).await?)
    } else {
        if plan.totals_changed || snapshot.has_sold_history != shop.has_sold_history {
            tracking
                .save_totals(shop.id, plan.totals, snapshot.has_sold_history)
                .await?;
        }
        if shop.status != ShopStatus::Active {
            tracking.set_status(shop.id, ShopStatus::Active, None).await?;
        }
        None
    };

    let continuation = match plan.sold_item_budget {
        Some(budget) => Some(
            tracking
                .queue_continuation(shop.id, budget, next_run_at(options.continuation_delay))
                .await?,
        ),
        None => None,
    };

    tracing::info!(
        shop = %shop.name,
        sales_delta = plan.sales_delta,
        admirers_delta = plan.admirers_delta,
        full_refresh = options.full_refresh,
        sold_item_budget = ?plan.sold_item_budget,
        "shop updated"
    );

    Ok(ShopUpdate {
        shop_id: shop.id,
        plan,
        reconcile,
        continuation,
    })
}

/// Starts tracking `name`, or runs a full refresh if it is already tracked.
///
/// A new shop is scraped in full, stored, reconciled against its empty
/// catalog, and given an unbounded sales-history continuation when it has
/// public sales.
///
/// # Errors
///
/// Returns the scrape or persistence failure. For a new shop nothing is
/// stored if the shop page cannot be scraped.
pub async fn track_shop<Sc, C, T>(
    scraper: &Sc,
    catalog: &C,
    tracking: &T,
    name: &str,
    options: &UpdateOptions,
) -> Result<ShopUpdate, SyncError>
where
    Sc: ShopScraper + ?Sized,
    C: CatalogStore + ?Sized,
    T: TrackingStore + ?Sized,
{
    if let Some(existing) = tracking.find_shop(name).await? {
        tracing::info!(shop = %name, "shop already tracked; running a full refresh");
        let full = UpdateOptions {
            full_refresh: true,
            ..*options
        };
        return update_shop(scraper, catalog, tracking, &existing, &full).await;
    }

    let mut snapshot = scraper.scrape_shop(name).await?;
    snapshot.name = name.to_string();
    snapshot.menu = scraper.scrape_menu(&snapshot).await;

    let shop_id = tracking.save_shop(&snapshot).await?;
    let result = async {
        tracking
            .record_daily_sales(shop_id, options.today, snapshot.totals())
            .await?;
        let reconcile = shop_items_update(catalog, shop_id, &snapshot.menu).await?;
        let continuation = if snapshot.has_sold_history {
            Some(
                tracking
                    .queue_continuation(shop_id, 0, next_run_at(options.continuation_delay))
                    .await?,
            )
        } else {
            None
        };
        Ok::<_, SyncError>((reconcile, continuation))
    }
    .await;

    let (reconcile, continuation) = match result {
        Ok(done) => done,
        Err(e) => {
            mark_failure(tracking, shop_id, &e).await;
            return Err(e);
        }
    };

    tracing::info!(
        shop = %name,
        shop_id,
        items = reconcile.items_created,
        categories = reconcile.categories_created,
        sold_history = snapshot.has_sold_history,
        "shop tracked"
    );

    let totals = snapshot.totals();
    Ok(ShopUpdate {
        shop_id,
        plan: ShopUpdatePlan {
            totals,
            sales_delta: 0,
            admirers_delta: 0,
            totals_changed: true,
            sold_item_budget: continuation.as_ref().map(|_| 0),
        },
        reconcile: Some(reconcile),
        continuation,
    })
}

/// Full refresh of one already tracked shop.
///
/// # Errors
///
/// Returns [`SyncError::UnknownShop`] if `name` is not tracked, otherwise as
/// [`update_shop`].
pub async fn refresh_shop<Sc, C, T>(
    scraper: &Sc,
    catalog: &C,
    tracking: &T,
    name: &str,
    options: &UpdateOptions,
) -> Result<ShopUpdate, SyncError>
where
    Sc: ShopScraper + ?Sized,
    C: CatalogStore + ?Sized,
    T: TrackingStore + ?Sized,
{
    let shop = tracking
        .find_shop(name)
        .await?
        .ok_or_else(|| SyncError::UnknownShop(name.to_string()))?;
    let full = UpdateOptions {
        full_refresh: true,
        ..*options
    };
    update_shop(scraper, catalog, tracking, &shop, &full).await
}

async fn mark_failure<T>(tracking: &T, shop_id: i64, err: &SyncError)
where
    T: TrackingStore + ?Sized,
{
    let status = if err.is_shop_not_found() {
        ShopStatus::NotFound
    } else {
        ShopStatus::Failed
    };
    if let Err(e) = tracking
        .set_status(shop_id, status, Some(&err.to_string()))
        .await
    {
        tracing::warn!(shop_id, error = %e, "could not record shop status");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn totals(total_sales: i64, admirers: i64, on_vacation: bool) -> ShopTotals {
        ShopTotals {
            total_sales,
            admirers,
            on_vacation,
        }
    }

    #[test]
    fn positive_delta_queues_budget() {
        let plan = plan_shop_update(totals(100, 10, false), totals(107, 12, false), true);
        assert_eq!(plan.sales_delta, 7);
        assert_eq!(plan.admirers_delta, 2);
        assert!(plan.totals_changed);
        assert_eq!(plan.sold_item_budget, Some(7));
    }

    #[test]
    fn no_budget_without_sold_history() {
        let plan = plan_shop_update(totals(100, 10, false), totals(107, 10, false), false);
        assert_eq!(plan.sold_item_budget, None);
    }

    #[test]
    fn negative_delta_is_persisted_but_not_crawled() {
        let plan = plan_shop_update(totals(100, 10, false), totals(98, 10, false), true);
        assert_eq!(plan.sales_delta, -2);
        assert!(plan.totals_changed);
        assert_eq!(plan.sold_item_budget, None);
    }

    #[test]
    fn vacation_pins_previous_totals() {
        let plan = plan_shop_update(totals(100, 10, false), totals(140, 30, true), true);
        assert_eq!(plan.totals, totals(100, 10, true));
        assert_eq!(plan.sales_delta, 0);
        assert_eq!(plan.admirers_delta, 0);
        assert_eq!(plan.sold_item_budget, None);
    }

    #[test]
    fn unchanged_counters_are_not_rewritten() {
        let plan = plan_shop_update(totals(100, 10, false), totals(100, 10, false), true);
        assert!(!plan.totals_changed);
        assert_eq!(plan.sold_item_budget, None);
    }
}
