//! Command handlers for the CLI.
//!
//! Each handler builds the storefront client and, where needed, the database
//! store from the loaded config, runs one pipeline operation and prints a
//! one-line summary.

use chrono::Utc;

use shoptrack_core::AppConfig;
use shoptrack_scraper::{ScraperConfig, StorefrontClient};
use shoptrack_sync::{
    ContinuationOptions, DrainSummary, PgStore, ShopUpdate, TrackingStore, UpdateOptions,
};

fn build_client(config: &AppConfig) -> anyhow::Result<StorefrontClient> {
    StorefrontClient::new(ScraperConfig::from_app_config(config))
        .map_err(|e| anyhow::anyhow!("failed to build storefront client: {e}"))
}

async fn connect_store(config: &AppConfig) -> anyhow::Result<PgStore> {
    let pool_config = shoptrack_db::PoolConfig::from_app_config(config);
    let pool = shoptrack_db::connect_pool(&config.database_url, pool_config).await?;
    shoptrack_db::run_migrations(&pool).await?;
    Ok(PgStore::new(pool))
}

fn print_update(shop: &str, update: &ShopUpdate) {
    let totals = update.plan.totals;
    println!(
        "{shop}: {} sales ({:+}), {} admirers ({:+}){}",
        totals.total_sales,
        update.plan.sales_delta,
        totals.admirers,
        update.plan.admirers_delta,
        if totals.on_vacation { ", on vacation" } else { "" }
    );
    if let Some(reconcile) = update.reconcile {
        println!(
            "  catalog: {} created, {} updated, {} reinstated, {} discontinued, {} new categories",
            reconcile.items_created,
            reconcile.items_updated,
            reconcile.items_reinstated,
            reconcile.items_discontinued,
            reconcile.categories_created
        );
    }
    if let Some(continuation) = &update.continuation {
        let budget = continuation.schedule.update_sold_items;
        println!(
            "  sales-history crawl #{} queued ({})",
            continuation.id,
            if budget == 0 {
                "full history".to_string()
            } else {
                format!("{budget} items")
            }
        );
    }
}

fn print_drain(shop: &str, summary: &DrainSummary) {
    println!(
        "{shop}: {} sold items over {} windows, revenue {} ({})",
        summary.items_inserted,
        summary.windows,
        summary.revenue,
        summary.status.as_str()
    );
}

pub(crate) async fn run_track(config: &AppConfig, shop: &str) -> anyhow::Result<()> {
    let client = build_client(config)?;
    let store = connect_store(config).await?;
    let options = UpdateOptions::for_today(config, true);

    let update = shoptrack_sync::track_shop(&client, &store, &store, shop, &options).await?;
    print_update(shop, &update);
    Ok(())
}

pub(crate) async fn run_refresh(config: &AppConfig, shop: &str) -> anyhow::Result<()> {
    let client = build_client(config)?;
    let store = connect_store(config).await?;
    let options = UpdateOptions::for_today(config, true);

    let update = shoptrack_sync::refresh_shop(&client, &store, &store, shop, &options).await?;
    print_update(shop, &update);
    Ok(())
}

pub(crate) async fn run_check(config: &AppConfig, shop: &str, full: bool) -> anyhow::Result<()> {
    let client = build_client(config)?;
    let snapshot = client.check_for_updates(shop, full).await?;

    println!(
        "{}: {} sales, {} admirers, sold history {}{}",
        snapshot.name,
        snapshot.total_sales,
        snapshot.admirers,
        if snapshot.has_sold_history { "public" } else { "hidden" },
        if snapshot.on_vacation { ", on vacation" } else { "" }
    );
    if full {
        for category in &snapshot.menu.categories {
            println!("  {:<32} {:>5} items", category.category, category.items.len());
        }
        println!(
            "  {} items in {} categories{}",
            snapshot.menu.item_count(),
            snapshot.menu.categories.len(),
            if snapshot.menu.incomplete {
                " (incomplete crawl)"
            } else {
                ""
            }
        );
    }
    Ok(())
}

pub(crate) async fn run_sold(config: &AppConfig, shop: &str, budget: u32) -> anyhow::Result<()> {
    let client = build_client(config)?;
    let store = connect_store(config).await?;

    let tracked = store
        .find_shop(shop)
        .await?
        .ok_or_else(|| anyhow::anyhow!("shop '{shop}' is not tracked; run `track` first"))?;
    let continuation = store
        .queue_continuation(tracked.id, budget, Utc::now())
        .await?;

    let options = ContinuationOptions::from_app_config(config);
    let summary =
        shoptrack_sync::drain_continuation(&client, &store, continuation, &options).await?;
    print_drain(shop, &summary);
    Ok(())
}

pub(crate) async fn run_update_all(config: &AppConfig, full: bool) -> anyhow::Result<()> {
    let client = build_client(config)?;
    let store = connect_store(config).await?;
    let options = UpdateOptions::for_today(config, full);

    let summary = shoptrack_sync::run_update_pass(&client, &store, &store, &options).await?;
    println!(
        "updated {} shops ({} failed, {} gone), {} catalog changes",
        summary.shops_updated, summary.shops_failed, summary.shops_not_found, summary.item_changes
    );

    let continuation_options = ContinuationOptions::from_app_config(config);
    for continuation in summary.continuations {
        let shop = continuation.shop_name.clone();
        let drained =
            shoptrack_sync::drain_continuation(&client, &store, continuation, &continuation_options)
                .await;
        match drained {
            Ok(drained) => print_drain(&shop, &drained),
            Err(e) => {
                tracing::error!(shop = %shop, error = %e, "sales-history crawl failed; skipping");
            }
        }
    }
    Ok(())
}
