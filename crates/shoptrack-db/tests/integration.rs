//! Offline unit tests for shoptrack-db pool configuration and row types.
//! These tests do not require a live database connection.

use chrono::{Utc, Weekday};
use shoptrack_core::{AppConfig, ContinuationStatus, Environment, ShopStatus};
use shoptrack_db::{PoolConfig, ShopRow, SoldItemTaskRow};

#[test]
fn pool_config_from_app_config_uses_core_values() {
    let app_config = AppConfig {
        database_url: "postgres://example".to_string(),
        env: Environment::Test,
        log_level: "info".to_string(),
        db_max_connections: 42,
        db_min_connections: 7,
        db_acquire_timeout_secs: 9,
        source_base_url: "https://www.etsy.com".to_string(),
        scraper_request_timeout_secs: 30,
        scraper_min_delay_ms: 1_500,
        scraper_jitter_ms: 1_500,
        scraper_backoff_min_secs: 10,
        scraper_backoff_max_secs: 89,
        scraper_max_retries: 3,
        scraper_proxies: Vec::new(),
        scraper_user_agents: Vec::new(),
        sold_max_page_limit: 10,
        sold_items_per_page: 24,
        update_cron: "0 0 3 * * *".to_string(),
        full_refresh_weekday: Weekday::Sun,
        continuation_max_attempts: 30,
    };

    let pool_config = PoolConfig::from_app_config(&app_config);
    assert_eq!(pool_config.max_connections, 42);
    assert_eq!(pool_config.min_connections, 7);
    assert_eq!(pool_config.acquire_timeout_secs, 9);
}

fn task_row(current_page: i32, update_sold_items: i32, status: &str) -> SoldItemTaskRow {
    SoldItemTaskRow {
        id: 1,
        shop_id: 9,
        current_page,
        last_page: 12,
        is_pagination_scraped: true,
        is_scrape_finished: false,
        update_sold_items,
        attempts: 2,
        status: status.to_string(),
        next_run_at: Utc::now(),
        last_error: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

#[test]
fn task_row_converts_to_schedule() {
    let schedule = task_row(5, 48, "pending").schedule();
    assert_eq!(schedule.current_page, 5);
    assert_eq!(schedule.last_page, 12);
    assert!(schedule.is_pagination_scraped);
    assert!(!schedule.is_scrape_finished);
    assert_eq!(schedule.update_sold_items, 48);
}

#[test]
fn task_row_with_corrupt_counters_is_clamped() {
    let schedule = task_row(0, -3, "pending").schedule();
    assert_eq!(schedule.current_page, 1);
    assert_eq!(schedule.update_sold_items, 0);
}

#[test]
fn task_row_status_is_parsed() {
    assert_eq!(
        task_row(1, 0, "abandoned").status().unwrap(),
        ContinuationStatus::Abandoned
    );
    assert!(task_row(1, 0, "paused").status().is_err());
}

#[test]
fn shop_row_exposes_totals_and_status() {
    let row = ShopRow {
        id: 3,
        name: "CandleCraft".to_string(),
        description: String::new(),
        location: String::new(),
        on_vacation: true,
        total_sales: 1_250,
        admirers: 310,
        has_sold_history: true,
        review_rating: 4.8,
        review_count: 200,
        review_keywords: serde_json::json!({}),
        last_update: String::new(),
        join_date: String::new(),
        members: serde_json::json!([]),
        social_links: serde_json::json!([]),
        status: "not_found".to_string(),
        last_error: Some("shop not found: CandleCraft".to_string()),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };

    let totals = row.totals();
    assert_eq!(totals.total_sales, 1_250);
    assert_eq!(totals.admirers, 310);
    assert!(totals.on_vacation);
    assert_eq!(row.status().unwrap(), ShopStatus::NotFound);
}
