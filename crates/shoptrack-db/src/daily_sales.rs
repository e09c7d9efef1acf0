//! Daily per-shop rollups in `daily_shop_sales`.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use shoptrack_core::ShopTotals;

use crate::DbError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DailyShopSalesRow {
    pub id: i64,
    pub shop_id: i64,
    pub sales_date: NaiveDate,
    pub total_sales: i64,
    pub admirers: i64,
    pub revenue: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Writes the day's totals for a shop. A second write on the same day
/// replaces the totals and keeps the accumulated revenue.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_daily_sales(
    pool: &PgPool,
    shop_id: i64,
    sales_date: NaiveDate,
    totals: ShopTotals,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO daily_shop_sales (shop_id, sales_date, total_sales, admirers) \
         VALUES ($1, $2, $3, $4) \
         ON CONFLICT (shop_id, sales_date) DO UPDATE SET \
             total_sales = EXCLUDED.total_sales, \
             admirers    = EXCLUDED.admirers, \
             updated_at  = NOW()",
    )
    .bind(shop_id)
    .bind(sales_date)
    .bind(totals.total_sales)
    .bind(totals.admirers)
    .execute(pool)
    .await?;
    Ok(())
}

/// Adds `amount` to the day's revenue. When the day has no row yet, one is
/// created carrying the shop's current persisted totals.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the shop does not exist, or
/// [`DbError::Sqlx`] if the write fails.
pub async fn add_daily_revenue(
    pool: &PgPool,
    shop_id: i64,
    sales_date: NaiveDate,
    amount: Decimal,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "INSERT INTO daily_shop_sales (shop_id, sales_date, total_sales, admirers, revenue) \
         SELECT id, $2, total_sales, admirers, $3::numeric(14,2) FROM shops WHERE id = $1 \
         ON CONFLICT (shop_id, sales_date) DO UPDATE SET \
             revenue    = daily_shop_sales.revenue + EXCLUDED.revenue, \
             updated_at = NOW()",
    )
    .bind(shop_id)
    .bind(sales_date)
    .bind(amount)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Most recent rollups for a shop, newest day first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_daily_sales(
    pool: &PgPool,
    shop_id: i64,
    limit: i64,
) -> Result<Vec<DailyShopSalesRow>, DbError> {
    let rows = sqlx::query_as::<_, DailyShopSalesRow>(
        "SELECT id, shop_id, sales_date, total_sales, admirers, revenue, created_at, updated_at \
         FROM daily_shop_sales \
         WHERE shop_id = $1 \
         ORDER BY sales_date DESC \
         LIMIT $2",
    )
    .bind(shop_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
