//! Database operations for `items`, the catalog listings.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use shoptrack_core::ScrapedItem;

use crate::DbError;

/// A row from the `items` table. `listing_id` is unique per shop.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ItemRow {
    pub id: i64,
    pub shop_id: i64,
    pub menu_item_id: i64,
    pub listing_id: String,
    pub name: String,
    pub price: Decimal,
    pub sale_price: Decimal,
    pub discount: String,
    pub available: bool,
    pub link: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Every listing of a shop, in creation order.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_items(pool: &PgPool, shop_id: i64) -> Result<Vec<ItemRow>, DbError> {
    let rows = sqlx::query_as::<_, ItemRow>(
        "SELECT id, shop_id, menu_item_id, listing_id, name, price, sale_price, discount, \
                available, link, created_at, updated_at \
         FROM items \
         WHERE shop_id = $1 \
         ORDER BY id",
    )
    .bind(shop_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Inserts a newly sighted listing. Returns the row id.
///
/// A conflicting `(shop_id, listing_id)` keeps the existing row and returns
/// its id, so replaying a creation is harmless.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_item(
    pool: &PgPool,
    shop_id: i64,
    menu_item_id: i64,
    item: &ScrapedItem,
) -> Result<i64, DbError> {
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO items \
             (shop_id, menu_item_id, listing_id, name, price, sale_price, discount, available, link) \
         VALUES ($1, $2, $3, $4, $5::numeric(12,2), $6::numeric(12,2), $7, $8, $9) \
         ON CONFLICT (shop_id, listing_id) DO UPDATE SET updated_at = items.updated_at \
         RETURNING id",
    )
    .bind(shop_id)
    .bind(menu_item_id)
    .bind(&item.listing_id)
    .bind(&item.name)
    .bind(item.price)
    .bind(item.sale_price)
    .bind(&item.discount)
    .bind(item.available)
    .bind(&item.link)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

/// Overwrites a listing with freshly scraped values and files it under
/// `menu_item_id`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the row does not exist, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn update_item(
    pool: &PgPool,
    item_id: i64,
    menu_item_id: i64,
    item: &ScrapedItem,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE items SET \
             menu_item_id = $2, name = $3, price = $4::numeric(12,2), \
             sale_price = $5::numeric(12,2), discount = $6, available = $7, link = $8, \
             updated_at = NOW() \
         WHERE id = $1",
    )
    .bind(item_id)
    .bind(menu_item_id)
    .bind(&item.name)
    .bind(item.price)
    .bind(item.sale_price)
    .bind(&item.discount)
    .bind(item.available)
    .bind(&item.link)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Refiles a listing under another category and sets its availability.
/// Used when a listing is discontinued.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the row does not exist, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn move_item(
    pool: &PgPool,
    item_id: i64,
    menu_item_id: i64,
    available: bool,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE items SET menu_item_id = $2, available = $3, updated_at = NOW() WHERE id = $1",
    )
    .bind(item_id)
    .bind(menu_item_id)
    .bind(available)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Sums the current selling price of each listing id in `listing_ids`,
/// counting repeats once per occurrence. A discounted listing contributes its
/// sale price; unknown listings contribute nothing.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn sum_listing_prices(
    pool: &PgPool,
    shop_id: i64,
    listing_ids: &[String],
) -> Result<Decimal, DbError> {
    if listing_ids.is_empty() {
        return Ok(Decimal::ZERO);
    }
    let total = sqlx::query_scalar::<_, Decimal>(
        "SELECT COALESCE(SUM(CASE WHEN i.sale_price > 0 THEN i.sale_price ELSE i.price END), 0) \
         FROM UNNEST($2::text[]) AS sold(listing_id) \
         JOIN items i ON i.shop_id = $1 AND i.listing_id = sold.listing_id",
    )
    .bind(shop_id)
    .bind(listing_ids)
    .fetch_one(pool)
    .await?;
    Ok(total)
}
