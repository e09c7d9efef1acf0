//! Database operations for `menu_items`, the per-shop categories.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use shoptrack_core::MenuCategory;

use crate::DbError;

/// A row from the `menu_items` table. `category` is unique per shop.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MenuItemRow {
    pub id: i64,
    pub shop_id: i64,
    pub category: String,
    pub section_id: String,
    pub link: String,
    pub item_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// All categories of a shop, in creation order.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_menu_items(pool: &PgPool, shop_id: i64) -> Result<Vec<MenuItemRow>, DbError> {
    let rows = sqlx::query_as::<_, MenuItemRow>(
        "SELECT id, shop_id, category, section_id, link, item_count, created_at, updated_at \
         FROM menu_items \
         WHERE shop_id = $1 \
         ORDER BY id",
    )
    .bind(shop_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Creates a category row, or refreshes its source metadata when the name
/// already exists for the shop. Returns the row id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn insert_menu_item(
    pool: &PgPool,
    shop_id: i64,
    category: &MenuCategory,
) -> Result<i64, DbError> {
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO menu_items (shop_id, category, section_id, link, item_count) \
         VALUES ($1, $2, $3, $4, $5) \
         ON CONFLICT (shop_id, category) DO UPDATE SET \
             section_id = EXCLUDED.section_id, \
             link       = EXCLUDED.link, \
             item_count = EXCLUDED.item_count, \
             updated_at = NOW() \
         RETURNING id",
    )
    .bind(shop_id)
    .bind(&category.category)
    .bind(&category.section_id)
    .bind(&category.link)
    .bind(category.item_count)
    .fetch_one(pool)
    .await?;
    Ok(id)
}
