//! Append-only `item_history_changes` ledger.
//!
//! There is deliberately no update or delete here.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use shoptrack_core::ItemChange;

use crate::DbError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ItemHistoryChangeRow {
    pub id: i64,
    pub shop_id: i64,
    pub item_id: i64,
    pub new_item_created: bool,
    pub old_price: Decimal,
    pub new_price: Decimal,
    pub old_available: bool,
    pub new_available: bool,
    pub old_menu_item_id: Option<i64>,
    pub new_menu_item_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Appends one audit row. Returns its id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_history_change(
    pool: &PgPool,
    shop_id: i64,
    change: &ItemChange,
) -> Result<i64, DbError> {
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO item_history_changes \
             (shop_id, item_id, new_item_created, old_price, new_price, old_available, \
              new_available, old_menu_item_id, new_menu_item_id) \
         VALUES ($1, $2, $3, $4::numeric(12,2), $5::numeric(12,2), $6, $7, $8, $9) \
         RETURNING id",
    )
    .bind(shop_id)
    .bind(change.item_id)
    .bind(change.new_item_created)
    .bind(change.old_price)
    .bind(change.new_price)
    .bind(change.old_available)
    .bind(change.new_available)
    .bind(change.old_menu_item_id)
    .bind(change.new_menu_item_id)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

/// Most recent changes for a shop, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_history_for_shop(
    pool: &PgPool,
    shop_id: i64,
    limit: i64,
) -> Result<Vec<ItemHistoryChangeRow>, DbError> {
    let rows = sqlx::query_as::<_, ItemHistoryChangeRow>(
        "SELECT id, shop_id, item_id, new_item_created, old_price, new_price, old_available, \
                new_available, old_menu_item_id, new_menu_item_id, created_at \
         FROM item_history_changes \
         WHERE shop_id = $1 \
         ORDER BY created_at DESC, id DESC \
         LIMIT $2",
    )
    .bind(shop_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_history_for_shop(pool: &PgPool, shop_id: i64) -> Result<i64, DbError> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM item_history_changes WHERE shop_id = $1",
    )
    .bind(shop_id)
    .fetch_one(pool)
    .await?;
    Ok(count)
}
