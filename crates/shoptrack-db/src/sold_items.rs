//! Database operations for `sold_items`.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use shoptrack_core::SoldItem;

use crate::DbError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SoldItemRow {
    pub id: i64,
    pub shop_id: i64,
    pub listing_id: String,
    pub external_shop_id: String,
    pub name: String,
    pub link: String,
    pub created_at: DateTime<Utc>,
}

/// Inserts sale events in slice order inside one transaction, so ids follow
/// the chronological order the crawler returns. Returns the number inserted.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any insert fails; nothing is written then.
pub async fn insert_sold_items(
    pool: &PgPool,
    shop_id: i64,
    items: &[SoldItem],
) -> Result<u64, DbError> {
    if items.is_empty() {
        return Ok(0);
    }

    let mut tx = pool.begin().await?;
    let mut inserted = 0u64;
    for item in items {
        let result = sqlx::query(
            "INSERT INTO sold_items (shop_id, listing_id, external_shop_id, name, link) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(shop_id)
        .bind(&item.listing_id)
        .bind(&item.external_shop_id)
        .bind(&item.name)
        .bind(&item.link)
        .execute(&mut *tx)
        .await?;
        inserted += result.rows_affected();
    }
    tx.commit().await?;

    Ok(inserted)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_sold_items(pool: &PgPool, shop_id: i64) -> Result<i64, DbError> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM sold_items WHERE shop_id = $1")
        .bind(shop_id)
        .fetch_one(pool)
        .await?;
    Ok(count)
}
