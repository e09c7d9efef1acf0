//! Database operations for the `shops` table.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use shoptrack_core::{ShopSnapshot, ShopStatus, ShopTotals};

use crate::DbError;

/// A row from the `shops` table.
///
/// The jsonb columns (`review_keywords`, `members`, `social_links`) are kept
/// as raw [`serde_json::Value`]; nothing in the update pipeline reads them.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ShopRow {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub location: String,
    pub on_vacation: bool,
    pub total_sales: i64,
    pub admirers: i64,
    pub has_sold_history: bool,
    pub review_rating: f64,
    pub review_count: i64,
    pub review_keywords: serde_json::Value,
    pub last_update: String,
    pub join_date: String,
    pub members: serde_json::Value,
    pub social_links: serde_json::Value,
    /// `active`, `failed` or `not_found`.
    pub status: String,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ShopRow {
    #[must_use]
    pub fn totals(&self) -> ShopTotals {
        ShopTotals {
            total_sales: self.total_sales,
            admirers: self.admirers,
            on_vacation: self.on_vacation,
        }
    }

    /// Parsed `status`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidValue`] for a value the CHECK constraint
    /// should have rejected.
    pub fn status(&self) -> Result<ShopStatus, DbError> {
        ShopStatus::parse(&self.status).ok_or_else(|| DbError::InvalidValue {
            column: "shops.status",
            value: self.status.clone(),
        })
    }
}

const SHOP_COLUMNS: &str = "id, name, description, location, on_vacation, total_sales, admirers, \
     has_sold_history, review_rating, review_count, review_keywords, last_update, join_date, \
     members, social_links, status, last_error, created_at, updated_at";

/// Inserts or refreshes a shop from a full snapshot and resets its status
/// to `active`.
///
/// Conflicts on `name`. Returns the internal `id`.
///
/// # Errors
///
/// Returns [`DbError::Json`] if the jsonb fields cannot be serialized, or
/// [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_shop(pool: &PgPool, shop: &ShopSnapshot) -> Result<i64, DbError> {
    let keywords = serde_json::to_value(&shop.reviews.keywords)?;
    let members = serde_json::to_value(&shop.members)?;
    let social_links = serde_json::to_value(&shop.social_links)?;

    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO shops \
             (name, description, location, on_vacation, total_sales, admirers, has_sold_history, \
              review_rating, review_count, review_keywords, last_update, join_date, members, \
              social_links, status, last_error) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10::jsonb, $11, $12, $13::jsonb, \
                 $14::jsonb, 'active', NULL) \
         ON CONFLICT (name) DO UPDATE SET \
             description      = EXCLUDED.description, \
             location         = EXCLUDED.location, \
             on_vacation      = EXCLUDED.on_vacation, \
             total_sales      = EXCLUDED.total_sales, \
             admirers         = EXCLUDED.admirers, \
             has_sold_history = EXCLUDED.has_sold_history, \
             review_rating    = EXCLUDED.review_rating, \
             review_count     = EXCLUDED.review_count, \
             review_keywords  = EXCLUDED.review_keywords, \
             last_update      = EXCLUDED.last_update, \
             join_date        = EXCLUDED.join_date, \
             members          = EXCLUDED.members, \
             social_links     = EXCLUDED.social_links, \
             status           = 'active', \
             last_error       = NULL, \
             updated_at       = NOW() \
         RETURNING id",
    )
    .bind(&shop.name)
    .bind(&shop.description)
    .bind(&shop.location)
    .bind(shop.on_vacation)
    .bind(shop.total_sales)
    .bind(shop.admirers)
    .bind(shop.has_sold_history)
    .bind(shop.reviews.rating)
    .bind(shop.reviews.count)
    .bind(keywords)
    .bind(&shop.last_update)
    .bind(&shop.join_date)
    .bind(members)
    .bind(social_links)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Looks up a shop by its storefront name.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_shop_by_name(pool: &PgPool, name: &str) -> Result<Option<ShopRow>, DbError> {
    let row = sqlx::query_as::<_, ShopRow>(&format!(
        "SELECT {SHOP_COLUMNS} FROM shops WHERE name = $1"
    ))
    .bind(name)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_shop_by_id(pool: &PgPool, id: i64) -> Result<Option<ShopRow>, DbError> {
    let row = sqlx::query_as::<_, ShopRow>(&format!(
        "SELECT {SHOP_COLUMNS} FROM shops WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Shops the scheduler should visit: every shop not marked `not_found`,
/// oldest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_tracked_shops(pool: &PgPool) -> Result<Vec<ShopRow>, DbError> {
    let rows = sqlx::query_as::<_, ShopRow>(&format!(
        "SELECT {SHOP_COLUMNS} FROM shops WHERE status <> 'not_found' ORDER BY id"
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Overwrites the three counters the daily check observes.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no shop has `shop_id`, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn update_shop_totals(
    pool: &PgPool,
    shop_id: i64,
    totals: ShopTotals,
    has_sold_history: bool,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE shops SET \
             total_sales = $2, admirers = $3, on_vacation = $4, has_sold_history = $5, \
             updated_at = NOW() \
         WHERE id = $1",
    )
    .bind(shop_id)
    .bind(totals.total_sales)
    .bind(totals.admirers)
    .bind(totals.on_vacation)
    .bind(has_sold_history)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Records the outcome of a refresh.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no shop has `shop_id`, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn set_shop_status(
    pool: &PgPool,
    shop_id: i64,
    status: ShopStatus,
    error: Option<&str>,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE shops SET status = $2, last_error = $3, updated_at = NOW() WHERE id = $1",
    )
    .bind(shop_id)
    .bind(status.as_str())
    .bind(error)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}
