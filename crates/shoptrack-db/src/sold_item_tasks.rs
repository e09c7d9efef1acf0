//! Persisted sales-history continuations (`sold_item_tasks`).
//!
//! A row carries a [`TaskSchedule`] plus the time it may next run, so a
//! restarted daemon picks up every continuation still `pending`.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use shoptrack_core::{ContinuationStatus, TaskSchedule};

use crate::{to_i32, to_u32, DbError};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SoldItemTaskRow {
    pub id: i64,
    pub shop_id: i64,
    pub current_page: i32,
    pub last_page: i32,
    pub is_pagination_scraped: bool,
    pub is_scrape_finished: bool,
    /// Item budget; `0` means unbounded.
    pub update_sold_items: i32,
    /// Number of windows already run.
    pub attempts: i32,
    /// `pending`, `finished` or `abandoned`.
    pub status: String,
    pub next_run_at: DateTime<Utc>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SoldItemTaskRow {
    #[must_use]
    pub fn schedule(&self) -> TaskSchedule {
        TaskSchedule {
            current_page: to_u32(self.current_page).max(1),
            last_page: to_u32(self.last_page),
            is_pagination_scraped: self.is_pagination_scraped,
            is_scrape_finished: self.is_scrape_finished,
            update_sold_items: to_u32(self.update_sold_items),
        }
    }

    /// Parsed `status`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidValue`] for a value the CHECK constraint
    /// should have rejected.
    pub fn status(&self) -> Result<ContinuationStatus, DbError> {
        ContinuationStatus::parse(&self.status).ok_or_else(|| DbError::InvalidValue {
            column: "sold_item_tasks.status",
            value: self.status.clone(),
        })
    }
}

const TASK_COLUMNS: &str = "id, shop_id, current_page, last_page, is_pagination_scraped, \
     is_scrape_finished, update_sold_items, attempts, status, next_run_at, last_error, \
     created_at, updated_at";

/// Queues a new continuation for a shop, starting from page 1.
///
/// Every call creates its own row. New sales sit on the first pages of the
/// history, so a budget is never folded into a crawl that has moved past
/// them.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn enqueue_sold_item_task(
    pool: &PgPool,
    shop_id: i64,
    budget: u32,
    next_run_at: DateTime<Utc>,
) -> Result<SoldItemTaskRow, DbError> {
    let row = sqlx::query_as::<_, SoldItemTaskRow>(&format!(
        "INSERT INTO sold_item_tasks (shop_id, update_sold_items, next_run_at) \
         VALUES ($1, $2, $3) \
         RETURNING {TASK_COLUMNS}"
    ))
    .bind(shop_id)
    .bind(to_i32(budget))
    .bind(next_run_at)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_sold_item_task(
    pool: &PgPool,
    id: i64,
) -> Result<Option<SoldItemTaskRow>, DbError> {
    let row = sqlx::query_as::<_, SoldItemTaskRow>(&format!(
        "SELECT {TASK_COLUMNS} FROM sold_item_tasks WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Every pending continuation, soonest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_pending_sold_item_tasks(pool: &PgPool) -> Result<Vec<SoldItemTaskRow>, DbError> {
    let rows = sqlx::query_as::<_, SoldItemTaskRow>(&format!(
        "SELECT {TASK_COLUMNS} FROM sold_item_tasks \
         WHERE status = 'pending' \
         ORDER BY next_run_at, id"
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Stores the outcome of one crawl window and bumps `attempts`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the row does not exist, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn record_sold_item_task_run(
    pool: &PgPool,
    id: i64,
    schedule: &TaskSchedule,
    status: ContinuationStatus,
    next_run_at: DateTime<Utc>,
    last_error: Option<&str>,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE sold_item_tasks SET \
             current_page          = $2, \
             last_page             = $3, \
             is_pagination_scraped = $4, \
             is_scrape_finished    = $5, \
             update_sold_items     = $6, \
             status                = $7, \
             next_run_at           = $8, \
             last_error            = $9, \
             attempts              = attempts + 1, \
             updated_at            = NOW() \
         WHERE id = $1",
    )
    .bind(id)
    .bind(to_i32(schedule.current_page))
    .bind(to_i32(schedule.last_page))
    .bind(schedule.is_pagination_scraped)
    .bind(schedule.is_scrape_finished)
    .bind(to_i32(schedule.update_sold_items))
    .bind(status.as_str())
    .bind(next_run_at)
    .bind(last_error)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}
