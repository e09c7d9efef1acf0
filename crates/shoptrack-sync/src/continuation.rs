//! Stepping persisted sales-history crawls one window at a time.

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use rust_decimal::Decimal;

use shoptrack_core::{AppConfig, ContinuationStatus, TaskSchedule};
use shoptrack_scraper::rate_limit::BackoffWindow;
use shoptrack_scraper::ShopScraper;

use crate::error::SyncError;
use crate::store::{Continuation, TrackingStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContinuationOptions {
    /// Windows a continuation may run before it is abandoned.
    pub max_attempts: u32,
    /// Delay between windows.
    pub delay: BackoffWindow,
    /// Date revenue is filed under.
    pub today: NaiveDate,
}

impl ContinuationOptions {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            max_attempts: config.continuation_max_attempts,
            delay: BackoffWindow::new(
                config.scraper_backoff_min_secs,
                config.scraper_backoff_max_secs,
            ),
            today: Utc::now().date_naive(),
        }
    }
}

/// Outcome of one window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContinuationStep {
    pub status: ContinuationStatus,
    pub schedule: TaskSchedule,
    pub items_inserted: u64,
    pub revenue: Decimal,
    /// When the next window is due; meaningful while `status` is pending.
    pub next_run_at: DateTime<Utc>,
}

/// A random instant inside `window` from now.
pub(crate) fn next_run_at(window: BackoffWindow) -> DateTime<Utc> {
    let delay = TimeDelta::from_std(window.sample()).unwrap_or(TimeDelta::zero());
    Utc::now() + delay
}

/// Runs one window of a pending continuation and persists the result.
///
/// Sold items are inserted and their catalog value added to the day's
/// revenue. The continuation is then marked finished, rescheduled, or
/// abandoned once `max_attempts` windows have run without finishing. A
/// budgeted continuation carries only the unspent budget forward.
///
/// # Errors
///
/// Returns a [`SyncError::Store`] if the items or the schedule cannot be
/// persisted. Crawl failures never surface here; they end the window early
/// and the schedule resumes from the failed page.
pub async fn advance_continuation<Sc, T>(
    scraper: &Sc,
    tracking: &T,
    continuation: &Continuation,
    options: &ContinuationOptions,
) -> Result<ContinuationStep, SyncError>
where
    Sc: ShopScraper + ?Sized,
    T: TrackingStore + ?Sized,
{
    if continuation.status != ContinuationStatus::Pending {
        return Ok(ContinuationStep {
            status: continuation.status,
            schedule: continuation.schedule,
            items_inserted: 0,
            revenue: Decimal::ZERO,
            next_run_at: continuation.next_run_at,
        });
    }

    let (items, mut schedule) = scraper
        .scrape_sales_history(&continuation.shop_name, continuation.schedule)
        .await;

    let items_inserted = tracking
        .insert_sold_items(continuation.shop_id, &items)
        .await?;
    let revenue = if items.is_empty() {
        Decimal::ZERO
    } else {
        tracking
            .add_revenue(continuation.shop_id, options.today, &items)
            .await?
    };

    let budget = continuation.schedule.update_sold_items;
    if budget > 0 && !schedule.is_scrape_finished {
        let spent = u32::try_from(items.len()).unwrap_or(u32::MAX);
        schedule.update_sold_items = budget.saturating_sub(spent).max(1);
    }

    let attempts = continuation.attempts.saturating_add(1);
    let (status, error) = if schedule.is_scrape_finished {
        (ContinuationStatus::Finished, None)
    } else if attempts >= options.max_attempts {
        (
            ContinuationStatus::Abandoned,
            Some(format!(
                "not finished after {attempts} windows (stopped at page {})",
                schedule.current_page
            )),
        )
    } else {
        (ContinuationStatus::Pending, None)
    };
    let next_run_at = next_run_at(options.delay);

    tracking
        .save_continuation(
            continuation.id,
            &schedule,
            status,
            next_run_at,
            error.as_deref(),
        )
        .await?;

    match status {
        ContinuationStatus::Abandoned => tracing::error!(
            shop = %continuation.shop_name,
            continuation_id = continuation.id,
            attempts,
            current_page = schedule.current_page,
            "sales-history crawl abandoned"
        ),
        _ => tracing::info!(
            shop = %continuation.shop_name,
            continuation_id = continuation.id,
            items = items_inserted,
            %revenue,
            status = status.as_str(),
            current_page = schedule.current_page,
            last_page = schedule.last_page,
            "sales-history window done"
        ),
    }

    Ok(ContinuationStep {
        status,
        schedule,
        items_inserted,
        revenue,
        next_run_at,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrainSummary {
    pub status: ContinuationStatus,
    pub windows: u32,
    pub items_inserted: u64,
    pub revenue: Decimal,
}

/// Runs windows back to back, sleeping the backoff delay between them, until
/// the continuation is finished or abandoned.
///
/// # Errors
///
/// Returns the first persistence failure; windows already run stay recorded.
pub async fn drain_continuation<Sc, T>(
    scraper: &Sc,
    tracking: &T,
    mut continuation: Continuation,
    options: &ContinuationOptions,
) -> Result<DrainSummary, SyncError>
where
    Sc: ShopScraper + ?Sized,
    T: TrackingStore + ?Sized,
{
    let mut summary = DrainSummary {
        status: continuation.status,
        windows: 0,
        items_inserted: 0,
        revenue: Decimal::ZERO,
    };

    while continuation.status == ContinuationStatus::Pending {
        let step = advance_continuation(scraper, tracking, &continuation, options).await?;
        summary.windows += 1;
        summary.items_inserted += step.items_inserted;
        summary.revenue += step.revenue;
        summary.status = step.status;

        continuation.schedule = step.schedule;
        continuation.status = step.status;
        continuation.attempts = continuation.attempts.saturating_add(1);
        continuation.next_run_at = step.next_run_at;

        if step.status == ContinuationStatus::Pending {
            let wait = (step.next_run_at - Utc::now()).to_std().unwrap_or_default();
            tokio::time::sleep(wait).await;
        }
    }

    Ok(summary)
}
