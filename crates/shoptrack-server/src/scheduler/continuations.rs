//! Deferred jobs that step persisted sales-history continuations.
//!
//! Each pending continuation owns at most one one-shot job. A job runs one
//! window and, while the continuation stays pending, schedules its successor
//! at the persisted `next_run_at`.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio_cron_scheduler::{Job, JobScheduler};

use shoptrack_core::ContinuationStatus;
use shoptrack_scraper::rate_limit::BackoffWindow;
use shoptrack_sync::{ContinuationOptions, TrackingStore};

use super::SchedulerContext;

/// Schedules every continuation still pending in the database.
pub(super) async fn resume_pending(scheduler: &JobScheduler, context: &Arc<SchedulerContext>) {
    let pending = match context.store.pending_continuations().await {
        Ok(pending) => pending,
        Err(e) => {
            tracing::error!(error = %e, "scheduler: failed to load pending continuations");
            return;
        }
    };

    tracing::info!(
        count = pending.len(),
        "scheduler: scheduling pending continuations"
    );
    for continuation in &pending {
        schedule(scheduler, context, continuation.id, continuation.next_run_at).await;
    }
}

/// Adds a one-shot job that runs continuation `id` at `run_at`, unless one is
/// already waiting for it.
pub(super) async fn schedule(
    scheduler: &JobScheduler,
    context: &Arc<SchedulerContext>,
    id: i64,
    run_at: DateTime<Utc>,
) {
    let delay = (run_at - Utc::now())
        .to_std()
        .unwrap_or_default()
        .max(Duration::from_secs(1));

    let job_context = Arc::clone(context);
    let job = Job::new_one_shot_async(delay, move |_uuid, scheduler| {
        let context = Arc::clone(&job_context);
        Box::pin(async move {
            run_continuation(&scheduler, &context, id).await;
        })
    });
    let job = match job {
        Ok(job) => job,
        Err(e) => {
            tracing::error!(
                continuation_id = id,
                error = %e,
                "scheduler: invalid continuation job"
            );
            return;
        }
    };
    let job_id = job.guid();

    {
        let Ok(mut scheduled) = context.scheduled.lock() else {
            tracing::error!(continuation_id = id, "scheduler: continuation registry poisoned");
            return;
        };
        if scheduled.contains_key(&id) {
            tracing::debug!(continuation_id = id, "scheduler: continuation already scheduled");
            return;
        }
        scheduled.insert(id, job_id);
    }

    if let Err(e) = scheduler.add(job).await {
        release(context, id);
        tracing::error!(
            continuation_id = id,
            error = %e,
            "scheduler: failed to add continuation job"
        );
        return;
    }
    tracing::debug!(
        continuation_id = id,
        delay_secs = delay.as_secs(),
        "scheduler: continuation scheduled"
    );
}

fn release(context: &SchedulerContext, id: i64) {
    if let Ok(mut scheduled) = context.scheduled.lock() {
        scheduled.remove(&id);
    }
}

/// Runs one window of continuation `id` and schedules the next one while it
/// stays pending. The id stays claimed until the window is done, so the
/// sweep does not start a second job for it.
fn run_continuation<'a>(
    scheduler: &'a JobScheduler,
    context: &'a Arc<SchedulerContext>,
    id: i64,
) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
    Box::pin(async move {
        let next = run_window(context, id).await;
        release(context, id);
        if let Some(run_at) = next {
            schedule(scheduler, context, id, run_at).await;
        }
    })
}

/// One window; returns when the next one is due, if any.
async fn run_window(context: &SchedulerContext, id: i64) -> Option<DateTime<Utc>> {
    let continuation = match context.store.continuation(id).await {
        Ok(Some(continuation)) => continuation,
        Ok(None) => {
            tracing::warn!(continuation_id = id, "scheduler: continuation vanished");
            return None;
        }
        Err(e) => {
            tracing::error!(
                continuation_id = id,
                error = %e,
                "scheduler: failed to load continuation"
            );
            return Some(retry_at(context));
        }
    };
    if continuation.status != ContinuationStatus::Pending {
        return None;
    }

    let options = ContinuationOptions::from_app_config(&context.config);
    match shoptrack_sync::advance_continuation(
        &context.scraper,
        &context.store,
        &continuation,
        &options,
    )
    .await
    {
        Ok(step) if step.status == ContinuationStatus::Pending => Some(step.next_run_at),
        Ok(_) => None,
        Err(e) => {
            tracing::error!(
                shop = %continuation.shop_name,
                continuation_id = id,
                error = %e,
                "scheduler: continuation window failed"
            );
            Some(retry_at(context))
        }
    }
}

fn retry_at(context: &SchedulerContext) -> DateTime<Utc> {
    let window = BackoffWindow::new(
        context.config.scraper_backoff_min_secs,
        context.config.scraper_backoff_max_secs,
    );
    Utc::now() + TimeDelta::from_std(window.sample()).unwrap_or(TimeDelta::zero())
}
