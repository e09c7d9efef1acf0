//! Background job scheduler.
//!
//! Registers the daily update pass and keeps one deferred job per pending
//! sales-history continuation.

mod continuations;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use uuid::Uuid;

use shoptrack_core::AppConfig;
use shoptrack_scraper::StorefrontClient;
use shoptrack_sync::{PgStore, UpdateOptions};

/// Everything a scheduled job needs, shared across jobs.
pub struct SchedulerContext {
    pub scraper: StorefrontClient,
    pub store: PgStore,
    pub config: AppConfig,
    /// Continuation id to the one-shot job that will run it.
    scheduled: Mutex<HashMap<i64, Uuid>>,
}

impl SchedulerContext {
    #[must_use]
    pub fn new(scraper: StorefrontClient, store: PgStore, config: AppConfig) -> Self {
        Self {
            scraper,
            store,
            config,
            scheduled: Mutex::new(HashMap::new()),
        }
    }
}

/// Builds and starts the background job scheduler.
///
/// Pending continuations left by a previous process are rescheduled before
/// the scheduler starts. The returned handle must be kept alive; dropping it
/// stops every job.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// the update cron expression is invalid, or the scheduler fails to start.
pub async fn build_scheduler(
    context: Arc<SchedulerContext>,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    register_update_job(&scheduler, Arc::clone(&context)).await?;
    register_continuation_sweep_job(&scheduler, Arc::clone(&context)).await?;
    continuations::resume_pending(&scheduler, &context).await;

    scheduler.start().await?;
    Ok(scheduler)
}

/// Register the daily update pass on `SHOPTRACK_UPDATE_CRON`.
async fn register_update_job(
    scheduler: &JobScheduler,
    context: Arc<SchedulerContext>,
) -> Result<(), JobSchedulerError> {
    let cron = context.config.update_cron.clone();

    let job = Job::new_async(cron.as_str(), move |_uuid, scheduler| {
        let context = Arc::clone(&context);

        Box::pin(async move {
            tracing::info!("scheduler: starting update pass");
            run_update_job(&scheduler, &context).await;
            tracing::info!("scheduler: update pass complete");
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(cron = %cron, "scheduler: registered update job");
    Ok(())
}

/// Register a sweep that picks up continuations queued outside this process,
/// such as by `shoptrack-cli track`.
///
/// Runs every 10 minutes (`0 */10 * * * *`). Continuations that already have
/// a job are left alone.
async fn register_continuation_sweep_job(
    scheduler: &JobScheduler,
    context: Arc<SchedulerContext>,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_async("0 */10 * * * *", move |_uuid, scheduler| {
        let context = Arc::clone(&context);

        Box::pin(async move {
            continuations::resume_pending(&scheduler, &context).await;
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

async fn run_update_job(scheduler: &JobScheduler, context: &Arc<SchedulerContext>) {
    let options = UpdateOptions::for_today(&context.config, false);
    let summary = match shoptrack_sync::run_update_pass(
        &context.scraper,
        &context.store,
        &context.store,
        &options,
    )
    .await
    {
        Ok(summary) => summary,
        Err(e) => {
            tracing::error!(error = %e, "scheduler: update pass could not start");
            return;
        }
    };

    for continuation in &summary.continuations {
        continuations::schedule(
            scheduler,
            context,
            continuation.id,
            continuation.next_run_at,
        )
        .await;
    }
}
