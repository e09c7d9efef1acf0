mod scheduler;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::scheduler::SchedulerContext;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = shoptrack_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = shoptrack_db::PoolConfig::from_app_config(&config);
    let pool = shoptrack_db::connect_pool(&config.database_url, pool_config).await?;
    let applied = shoptrack_db::run_migrations(&pool).await?;
    tracing::info!(applied, "database ready");

    let scraper_config = shoptrack_scraper::ScraperConfig::from_app_config(&config);
    let scraper = shoptrack_scraper::StorefrontClient::new(scraper_config)?;
    let store = shoptrack_sync::PgStore::new(pool);

    let context = Arc::new(SchedulerContext::new(scraper, store, config));
    let mut scheduler = scheduler::build_scheduler(context).await?;

    shutdown_signal().await;
    scheduler.shutdown().await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, stopping scheduler");
}
