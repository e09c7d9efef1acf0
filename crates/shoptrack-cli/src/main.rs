mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "shoptrack-cli")]
#[command(about = "Track storefront shops, their catalogs and sales")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Start tracking a shop, or fully refresh it if already tracked
    Track { shop: String },
    /// Full refresh of a tracked shop: counters, menu and catalog diff
    Refresh { shop: String },
    /// Fetch a shop's counters without touching the database
    Check {
        shop: String,
        /// Also crawl the menu and report item counts
        #[arg(long)]
        full: bool,
    },
    /// Crawl a tracked shop's sales history until done
    Sold {
        shop: String,
        /// Stop after this many sold items; 0 crawls the whole history
        #[arg(long, default_value_t = 0)]
        budget: u32,
    },
    /// Run one update pass over every tracked shop
    UpdateAll {
        /// Refresh menus regardless of the configured weekday
        #[arg(long)]
        full: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = shoptrack_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match cli.command {
        Commands::Track { shop } => commands::run_track(&config, &shop).await,
        Commands::Refresh { shop } => commands::run_refresh(&config, &shop).await,
        Commands::Check { shop, full } => commands::run_check(&config, &shop, full).await,
        Commands::Sold { shop, budget } => commands::run_sold(&config, &shop, budget).await,
        Commands::UpdateAll { full } => commands::run_update_all(&config, full).await,
    }
}
