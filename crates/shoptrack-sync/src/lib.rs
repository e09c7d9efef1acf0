//! Keeps the stored view of tracked shops in step with the storefront.
//!
//! The pipeline is written against the [`ShopScraper`] capability and the
//! [`CatalogStore`] / [`TrackingStore`] persistence traits; [`PgStore`] is the
//! production backend.
//!
//! [`ShopScraper`]: shoptrack_scraper::ShopScraper

pub mod continuation;
pub mod error;
mod pg;
pub mod reconcile;
pub mod store;
pub mod updates;

pub use continuation::{
    advance_continuation, drain_continuation, ContinuationOptions, ContinuationStep, DrainSummary,
};
pub use error::{StoreError, SyncError};
pub use pg::PgStore;
pub use reconcile::{shop_items_update, should_update, ReconcileSummary};
pub use store::{
    Catalog, CatalogStore, Continuation, StoredCategory, StoredItem, TrackedShop, TrackingStore,
};
pub use updates::{
    plan_shop_update, refresh_shop, run_update_pass, track_shop, update_shop, ShopUpdate,
    ShopUpdatePlan, UpdateOptions, UpdatePassSummary,
};
