use thiserror::Error;

use shoptrack_db::DbError;
use shoptrack_scraper::ScraperError;

/// Failures from a persistence backend behind [`crate::CatalogStore`] or
/// [`crate::TrackingStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(#[from] DbError),

    #[error("{entity} {id} not found")]
    Missing { entity: &'static str, id: i64 },
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Scraper(#[from] ScraperError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("shop '{0}' is not tracked")]
    UnknownShop(String),
}

impl SyncError {
    /// `true` when the storefront reported the shop itself as gone.
    #[must_use]
    pub fn is_shop_not_found(&self) -> bool {
        matches!(self, Self::Scraper(ScraperError::ShopNotFound { .. }))
    }
}
