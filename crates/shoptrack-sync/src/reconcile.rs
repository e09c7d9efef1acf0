//! Diffing a scraped menu against the persisted catalog.
//!
//! Categories are matched by name and items by listing id. Every creation or
//! mutation writes one `item_history_changes` row before the item itself is
//! touched, so a retry after a partial failure can only duplicate audit rows,
//! never lose them. Re-running with an unchanged snapshot writes nothing.

use std::collections::{HashMap, HashSet};

use rust_decimal::{Decimal, RoundingStrategy};

use shoptrack_core::{ItemChange, MenuCategory, MenuSnapshot, OUT_OF_PRODUCTION_CATEGORY};

use crate::error::StoreError;
use crate::store::{CatalogStore, StoredItem};

/// Minimum relative price movement, in whole percent, that counts as a change.
const PRICE_CHANGE_THRESHOLD_PCT: i64 = 3;

/// Whether a price move from `old` to `new` is large enough to record.
///
/// `round(|old / new - 1| * 100) >= 3`, rounding half away from zero. A new
/// price of zero is a change unless the old price was zero too.
#[must_use]
pub fn should_update(old: Decimal, new: Decimal) -> bool {
    if new.is_zero() {
        return !old.is_zero();
    }
    let pct = ((old / new) - Decimal::ONE).abs() * Decimal::ONE_HUNDRED;
    pct.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        >= Decimal::from(PRICE_CHANGE_THRESHOLD_PCT)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub categories_created: u32,
    pub items_created: u32,
    pub items_updated: u32,
    pub items_reinstated: u32,
    pub items_discontinued: u32,
}

impl ReconcileSummary {
    /// Number of history rows written.
    #[must_use]
    pub fn changes(&self) -> u32 {
        self.items_created + self.items_updated + self.items_reinstated + self.items_discontinued
    }
}

/// Applies a scraped menu to the persisted catalog of `shop_id`.
///
/// New listings are created under their scraped category, listings whose
/// price moved past the threshold are updated, and listings filed under
/// "Out Of Production" that reappear are reinstated. Persisted listings
/// missing from the scrape are moved to "Out Of Production" unless the
/// snapshot is empty or flagged incomplete.
///
/// A listing that appears under several categories is filed under the first.
///
/// # Errors
///
/// Returns the first [`StoreError`]. Writes made before the failure stay
/// applied.
pub async fn shop_items_update<S>(
    store: &S,
    shop_id: i64,
    scraped: &MenuSnapshot,
) -> Result<ReconcileSummary, StoreError>
where
    S: CatalogStore + ?Sized,
{
    let catalog = store.load_catalog(shop_id).await?;
    let mut summary = ReconcileSummary::default();

    let mut category_ids: HashMap<String, i64> = catalog
        .categories
        .iter()
        .map(|c| (c.name.clone(), c.id))
        .collect();
    let mut out_of_production = catalog.category_id(OUT_OF_PRODUCTION_CATEGORY);
    let mut persisted: HashMap<String, StoredItem> = catalog
        .items
        .iter()
        .map(|item| (item.listing_id.clone(), item.clone()))
        .collect();
    let mut seen: HashSet<&str> = HashSet::new();

    for category in &scraped.categories {
        let category_id = match category_ids.get(&category.category) {
            Some(id) => *id,
            None => {
                let id = store.create_category(shop_id, category).await?;
                category_ids.insert(category.category.clone(), id);
                if category.category == OUT_OF_PRODUCTION_CATEGORY {
                    out_of_production = Some(id);
                }
                summary.categories_created += 1;
                id
            }
        };

        for item in &category.items {
            if !seen.insert(item.listing_id.as_str()) {
                continue;
            }

            let Some(existing) = persisted.get_mut(&item.listing_id) else {
                let item_id = store.create_item(shop_id, category_id, item).await?;
                store
                    .record_change(
                        shop_id,
                        &ItemChange {
                            item_id,
                            new_item_created: true,
                            old_price: Decimal::ZERO,
                            new_price: item.price,
                            old_available: false,
                            new_available: item.available,
                            old_menu_item_id: None,
                            new_menu_item_id: Some(category_id),
                        },
                    )
                    .await?;
                persisted.insert(
                    item.listing_id.clone(),
                    StoredItem {
                        id: item_id,
                        listing_id: item.listing_id.clone(),
                        price: item.price,
                        available: item.available,
                        menu_item_id: category_id,
                    },
                );
                summary.items_created += 1;
                continue;
            };

            let reinstating = out_of_production == Some(existing.menu_item_id);
            if !reinstating && !should_update(existing.price, item.price) {
                continue;
            }

            store
                .record_change(
                    shop_id,
                    &ItemChange {
                        item_id: existing.id,
                        new_item_created: false,
                        old_price: existing.price,
                        new_price: item.price,
                        old_available: existing.available,
                        new_available: item.available,
                        old_menu_item_id: Some(existing.menu_item_id),
                        new_menu_item_id: Some(category_id),
                    },
                )
                .await?;
            store.update_item(existing.id, category_id, item).await?;
            existing.price = item.price;
            existing.available = item.available;
            existing.menu_item_id = category_id;

            if reinstating {
                summary.items_reinstated += 1;
            } else {
                summary.items_updated += 1;
            }
        }
    }

    if scraped.incomplete || scraped.item_count() == 0 {
        tracing::warn!(
            shop_id,
            incomplete = scraped.incomplete,
            items = scraped.item_count(),
            "skipping discontinuation sweep"
        );
        return Ok(summary);
    }

    for item in &catalog.items {
        if seen.contains(item.listing_id.as_str()) || out_of_production == Some(item.menu_item_id)
        {
            continue;
        }

        let target = if let Some(id) = out_of_production {
            id
        } else {
            let id = store
                .create_category(shop_id, &MenuCategory::synthetic(OUT_OF_PRODUCTION_CATEGORY))
                .await?;
            out_of_production = Some(id);
            summary.categories_created += 1;
            id
        };

        store
            .record_change(
                shop_id,
                &ItemChange {
                    item_id: item.id,
                    new_item_created: false,
                    old_price: item.price,
                    new_price: item.price,
                    old_available: item.available,
                    new_available: false,
                    old_menu_item_id: Some(item.menu_item_id),
                    new_menu_item_id: Some(target),
                },
            )
            .await?;
        store.move_item(item.id, target, false).await?;
        summary.items_discontinued += 1;
    }

    Ok(summary)
}
