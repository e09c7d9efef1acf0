use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Umbrella listing index; a superset of every real category.
pub const ALL_CATEGORY: &str = "All";
pub const ON_SALE_CATEGORY: &str = "On sale";
/// Synthetic category for listings visible only under [`ALL_CATEGORY`].
pub const UNCATEGORIZED_CATEGORY: &str = "UnCategorized";
/// Synthetic category that discontinued listings are moved into.
pub const OUT_OF_PRODUCTION_CATEGORY: &str = "Out Of Production";

/// One entry of the category list on a shop's landing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapedCategory {
    pub name: String,
    pub item_count: i64,
    pub section_id: String,
    pub link: String,
}

impl ScrapedCategory {
    /// Categories that hold no listings of their own and are not walked.
    #[must_use]
    pub fn is_excluded_from_traversal(&self) -> bool {
        matches!(
            self.name.as_str(),
            ON_SALE_CATEGORY | UNCATEGORIZED_CATEGORY | OUT_OF_PRODUCTION_CATEGORY
        )
    }
}

/// A catalog listing as it appeared on a category page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapedItem {
    /// External natural key; unique per shop.
    pub listing_id: String,
    pub name: String,
    /// Regular price. For a discounted listing this is the pre-discount price.
    pub price: Decimal,
    /// Discounted price, or zero when the listing is not on sale.
    pub sale_price: Decimal,
    pub discount: String,
    pub available: bool,
    pub link: String,
}

/// A category together with the listings the crawl found under it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuCategory {
    pub category: String,
    pub section_id: String,
    pub link: String,
    pub item_count: i64,
    pub items: Vec<ScrapedItem>,
}

impl MenuCategory {
    #[must_use]
    pub fn from_scraped(category: &ScrapedCategory) -> Self {
        Self {
            category: category.name.clone(),
            section_id: category.section_id.clone(),
            link: category.link.clone(),
            item_count: category.item_count,
            items: Vec::new(),
        }
    }

    /// A synthetic category with no counterpart on the source site.
    #[must_use]
    pub fn synthetic(name: &str) -> Self {
        Self {
            category: name.to_string(),
            section_id: String::new(),
            link: String::new(),
            item_count: 0,
            items: Vec::new(),
        }
    }
}

/// Result of one full menu crawl.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MenuSnapshot {
    pub categories: Vec<MenuCategory>,
    /// Set when at least one page could not be fetched even after a retry.
    pub incomplete: bool,
}

impl MenuSnapshot {
    #[must_use]
    pub fn item_count(&self) -> usize {
        self.categories.iter().map(|c| c.items.len()).sum()
    }

    #[must_use]
    pub fn category(&self, name: &str) -> Option<&MenuCategory> {
        self.categories.iter().find(|c| c.category == name)
    }
}

/// One historical sale event from a shop's sales-history pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoldItem {
    pub listing_id: String,
    /// The source site's own shop id, when the card carries one.
    pub external_shop_id: String,
    pub name: String,
    pub link: String,
}

/// An audit record for one detected listing creation or mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemChange {
    pub item_id: i64,
    pub new_item_created: bool,
    pub old_price: Decimal,
    pub new_price: Decimal,
    pub old_available: bool,
    pub new_available: bool,
    pub old_menu_item_id: Option<i64>,
    pub new_menu_item_id: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category(name: &str) -> ScrapedCategory {
        ScrapedCategory {
            name: name.to_string(),
            item_count: 3,
            section_id: "42".to_string(),
            link: "/shop/x?section_id=42".to_string(),
        }
    }

    #[test]
    fn synthetic_and_sale_categories_are_not_traversed() {
        assert!(category(ON_SALE_CATEGORY).is_excluded_from_traversal());
        assert!(category(UNCATEGORIZED_CATEGORY).is_excluded_from_traversal());
        assert!(category(OUT_OF_PRODUCTION_CATEGORY).is_excluded_from_traversal());
    }

    #[test]
    fn all_and_real_categories_are_traversed() {
        assert!(!category(ALL_CATEGORY).is_excluded_from_traversal());
        assert!(!category("Candles").is_excluded_from_traversal());
    }

    #[test]
    fn menu_snapshot_counts_items_across_categories() {
        let item = ScrapedItem {
            listing_id: "1".to_string(),
            name: "Soy candle".to_string(),
            price: Decimal::new(1250, 2),
            sale_price: Decimal::ZERO,
            discount: String::new(),
            available: true,
            link: String::new(),
        };
        let mut a = MenuCategory::from_scraped(&category("Candles"));
        a.items.push(item.clone());
        let mut b = MenuCategory::synthetic(UNCATEGORIZED_CATEGORY);
        b.items.push(item);
        let snapshot = MenuSnapshot {
            categories: vec![a, b],
            incomplete: false,
        };
        assert_eq!(snapshot.item_count(), 2);
        assert!(snapshot.category("Candles").is_some());
        assert!(snapshot.category("Soap").is_none());
    }
}
