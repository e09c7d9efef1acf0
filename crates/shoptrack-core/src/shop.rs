use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::items::{MenuSnapshot, ScrapedCategory};

/// Placeholder stored for free-text shop facts the page did not carry.
pub const NOT_AVAILABLE: &str = "No information available";

/// Shop-level facts extracted from a storefront landing page.
///
/// Every field has a documented default so a partially rendered page still
/// yields a usable snapshot. `menu` is empty until the menu crawler has run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShopSnapshot {
    pub name: String,
    pub description: String,
    pub location: String,
    pub on_vacation: bool,
    pub total_sales: i64,
    /// `true` when the page links to the shop's public sales history.
    pub has_sold_history: bool,
    pub admirers: i64,
    pub reviews: ReviewSummary,
    pub last_update: String,
    pub join_date: String,
    pub members: Vec<ShopMember>,
    pub social_links: Vec<String>,
    /// Raw category list used to seed the menu crawl.
    pub categories: Vec<ScrapedCategory>,
    pub menu: MenuSnapshot,
}

impl ShopSnapshot {
    /// A snapshot carrying only the requested name and every default.
    #[must_use]
    pub fn empty(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: NOT_AVAILABLE.to_string(),
            location: NOT_AVAILABLE.to_string(),
            on_vacation: false,
            total_sales: 0,
            has_sold_history: false,
            admirers: 0,
            reviews: ReviewSummary::default(),
            last_update: NOT_AVAILABLE.to_string(),
            join_date: NOT_AVAILABLE.to_string(),
            members: Vec::new(),
            social_links: Vec::new(),
            categories: Vec::new(),
            menu: MenuSnapshot::default(),
        }
    }

    #[must_use]
    pub fn totals(&self) -> ShopTotals {
        ShopTotals {
            total_sales: self.total_sales,
            admirers: self.admirers,
            on_vacation: self.on_vacation,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewSummary {
    pub rating: f64,
    pub count: i64,
    /// Keyword label (e.g. `"Item quality"`) to number of reviews mentioning it.
    pub keywords: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopMember {
    pub name: String,
    pub role: String,
}

/// The three counters the lightweight update check observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShopTotals {
    pub total_sales: i64,
    pub admirers: i64,
    pub on_vacation: bool,
}

/// Outcome of the most recent refresh of a tracked shop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShopStatus {
    Active,
    Failed,
    /// The shop page returned 404; the scheduler skips the shop.
    NotFound,
}

impl ShopStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Failed => "failed",
            Self::NotFound => "not_found",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "active" => Some(Self::Active),
            "failed" => Some(Self::Failed),
            "not_found" => Some(Self::NotFound),
            _ => None,
        }
    }
}

impl std::fmt::Display for ShopStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
