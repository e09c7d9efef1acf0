//! Category traversal producing a shop's full item snapshot.
//!
//! Every traversable category's first page goes on the primary queue. The
//! first page seen for a section enqueues its remaining pages. A page that
//! fails waits out the backoff window and moves to the backup queue, which is
//! drained once after the primary queue; a second failure drops the page and
//! flags the snapshot incomplete.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use shoptrack_core::{
    MenuCategory, MenuSnapshot, ScrapedItem, ShopSnapshot, ALL_CATEGORY, NOT_AVAILABLE,
    UNCATEGORIZED_CATEGORY,
};

use crate::client::{urls, StorefrontClient};
use crate::pagination::highest_page;
use crate::parse_helpers::{first_text, parse_price, selector};
use crate::queue::WorkQueue;

static LISTING_CARD: LazyLock<Selector> =
    LazyLock::new(|| selector("div.listing-card[data-listing-id]"));
static SHOWN_PRICE: LazyLock<Selector> = LazyLock::new(|| selector(".lc-price .currency-value"));
static ORIGINAL_PRICE: LazyLock<Selector> =
    LazyLock::new(|| selector(".lc-original-price .currency-value"));
static LISTING_TITLE: LazyLock<Selector> = LazyLock::new(|| selector("h3.listing-title"));
static DISCOUNT: LazyLock<Selector> = LazyLock::new(|| selector(".lc-discount"));
static SOLD_OUT: LazyLock<Selector> = LazyLock::new(|| selector(".lc-sold-out"));
static LISTING_LINK: LazyLock<Selector> = LazyLock::new(|| selector("a.listing-link[href]"));

#[derive(Debug, Clone)]
struct PageRequest {
    url: String,
    category: usize,
    page: u32,
}

/// Scratch state for one menu crawl. Lives exactly as long as the call.
struct MenuCrawl<'a> {
    shop: &'a str,
    base_url: &'a str,
    categories: Vec<MenuCategory>,
    seen: Vec<HashSet<String>>,
    /// Number of distinct categories each listing was seen under.
    occurrences: HashMap<String, u32>,
    /// Sections whose page 2..N requests have already been queued.
    paginated: HashSet<String>,
    incomplete: bool,
}

impl<'a> MenuCrawl<'a> {
    fn new(shop: &'a ShopSnapshot, base_url: &'a str) -> Self {
        let categories: Vec<MenuCategory> =
            shop.categories.iter().map(MenuCategory::from_scraped).collect();
        Self {
            shop: &shop.name,
            base_url,
            seen: vec![HashSet::new(); categories.len()],
            categories,
            occurrences: HashMap::new(),
            paginated: HashSet::new(),
            incomplete: false,
        }
    }

    fn first_pages(&mut self, shop: &ShopSnapshot) -> Vec<PageRequest> {
        let mut requests = Vec::new();
        for (index, category) in shop.categories.iter().enumerate() {
            if category.is_excluded_from_traversal() {
                continue;
            }
            match urls::category_first_page_url(
                self.base_url,
                self.shop,
                &category.section_id,
                &category.link,
            ) {
                Ok(url) => requests.push(PageRequest {
                    url,
                    category: index,
                    page: 1,
                }),
                Err(e) => {
                    tracing::warn!(shop = self.shop, category = %category.name, error = %e, "skipping category with bad link");
                    self.incomplete = true;
                }
            }
        }
        requests
    }

    /// Records the listings on one page and returns any follow-up pages.
    fn handle_page(&mut self, request: &PageRequest, html: &str) -> Vec<PageRequest> {
        let doc = Html::parse_document(html);

        let items = parse_listing_cards(&doc);
        let seen = &mut self.seen[request.category];
        let category = &mut self.categories[request.category];
        for item in items {
            if seen.insert(item.listing_id.clone()) {
                *self.occurrences.entry(item.listing_id.clone()).or_insert(0) += 1;
                category.items.push(item);
            }
        }

        let section_key = if category.section_id.is_empty() {
            category.category.clone()
        } else {
            category.section_id.clone()
        };
        if !self.paginated.insert(section_key) {
            return Vec::new();
        }

        let last_page = highest_page(&doc);
        let mut follow_ups = Vec::new();
        for page in (request.page + 1)..=last_page {
            match urls::category_page_url(self.base_url, self.shop, &category.section_id, page) {
                Ok(url) => follow_ups.push(PageRequest {
                    url,
                    category: request.category,
                    page,
                }),
                Err(e) => {
                    tracing::warn!(shop = self.shop, page, error = %e, "could not build category page url");
                    self.incomplete = true;
                }
            }
        }
        if !follow_ups.is_empty() {
            tracing::debug!(
                shop = self.shop,
                category = %category.category,
                last_page,
                "queued category pagination"
            );
        }
        follow_ups
    }

    fn finish(mut self) -> MenuSnapshot {
        assign_uncategorized(&mut self.categories, &self.occurrences);
        MenuSnapshot {
            categories: self.categories,
            incomplete: self.incomplete,
        }
    }
}

impl StorefrontClient {
    /// Crawls every traversable category of `shop` in a fresh session.
    ///
    /// Never fails as a whole: pages that cannot be fetched after the backup
    /// pass are dropped and the returned snapshot is flagged
    /// [`MenuSnapshot::incomplete`].
    pub async fn scrape_all_menu_items(&self, shop: &ShopSnapshot) -> MenuSnapshot {
        let mut crawl = MenuCrawl::new(shop, &self.config.base_url);
        let session = match self.start_session() {
            Ok(session) => session,
            Err(e) => {
                tracing::error!(shop = %shop.name, error = %e, "could not open crawl session");
                crawl.incomplete = true;
                return crawl.finish();
            }
        };
        let mut primary = WorkQueue::new();
        primary.extend(crawl.first_pages(shop));
        let mut backup = WorkQueue::new();

        while let Some(request) = primary.pop() {
            match session.fetch_html(&request.url).await {
                Ok(html) => {
                    let follow_ups = crawl.handle_page(&request, &html);
                    primary.extend(follow_ups);
                }
                Err(e) if e.is_not_found() => {
                    tracing::warn!(shop = %shop.name, url = %request.url, "category page not found, dropping");
                }
                Err(_) => {
                    self.backoff().await;
                    backup.push(request);
                }
            }
        }

        if !backup.is_empty() {
            tracing::info!(shop = %shop.name, pages = backup.len(), "retrying failed category pages");
        }
        while let Some(request) = backup.pop() {
            match session.fetch_html(&request.url).await {
                Ok(html) => {
                    let follow_ups = crawl.handle_page(&request, &html);
                    backup.extend(follow_ups);
                }
                Err(e) => {
                    tracing::error!(
                        shop = %shop.name,
                        url = %request.url,
                        page = request.page,
                        error = %e,
                        "category page failed twice, dropping"
                    );
                    if !e.is_not_found() {
                        crawl.incomplete = true;
                    }
                }
            }
        }

        let snapshot = crawl.finish();
        tracing::info!(
            shop = %shop.name,
            categories = snapshot.categories.len(),
            items = snapshot.item_count(),
            incomplete = snapshot.incomplete,
            "menu crawl finished"
        );
        snapshot
    }
}

/// Moves listings seen only under "All" into a synthetic "UnCategorized"
/// category (created on demand), then empties "All".
///
/// `occurrences` maps a listing id to the number of categories it was seen
/// under; "All" counts as one of them.
pub fn assign_uncategorized(
    categories: &mut Vec<MenuCategory>,
    occurrences: &HashMap<String, u32>,
) {
    let Some(all) = categories.iter().position(|c| c.category == ALL_CATEGORY) else {
        return;
    };
    let orphans: Vec<ScrapedItem> = std::mem::take(&mut categories[all].items)
        .into_iter()
        .filter(|item| occurrences.get(&item.listing_id).copied().unwrap_or(0) <= 1)
        .collect();
    if orphans.is_empty() {
        return;
    }

    let target = match categories
        .iter()
        .position(|c| c.category == UNCATEGORIZED_CATEGORY)
    {
        Some(index) => index,
        None => {
            categories.push(MenuCategory::synthetic(UNCATEGORIZED_CATEGORY));
            categories.len() - 1
        }
    };
    let uncategorized = &mut categories[target];
    for item in orphans {
        if !uncategorized
            .items
            .iter()
            .any(|existing| existing.listing_id == item.listing_id)
        {
            uncategorized.items.push(item);
        }
    }
    uncategorized.item_count = i64::try_from(uncategorized.items.len()).unwrap_or(i64::MAX);
}

fn parse_listing_cards(doc: &Html) -> Vec<ScrapedItem> {
    doc.select(&LISTING_CARD)
        .filter_map(parse_listing_card)
        .collect()
}

fn parse_listing_card(card: ElementRef<'_>) -> Option<ScrapedItem> {
    let listing_id = card.value().attr("data-listing-id")?.trim().to_string();
    if listing_id.is_empty() {
        return None;
    }

    let shown = first_text(card, &SHOWN_PRICE)
        .map(|raw| parse_price(&raw, "price"))
        .unwrap_or_default();
    let original = first_text(card, &ORIGINAL_PRICE)
        .map(|raw| parse_price(&raw, "original_price"));
    let (price, sale_price) = match original {
        Some(original) => (original, shown),
        None => (shown, rust_decimal::Decimal::ZERO),
    };

    Some(ScrapedItem {
        name: first_text(card, &LISTING_TITLE)
            .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        price,
        sale_price,
        discount: first_text(card, &DISCOUNT).unwrap_or_default(),
        available: card.select(&SOLD_OUT).next().is_none(),
        link: card
            .select(&LISTING_LINK)
            .next()
            .and_then(|a| a.value().attr("href"))
            .unwrap_or_default()
            .to_string(),
        listing_id,
    })
}

#[cfg(test)]
#[path = "menu_test.rs"]
mod tests;
