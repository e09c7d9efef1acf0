//! Shop landing-page fetch and extraction.
//!
//! Every field is read by its own extractor. A missing element yields the
//! field's default ([`NOT_AVAILABLE`], zero, `false` or empty) and never an
//! error, so a partially rendered page still produces a snapshot.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use scraper::{Html, Selector};

use shoptrack_core::{ReviewSummary, ScrapedCategory, ShopMember, ShopSnapshot, NOT_AVAILABLE};

use crate::client::{urls, CrawlSession, StorefrontClient};
use crate::error::ScraperError;
use crate::parse_helpers::{first_text, parse_count, selector, text_of};

static SHOP_NAME: LazyLock<Selector> =
    LazyLock::new(|| selector("div.shop-name-and-title-container h1"));
static HEADLINE: LazyLock<Selector> = LazyLock::new(|| selector("p.shop-headline"));
static LOCATION: LazyLock<Selector> = LazyLock::new(|| selector("span.shop-location"));
static LAST_UPDATED: LazyLock<Selector> = LazyLock::new(|| selector("span.shop-last-updated"));
static JOIN_DATE: LazyLock<Selector> = LazyLock::new(|| selector("span.shop-join-date"));
static VACATION_NOTICE: LazyLock<Selector> = LazyLock::new(|| selector("div.vacation-notice"));
static SALES_COUNT: LazyLock<Selector> = LazyLock::new(|| selector("span.shop-sales-count"));
static SALES_LINK: LazyLock<Selector> = LazyLock::new(|| selector("a[href]"));
static ADMIRERS: LazyLock<Selector> = LazyLock::new(|| selector("a.shop-admirers"));
static RATING: LazyLock<Selector> = LazyLock::new(|| selector(r#"input[name="rating"]"#));
static REVIEWS_TOTAL: LazyLock<Selector> = LazyLock::new(|| selector("span.reviews-total"));
static REVIEW_KEYWORDS: LazyLock<Selector> = LazyLock::new(|| selector("ul.review-keywords li"));
static MEMBERS: LazyLock<Selector> = LazyLock::new(|| selector("ul.shop-members li"));
static MEMBER_NAME: LazyLock<Selector> = LazyLock::new(|| selector(".member-name"));
static MEMBER_ROLE: LazyLock<Selector> = LazyLock::new(|| selector(".member-role"));
static SOCIAL_LINKS: LazyLock<Selector> =
    LazyLock::new(|| selector("div.shop-social-links a[href]"));
static SECTIONS: LazyLock<Selector> =
    LazyLock::new(|| selector("ul.shop-sections li[data-section-id]"));
static SECTION_LINK: LazyLock<Selector> = LazyLock::new(|| selector("a"));
static SECTION_COUNT: LazyLock<Selector> = LazyLock::new(|| selector("span.section-count"));

impl StorefrontClient {
    /// Fetches and parses a shop's landing page in a fresh session.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::ShopNotFound`] when the shop page is a 404,
    /// or the last transport error once retries are exhausted.
    pub async fn scrape_shop(&self, name: &str) -> Result<ShopSnapshot, ScraperError> {
        let session = self.start_session()?;
        let html = self.fetch_shop_page(&session, name).await?;
        let shop = parse_shop_page(&html, name);
        tracing::info!(
            shop = %shop.name,
            categories = shop.categories.len(),
            total_sales = shop.total_sales,
            "scraped shop page"
        );
        Ok(shop)
    }

    /// Lightweight refresh of a shop's counters. With `need_item_refresh`
    /// the full page is parsed and the menu crawled as well.
    ///
    /// # Errors
    ///
    /// Same as [`Self::scrape_shop`].
    pub async fn check_for_updates(
        &self,
        name: &str,
        need_item_refresh: bool,
    ) -> Result<ShopSnapshot, ScraperError> {
        if need_item_refresh {
            let mut shop = self.scrape_shop(name).await?;
            shop.menu = self.scrape_all_menu_items(&shop).await;
            return Ok(shop);
        }
        let session = self.start_session()?;
        let html = self.fetch_shop_page(&session, name).await?;
        Ok(parse_shop_counters(&html, name))
    }

    async fn fetch_shop_page(
        &self,
        session: &CrawlSession<'_>,
        name: &str,
    ) -> Result<String, ScraperError> {
        let url = urls::shop_url(&self.config.base_url, name)?;
        session.fetch_html_with_retry(&url).await.map_err(|e| match e {
            ScraperError::NotFound { .. } => ScraperError::ShopNotFound {
                shop: name.to_string(),
            },
            other => other,
        })
    }
}

/// Parses a full shop snapshot. `menu` is left empty.
///
/// `requested_name` is used when the page carries no shop name.
#[must_use]
pub fn parse_shop_page(html: &str, requested_name: &str) -> ShopSnapshot {
    let doc = Html::parse_document(html);
    let mut shop = ShopSnapshot::empty(requested_name);

    if let Some(name) = page_text(&doc, &SHOP_NAME) {
        shop.name = name;
    }
    shop.description = page_text(&doc, &HEADLINE).unwrap_or_else(not_available);
    shop.location = page_text(&doc, &LOCATION).unwrap_or_else(not_available);
    read_counters(&doc, &mut shop);
    shop.reviews = reviews(&doc);
    shop.last_update = page_text(&doc, &LAST_UPDATED).unwrap_or_else(not_available);
    shop.join_date = page_text(&doc, &JOIN_DATE).unwrap_or_else(not_available);
    shop.members = members(&doc);
    shop.social_links = social_links(&doc);
    shop.categories = categories(&doc);
    shop
}

/// Parses only what the lightweight update check needs: total sales,
/// admirers, the vacation flag and the sold-history link.
#[must_use]
pub fn parse_shop_counters(html: &str, requested_name: &str) -> ShopSnapshot {
    let doc = Html::parse_document(html);
    let mut shop = ShopSnapshot::empty(requested_name);
    read_counters(&doc, &mut shop);
    shop
}

fn not_available() -> String {
    NOT_AVAILABLE.to_string()
}

fn page_text(doc: &Html, sel: &Selector) -> Option<String> {
    first_text(doc.root_element(), sel)
}

fn read_counters(doc: &Html, shop: &mut ShopSnapshot) {
    shop.on_vacation = doc.select(&VACATION_NOTICE).next().is_some();

    if let Some(sales) = doc.select(&SALES_COUNT).next() {
        shop.total_sales = parse_count(&text_of(sales), "total_sales");
        shop.has_sold_history = sales
            .select(&SALES_LINK)
            .filter_map(|a| a.value().attr("href"))
            .any(|href| href.contains("/sold"));
    }

    shop.admirers = page_text(doc, &ADMIRERS)
        .map_or(0, |text| parse_count(&text, "admirers"));
}

fn reviews(doc: &Html) -> ReviewSummary {
    let rating = doc
        .select(&RATING)
        .next()
        .and_then(|input| input.value().attr("value"))
        .map_or(0.0, |raw| {
            raw.trim().parse::<f64>().unwrap_or_else(|_| {
                tracing::warn!(raw, "unparsable review rating, defaulting to 0");
                0.0
            })
        });
    let count =
        page_text(doc, &REVIEWS_TOTAL).map_or(0, |text| parse_count(&text, "reviews"));

    let mut keywords = BTreeMap::new();
    for li in doc.select(&REVIEW_KEYWORDS) {
        if let Some((label, tally)) = keyword_tally(&text_of(li)) {
            keywords.insert(label, tally);
        }
    }

    ReviewSummary {
        rating,
        count,
        keywords,
    }
}

/// Splits `"Item quality (87)"` into `("Item quality", 87)`.
fn keyword_tally(text: &str) -> Option<(String, i64)> {
    let (label, rest) = match text.rfind('(') {
        Some(idx) => (text[..idx].trim(), &text[idx..]),
        None => (text.trim(), ""),
    };
    if label.is_empty() {
        return None;
    }
    Some((label.to_string(), parse_count(rest, "review_keyword")))
}

fn members(doc: &Html) -> Vec<ShopMember> {
    doc.select(&MEMBERS)
        .filter_map(|li| {
            let name = first_text(li, &MEMBER_NAME)?;
            let role = first_text(li, &MEMBER_ROLE).unwrap_or_else(not_available);
            Some(ShopMember { name, role })
        })
        .collect()
}

fn social_links(doc: &Html) -> Vec<String> {
    doc.select(&SOCIAL_LINKS)
        .filter_map(|a| a.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .map(str::to_string)
        .collect()
}

fn categories(doc: &Html) -> Vec<ScrapedCategory> {
    doc.select(&SECTIONS)
        .filter_map(|li| {
            let section_id = li.value().attr("data-section-id")?.trim().to_string();
            let link = li.select(&SECTION_LINK).next()?;
            let name = text_of(link);
            if name.is_empty() {
                return None;
            }
            let item_count = first_text(li, &SECTION_COUNT)
                .map_or(0, |text| parse_count(&text, "section_count"));
            Some(ScrapedCategory {
                name,
                item_count,
                section_id,
                link: link.value().attr("href").unwrap_or_default().to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
#[path = "shop_test.rs"]
mod tests;
