//! Budgeted, resumable traversal of a shop's sales-history pages.
//!
//! One call crawls at most one window of pages and hands back the
//! [`TaskSchedule`] to resume from. The caller decides when to run the next
//! window.

use std::sync::LazyLock;

use scraper::{Html, Selector};

use shoptrack_core::{SoldItem, TaskSchedule, NOT_AVAILABLE};

use crate::client::{urls, StorefrontClient};
use crate::pagination::highest_page;
use crate::parse_helpers::{first_text, selector};
use crate::queue::WorkQueue;

static SOLD_CARD: LazyLock<Selector> =
    LazyLock::new(|| selector("div.listing-card[data-listing-id]"));
static SOLD_TITLE: LazyLock<Selector> = LazyLock::new(|| selector("h3.listing-title"));
static SOLD_LINK: LazyLock<Selector> = LazyLock::new(|| selector("a.listing-link[href]"));

/// One parsed sales-history page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoldPage {
    /// Sale events in page order (newest first).
    pub items: Vec<SoldItem>,
    pub last_page: u32,
}

#[must_use]
pub fn parse_sold_page(html: &str) -> SoldPage {
    let doc = Html::parse_document(html);

    let items = doc
        .select(&SOLD_CARD)
        .filter_map(|card| {
            let listing_id = card.value().attr("data-listing-id")?.trim();
            if listing_id.is_empty() {
                return None;
            }
            Some(SoldItem {
                listing_id: listing_id.to_string(),
                external_shop_id: card
                    .value()
                    .attr("data-shop-id")
                    .unwrap_or_default()
                    .trim()
                    .to_string(),
                name: first_text(card, &SOLD_TITLE).unwrap_or_else(|| NOT_AVAILABLE.to_string()),
                link: card
                    .select(&SOLD_LINK)
                    .next()
                    .and_then(|a| a.value().attr("href"))
                    .unwrap_or_default()
                    .to_string(),
            })
        })
        .collect();

    SoldPage {
        items,
        last_page: highest_page(&doc),
    }
}

impl StorefrontClient {
    /// Crawls the next window of `shop`'s sales history.
    ///
    /// Returns the sale events found, oldest first, and the schedule to pass
    /// to the next call. Stops early when the item budget is met, when a page
    /// yields nothing (stalled), or on a transport error; the last two leave
    /// `current_page` on the page to retry.
    pub async fn scrape_sales_history(
        &self,
        shop: &str,
        mut task: TaskSchedule,
    ) -> (Vec<SoldItem>, TaskSchedule) {
        if task.is_scrape_finished {
            tracing::debug!(shop, "sales history already complete");
            return (Vec::new(), task);
        }
        let session = match self.start_session() {
            Ok(session) => session,
            Err(e) => {
                tracing::error!(shop, error = %e, "could not open crawl session");
                return (Vec::new(), task);
            }
        };

        let budget = usize::try_from(task.update_sold_items).unwrap_or(usize::MAX);
        let window_len = task.window_len(
            self.config.sold_max_page_limit,
            self.config.sold_items_per_page,
        );

        let mut queue = WorkQueue::new();
        let mut window_queued = task.is_pagination_scraped;
        if window_queued {
            queue.extend(task.next_window(window_len));
            if queue.is_empty() {
                tracing::info!(shop, last_page = task.last_page, "no sales-history pages left");
                task.finish();
            }
        } else {
            queue.push(task.current_page);
        }

        let mut items: Vec<SoldItem> = Vec::new();
        while let Some(page) = queue.pop() {
            let url = match urls::sold_page_url(&self.config.base_url, shop, page) {
                Ok(url) => url,
                Err(e) => {
                    tracing::error!(shop, page, error = %e, "could not build sales-history url");
                    task.resume_at(page);
                    break;
                }
            };

            let html = match session.fetch_html(&url).await {
                Ok(html) => html,
                Err(e) if e.is_not_found() => {
                    tracing::warn!(shop, page, "sales-history page not found, closing crawl");
                    task.finish();
                    break;
                }
                Err(e) => {
                    tracing::warn!(shop, page, error = %e, "sales-history page failed, will resume here");
                    task.resume_at(page);
                    break;
                }
            };

            let parsed = parse_sold_page(&html);
            if parsed.items.is_empty() {
                let stalled_at = urls::page_from_url(&url).unwrap_or(page);
                tracing::warn!(shop, page = stalled_at, "sales-history page stalled, will resume here");
                task.resume_at(stalled_at);
                break;
            }
            items.extend(parsed.items);

            task.record_pagination(parsed.last_page);

            if budget > 0 && items.len() >= budget {
                items.truncate(budget);
                task.finish();
                break;
            }

            if !window_queued {
                queue.extend(task.next_window(window_len));
                window_queued = true;
            }
        }

        tracing::info!(
            shop,
            items = items.len(),
            current_page = task.current_page,
            last_page = task.last_page,
            finished = task.is_scrape_finished,
            "sales-history window done"
        );
        items.reverse();
        (items, task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sold_cards_carry_shop_id_and_link() {
        let page = parse_sold_page(
            r#"<div class="listing-card" data-listing-id="9" data-shop-id="5544">
                 <a class="listing-link" href="https://www.etsy.com/listing/9/ember">
                   <h3 class="listing-title">Ember</h3>
                 </a>
               </div>
               <div class="listing-card" data-listing-id="10"></div>
               <nav class="pagination"><a data-page="12">12</a></nav>"#,
        );
        assert_eq!(page.last_page, 12);
        assert_eq!(
            page.items,
            vec![
                SoldItem {
                    listing_id: "9".to_string(),
                    external_shop_id: "5544".to_string(),
                    name: "Ember".to_string(),
                    link: "https://www.etsy.com/listing/9/ember".to_string(),
                },
                SoldItem {
                    listing_id: "10".to_string(),
                    external_shop_id: String::new(),
                    name: NOT_AVAILABLE.to_string(),
                    link: String::new(),
                },
            ]
        );
    }

    #[test]
    fn page_without_cards_is_empty_single_page() {
        let page = parse_sold_page("<p>No sales yet</p>");
        assert!(page.items.is_empty());
        assert_eq!(page.last_page, 1);
    }
}
