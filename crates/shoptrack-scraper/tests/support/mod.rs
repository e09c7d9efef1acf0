//! Shared fixtures for the storefront integration tests.

#![allow(dead_code)]

use shoptrack_scraper::rate_limit::BackoffWindow;
use shoptrack_scraper::{ScraperConfig, StorefrontClient};

/// No pacing, no backoff sleeps, no retries.
pub fn test_config(base_url: &str) -> ScraperConfig {
    ScraperConfig {
        base_url: base_url.to_string(),
        request_timeout_secs: 5,
        min_delay_ms: 0,
        jitter_ms: 0,
        backoff: BackoffWindow::new(0, 0),
        max_retries: 0,
        proxies: Vec::new(),
        user_agents: vec!["shoptrack-test/0.1".to_string()],
        sold_max_page_limit: 10,
        sold_items_per_page: 24,
    }
}

pub fn test_client(base_url: &str) -> StorefrontClient {
    StorefrontClient::new(test_config(base_url)).expect("failed to build test StorefrontClient")
}

/// A listing card with a regular price.
pub fn listing_card(listing_id: &str, price: &str) -> String {
    format!(
        r#"<div class="listing-card" data-listing-id="{listing_id}">
             <a class="listing-link" href="/listing/{listing_id}">
               <h3 class="listing-title">Listing {listing_id}</h3>
             </a>
             <span class="lc-price"><span class="currency-value">{price}</span></span>
           </div>"#
    )
}

/// A sales-history card.
pub fn sold_card(listing_id: &str) -> String {
    format!(
        r#"<div class="listing-card" data-listing-id="{listing_id}" data-shop-id="5544">
             <a class="listing-link" href="/listing/{listing_id}">
               <h3 class="listing-title">Sold {listing_id}</h3>
             </a>
           </div>"#
    )
}

pub fn pagination(last_page: u32) -> String {
    let links: String = (1..=last_page)
        .map(|page| format!(r#"<a data-page="{page}">{page}</a>"#))
        .collect();
    format!(r#"<nav class="pagination">{links}</nav>"#)
}

pub fn page(body: &str) -> String {
    format!("<html><body>{body}</body></html>")
}
