use std::sync::LazyLock;

use scraper::{Html, Selector};

use crate::parse_helpers::selector;

static PAGINATION: LazyLock<Selector> = LazyLock::new(|| selector("nav.pagination"));
static PAGE_LINK: LazyLock<Selector> = LazyLock::new(|| selector("a[data-page]"));

/// Highest page number linked from the page's pagination bar; `1` when the
/// page has no pagination.
pub(crate) fn highest_page(html: &Html) -> u32 {
    html.select(&PAGINATION)
        .flat_map(|nav| nav.select(&PAGE_LINK))
        .filter_map(|a| a.value().attr("data-page"))
        .filter_map(|page| page.trim().parse::<u32>().ok())
        .max()
        .unwrap_or(1)
        .max(1)
}
