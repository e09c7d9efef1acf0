//! URL construction and inspection for storefront pages.

use reqwest::Url;

use crate::error::ScraperError;

fn parse(raw: &str) -> Result<Url, ScraperError> {
    Url::parse(raw).map_err(|e| ScraperError::InvalidUrl {
        url: raw.to_owned(),
        reason: e.to_string(),
    })
}

/// `{base}/shop/{name}`
pub(crate) fn shop_url(base: &str, shop: &str) -> Result<String, ScraperError> {
    Ok(parse(&format!("{base}/shop/{shop}"))?.to_string())
}

/// First page of a category: the link from the shop page resolved against
/// `base`, or `{base}/shop/{name}?section_id={id}` when there is no link.
pub(crate) fn category_first_page_url(
    base: &str,
    shop: &str,
    section_id: &str,
    link: &str,
) -> Result<String, ScraperError> {
    if !link.is_empty() {
        let resolved = parse(base)?.join(link).map_err(|e| ScraperError::InvalidUrl {
            url: link.to_owned(),
            reason: e.to_string(),
        })?;
        return Ok(resolved.to_string());
    }
    let mut url = parse(&format!("{base}/shop/{shop}"))?;
    url.query_pairs_mut().append_pair("section_id", section_id);
    Ok(url.to_string())
}

/// Page `page` (≥ 2) of a category, sorted by descending price.
pub(crate) fn category_page_url(
    base: &str,
    shop: &str,
    section_id: &str,
    page: u32,
) -> Result<String, ScraperError> {
    let mut url = parse(&format!("{base}/shop/{shop}"))?;
    url.query_pairs_mut()
        .append_pair("ref", "items-pagination")
        .append_pair("page", &page.to_string())
        .append_pair("sort_order", "price_desc")
        .append_pair("section_id", section_id);
    Ok(url.to_string())
}

/// Page `page` of a shop's sales history.
pub(crate) fn sold_page_url(base: &str, shop: &str, page: u32) -> Result<String, ScraperError> {
    let mut url = parse(&format!("{base}/shop/{shop}/sold"))?;
    url.query_pairs_mut()
        .append_pair("ref", "pagination")
        .append_pair("page", &page.to_string());
    Ok(url.to_string())
}

/// Reads the `page` query parameter; a URL without one is page 1.
pub(crate) fn page_from_url(raw: &str) -> Option<u32> {
    let url = Url::parse(raw).ok()?;
    let page = url
        .query_pairs()
        .find(|(key, _)| key == "page")
        .map(|(_, value)| value.into_owned());
    match page {
        Some(value) => value.parse::<u32>().ok(),
        None => Some(1),
    }
}

/// Extracts the hostname from a URL for pacing and error messages.
///
/// Falls back to the full URL string if parsing fails.
pub(crate) fn extract_domain(raw: &str) -> String {
    Url::parse(raw)
        .ok()
        .and_then(|u| u.host_str().map(str::to_owned))
        .unwrap_or_else(|| raw.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://www.etsy.com";

    #[test]
    fn shop_url_appends_name() {
        assert_eq!(
            shop_url(BASE, "CandleCraft").unwrap(),
            "https://www.etsy.com/shop/CandleCraft"
        );
    }

    #[test]
    fn shop_url_rejects_invalid_base() {
        let err = shop_url("not a url", "CandleCraft").unwrap_err();
        assert!(matches!(err, ScraperError::InvalidUrl { .. }), "{err:?}");
    }

    #[test]
    fn first_page_resolves_relative_link() {
        let url =
            category_first_page_url(BASE, "CandleCraft", "12", "/shop/CandleCraft?section_id=12")
                .unwrap();
        assert_eq!(url, "https://www.etsy.com/shop/CandleCraft?section_id=12");
    }

    #[test]
    fn first_page_keeps_absolute_link() {
        let url = category_first_page_url(
            BASE,
            "CandleCraft",
            "12",
            "https://www.etsy.com/shop/CandleCraft?section_id=12&ref=shopsection_leftnav_2",
        )
        .unwrap();
        assert!(url.ends_with("ref=shopsection_leftnav_2"));
    }

    #[test]
    fn first_page_without_link_uses_section_id() {
        let url = category_first_page_url(BASE, "CandleCraft", "12", "").unwrap();
        assert_eq!(url, "https://www.etsy.com/shop/CandleCraft?section_id=12");
    }

    #[test]
    fn category_page_carries_sort_and_section() {
        let url = category_page_url(BASE, "CandleCraft", "12", 3).unwrap();
        assert_eq!(
            url,
            "https://www.etsy.com/shop/CandleCraft?ref=items-pagination&page=3&sort_order=price_desc&section_id=12"
        );
    }

    #[test]
    fn sold_page_url_has_page_param() {
        let url = sold_page_url(BASE, "CandleCraft", 4).unwrap();
        assert_eq!(
            url,
            "https://www.etsy.com/shop/CandleCraft/sold?ref=pagination&page=4"
        );
        assert_eq!(page_from_url(&url), Some(4));
    }

    #[test]
    fn page_from_url_defaults_to_first_page() {
        assert_eq!(
            page_from_url("https://www.etsy.com/shop/CandleCraft?section_id=12"),
            Some(1)
        );
    }

    #[test]
    fn page_from_url_rejects_garbage() {
        assert_eq!(page_from_url("https://www.etsy.com/shop/x?page=abc"), None);
        assert_eq!(page_from_url("no scheme"), None);
    }

    #[test]
    fn extract_domain_strips_scheme_and_path() {
        assert_eq!(
            extract_domain("https://www.etsy.com/shop/CandleCraft"),
            "www.etsy.com"
        );
        assert_eq!(extract_domain("www.etsy.com"), "www.etsy.com");
    }
}
