//! Tolerant text and number extraction shared by the page parsers.
//!
//! Nothing here fails: a value that cannot be read is logged and replaced by
//! its default so one malformed element never sinks a whole page.

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;
use scraper::{ElementRef, Selector};

static COUNT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d[\d,.]*)\s*([kKmM]\b)?").expect("valid regex"));

static PRICE_STRIP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\d.\-]").expect("valid regex"));

pub(crate) fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid selector")
}

/// Element text with runs of whitespace collapsed to single spaces.
pub(crate) fn text_of(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Collapsed text of the first descendant matching `sel`.
pub(crate) fn first_text(scope: ElementRef<'_>, sel: &Selector) -> Option<String> {
    scope
        .select(sel)
        .next()
        .map(text_of)
        .filter(|text| !text.is_empty())
}

/// Parses a displayed price such as `"$1,299.00"` or `"USD 12.50+"`.
pub(crate) fn parse_price(raw: &str, field: &str) -> Decimal {
    let cleaned = PRICE_STRIP_RE.replace_all(raw, "");
    match Decimal::from_str(&cleaned) {
        Ok(value) => value,
        Err(_) => {
            if !raw.trim().is_empty() {
                tracing::warn!(field, raw, "unparsable price, defaulting to 0");
            }
            Decimal::ZERO
        }
    }
}

/// Reads the first number in `raw`, ignoring thousands separators:
/// `"12,345 Sales"` → 12345. A `k` or `m` suffix scales the figure, so
/// `"1.2k admirers"` → 1200.
pub(crate) fn parse_count(raw: &str, field: &str) -> i64 {
    let parsed = COUNT_RE.captures(raw).and_then(|caps| {
        let number = caps.get(1)?.as_str().replace(',', "");
        let number = number.trim_end_matches('.');
        let scale = match caps.get(2).map(|m| m.as_str().to_ascii_lowercase()) {
            Some(suffix) if suffix == "k" => Decimal::from(1_000),
            Some(suffix) if suffix == "m" => Decimal::from(1_000_000),
            _ => Decimal::ONE,
        };
        let value = Decimal::from_str(number).ok()? * scale;
        i64::try_from(value.trunc()).ok()
    });
    parsed.unwrap_or_else(|| {
        if !raw.trim().is_empty() {
            tracing::warn!(field, raw, "unparsable count, defaulting to 0");
        }
        0
    })
}
