//! Logging hooks fired around every storefront request.

use crate::error::ScraperError;

pub(super) fn on_request(url: &str, user_agent: &str, proxied: bool) {
    tracing::debug!(url, user_agent, proxied, "storefront request");
}

pub(super) fn on_response(url: &str, status: u16, body_bytes: usize) {
    tracing::debug!(url, status, body_bytes, "storefront response");
}

pub(super) fn on_error(url: &str, error: &ScraperError) {
    tracing::warn!(url, error = %error, "storefront request failed");
}
