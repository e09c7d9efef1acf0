//! User-agent and proxy selection for crawl sessions.

use rand::seq::IndexedRandom;
use reqwest::header::{
    HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, REFERER,
    UPGRADE_INSECURE_REQUESTS,
};

/// Used when every configured user agent is filtered out.
pub(super) const BROWSER_FALLBACK_UA: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Desktop browser user agents rotated between sessions.
pub(super) const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (X11; Linux x86_64; rv:132.0) Gecko/20100101 Firefox/132.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/18.1 Safari/605.1.15",
];

/// User-agent tokens the storefront answers with an extra challenge page.
const FRICTION_TOKENS: &[&str] = &["Mobile", "Android", "iPhone", "iPad", "Edg/", "Headless"];

/// The browser identity one crawl session presents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_agent: String,
    pub proxy: Option<String>,
}

/// Returns `true` when `user_agent` carries none of the friction tokens.
#[must_use]
pub(super) fn is_usable_user_agent(user_agent: &str) -> bool {
    !FRICTION_TOKENS
        .iter()
        .any(|token| user_agent.contains(token))
}

/// Picks a random usable user agent and, when any are configured, a random
/// proxy.
///
/// An empty `user_agents` slice selects from [`DEFAULT_USER_AGENTS`].
pub(super) fn pick_identity(user_agents: &[String], proxies: &[String]) -> Identity {
    let candidates: Vec<&str> = if user_agents.is_empty() {
        DEFAULT_USER_AGENTS.to_vec()
    } else {
        user_agents.iter().map(String::as_str).collect()
    };
    let usable: Vec<&str> = candidates
        .into_iter()
        .filter(|ua| is_usable_user_agent(ua))
        .collect();

    let mut rng = rand::rng();
    let user_agent = usable
        .choose(&mut rng)
        .copied()
        .unwrap_or(BROWSER_FALLBACK_UA)
        .to_string();
    let proxy = proxies.choose(&mut rng).cloned();

    Identity { user_agent, proxy }
}

/// Headers a desktop browser sends on a top-level navigation, shaped to the
/// browser family of `user_agent`. Sent as the session client's defaults.
pub(super) fn browser_headers(user_agent: &str, referer: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));
    headers.insert("sec-fetch-dest", HeaderValue::from_static("document"));
    headers.insert("sec-fetch-mode", HeaderValue::from_static("navigate"));
    headers.insert("sec-fetch-site", HeaderValue::from_static("same-origin"));
    headers.insert("sec-fetch-user", HeaderValue::from_static("?1"));

    // Client hints are Chromium only; Firefox and Safari never send them.
    if user_agent.contains("Chrome/") {
        headers.insert("sec-ch-ua-mobile", HeaderValue::from_static("?0"));
        headers.insert("sec-ch-ua-platform", HeaderValue::from_static(platform(user_agent)));
    }
    if let Ok(value) = HeaderValue::from_str(referer) {
        headers.insert(REFERER, value);
    }
    headers
}

fn platform(user_agent: &str) -> &'static str {
    if user_agent.contains("Windows") {
        "\"Windows\""
    } else if user_agent.contains("Macintosh") {
        "\"macOS\""
    } else {
        "\"Linux\""
    }
}
