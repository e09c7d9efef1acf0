//! HTTP transport for the storefront site.
//!
//! A [`StorefrontClient`] holds the configuration and the per-domain pacer.
//! Each crawl opens its own [`CrawlSession`]: a `reqwest` client with its own
//! cookie jar, a browser user agent and header profile, and an optional
//! proxy. Concurrent crawls share only the pacer. Any failure other than a
//! 404 throws the session's client away (cookies included) and picks a fresh
//! identity before the caller retries.

mod hooks;
mod identity;
pub(crate) mod urls;

use std::time::Duration;

use reqwest::Client;
use tokio::sync::Mutex;

use crate::error::ScraperError;
use crate::rate_limit::{retry_with_backoff, BackoffWindow, DomainPacer};

pub use identity::Identity;

/// Scraper settings, usually derived from [`shoptrack_core::AppConfig`].
#[derive(Debug, Clone)]
pub struct ScraperConfig {
    /// Origin of the storefront site, without a trailing slash.
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub min_delay_ms: u64,
    pub jitter_ms: u64,
    pub backoff: BackoffWindow,
    /// Extra attempts for single-page fetches (shop page, update check).
    pub max_retries: u32,
    pub proxies: Vec<String>,
    pub user_agents: Vec<String>,
    pub sold_max_page_limit: u32,
    pub sold_items_per_page: u32,
}

impl ScraperConfig {
    #[must_use]
    pub fn from_app_config(config: &shoptrack_core::AppConfig) -> Self {
        Self {
            base_url: config.source_base_url.clone(),
            request_timeout_secs: config.scraper_request_timeout_secs,
            min_delay_ms: config.scraper_min_delay_ms,
            jitter_ms: config.scraper_jitter_ms,
            backoff: BackoffWindow::new(
                config.scraper_backoff_min_secs,
                config.scraper_backoff_max_secs,
            ),
            max_retries: config.scraper_max_retries,
            proxies: config.scraper_proxies.clone(),
            user_agents: config.scraper_user_agents.clone(),
            sold_max_page_limit: config.sold_max_page_limit,
            sold_items_per_page: config.sold_items_per_page,
        }
    }
}

struct Session {
    client: Client,
    identity: Identity,
}

/// Storefront scraper: transport plus the shop, menu and sales-history
/// crawls built on it. Safe to share between concurrent crawls.
pub struct StorefrontClient {
    pub(crate) config: ScraperConfig,
    pacer: DomainPacer,
}

impl StorefrontClient {
    /// Creates a client after checking that every configured proxy parses
    /// and a session can be built.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if a proxy URL is unparsable or the
    /// underlying `reqwest::Client` cannot be constructed.
    pub fn new(config: ScraperConfig) -> Result<Self, ScraperError> {
        for proxy in &config.proxies {
            reqwest::Proxy::all(proxy)?;
        }
        build_session(&config)?;
        let pacer = DomainPacer::new(config.min_delay_ms, config.jitter_ms);
        Ok(Self { config, pacer })
    }

    /// Opens a new crawl session: fresh cookie jar, user agent and proxy.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the session client cannot be built.
    pub fn start_session(&self) -> Result<CrawlSession<'_>, ScraperError> {
        let session = build_session(&self.config)?;
        tracing::debug!(
            user_agent = %session.identity.user_agent,
            proxied = session.identity.proxy.is_some(),
            "new crawl session"
        );
        Ok(CrawlSession {
            scraper: self,
            state: Mutex::new(session),
        })
    }

    /// Random sleep used before a failed page is retried.
    pub(crate) async fn backoff(&self) {
        let delay = self.config.backoff.sample();
        if !delay.is_zero() {
            tracing::info!(delay_secs = delay.as_secs(), "backing off before retry");
            tokio::time::sleep(delay).await;
        }
    }
}

/// The HTTP session of one crawl. Identity rotation only ever replaces this
/// session's client, never another crawl's.
pub struct CrawlSession<'a> {
    scraper: &'a StorefrontClient,
    state: Mutex<Session>,
}

impl CrawlSession<'_> {
    /// The identity this session currently presents.
    pub async fn identity(&self) -> Identity {
        self.state.lock().await.identity.clone()
    }

    /// Fetches one page as text.
    ///
    /// # Errors
    ///
    /// - [`ScraperError::NotFound`]: HTTP 404. The session is kept.
    /// - [`ScraperError::RateLimited`]: HTTP 429.
    /// - [`ScraperError::UnexpectedStatus`]: any other non-2xx status.
    /// - [`ScraperError::Http`]: network or TLS failure.
    ///
    /// Every error except `NotFound` rotates the session identity.
    pub async fn fetch_html(&self, url: &str) -> Result<String, ScraperError> {
        self.scraper.pacer.wait(&urls::extract_domain(url)).await;

        let (client, identity) = {
            let session = self.state.lock().await;
            (session.client.clone(), session.identity.clone())
        };
        hooks::on_request(url, &identity.user_agent, identity.proxy.is_some());

        let result = send(&client, url).await;
        if let Err(e) = &result {
            hooks::on_error(url, e);
            if !e.is_not_found() {
                self.rotate().await;
            }
        }
        result
    }

    /// [`Self::fetch_html`] with up to `max_retries` backed-off retries.
    pub(crate) async fn fetch_html_with_retry(&self, url: &str) -> Result<String, ScraperError> {
        let config = &self.scraper.config;
        retry_with_backoff(config.max_retries, config.backoff, || self.fetch_html(url)).await
    }

    /// Replaces the client and identity. A session that cannot be built is
    /// logged and the previous one kept.
    async fn rotate(&self) {
        match build_session(&self.scraper.config) {
            Ok(session) => {
                tracing::debug!(
                    user_agent = %session.identity.user_agent,
                    proxied = session.identity.proxy.is_some(),
                    "rotated crawl identity"
                );
                *self.state.lock().await = session;
            }
            Err(e) => {
                tracing::error!(error = %e, "could not rotate crawl identity; keeping previous");
            }
        }
    }
}

async fn send(client: &Client, url: &str) -> Result<String, ScraperError> {
    let response = client.get(url).send().await?;
    let status = response.status();

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after_secs = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(60);
        return Err(ScraperError::RateLimited {
            domain: urls::extract_domain(url),
            retry_after_secs,
        });
    }

    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(ScraperError::NotFound {
            url: url.to_owned(),
        });
    }

    if !status.is_success() {
        return Err(ScraperError::UnexpectedStatus {
            status: status.as_u16(),
            url: url.to_owned(),
        });
    }

    let body = response.text().await?;
    hooks::on_response(url, status.as_u16(), body.len());
    Ok(body)
}

fn build_session(config: &ScraperConfig) -> Result<Session, ScraperError> {
    let identity = identity::pick_identity(&config.user_agents, &config.proxies);
    let mut builder = Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .user_agent(&identity.user_agent)
        .default_headers(identity::browser_headers(&identity.user_agent, &config.base_url))
        .cookie_store(true)
        .gzip(true)
        .brotli(true);
    if let Some(proxy) = &identity.proxy {
        builder = builder.proxy(reqwest::Proxy::all(proxy)?);
    }
    Ok(Session {
        client: builder.build()?,
        identity,
    })
}
