//! Integration tests for shop-page fetching and the update check.

mod support;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shoptrack_core::NOT_AVAILABLE;
use shoptrack_scraper::{ScraperError, StorefrontClient};

use support::{page, test_client, test_config};

fn shop_page_html() -> String {
    page(
        r#"
        <div class="shop-name-and-title-container"><h1>CandleCraft</h1></div>
        <p class="shop-headline">Hand poured soy candles</p>
        <span class="shop-sales-count">1,250 <a href="/shop/CandleCraft/sold">Sales</a></span>
        <a class="shop-admirers">310 Admirers</a>
        <ul class="shop-sections">
          <li data-section-id="0"><a href="/shop/CandleCraft">All</a><span class="section-count">4</span></li>
          <li data-section-id="12"><a href="/shop/CandleCraft?section_id=12">Candles</a><span class="section-count">3</span></li>
        </ul>
        "#,
    )
}

#[tokio::test]
async fn scrape_shop_parses_landing_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/shop/CandleCraft"))
        .respond_with(ResponseTemplate::new(200).set_body_string(shop_page_html()))
        .expect(1)
        .mount(&server)
        .await;

    let shop = test_client(&server.uri())
        .scrape_shop("CandleCraft")
        .await
        .expect("shop page should parse");

    assert_eq!(shop.name, "CandleCraft");
    assert_eq!(shop.total_sales, 1_250);
    assert!(shop.has_sold_history);
    assert_eq!(shop.admirers, 310);
    assert_eq!(shop.location, NOT_AVAILABLE);
    assert_eq!(shop.categories.len(), 2);
    assert!(shop.menu.categories.is_empty());
}

#[tokio::test]
async fn scrape_shop_maps_404_to_shop_not_found_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/shop/Gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = test_config(&server.uri());
    config.max_retries = 3;
    let client = StorefrontClient::new(config).unwrap();
    let err = client.scrape_shop("Gone").await.unwrap_err();

    assert!(
        matches!(err, ScraperError::ShopNotFound { ref shop } if shop == "Gone"),
        "expected ShopNotFound, got: {err:?}"
    );
}

#[tokio::test]
async fn scrape_shop_retries_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/shop/CandleCraft"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/shop/CandleCraft"))
        .respond_with(ResponseTemplate::new(200).set_body_string(shop_page_html()))
        .mount(&server)
        .await;

    let mut config = test_config(&server.uri());
    config.max_retries = 1;
    let shop = StorefrontClient::new(config)
        .unwrap()
        .scrape_shop("CandleCraft")
        .await
        .expect("second attempt should succeed");
    assert_eq!(shop.total_sales, 1_250);
}

#[tokio::test]
async fn scrape_shop_surfaces_status_after_retries_exhausted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/shop/CandleCraft"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let mut config = test_config(&server.uri());
    config.max_retries = 1;
    let err = StorefrontClient::new(config)
        .unwrap()
        .scrape_shop("CandleCraft")
        .await
        .unwrap_err();
    assert!(
        matches!(err, ScraperError::UnexpectedStatus { status: 500, .. }),
        "got: {err:?}"
    );
}

#[tokio::test]
async fn rate_limit_reports_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/shop/CandleCraft"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "17"))
        .mount(&server)
        .await;

    let err = test_client(&server.uri())
        .scrape_shop("CandleCraft")
        .await
        .unwrap_err();
    assert!(
        matches!(err, ScraperError::RateLimited { retry_after_secs: 17, .. }),
        "got: {err:?}"
    );
}

#[tokio::test]
async fn light_check_reads_counters_only() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/shop/CandleCraft"))
        .respond_with(ResponseTemplate::new(200).set_body_string(shop_page_html()))
        .expect(1)
        .mount(&server)
        .await;

    let shop = test_client(&server.uri())
        .check_for_updates("CandleCraft", false)
        .await
        .unwrap();

    assert_eq!(shop.total_sales, 1_250);
    assert_eq!(shop.admirers, 310);
    assert!(shop.categories.is_empty(), "no category parse on a light check");
    assert!(shop.menu.categories.is_empty());
}

fn cookie_of(request: &wiremock::Request) -> Option<String> {
    request
        .headers
        .get("cookie")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

#[tokio::test]
async fn server_error_drops_session_cookies_before_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/shop/CandleCraft"))
        .respond_with(ResponseTemplate::new(500).insert_header("Set-Cookie", "uaid=first; Path=/"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/shop/CandleCraft"))
        .respond_with(ResponseTemplate::new(200).set_body_string(shop_page_html()))
        .mount(&server)
        .await;

    let mut config = test_config(&server.uri());
    config.max_retries = 1;
    StorefrontClient::new(config)
        .unwrap()
        .scrape_shop("CandleCraft")
        .await
        .expect("retry should succeed");

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    assert_eq!(cookie_of(&requests[1]), None, "retry must start a clean cookie jar");
}

#[tokio::test]
async fn not_found_keeps_session_cookies() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/shop/Gone"))
        .respond_with(ResponseTemplate::new(404).insert_header("Set-Cookie", "uaid=kept; Path=/"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/shop/CandleCraft"))
        .respond_with(ResponseTemplate::new(200).set_body_string(shop_page_html()))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let session = client.start_session().unwrap();
    let err = session
        .fetch_html(&format!("{}/shop/Gone", server.uri()))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    session
        .fetch_html(&format!("{}/shop/CandleCraft", server.uri()))
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(cookie_of(&requests[1]).as_deref(), Some("uaid=kept"));
}

#[tokio::test]
async fn concurrent_sessions_do_not_share_identity_state() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/shop/CandleCraft"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Set-Cookie", "uaid=crawl-a; Path=/")
                .set_body_string(shop_page_html()),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/shop/CandleCraft"))
        .respond_with(ResponseTemplate::new(200).set_body_string(shop_page_html()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/shop/Flaky"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let crawl_a = client.start_session().unwrap();
    let crawl_b = client.start_session().unwrap();
    let page = format!("{}/shop/CandleCraft", server.uri());

    crawl_a.fetch_html(&page).await.unwrap();
    crawl_b.fetch_html(&page).await.unwrap();
    crawl_b
        .fetch_html(&format!("{}/shop/Flaky", server.uri()))
        .await
        .unwrap_err();
    crawl_a.fetch_html(&page).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 4);
    assert_eq!(cookie_of(&requests[1]), None, "crawl b has its own jar");
    assert_eq!(
        cookie_of(&requests[3]).as_deref(),
        Some("uaid=crawl-a"),
        "crawl b rotating its identity leaves crawl a's session intact"
    );
}

#[tokio::test]
async fn requests_carry_browser_navigation_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/shop/CandleCraft"))
        .respond_with(ResponseTemplate::new(200).set_body_string(shop_page_html()))
        .mount(&server)
        .await;

    test_client(&server.uri())
        .check_for_updates("CandleCraft", false)
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let headers = &requests[0].headers;
    assert_eq!(headers.get("user-agent").unwrap(), "shoptrack-test/0.1");
    assert_eq!(headers.get("sec-fetch-mode").unwrap(), "navigate");
    assert_eq!(headers.get("referer").unwrap().to_str().unwrap(), server.uri());
    assert!(headers
        .get("accept")
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/html"));
}
