//! End-to-end extraction engine behaviour against canned pages
use std::time::Duration;

use product_harvester::application::ProductClassifier;
use product_harvester::domain::{DetailOutcome, FailureReason, ProductCategory, SiteConfig, SkipReason};
use product_harvester::infrastructure::config::EngineSettings;
use product_harvester::infrastructure::fixture_navigator::{FixtureNavigator, FixturePage};
use product_harvester::infrastructure::pacing::{NoDelay, RandomDelay};
use product_harvester::infrastructure::ExtractionEngine;

const LIST_URL: &str = "https://shop.example/dien-thoai";

fn site() -> SiteConfig {
    SiteConfig::load([
        ("url", LIST_URL),
        ("productContainer", ".product-item"),
        ("name", ".pdp-name"),
        ("price", ".pdp-price"),
    ])
    .unwrap()
}

fn settings() -> EngineSettings {
    EngineSettings {
        max_listings: 10,
        min_delay_ms: 500,
        max_delay_ms: 1_500,
        wait_timeout_ms: 3_000,
        navigation_timeout_ms: 10_000,
        ..EngineSettings::default()
    }
}

fn listing(count: usize) -> String {
    (1..=count)
        .map(|i| format!(r#"<div class="product-item"><a href="/p/{i}">Phone {i}</a></div>"#))
        .collect()
}

fn detail_url(i: usize) -> String {
    format!("https://shop.example/p/{i}")
}

#[tokio::test(start_paused = true)]
async fn fallback_alternate_supplies_missing_name() {
    let url = detail_url(1);
    let nav = FixtureNavigator::new().with_page(
        &url,
        r#"<div class="product-name-box">Phone X</div><span class="pdp-price">7.490.000đ</span>"#,
    );
    let mut engine = ExtractionEngine::new(Box::new(nav), Box::new(NoDelay), settings());

    let outcome = engine.extract_detail(&url, &site()).await.unwrap();
    let DetailOutcome::Extracted(fields) = outcome else {
        panic!("expected extracted fields, got {outcome:?}");
    };
    let product = ProductClassifier::build(ProductCategory::Smartphone, fields, &url);
    assert_eq!(product.name(), "Phone X");
    assert_eq!(product.price, 7_490_000.0);
    assert_eq!(product.product_url, url);

    engine.close().await;
}

#[tokio::test(start_paused = true)]
async fn exhausted_name_chain_skips_product() {
    let url = detail_url(2);
    let nav = FixtureNavigator::new().with_page(&url, r#"<span class="pdp-price">1.000.000đ</span>"#);
    let mut engine = ExtractionEngine::new(Box::new(nav), Box::new(NoDelay), settings());

    let outcome = engine.extract_detail(&url, &site()).await.unwrap();
    assert_eq!(outcome, DetailOutcome::Skipped(SkipReason::MissingName));

    engine.close().await;
}

#[tokio::test(start_paused = true)]
async fn listing_cap_and_pacing_between_visits() {
    let mut nav = FixtureNavigator::new().with_page(LIST_URL, listing(12));
    for i in 1..=12 {
        nav = nav.with_page(detail_url(i), format!(r#"<h1>Phone {i}</h1>"#));
    }
    let log = nav.log();
    let min_delay = Duration::from_millis(settings().min_delay_ms);
    let delay = RandomDelay::from_millis(settings().min_delay_ms, settings().max_delay_ms, 11);
    let mut engine = ExtractionEngine::new(Box::new(nav), Box::new(delay), settings());

    let urls = engine.discover_listings(&site()).await.unwrap();
    assert_eq!(urls.len(), 10);
    for url in &urls {
        let outcome = engine.extract_detail(url.as_str(), &site()).await.unwrap();
        assert!(matches!(outcome, DetailOutcome::Extracted(_)));
    }
    engine.close().await;

    let visits = log.visits();
    assert_eq!(visits.len(), 11);
    assert_eq!(visits[0].url, LIST_URL);
    let expected: Vec<String> = (1..=10).map(detail_url).collect();
    let visited: Vec<String> = visits[1..].iter().map(|v| v.url.clone()).collect();
    assert_eq!(visited, expected);
    for pair in visits.windows(2) {
        assert!(
            pair[1].at - pair[0].at >= min_delay,
            "{} followed {} too quickly",
            pair[1].url,
            pair[0].url
        );
    }
}

#[tokio::test(start_paused = true)]
async fn blocked_page_fails_without_retry_and_next_url_proceeds() {
    let blocked = detail_url(1);
    let fine = detail_url(2);
    let nav = FixtureNavigator::new()
        .with_page(&blocked, "<html><body><p>Please verify you are human to continue</p></body></html>")
        .with_page(&fine, r#"<h1 class="pdp-name">Phone 2</h1>"#);
    let log = nav.log();
    let mut engine = ExtractionEngine::new(Box::new(nav), Box::new(NoDelay), settings());

    let first = engine.extract_detail(&blocked, &site()).await.unwrap();
    assert!(matches!(first, DetailOutcome::Failed(FailureReason::Blocked { ref marker }) if marker == "verify you are human"));

    let second = engine.extract_detail(&fine, &site()).await.unwrap();
    assert!(matches!(second, DetailOutcome::Extracted(ref fields) if fields.name == "Phone 2"));

    engine.close().await;
    assert_eq!(log.visited_urls(), vec![blocked, fine]);
}

#[tokio::test(start_paused = true)]
async fn hanging_navigation_times_out_and_engine_stays_usable() {
    let slow = detail_url(1);
    let fine = detail_url(2);
    let nav = FixtureNavigator::new()
        .with_response(&slow, FixturePage::Hang)
        .with_page(&fine, r#"<h1>Phone 2</h1>"#);
    let mut engine = ExtractionEngine::new(Box::new(nav), Box::new(NoDelay), settings());

    let started = tokio::time::Instant::now();
    let outcome = engine.extract_detail(&slow, &site()).await.unwrap();
    assert_eq!(outcome, DetailOutcome::Failed(FailureReason::Timeout));
    assert!(started.elapsed() >= Duration::from_millis(10_000));

    let next = engine.extract_detail(&fine, &site()).await.unwrap();
    assert!(matches!(next, DetailOutcome::Extracted(_)));
    engine.close().await;
}

#[tokio::test]
async fn close_is_idempotent() {
    let nav = FixtureNavigator::new();
    let log = nav.log();
    let mut engine = ExtractionEngine::new(Box::new(nav), Box::new(NoDelay), settings());

    engine.close().await;
    engine.close().await;
    assert!(engine.is_closed());
    assert_eq!(log.close_calls(), 1);
}
