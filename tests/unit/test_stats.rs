//! Visitor counter and statistics display
//!
//! These run on real time: the mock counter is a loopback TCP server.

use crate::helpers::day_later;
use homepage::config::Config;
use homepage::page::PageContext;
use homepage::storage::MemoryStorage;
use homepage::testing::MockCounterServer;
use std::sync::Arc;
use std::time::Duration;

fn page_against(server: &MockCounterServer) -> Arc<PageContext> {
    let mut config = Config::default();
    config.counter_endpoint = Some(server.url().to_string());
    config.request_timeout_secs = 2;
    PageContext::builder(config)
        .storage(Arc::new(MemoryStorage::new()))
        .clock(day_later())
        .build()
        .unwrap()
}

fn text_of(page: &PageContext, id: &str) -> Option<String> {
    let node = page.document().by_id(id)?;
    page.document().text(node)
}

/// Poll until the counter call has been answered and handled.
async fn wait_for_counter(server: &MockCounterServer) {
    for _ in 0..100 {
        if !server.requests().await.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    tokio::time::sleep(Duration::from_millis(200)).await;
}

#[tokio::test]
async fn test_counter_success_displayed() {
    let server = MockCounterServer::builder()
        .with_start_count(1233)
        .with_page_views()
        // Answer after the locale is known
        .with_latency(50)
        .build()
        .await
        .unwrap();
    let page = page_against(&server);
    page.boot().await;
    wait_for_counter(&server).await;

    let stats = page.stats().unwrap();
    assert_eq!(stats.visitor_count(), 1234);
    assert_eq!(stats.page_views(), 3702);
    assert_eq!(text_of(&page, "visitor-count").as_deref(), Some("1,234"));
    assert_eq!(text_of(&page, "page-views").as_deref(), Some("3702"));
    assert_eq!(server.requests().await, vec!["nie1037"]);

    page.shutdown();
    server.stop().await;
}

#[tokio::test]
async fn test_counter_failure_shows_dash() {
    let server = MockCounterServer::builder()
        .with_error(503, "unavailable")
        .build()
        .await
        .unwrap();
    let page = page_against(&server);
    page.boot().await;
    wait_for_counter(&server).await;

    assert_eq!(page.stats().unwrap().visitor_count(), 0);
    assert_eq!(text_of(&page, "visitor-count").as_deref(), Some("-"));
    assert_eq!(text_of(&page, "page-views").as_deref(), Some("-"));

    page.shutdown();
    server.stop().await;
}

#[tokio::test]
async fn test_refresh_click_refetches_count() {
    let server = MockCounterServer::builder()
        .with_start_count(9)
        .build()
        .await
        .unwrap();
    let page = page_against(&server);
    page.boot().await;
    wait_for_counter(&server).await;
    assert_eq!(page.stats().unwrap().visitor_count(), 10);

    let refresh = page.document().by_id("refresh-stats").unwrap();
    page.click(refresh).await;
    assert_eq!(page.stats().unwrap().visitor_count(), 11);
    assert_eq!(text_of(&page, "visitor-count").as_deref(), Some("11"));
    assert_eq!(server.requests().await.len(), 2);

    page.shutdown();
    server.stop().await;
}

#[tokio::test]
async fn test_site_id_from_config() {
    let server = MockCounterServer::builder().build().await.unwrap();
    let mut config = Config::default();
    config.site_id = "other-site".into();
    config.counter_endpoint = Some(server.url().to_string());
    let page = PageContext::builder(config)
        .storage(Arc::new(MemoryStorage::new()))
        .build()
        .unwrap();
    page.boot().await;
    wait_for_counter(&server).await;

    assert_eq!(server.count("other-site").await, Some(1));
    page.shutdown();
    server.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_current_stats_snapshot() {
    let page = PageContext::builder(Config::default())
        .storage(Arc::new(MemoryStorage::new()))
        .counter(Arc::new(homepage::stats::OfflineCounterClient))
        .clock(day_later())
        .build()
        .unwrap();
    page.boot().await;
    tokio::time::sleep(Duration::from_secs(90)).await;

    let snapshot = page.stats().unwrap().current_stats();
    assert_eq!(snapshot.uptime.days, 1);
    assert_eq!(snapshot.uptime.hours, 2);
    assert_eq!(snapshot.uptime.minutes, 3);
    assert_eq!(snapshot.visitors, 0);
    assert!(snapshot.session_duration_ms >= 90_000);
    assert_eq!(page.stats().unwrap().formatted_session_duration(), "1m 30s");
    page.shutdown();
}
