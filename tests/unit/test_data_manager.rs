//! Data manager overlay driven through page clicks

use crate::helpers::day_later;
use homepage::config::Config;
use homepage::data_manager::StatsCache;
use homepage::features::KeyEvent;
use homepage::page::{ClickOutcome, Confirm, PageContext};
use homepage::stats::OfflineCounterClient;
use homepage::storage::{keys, MemoryStorage, Storage};
use std::path::Path;
use std::sync::Arc;

fn page_in(export_dir: &Path, storage: Arc<dyn Storage>, confirm: Confirm) -> Arc<PageContext> {
    let mut config = Config::default();
    config.export_dir = export_dir.to_path_buf();
    PageContext::builder(config)
        .storage(storage)
        .counter(Arc::new(OfflineCounterClient))
        .clock(day_later())
        .confirm(confirm)
        .build()
        .unwrap()
}

fn cached() -> String {
    serde_json::json!({
        "totalVisitors": 321,
        "pageViews": 900,
        "lastUpdated": "2025-06-21T10:00:00Z",
        "visitsByType": {"returning": 5},
        "dailyVisitors": {"2025-06-22": 7}
    })
    .to_string()
}

async fn click_id(page: &PageContext, id: &str) -> ClickOutcome {
    let node = page.document().by_id(id).unwrap();
    page.click(node).await
}

#[tokio::test]
async fn test_export_writes_dated_file() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(MemoryStorage::with_entries([(keys::SITE_STATS, cached())]));
    let page = page_in(dir.path(), storage, Arc::new(|_: &str| false));
    page.boot().await;

    let path = match click_id(&page, "export-data").await {
        ClickOutcome::Exported(path) => path,
        other => panic!("unexpected outcome {other:?}"),
    };
    assert_eq!(path, dir.path().join("site-stats-2025-06-22.json"));

    let exported: StatsCache =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(exported.total_visitors, 321);
    assert_eq!(exported.visits_by_type.get("returning"), Some(&5));

    let manager = page.data_manager().unwrap();
    assert!(manager.notifications().iter().any(|n| n.contains("导出成功")));
    page.shutdown();
}

#[tokio::test]
async fn test_panel_shows_cached_totals() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(MemoryStorage::with_entries([(keys::SITE_STATS, cached())]));
    let page = page_in(dir.path(), storage, Arc::new(|_: &str| false));
    page.boot().await;

    assert_eq!(click_id(&page, "data-manager-btn").await, ClickOutcome::DataManagerOpened);
    let text = |id: &str| page.document().text(page.document().by_id(id).unwrap());
    assert_eq!(text("total-visitors").as_deref(), Some("321"));
    assert_eq!(text("total-pageviews").as_deref(), Some("900"));
    assert_eq!(text("today-visitors").as_deref(), Some("7"));
    assert_eq!(text("visitor-types").as_deref(), Some("returning: 5"));
    assert_eq!(text("scroll-milestones").as_deref(), Some("暂无数据"));

    assert_eq!(
        click_id(&page, "close-data-manager").await,
        ClickOutcome::DataManagerClosed
    );
    assert!(!page.data_manager().unwrap().is_visible());
    page.shutdown();
}

#[tokio::test]
async fn test_import_replaces_cache_and_persists() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("backup.json");
    std::fs::write(&file, cached()).unwrap();

    let storage = Arc::new(MemoryStorage::new());
    let page = page_in(dir.path(), storage.clone(), Arc::new(|_: &str| false));
    page.boot().await;

    assert_eq!(click_id(&page, "import-data").await, ClickOutcome::ImportRequested);
    page.import_file(&file).await.unwrap();

    assert_eq!(page.data_manager().unwrap().stats().total_visitors, 321);
    let stored: StatsCache =
        serde_json::from_str(&storage.get(keys::SITE_STATS).unwrap()).unwrap();
    assert_eq!(stored.page_views, 900);
    page.shutdown();
}

#[tokio::test]
async fn test_import_rejects_invalid_file() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("broken.json");
    std::fs::write(&file, r#"{"totalVisitors": "many"}"#).unwrap();

    let storage = Arc::new(MemoryStorage::with_entries([(keys::SITE_STATS, cached())]));
    let page = page_in(dir.path(), storage, Arc::new(|_: &str| false));
    page.boot().await;

    assert!(page.import_file(&file).await.is_err());
    let manager = page.data_manager().unwrap();
    assert_eq!(manager.stats().total_visitors, 321);
    assert!(manager.notifications().iter().any(|n| n.contains("导入失败")));
    page.shutdown();
}

#[tokio::test]
async fn test_confirmed_reset_clears_cache() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(MemoryStorage::with_entries([(keys::SITE_STATS, cached())]));
    let page = page_in(dir.path(), storage.clone(), Arc::new(|_: &str| true));
    page.boot().await;

    assert_eq!(click_id(&page, "reset-data").await, ClickOutcome::DataReset(true));
    let manager = page.data_manager().unwrap();
    assert_eq!(manager.stats().total_visitors, 0);
    assert!(manager.stats().daily_visitors.is_empty());
    let stored: StatsCache =
        serde_json::from_str(&storage.get(keys::SITE_STATS).unwrap()).unwrap();
    assert_eq!(stored.total_visitors, 0);
    page.shutdown();
}

#[tokio::test]
async fn test_tab_cycles_within_open_panel() {
    let dir = tempfile::tempdir().unwrap();
    let page = page_in(dir.path(), Arc::new(MemoryStorage::new()), Arc::new(|_: &str| false));
    page.boot().await;
    click_id(&page, "data-manager-btn").await;

    let doc = page.document();
    let close = doc.by_id("close-data-manager").unwrap();
    let reset = doc.by_id("reset-data").unwrap();

    doc.focus(reset);
    page.key_down(&KeyEvent::new("Tab"));
    assert_eq!(doc.active_element(), Some(close));

    page.key_down(&KeyEvent::new("Tab").shift());
    assert_eq!(doc.active_element(), Some(reset));
    page.shutdown();
}
