//! Theme behaviour across page loads

use crate::helpers::day_later;
use homepage::config::Config;
use homepage::document::ROOT;
use homepage::page::PageContext;
use homepage::stats::OfflineCounterClient;
use homepage::storage::{keys, JsonFileStorage, MemoryStorage, Storage};
use homepage::theme::Theme;
use std::sync::Arc;
use std::time::Duration;

fn page_on(storage: Arc<dyn Storage>, system_dark: bool) -> Arc<PageContext> {
    let mut config = Config::default();
    config.environment.system_dark = system_dark;
    PageContext::builder(config)
        .storage(storage)
        .counter(Arc::new(OfflineCounterClient))
        .clock(day_later())
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_choice_survives_reload_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("storage.json");

    let first = page_on(Arc::new(JsonFileStorage::open(&path).unwrap()), false);
    first.boot().await;
    first.theme().unwrap().toggle_theme().unwrap();
    first.shutdown();

    // OS says light, the saved choice still wins
    let second = page_on(Arc::new(JsonFileStorage::open(&path).unwrap()), false);
    second.boot().await;
    let theme = second.theme().unwrap();
    assert_eq!(theme.current_theme(), Theme::Dark);
    assert_eq!(theme.theme_usage_stats().get("dark"), Some(&1));
    assert!(second.document().has_class(ROOT, "theme-dark"));
    second.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_high_contrast_reapplied_on_next_load() {
    let storage = Arc::new(MemoryStorage::new());

    let first = page_on(storage.clone(), false);
    first.boot().await;
    first.theme().unwrap().enable_high_contrast().unwrap();
    first.shutdown();

    let second = page_on(storage.clone(), true);
    second.boot().await;
    assert!(second.document().has_class(ROOT, "high-contrast"));
    assert_eq!(second.theme().unwrap().current_theme(), Theme::Dark);
    second.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_theme_change_mirrors_visitor_count() {
    let storage = Arc::new(MemoryStorage::new());
    let page = page_on(storage.clone(), false);
    page.boot().await;

    // Offline counter: nothing to mirror
    page.theme().unwrap().toggle_theme().unwrap();
    assert_eq!(storage.get(keys::VISITOR_COUNT_BACKUP), None);

    // The stats display is refreshed shortly after the change
    let visitors = page.document().by_id("visitor-count").unwrap();
    page.document().set_text(visitors, "stale");
    page.theme().unwrap().toggle_theme().unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(page.document().text(visitors).as_deref(), Some("-"));
    page.shutdown();
}
