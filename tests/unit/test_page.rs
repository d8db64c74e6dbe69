//! Whole-page scenarios
//!
//! Boots a full [`PageContext`] the way a browser load would and drives it
//! with simulated input.

use crate::helpers::{day_later, FlakyStorage};
use homepage::app::ModuleStatus;
use homepage::config::Config;
use homepage::features::KeyEvent;
use homepage::i18n::Language;
use homepage::page::{ClickOutcome, LoadPlan, LoadPlans, PageContext};
use homepage::stats::OfflineCounterClient;
use homepage::storage::{keys, MemoryStorage, Storage};
use homepage::theme::Theme;
use homepage::AppState;
use std::sync::Arc;
use std::time::Duration;

fn page(config: Config, storage: Arc<dyn Storage>) -> Arc<PageContext> {
    PageContext::builder(config)
        .storage(storage)
        .counter(Arc::new(OfflineCounterClient))
        .clock(day_later())
        .build()
        .unwrap()
}

fn english() -> Config {
    let mut config = Config::default();
    config.environment.browser_language = Some("en-US".to_string());
    config
}

fn text_of(page: &PageContext, id: &str) -> Option<String> {
    let node = page.document().by_id(id)?;
    page.document().text(node)
}

/// Let spawned listeners run.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

#[tokio::test(start_paused = true)]
async fn test_chinese_dark_os_first_visit() {
    let storage = Arc::new(MemoryStorage::new());
    let mut config = Config::default();
    config.environment.system_dark = true;
    let page = page(config, storage.clone());

    assert_eq!(page.boot().await, AppState::Ready);

    let theme = page.theme().unwrap();
    assert_eq!(theme.current_theme(), Theme::Dark);
    assert_eq!(
        page.document().attr(homepage::document::ROOT, "data-theme").as_deref(),
        Some("dark")
    );
    // The OS-derived theme is not a preference
    assert_eq!(storage.get(keys::PREFERRED_THEME), None);

    assert_eq!(page.i18n().unwrap().current_language(), Language::ZhCn);
    assert_eq!(text_of(&page, "uptime-display").as_deref(), Some("1天 2小时 3分钟"));
    page.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_english_browser_translates_page() {
    let page = page(english(), Arc::new(MemoryStorage::new()));
    page.boot().await;

    let doc = page.document();
    assert_eq!(doc.title(), "Personal Homepage");
    assert_eq!(doc.attr(homepage::document::ROOT, "lang").as_deref(), Some("en"));

    let about = doc.select(|e| e.has_class("nav-link") && e.get_attr("href") == Some("#about"))[0];
    assert_eq!(doc.text(about).as_deref(), Some("About"));

    let button = doc.by_id("data-manager-btn").unwrap();
    assert_eq!(doc.attr(button, "title").as_deref(), Some("Data Manager"));
    page.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_uptime_switches_locale_on_next_tick() {
    let page = page(english(), Arc::new(MemoryStorage::new()));
    page.boot().await;

    // Stats rendered before the tables were loaded
    assert_eq!(text_of(&page, "uptime-display").as_deref(), Some("1天 2小时 3分钟"));

    tokio::time::sleep(Duration::from_secs(61)).await;
    assert_eq!(text_of(&page, "uptime-display").as_deref(), Some("1d 2h 3m"));
    page.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_theme_write_failure_retried_at_dom_ready() {
    let inner = MemoryStorage::with_entries([(keys::PREFERRED_THEME, "dark")]);
    let storage = Arc::new(FlakyStorage::new(inner, 1));
    let page = page(Config::default(), storage);

    assert_eq!(page.boot().await, AppState::Ready);
    assert_eq!(
        page.app().module_status("theme").status(),
        Some(ModuleStatus::Loaded)
    );
    assert_eq!(page.theme().unwrap().current_theme(), Theme::Dark);
    page.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_late_stats_script_found_by_event() {
    let plans = LoadPlans {
        stats: LoadPlan::After(Duration::from_millis(850)),
        ..LoadPlans::default()
    };
    let page = PageContext::builder(Config::default())
        .storage(Arc::new(MemoryStorage::new()))
        .counter(Arc::new(OfflineCounterClient))
        .clock(day_later())
        .plans(plans)
        .build()
        .unwrap();

    page.boot().await;
    assert_eq!(
        page.app().module_status("stats").status(),
        Some(ModuleStatus::Loaded)
    );
    let stats = page
        .app()
        .performance_metrics()
        .modules
        .into_iter()
        .find(|m| m.name == "stats")
        .unwrap();
    // i18n resolves on its first poll at 100ms
    assert_eq!(stats.duration_ms, 750);
    page.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_scroll_milestones_over_full_page() {
    let page = page(Config::default(), Arc::new(MemoryStorage::new()));
    page.boot().await;

    // 2400 tall, 800 viewport: 1600 scrollable
    for y in [400.0, 800.0, 1200.0, 1500.0] {
        page.scroll_to(y);
    }
    page.scroll_to(300.0);

    assert_eq!(page.stats().unwrap().scroll_milestones(), vec![25, 50, 75, 90]);
    page.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_ctrl_shift_d_toggles_theme_and_opens_panel() {
    let page = page(Config::default(), Arc::new(MemoryStorage::new()));
    page.boot().await;

    page.key_down(&KeyEvent::new("D").ctrl().shift());
    assert_eq!(page.theme().unwrap().current_theme(), Theme::Dark);
    assert!(page.data_manager().unwrap().is_visible());
    page.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_language_shortcut_redisplays_stats() {
    let storage = Arc::new(MemoryStorage::new());
    let page = page(Config::default(), storage.clone());
    page.boot().await;

    page.key_down(&KeyEvent::new("L").ctrl().shift());
    settle().await;

    assert_eq!(page.i18n().unwrap().current_language(), Language::En);
    assert_eq!(storage.get(keys::PREFERRED_LANGUAGE).as_deref(), Some("en"));
    assert_eq!(text_of(&page, "uptime-display").as_deref(), Some("1d 2h 3m"));
    page.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_hidden_tab_pauses_uptime() {
    let page = page(Config::default(), Arc::new(MemoryStorage::new()));
    page.boot().await;
    let stats = page.stats().unwrap();
    assert!(stats.is_ticking());

    page.set_hidden(true);
    settle().await;
    assert!(!stats.is_ticking());

    page.set_hidden(false);
    settle().await;
    assert!(stats.is_ticking());
    page.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_os_scheme_followed_until_user_chooses() {
    let storage = Arc::new(MemoryStorage::new());
    let page = page(Config::default(), storage.clone());
    page.boot().await;
    let theme = page.theme().unwrap();

    page.set_system_dark(true);
    settle().await;
    assert_eq!(theme.current_theme(), Theme::Dark);
    assert_eq!(storage.get(keys::PREFERRED_THEME), None);

    let switch = page.document().by_id("theme-switch").unwrap();
    page.click(switch).await;
    assert_eq!(theme.current_theme(), Theme::Light);

    page.set_system_dark(true);
    settle().await;
    assert_eq!(theme.current_theme(), Theme::Light);
    page.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_reload_button_on_error_panel() {
    let page = page(Config::default(), Arc::new(MemoryStorage::new()));
    page.document().abort();
    assert_eq!(page.boot().await, AppState::Failed);

    let reload = page.document().by_attr("data-action")[0];
    assert_eq!(page.click(reload).await, ClickOutcome::Reload);
}

#[tokio::test(start_paused = true)]
async fn test_copy_and_scroll_to_top_clicks() {
    let page = page(Config::default(), Arc::new(MemoryStorage::new()));
    page.boot().await;
    let doc = page.document();

    let copy = doc.by_attr("data-copy")[0];
    assert_eq!(page.click(copy).await, ClickOutcome::Copied);

    page.scroll_to(900.0);
    let top = doc.by_class("scroll-to-top")[0];
    assert!(doc.has_class(top, "visible"));
    assert_eq!(page.click(top).await, ClickOutcome::ScrollToTop);
    assert!(!doc.has_class(top, "visible"));
    page.shutdown();
}
