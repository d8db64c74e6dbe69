//! Language selection and page translation

use crate::helpers::day_later;
use homepage::config::Config;
use homepage::document::{Element, BODY, ROOT};
use homepage::i18n::Language;
use homepage::page::{ClickOutcome, PageContext};
use homepage::stats::OfflineCounterClient;
use homepage::storage::{keys, MemoryStorage, Storage};
use std::sync::Arc;
use std::time::Duration;

fn page_with(config: Config, storage: Arc<dyn Storage>) -> Arc<PageContext> {
    PageContext::builder(config)
        .storage(storage)
        .counter(Arc::new(OfflineCounterClient))
        .clock(day_later())
        .build()
        .unwrap()
}

fn hero_motto(page: &PageContext) -> Option<String> {
    let doc = page.document();
    let node = doc.select(|e| e.get_attr("data-i18n-key") == Some("hero.motto"))[0];
    doc.text(node)
}

#[tokio::test(start_paused = true)]
async fn test_stored_language_beats_browser() {
    let storage = Arc::new(MemoryStorage::with_entries([(keys::PREFERRED_LANGUAGE, "zh-CN")]));
    let mut config = Config::default();
    config.environment.browser_language = Some("en-GB".into());
    let page = page_with(config, storage);
    page.boot().await;

    assert_eq!(page.i18n().unwrap().current_language(), Language::ZhCn);
    assert_eq!(page.document().title(), "个人主页");
    page.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_unknown_stored_language_ignored() {
    let storage = Arc::new(MemoryStorage::with_entries([(keys::PREFERRED_LANGUAGE, "fr")]));
    let mut config = Config::default();
    config.environment.browser_language = Some("en".into());
    let page = page_with(config, storage);
    page.boot().await;

    assert_eq!(page.i18n().unwrap().current_language(), Language::En);
    page.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_missing_english_key_falls_back_to_chinese() {
    let mut config = Config::default();
    config.environment.browser_language = Some("en".into());
    let page = page_with(config, Arc::new(MemoryStorage::new()));
    page.boot().await;

    assert_eq!(hero_motto(&page).as_deref(), Some("保持好奇，持续构建"));
    page.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_lang_switch_click_round_trip() {
    let storage = Arc::new(MemoryStorage::new());
    let page = page_with(Config::default(), storage.clone());
    page.boot().await;
    let doc = page.document();
    let switch = doc.by_id("lang-switch").unwrap();

    assert_eq!(page.click(switch).await, ClickOutcome::LanguageToggled);
    assert_eq!(doc.attr(ROOT, "lang").as_deref(), Some("en"));
    assert!(doc.has_attr(switch, "checked"));
    assert!(!doc.has_attr(switch, "disabled"));
    let container = doc.closest(switch, "switch-container").unwrap();
    assert_eq!(doc.attr(container, "title").as_deref(), Some("Switch Language"));

    page.click(switch).await;
    assert_eq!(doc.attr(ROOT, "lang").as_deref(), Some("zh-CN"));
    assert_eq!(storage.get(keys::PREFERRED_LANGUAGE).as_deref(), Some("zh-CN"));
    page.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_added_content_translated() {
    let mut config = Config::default();
    config.environment.browser_language = Some("en".into());
    let page = page_with(config, Arc::new(MemoryStorage::new()));
    page.boot().await;

    let node = page
        .document()
        .append(BODY, Element::new("span").attr("data-i18n-key", "nav.projects"));
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(page.document().text(node).as_deref(), Some("Projects"));
    page.shutdown();
}

#[tokio::test]
async fn test_translations_from_directory() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("zh-CN.json"),
        r#"{"site": {"title": "自定义标题"}, "nav": {"about": "关于我"}}"#,
    )
    .unwrap();
    // No en.json: English lookups fall back to Chinese

    let mut config = Config::default();
    config.translations_dir = Some(dir.path().to_path_buf());
    config.environment.browser_language = Some("en".into());
    let page = page_with(config, Arc::new(MemoryStorage::new()));
    page.boot().await;

    let i18n = page.i18n().unwrap();
    assert_eq!(i18n.current_language(), Language::En);
    assert!(i18n.table(Language::En).is_none());
    assert_eq!(page.document().title(), "自定义标题");
    assert_eq!(i18n.translate("nav.about"), "关于我");
    assert_eq!(i18n.translate("nav.missing"), "nav.missing");
    page.shutdown();
}
