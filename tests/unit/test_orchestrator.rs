//! Orchestrator bring-up scenarios
//!
//! Tests cover:
//! - Late readiness found by polling
//! - Attempt budget exhaustion
//! - Readiness events racing the poll
//! - The appReady payload and bring-up timings

use homepage::app::{App, AppState, ModuleLookup, ModuleStatus, PageModule, ServiceDependency};
use homepage::document::homepage_template;
use homepage::events::{next_of_kind, EventBus, EventKind, PageEvent};
use homepage::i18n::I18n;
use homepage::readiness::ReadinessProbe;
use homepage::registry::{ServiceName, ServiceRegistry};
use homepage::storage::MemoryStorage;
use homepage::theme::{ThemeDeps, ThemeManager};
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

fn i18n_and_theme(registry: &Arc<ServiceRegistry>, bus: &EventBus) -> Vec<Arc<dyn PageModule>> {
    vec![
        Arc::new(ServiceDependency::new(
            "i18n",
            ReadinessProbe::new(ServiceName::I18n, 50),
            Arc::clone(registry),
            bus.clone(),
        )),
        Arc::new(ServiceDependency::new(
            "theme",
            ReadinessProbe::new(ServiceName::ThemeManager, 10)
                .with_event(EventKind::ThemeManagerReady),
            Arc::clone(registry),
            bus.clone(),
        )),
    ]
}

fn theme_manager(bus: &EventBus) -> Arc<ThemeManager> {
    ThemeManager::initialize(ThemeDeps {
        document: Arc::new(homepage_template()),
        storage: Arc::new(MemoryStorage::new()),
        bus: bus.clone(),
        visitor_count: Arc::new(AtomicU64::new(0)),
        system_dark: false,
    })
    .unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_late_i18n_loaded_and_missing_theme_errors() {
    let doc = Arc::new(homepage_template());
    doc.mark_interactive();
    let bus = EventBus::new();
    let registry = Arc::new(ServiceRegistry::new());

    let publisher = Arc::clone(&registry);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(250)).await;
        publisher.i18n.publish(Arc::new(I18n::empty()));
    });

    let app = App::builder(Arc::clone(&doc), bus.clone(), Arc::clone(&registry))
        .modules(i18n_and_theme(&registry, &bus))
        .build();

    let started = Instant::now();
    assert_eq!(app.run().await, AppState::Ready);
    // Three ticks for i18n, then theme's whole budget
    assert_eq!(started.elapsed(), Duration::from_millis(1300));

    assert_eq!(app.module_status("i18n").status(), Some(ModuleStatus::Loaded));
    assert_eq!(app.module_status("theme").status(), Some(ModuleStatus::Error));
    match app.module_status("theme") {
        ModuleLookup::Found(handle) => {
            assert!(handle.error.unwrap().contains("10 attempts"));
        }
        ModuleLookup::NotFound { .. } => panic!("theme not tracked"),
    }

    // Page interactions still wired
    let github = doc.select(|e| e.get_attr("href") == Some("https://github.com/example"))[0];
    assert_eq!(doc.attr(github, "target").as_deref(), Some("_blank"));
}

#[tokio::test(start_paused = true)]
async fn test_readiness_event_resolves_before_budget() {
    let doc = Arc::new(homepage_template());
    doc.mark_interactive();
    let bus = EventBus::new();
    let registry = Arc::new(ServiceRegistry::new());
    registry.i18n.publish(Arc::new(I18n::empty()));

    let theme = theme_manager(&bus);
    let publisher = Arc::clone(&registry);
    let emitter = bus.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(420)).await;
        publisher.theme.publish(theme);
        emitter.emit(PageEvent::ThemeManagerReady);
    });

    let app = App::builder(Arc::clone(&doc), bus.clone(), Arc::clone(&registry))
        .modules(i18n_and_theme(&registry, &bus))
        .build();

    let started = Instant::now();
    app.run().await;
    assert_eq!(started.elapsed(), Duration::from_millis(420));
    assert_eq!(app.module_status("theme").status(), Some(ModuleStatus::Loaded));
}

#[tokio::test(start_paused = true)]
async fn test_app_ready_carries_status_table() {
    let doc = Arc::new(homepage_template());
    doc.mark_interactive();
    let bus = EventBus::new();
    let registry = Arc::new(ServiceRegistry::new());
    registry.i18n.publish(Arc::new(I18n::empty()));
    registry.theme.publish(theme_manager(&bus));

    let mut events = bus.subscribe();
    let app = App::builder(Arc::clone(&doc), bus.clone(), Arc::clone(&registry))
        .modules(i18n_and_theme(&registry, &bus))
        .build();
    app.run().await;

    match next_of_kind(&mut events, EventKind::AppReady).await {
        Some(PageEvent::AppReady { modules, .. }) => {
            let names: Vec<_> = modules.iter().map(|m| m.name.as_str()).collect();
            assert_eq!(names, vec!["i18n", "theme"]);
            assert!(modules.iter().all(|m| m.status == ModuleStatus::Loaded));
        }
        other => panic!("unexpected event: {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_performance_metrics_follow_module_order() {
    let doc = Arc::new(homepage_template());
    doc.mark_interactive();
    let bus = EventBus::new();
    let registry = Arc::new(ServiceRegistry::new());

    let app = App::builder(Arc::clone(&doc), bus.clone(), Arc::clone(&registry))
        .modules(i18n_and_theme(&registry, &bus))
        .build();
    app.run().await;

    let metrics = app.performance_metrics();
    assert_eq!(metrics.modules.len(), 2);
    assert_eq!(metrics.modules[0].name, "i18n");
    assert_eq!(metrics.modules[0].duration_ms, 5000);
    assert_eq!(metrics.modules[1].duration_ms, 1000);
    assert_eq!(metrics.total_ms, 6000);
}

#[tokio::test(start_paused = true)]
async fn test_state_watch_reaches_ready() {
    let doc = Arc::new(homepage_template());
    let bus = EventBus::new();
    let registry = Arc::new(ServiceRegistry::new());
    let app = Arc::new(App::builder(Arc::clone(&doc), bus, registry).build());

    let mut state = app.subscribe_state();
    let runner = Arc::clone(&app);
    let handle = tokio::spawn(async move { runner.run().await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(app.state(), AppState::Loading);
    doc.mark_interactive();

    state.wait_for(|s| s.is_terminal()).await.unwrap();
    assert_eq!(handle.await.unwrap(), AppState::Ready);
}
