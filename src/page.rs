//! Page composition root
//!
//! Owns every shared handle of one page load and hands each manager only
//! what it needs. Also stands in for the browser: it executes the "scripts"
//! according to their load plans, fires DOM readiness, and routes simulated
//! input (clicks, keys, scrolling, visibility and colour-scheme signals) to
//! the modules that would have registered listeners for them.

use crate::app::{App, AppState, PageModule, ServiceDependency};
use crate::config::Config;
use crate::data_manager::{DataManager, DataManagerDeps};
use crate::document::{homepage_template, Document, NodeId, BODY};
use crate::errors::{DataError, HomepageError, StorageError};
use crate::events::{EventBus, EventKind, PageEvent};
use crate::features::{
    shortcuts, Accessibility, Animations, Announcer, CardAction, Cards, KeyEvent, Navigation,
    PageInteractions, ShortcutAction,
};
use crate::i18n::{locale_channel, I18n, I18nDeps, LocaleReceiver, LocaleSender, TranslationSource};
use crate::readiness::ReadinessProbe;
use crate::registry::{ServiceName, ServiceRegistry};
use crate::stats::{
    system_clock, Clock, CounterClient, HttpCounterClient, OfflineCounterClient, StatsDeps,
    StatsManager,
};
use crate::storage::{JsonFileStorage, Storage};
use crate::theme::{ThemeDeps, ThemeManager};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// When a singleton's script runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPlan {
    /// As soon as the page starts loading.
    Immediate,
    /// A fixed delay after the page starts loading.
    After(Duration),
    /// Once the document is interactive.
    OnDomReady,
    /// The script never loads.
    Missing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadPlans {
    pub theme: LoadPlan,
    pub i18n: LoadPlan,
    pub stats: LoadPlan,
    pub data_manager: LoadPlan,
}

impl Default for LoadPlans {
    fn default() -> Self {
        Self {
            theme: LoadPlan::Immediate,
            i18n: LoadPlan::OnDomReady,
            stats: LoadPlan::Immediate,
            data_manager: LoadPlan::OnDomReady,
        }
    }
}

impl LoadPlans {
    fn get(&self, service: ServiceName) -> LoadPlan {
        match service {
            ServiceName::ThemeManager => self.theme,
            ServiceName::I18n => self.i18n,
            ServiceName::StatsManager => self.stats,
            ServiceName::DataManager => self.data_manager,
        }
    }
}

/// Answers a `confirm()` prompt.
pub type Confirm = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// What a click ended up doing.
#[derive(Debug, Clone, PartialEq)]
pub enum ClickOutcome {
    Reload,
    DataManagerOpened,
    DataManagerClosed,
    Exported(PathBuf),
    ImportRequested,
    StatsRefreshed,
    DataReset(bool),
    ThemeToggled,
    LanguageToggled,
    Copied,
    ScrollToTop,
    MenuToggled,
    Anchor(f64),
    Card(CardAction),
    Ignored,
}

/// The auxiliary feature modules, kept for input routing.
struct Features {
    announcer: Arc<Announcer>,
    accessibility: Arc<Accessibility>,
    animations: Arc<Animations>,
    navigation: Arc<Navigation>,
    cards: Arc<Cards>,
    interactions: Arc<PageInteractions>,
}

pub struct PageBuilder {
    config: Config,
    document: Option<Arc<Document>>,
    storage: Option<Arc<dyn Storage>>,
    counter: Option<Arc<dyn CounterClient>>,
    clock: Option<Clock>,
    plans: LoadPlans,
    confirm: Option<Confirm>,
}

impl PageBuilder {
    pub fn document(mut self, document: Arc<Document>) -> Self {
        self.document = Some(document);
        self
    }

    pub fn storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn counter(mut self, counter: Arc<dyn CounterClient>) -> Self {
        self.counter = Some(counter);
        self
    }

    pub fn clock(mut self, clock: Clock) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn plans(mut self, plans: LoadPlans) -> Self {
        self.plans = plans;
        self
    }

    pub fn confirm(mut self, confirm: Confirm) -> Self {
        self.confirm = Some(confirm);
        self
    }

    pub fn build(self) -> Result<Arc<PageContext>, HomepageError> {
        self.config.validate()?;
        let config = self.config;

        let storage: Arc<dyn Storage> = match self.storage {
            Some(storage) => storage,
            None => Arc::new(JsonFileStorage::open(&config.storage_path)?),
        };
        let counter: Arc<dyn CounterClient> = match (self.counter, &config.counter_endpoint) {
            (Some(counter), _) => counter,
            (None, Some(endpoint)) => {
                Arc::new(HttpCounterClient::new(endpoint, config.request_timeout())?)
            }
            (None, None) => {
                debug!("No counter endpoint configured");
                Arc::new(OfflineCounterClient)
            }
        };
        let document = self
            .document
            .unwrap_or_else(|| Arc::new(homepage_template()));
        let bus = EventBus::new();
        let registry = Arc::new(ServiceRegistry::new());
        let (locale_tx, locale_rx) = locale_channel();
        let env = &config.environment;
        let confirm: Confirm = match self.confirm {
            Some(confirm) => confirm,
            None => Arc::new(|_: &str| false),
        };

        let announcer = Arc::new(Announcer::new(Arc::clone(&document)));
        let features = Features {
            accessibility: Arc::new(Accessibility::new(
                Arc::clone(&document),
                Arc::clone(&announcer),
                env.reduced_motion,
            )),
            animations: Arc::new(Animations::new(Arc::clone(&document), env.reduced_motion)),
            navigation: Arc::new(Navigation::new(Arc::clone(&document))),
            cards: Arc::new(Cards::new(Arc::clone(&document), env.mobile)),
            interactions: Arc::new(PageInteractions::new(
                Arc::clone(&document),
                Some(Arc::clone(&announcer)),
            )),
            announcer,
        };

        let app = App::builder(Arc::clone(&document), bus.clone(), Arc::clone(&registry))
            .modules(default_modules(&config, &registry, &bus, &features))
            .interactions(Arc::clone(&features.interactions))
            .build();

        Ok(Arc::new(PageContext {
            system_dark: AtomicBool::new(env.system_dark),
            document,
            storage,
            bus,
            registry,
            locale_tx: Arc::new(locale_tx),
            locale_rx,
            visitor_count: Arc::new(AtomicU64::new(0)),
            counter,
            clock: self.clock.unwrap_or_else(system_clock),
            plans: self.plans,
            confirm,
            features,
            app,
            tasks: Mutex::new(Vec::new()),
            config,
        }))
    }
}

/// The tracked modules, in bring-up order.
fn default_modules(
    config: &Config,
    registry: &Arc<ServiceRegistry>,
    bus: &EventBus,
    features: &Features,
) -> Vec<Arc<dyn PageModule>> {
    let orchestrator = &config.orchestrator;
    let probe = |service, attempts| {
        ReadinessProbe::new(service, attempts).with_poll_interval(orchestrator.poll_interval())
    };
    let dependency = |name: &str, probe: ReadinessProbe| -> Arc<dyn PageModule> {
        Arc::new(ServiceDependency::new(
            name,
            probe,
            Arc::clone(registry),
            bus.clone(),
        ))
    };

    vec![
        dependency("i18n", probe(ServiceName::I18n, orchestrator.i18n_attempts)),
        dependency(
            "theme",
            probe(ServiceName::ThemeManager, orchestrator.module_attempts)
                .with_event(EventKind::ThemeManagerReady),
        ),
        dependency(
            "stats",
            probe(ServiceName::StatsManager, orchestrator.module_attempts)
                .with_event(EventKind::StatsManagerReady),
        ),
        Arc::clone(&features.animations) as Arc<dyn PageModule>,
        Arc::clone(&features.navigation) as Arc<dyn PageModule>,
        Arc::clone(&features.cards) as Arc<dyn PageModule>,
        Arc::clone(&features.accessibility) as Arc<dyn PageModule>,
    ]
}

pub struct PageContext {
    document: Arc<Document>,
    storage: Arc<dyn Storage>,
    bus: EventBus,
    registry: Arc<ServiceRegistry>,
    config: Config,
    system_dark: AtomicBool,
    locale_tx: Arc<LocaleSender>,
    locale_rx: LocaleReceiver,
    visitor_count: Arc<AtomicU64>,
    counter: Arc<dyn CounterClient>,
    clock: Clock,
    plans: LoadPlans,
    confirm: Confirm,
    features: Features,
    app: App,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for PageContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageContext")
            .field("site_id", &self.config.site_id)
            .field("plans", &self.plans)
            .field("state", &self.app.state())
            .finish()
    }
}

impl Drop for PageContext {
    fn drop(&mut self) {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }
}

impl PageContext {
    pub fn builder(config: Config) -> PageBuilder {
        PageBuilder {
            config,
            document: None,
            storage: None,
            counter: None,
            clock: None,
            plans: LoadPlans::default(),
            confirm: None,
        }
    }

    // ─── Page load ─────────────────────────────────────────────────────

    /// Simulate one page load: run the scripts per their load plans, mark
    /// the document interactive and drive the orchestrator to completion.
    pub async fn boot(self: &Arc<Self>) -> AppState {
        info!(site = %self.config.site_id, "Loading page");
        for service in [
            ServiceName::ThemeManager,
            ServiceName::I18n,
            ServiceName::StatsManager,
            ServiceName::DataManager,
        ] {
            self.schedule(service).await;
        }
        self.document.mark_interactive();
        self.app.run().await
    }

    async fn schedule(self: &Arc<Self>, service: ServiceName) {
        match self.plans.get(service) {
            LoadPlan::Missing => {
                debug!(service = service.as_str(), "Script never loads");
            }
            LoadPlan::Immediate => {
                if let Err(e) = self.load(service).await {
                    error!(service = service.as_str(), error = %e, "Initialization failed, retrying at DOM ready");
                    self.spawn_on_dom_ready(service, true);
                }
            }
            LoadPlan::After(delay) => self.spawn_after(service, delay),
            LoadPlan::OnDomReady => self.spawn_on_dom_ready(service, false),
        }
    }

    fn spawn(&self, task: impl std::future::Future<Output = ()> + Send + 'static) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => self.tasks.lock().push(handle.spawn(task)),
            Err(_) => warn!("No runtime, deferred script dropped"),
        }
    }

    fn spawn_after(self: &Arc<Self>, service: ServiceName, delay: Duration) {
        let weak = Arc::downgrade(self);
        self.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(page) = weak.upgrade() {
                if let Err(e) = page.load(service).await {
                    error!(service = service.as_str(), error = %e, "Delayed initialization failed");
                }
            }
        });
    }

    fn spawn_on_dom_ready(self: &Arc<Self>, service: ServiceName, retry: bool) {
        let weak: Weak<Self> = Arc::downgrade(self);
        let document = Arc::clone(&self.document);
        self.spawn(async move {
            if document.wait_interactive().await.is_err() {
                debug!(service = service.as_str(), "Document aborted before ready");
                return;
            }
            let Some(page) = weak.upgrade() else {
                return;
            };
            match page.load(service).await {
                Ok(()) if retry => info!(service = service.as_str(), "Retry succeeded"),
                Ok(()) => {}
                Err(e) => error!(service = service.as_str(), error = %e, "Initialization failed"),
            }
        });
    }

    /// Construct one singleton, publish it, then announce it.
    async fn load(&self, service: ServiceName) -> Result<(), HomepageError> {
        match service {
            ServiceName::ThemeManager => match ThemeManager::initialize(self.theme_deps()) {
                Ok(theme) => {
                    self.registry.theme.publish(theme);
                    self.bus.emit(PageEvent::ThemeManagerReady);
                }
                Err(e) => {
                    self.registry.theme.clear();
                    return Err(e.into());
                }
            },
            ServiceName::I18n => {
                let i18n = I18n::initialize(self.i18n_deps()).await;
                self.registry.i18n.publish(i18n);
            }
            ServiceName::StatsManager => {
                let stats = StatsManager::initialize(self.stats_deps());
                self.registry.stats.publish(stats);
                self.bus.emit(PageEvent::StatsManagerReady);
            }
            ServiceName::DataManager => {
                let manager = DataManager::initialize(self.data_manager_deps())?;
                self.registry.data_manager.publish(manager);
            }
        }
        debug!(service = service.as_str(), "Service loaded");
        Ok(())
    }

    fn theme_deps(&self) -> ThemeDeps {
        ThemeDeps {
            document: Arc::clone(&self.document),
            storage: Arc::clone(&self.storage),
            bus: self.bus.clone(),
            visitor_count: Arc::clone(&self.visitor_count),
            system_dark: self.system_dark.load(Ordering::SeqCst),
        }
    }

    fn i18n_deps(&self) -> I18nDeps {
        I18nDeps {
            document: Arc::clone(&self.document),
            storage: Arc::clone(&self.storage),
            bus: self.bus.clone(),
            locale: Arc::clone(&self.locale_tx),
            browser_language: self.config.environment.browser_language.clone(),
            source: self
                .config
                .translations_dir
                .clone()
                .map(TranslationSource::Directory)
                .unwrap_or_default(),
        }
    }

    fn stats_deps(&self) -> StatsDeps {
        StatsDeps {
            document: Arc::clone(&self.document),
            bus: self.bus.clone(),
            counter: Arc::clone(&self.counter),
            locale: self.locale_rx.clone(),
            visitor_count: Arc::clone(&self.visitor_count),
            site_id: self.config.site_id.clone(),
            epoch: self.config.stats.epoch,
            tick: self.config.stats.tick(),
            clock: Arc::clone(&self.clock),
        }
    }

    fn data_manager_deps(&self) -> DataManagerDeps {
        DataManagerDeps {
            document: Arc::clone(&self.document),
            storage: Arc::clone(&self.storage),
            stats: self.registry.stats.subscribe(),
            export_dir: self.config.export_dir.clone(),
            clock: Arc::clone(&self.clock),
        }
    }

    /// End the session: stop stats ticking and background scripts.
    pub fn shutdown(&self) {
        if let Some(stats) = self.registry.stats.get() {
            stats.destroy();
        }
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        info!("Page unloaded");
    }

    // ─── Handles ───────────────────────────────────────────────────────

    pub fn app(&self) -> &App {
        &self.app
    }

    pub fn document(&self) -> &Arc<Document> {
        &self.document
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn announcer(&self) -> &Arc<Announcer> {
        &self.features.announcer
    }

    pub fn theme(&self) -> Option<Arc<ThemeManager>> {
        self.registry.theme.get()
    }

    pub fn i18n(&self) -> Option<Arc<I18n>> {
        self.registry.i18n.get()
    }

    pub fn stats(&self) -> Option<Arc<StatsManager>> {
        self.registry.stats.get()
    }

    pub fn data_manager(&self) -> Option<Arc<DataManager>> {
        self.registry.data_manager.get()
    }

    // ─── Input ─────────────────────────────────────────────────────────

    /// A document-level `keydown`. Returns the shortcut actions it fired.
    pub fn key_down(&self, event: &KeyEvent) -> Vec<ShortcutAction> {
        if event.key == "Tab" {
            self.trap_focus(event.shift);
        }
        if event.key == "Enter" || event.key == " " {
            if let Some(card) = self.document.active_element() {
                self.features.cards.handle_key(card, &event.key);
            }
        }

        let actions = shortcuts::resolve(event);
        for action in &actions {
            self.dispatch_shortcut(*action);
        }
        actions
    }

    fn dispatch_shortcut(&self, action: ShortcutAction) {
        match action {
            ShortcutAction::ToggleTheme => match self.theme() {
                Some(theme) => log_storage(theme.toggle_theme(), "theme toggle"),
                None => warn!("Theme manager not available"),
            },
            ShortcutAction::ToggleLanguage => match self.i18n() {
                Some(i18n) => log_storage(i18n.toggle_language(), "language toggle"),
                None => warn!("I18n not available"),
            },
            ShortcutAction::OpenDataManager => match self.data_manager() {
                Some(manager) => manager.show(),
                None => warn!("Data manager not available"),
            },
            ShortcutAction::Search => info!("Search requested"),
            ShortcutAction::CloseMobileMenu => {
                self.features.navigation.handle_escape();
            }
            ShortcutAction::CloseImagePreview => {
                self.features.cards.close_preview();
            }
            ShortcutAction::CloseDataManager => {
                if let Some(manager) = self.data_manager() {
                    manager.hide();
                }
            }
        }
    }

    fn trap_focus(&self, shift: bool) {
        let dialog = self
            .data_manager()
            .filter(|m| m.is_visible())
            .and_then(|_| self.document.by_id(crate::data_manager::PANEL_ID))
            .or_else(|| {
                self.document
                    .select(|e| e.has_class("modal") && e.has_class("show"))
                    .into_iter()
                    .next()
            });
        if let Some(dialog) = dialog {
            self.features.accessibility.trap_focus(dialog, shift);
        }
    }

    /// A click on `target`, routed the way the page's listeners would.
    pub async fn click(&self, target: NodeId) -> ClickOutcome {
        if self.document.attr(target, "data-action").as_deref() == Some("reload") {
            info!("Reload requested");
            return ClickOutcome::Reload;
        }
        let id = self.document.with_element(target, |e| e.id.clone()).flatten();
        match id.as_deref() {
            Some("data-manager-btn") => {
                return if self.app.open_data_manager() {
                    ClickOutcome::DataManagerOpened
                } else {
                    ClickOutcome::Ignored
                };
            }
            Some("theme-switch") => {
                return match self.theme() {
                    Some(theme) => {
                        log_storage(theme.toggle_theme(), "theme switch");
                        ClickOutcome::ThemeToggled
                    }
                    None => ClickOutcome::Ignored,
                };
            }
            Some("lang-switch") => {
                return match self.i18n() {
                    Some(i18n) => {
                        log_storage(i18n.toggle_language(), "language switch");
                        ClickOutcome::LanguageToggled
                    }
                    None => ClickOutcome::Ignored,
                };
            }
            Some(id) => {
                if let Some(outcome) = self.data_manager_action(id).await {
                    return outcome;
                }
            }
            None => {}
        }

        if let Some(manager) = self.data_manager() {
            if manager.handle_click(target) {
                return ClickOutcome::DataManagerClosed;
            }
        }
        if self.features.interactions.handle_copy(target) {
            return ClickOutcome::Copied;
        }
        if self.features.interactions.is_scroll_to_top(target) {
            self.scroll_to(0.0);
            return ClickOutcome::ScrollToTop;
        }
        if self.features.navigation.handle_click(target) {
            return ClickOutcome::MenuToggled;
        }
        if let Some(position) = self.features.navigation.anchor_target(target) {
            self.scroll_to(position.max(0.0));
            return ClickOutcome::Anchor(position);
        }
        match self.features.cards.handle_click(target) {
            CardAction::Ignored => ClickOutcome::Ignored,
            action => ClickOutcome::Card(action),
        }
    }

    async fn data_manager_action(&self, id: &str) -> Option<ClickOutcome> {
        if !matches!(id, "export-data" | "import-data" | "refresh-stats" | "reset-data") {
            return None;
        }
        let manager = self.data_manager()?;
        let outcome = match id {
            "export-data" => match manager.export_data().await {
                Ok(path) => ClickOutcome::Exported(path),
                Err(_) => ClickOutcome::Ignored,
            },
            "import-data" => ClickOutcome::ImportRequested,
            "refresh-stats" => {
                manager.refresh_stats().await;
                ClickOutcome::StatsRefreshed
            }
            _ => {
                let confirmed = (self.confirm)("确定要重置所有统计数据吗？此操作不可撤销。");
                match manager.reset_data(confirmed).await {
                    Ok(reset) => ClickOutcome::DataReset(reset),
                    Err(e) => {
                        warn!(error = %e, "Reset failed");
                        ClickOutcome::DataReset(false)
                    }
                }
            }
        };
        Some(outcome)
    }

    /// The file chosen after an import request.
    pub async fn import_file(&self, path: &Path) -> Result<(), DataError> {
        match self.data_manager() {
            Some(manager) => manager.import_data(path).await,
            None => {
                warn!("Data manager not available");
                Ok(())
            }
        }
    }

    /// The window scrolled to `y`.
    pub fn scroll_to(&self, y: f64) {
        let viewport = self.config.environment.viewport_height;
        self.features.interactions.on_scroll(y);
        self.features.animations.on_scroll(y);
        self.features.animations.check_visibility(y, viewport);
        self.features.cards.check_visibility(y, viewport);
        if let Some(stats) = self.stats() {
            let height = self.document.metric(BODY, "data-scroll-height");
            stats.track_scroll(y, height, viewport);
        }
    }

    pub fn hover(&self, node: NodeId, entered: bool) {
        self.features.animations.hover(node, entered);
    }

    /// The tab was hidden or shown again.
    pub fn set_hidden(&self, hidden: bool) {
        self.bus.emit(PageEvent::VisibilityChange { hidden });
    }

    /// The OS colour scheme changed.
    pub fn set_system_dark(&self, dark: bool) {
        self.system_dark.store(dark, Ordering::SeqCst);
        self.bus.emit(PageEvent::ColorSchemeChange { dark });
    }

    pub fn set_reduced_motion(&self, reduce: bool) {
        self.features.accessibility.set_reduced_motion(reduce);
        self.features.animations.set_reduced_motion(reduce);
    }
}

fn log_storage(result: Result<(), StorageError>, action: &str) {
    if let Err(e) = result {
        warn!(action, error = %e, "Preference could not be saved");
    }
}
