//! Page orchestrator
//!
//! Brings up an ordered list of modules one after another, tolerating any of
//! them failing or never becoming ready, then wires page interactions and
//! announces `appReady`. Only a failure of the top-level sequence itself
//! (the document never becoming interactive, interaction wiring failing)
//! moves the page into the failed state.

use crate::document::{self, Document, Element, NodeId, BODY};
use crate::errors::{InitError, ModuleError};
use crate::events::{EventBus, PageEvent};
use crate::features::interactions::PageInteractions;
use crate::observability::telemetry::{record_state_transition, track_module_init};
use crate::readiness::{wait_for_service, ReadinessProbe};
use crate::registry::ServiceRegistry;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{error, info, warn};

/// Delay between hiding the loading screen and removing it from layout.
const LOADING_FADE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleStatus {
    Pending,
    Loaded,
    Error,
}

impl std::fmt::Display for ModuleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModuleStatus::Pending => write!(f, "pending"),
            ModuleStatus::Loaded => write!(f, "loaded"),
            ModuleStatus::Error => write!(f, "error"),
        }
    }
}

/// The orchestrator's record of one tracked module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleHandle {
    pub name: String,
    pub status: ModuleStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Answer to a status query for a single module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ModuleLookup {
    Found(ModuleHandle),
    NotFound { status: &'static str },
}

impl ModuleLookup {
    pub fn status(&self) -> Option<ModuleStatus> {
        match self {
            ModuleLookup::Found(handle) => Some(handle.status),
            ModuleLookup::NotFound { .. } => None,
        }
    }
}

/// Insertion-ordered status table. Entries are never removed.
#[derive(Debug, Clone, Default)]
pub struct ModuleTable {
    entries: Vec<ModuleHandle>,
}

impl ModuleTable {
    fn upsert(&mut self, name: &str, status: ModuleStatus, error: Option<String>) {
        let handle = ModuleHandle {
            name: name.to_string(),
            status,
            error,
            timestamp: Utc::now(),
        };
        match self.entries.iter_mut().find(|h| h.name == name) {
            Some(existing) => *existing = handle,
            None => self.entries.push(handle),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ModuleHandle> {
        self.entries.iter().find(|h| h.name == name)
    }

    pub fn all(&self) -> &[ModuleHandle] {
        &self.entries
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AppState {
    NotStarted,
    Loading,
    Ready,
    Failed,
}

impl AppState {
    pub fn as_str(self) -> &'static str {
        match self {
            AppState::NotStarted => "not-started",
            AppState::Loading => "loading",
            AppState::Ready => "ready",
            AppState::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, AppState::Ready | AppState::Failed)
    }
}

/// A unit the orchestrator brings up.
#[async_trait]
pub trait PageModule: Send + Sync {
    fn name(&self) -> &str;

    async fn init(&self) -> Result<(), ModuleError>;
}

/// A module that is ready once a service has been published.
pub struct ServiceDependency {
    name: String,
    probe: ReadinessProbe,
    registry: Arc<ServiceRegistry>,
    bus: EventBus,
}

impl ServiceDependency {
    pub fn new(
        name: impl Into<String>,
        probe: ReadinessProbe,
        registry: Arc<ServiceRegistry>,
        bus: EventBus,
    ) -> Self {
        Self {
            name: name.into(),
            probe,
            registry,
            bus,
        }
    }
}

#[async_trait]
impl PageModule for ServiceDependency {
    fn name(&self) -> &str {
        &self.name
    }

    async fn init(&self) -> Result<(), ModuleError> {
        let outcome = wait_for_service(&self.registry, &self.bus, &self.probe).await;
        match outcome {
            crate::readiness::WaitOutcome::TimedOut { attempts } => Err(ModuleError::NotReady {
                name: self.name.clone(),
                attempts,
            }),
            _ => Ok(()),
        }
    }
}

/// Bring-up timings.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PerformanceMetrics {
    pub total_ms: u64,
    pub modules: Vec<ModuleTiming>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModuleTiming {
    pub name: String,
    pub duration_ms: u64,
}

pub struct App {
    document: Arc<Document>,
    bus: EventBus,
    registry: Arc<ServiceRegistry>,
    modules: Vec<Arc<dyn PageModule>>,
    interactions: Arc<PageInteractions>,
    table: RwLock<ModuleTable>,
    state: watch::Sender<AppState>,
    metrics: Mutex<PerformanceMetrics>,
    loading: Mutex<Option<NodeId>>,
    data_manager_bound: AtomicBool,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("modules", &self.modules.len())
            .field("state", &self.state())
            .finish()
    }
}

pub struct AppBuilder {
    document: Arc<Document>,
    bus: EventBus,
    registry: Arc<ServiceRegistry>,
    modules: Vec<Arc<dyn PageModule>>,
    interactions: Option<Arc<PageInteractions>>,
}

impl AppBuilder {
    pub fn module(mut self, module: Arc<dyn PageModule>) -> Self {
        self.modules.push(module);
        self
    }

    pub fn modules(mut self, modules: impl IntoIterator<Item = Arc<dyn PageModule>>) -> Self {
        self.modules.extend(modules);
        self
    }

    pub fn interactions(mut self, interactions: Arc<PageInteractions>) -> Self {
        self.interactions = Some(interactions);
        self
    }

    pub fn build(self) -> App {
        let interactions = self
            .interactions
            .unwrap_or_else(|| Arc::new(PageInteractions::new(Arc::clone(&self.document), None)));
        let (state, _) = watch::channel(AppState::NotStarted);
        App {
            document: self.document,
            bus: self.bus,
            registry: self.registry,
            modules: self.modules,
            interactions,
            table: RwLock::new(ModuleTable::default()),
            state,
            metrics: Mutex::new(PerformanceMetrics::default()),
            loading: Mutex::new(None),
            data_manager_bound: AtomicBool::new(false),
        }
    }
}

impl App {
    pub fn builder(
        document: Arc<Document>,
        bus: EventBus,
        registry: Arc<ServiceRegistry>,
    ) -> AppBuilder {
        AppBuilder {
            document,
            bus,
            registry,
            modules: Vec::new(),
            interactions: None,
        }
    }

    /// Run the whole bring-up sequence once. Returns the terminal state.
    pub async fn run(&self) -> AppState {
        if self.state() != AppState::NotStarted {
            warn!(state = self.state().as_str(), "App already started");
            return self.state();
        }
        self.transition(AppState::Loading);
        info!("Starting page initialization");
        self.show_loading();

        match self.bring_up().await {
            Ok(()) => {
                info!("Page initialization complete");
                self.bind_data_manager();
                AppState::Ready
            }
            Err(e) => {
                error!(error = %e, "Page initialization failed");
                self.render_error_panel();
                self.hide_loading();
                self.transition(AppState::Failed);
                AppState::Failed
            }
        }
    }

    async fn bring_up(&self) -> Result<(), InitError> {
        let started = Instant::now();
        self.document.wait_interactive().await?;

        self.initialize_modules().await;

        self.interactions.setup()?;

        {
            let mut metrics = self.metrics.lock();
            metrics.total_ms = started.elapsed().as_millis() as u64;
            info!(
                total_ms = metrics.total_ms,
                modules = metrics.modules.len(),
                "Bring-up timings recorded"
            );
        }

        self.hide_loading();
        self.transition(AppState::Ready);
        self.bus.emit(PageEvent::AppReady {
            modules: self.all_module_status(),
            timestamp: Utc::now(),
        });
        Ok(())
    }

    async fn initialize_modules(&self) {
        {
            let mut table = self.table.write();
            for module in &self.modules {
                table.upsert(module.name(), ModuleStatus::Pending, None);
            }
        }

        // Sequential on purpose: module N+1 waits for module N to resolve
        for module in &self.modules {
            let name = module.name().to_string();
            let (result, elapsed) = track_module_init(&name, || module.init()).await;
            let (status, error) = match result {
                Ok(()) => (ModuleStatus::Loaded, None),
                Err(e) => (ModuleStatus::Error, Some(e.to_string())),
            };
            self.table.write().upsert(&name, status, error);
            self.metrics.lock().modules.push(ModuleTiming {
                name,
                duration_ms: elapsed.as_millis() as u64,
            });
        }

        let summary: Vec<String> = self
            .table
            .read()
            .all()
            .iter()
            .map(|h| format!("{}={}", h.name, h.status))
            .collect();
        info!(modules = %summary.join(","), "Module initialization finished");
    }

    fn transition(&self, to: AppState) {
        let from = self.state.send_replace(to);
        record_state_transition(from.as_str(), to.as_str());
    }

    fn show_loading(&self) {
        let loading = self.document.by_class("loading-screen").into_iter().next();
        match loading {
            Some(node) => {
                self.document.set_style(node, "display", "flex");
                self.document.remove_class(node, "hidden");
            }
            None => warn!("Loading screen element not found"),
        }
        *self.loading.lock() = loading;
    }

    fn hide_loading(&self) {
        let Some(node) = *self.loading.lock() else {
            warn!("No loading screen to hide");
            return;
        };
        self.document.add_class(node, "hidden");
        document::schedule(&self.document, LOADING_FADE, move |doc| {
            doc.set_style(node, "display", "none");
        });
    }

    fn render_error_panel(&self) {
        if !self.document.by_class("initialization-error").is_empty() {
            return;
        }
        use crate::document::BatchParent::{Earlier, Node};
        let panel = self.document.append_batch(vec![
            (Node(BODY), Element::new("div").class("initialization-error")),
            (Earlier(0), Element::new("div").class("error-content")),
            (
                Earlier(1),
                Element::new("h2").text("Oops! Something went wrong"),
            ),
            (
                Earlier(1),
                Element::new("p").text(
                    "We're having trouble loading the website. Please try refreshing the page.",
                ),
            ),
            (
                Earlier(1),
                Element::new("button")
                    .class("btn btn-primary")
                    .attr("data-action", "reload")
                    .text("Refresh Page"),
            ),
        ]);
        if let Err(e) = panel {
            error!(error = %e, "Could not render the error panel");
        }
    }

    fn bind_data_manager(&self) {
        if self.document.by_id("data-manager-btn").is_some() {
            self.data_manager_bound.store(true, Ordering::SeqCst);
            info!("Data manager button bound");
        } else {
            warn!("Data manager button not found");
        }
    }

    /// Click handler of `#data-manager-btn`. Returns whether the panel opened.
    pub fn open_data_manager(&self) -> bool {
        if !self.data_manager_bound.load(Ordering::SeqCst) {
            return false;
        }
        match self.registry.data_manager.get() {
            Some(manager) => {
                manager.show();
                true
            }
            None => {
                warn!("Data manager not ready");
                false
            }
        }
    }

    // ─── Query API ─────────────────────────────────────────────────────

    pub fn module_status(&self, name: &str) -> ModuleLookup {
        match self.table.read().get(name) {
            Some(handle) => ModuleLookup::Found(handle.clone()),
            None => ModuleLookup::NotFound {
                status: "not-found",
            },
        }
    }

    pub fn all_module_status(&self) -> Vec<ModuleHandle> {
        self.table.read().all().to_vec()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == AppState::Ready
    }

    pub fn state(&self) -> AppState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<AppState> {
        self.state.subscribe()
    }

    pub fn performance_metrics(&self) -> PerformanceMetrics {
        self.metrics.lock().clone()
    }

    pub fn interactions(&self) -> &Arc<PageInteractions> {
        &self.interactions
    }
}
