//! Theme management
//!
//! Owns the light/dark choice: applies it to the document root, persists
//! explicit choices, keeps the switch UI in sync and announces every
//! application with a `themeChanged` event.
//!
//! Initial theme precedence is stored preference, then the OS colour-scheme
//! signal, then light. A theme derived from the OS signal is not persisted,
//! so later OS changes keep auto-switching until the user picks a theme.

use crate::document::{self, Document, ROOT};
use crate::errors::StorageError;
use crate::events::{EventBus, PageEvent};
use crate::storage::{keys, Storage};
use chrono::{Duration as ChronoDuration, NaiveDateTime, NaiveTime, Timelike};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const TRANSITION_DURATION: Duration = Duration::from_millis(500);
const MODAL_REFRESH_DURATION: Duration = Duration::from_millis(50);
const DAY_START_HOUR: u32 = 6;
const NIGHT_START_HOUR: u32 = 18;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
}

impl Theme {
    pub const ALL: [Theme; 2] = [Theme::Light, Theme::Dark];

    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn other(self) -> Theme {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    /// `<meta name="theme-color">` value.
    pub fn theme_color(self) -> &'static str {
        match self {
            Theme::Light => "#ffffff",
            Theme::Dark => "#0f172a",
        }
    }

    pub fn from_system(dark: bool) -> Theme {
        if dark {
            Theme::Dark
        } else {
            Theme::Light
        }
    }

    fn class(self) -> &'static str {
        match self {
            Theme::Light => "theme-light",
            Theme::Dark => "theme-dark",
        }
    }

    /// Day/night theme for a wall-clock time.
    pub fn for_time_of_day(time: NaiveTime) -> Theme {
        if (DAY_START_HOUR..NIGHT_START_HOUR).contains(&time.hour()) {
            Theme::Light
        } else {
            Theme::Dark
        }
    }
}

impl std::fmt::Display for Theme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(format!("Theme '{other}' is not supported")),
        }
    }
}

/// Next moment the time-of-day theme changes after `now`.
pub fn next_auto_switch(now: NaiveDateTime) -> NaiveDateTime {
    let date = now.date();
    let at = |hour: u32| date.and_time(NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or_default());
    if now.hour() < DAY_START_HOUR {
        at(DAY_START_HOUR)
    } else if now.hour() < NIGHT_START_HOUR {
        at(NIGHT_START_HOUR)
    } else {
        at(DAY_START_HOUR) + ChronoDuration::days(1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThemePreset {
    pub name: &'static str,
    pub description: &'static str,
    pub preview: &'static str,
}

pub fn theme_presets() -> BTreeMap<Theme, ThemePreset> {
    BTreeMap::from([
        (
            Theme::Light,
            ThemePreset {
                name: "Light",
                description: "Clean and bright interface",
                preview: Theme::Light.theme_color(),
            },
        ),
        (
            Theme::Dark,
            ThemePreset {
                name: "Dark",
                description: "Easy on the eyes in low light",
                preview: Theme::Dark.theme_color(),
            },
        ),
    ])
}

/// Handles the theme manager needs from the page.
#[derive(Clone)]
pub struct ThemeDeps {
    pub document: Arc<Document>,
    pub storage: Arc<dyn Storage>,
    pub bus: EventBus,
    /// Current visitor count, mirrored to storage before each theme change.
    pub visitor_count: Arc<AtomicU64>,
    pub system_dark: bool,
}

pub struct ThemeManager {
    document: Arc<Document>,
    storage: Arc<dyn Storage>,
    bus: EventBus,
    visitor_count: Arc<AtomicU64>,
    current: Mutex<Theme>,
    auto_theme: Mutex<Option<JoinHandle<()>>>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for ThemeManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThemeManager")
            .field("current", &self.current_theme())
            .finish()
    }
}

impl ThemeManager {
    /// Construct, apply the initial theme and re-apply stored high contrast.
    pub fn initialize(deps: ThemeDeps) -> Result<Arc<Self>, StorageError> {
        let manager = Arc::new(Self {
            document: deps.document,
            storage: deps.storage,
            bus: deps.bus,
            visitor_count: deps.visitor_count,
            current: Mutex::new(Theme::Light),
            auto_theme: Mutex::new(None),
            listener: Mutex::new(None),
        });

        let (theme, persist) = match manager.saved_theme() {
            Some(saved) => (saved, true),
            None => (Theme::from_system(deps.system_dark), false),
        };
        manager.apply(theme, persist)?;
        manager.update_theme_ui();

        if manager.is_high_contrast_enabled() {
            debug!("Re-applying stored high contrast setting");
            manager.enable_high_contrast()?;
        }

        manager.spawn_listener();
        info!(theme = %theme, "Theme manager initialized");
        Ok(manager)
    }

    fn saved_theme(&self) -> Option<Theme> {
        let raw = self.storage.get(keys::PREFERRED_THEME)?;
        match raw.parse() {
            Ok(theme) => Some(theme),
            Err(e) => {
                warn!(error = %e, "Ignoring stored theme preference");
                None
            }
        }
    }

    pub fn current_theme(&self) -> Theme {
        *self.current.lock()
    }

    pub fn available_themes(&self) -> Vec<Theme> {
        Theme::ALL.to_vec()
    }

    pub fn is_theme_supported(&self, name: &str) -> bool {
        name.parse::<Theme>().is_ok()
    }

    pub fn presets(&self) -> BTreeMap<Theme, ThemePreset> {
        theme_presets()
    }

    /// Apply a theme by name. Unsupported names are logged and ignored.
    ///
    /// Re-applying the current theme still re-emits `themeChanged`.
    pub fn apply_theme(&self, name: &str) -> Result<(), StorageError> {
        match name.parse::<Theme>() {
            Ok(theme) => self.apply(theme, true),
            Err(e) => {
                warn!(error = %e, "Refusing to apply theme");
                Ok(())
            }
        }
    }

    fn apply(&self, theme: Theme, persist: bool) -> Result<(), StorageError> {
        for t in Theme::ALL {
            self.document.remove_class(ROOT, t.class());
        }
        self.document.set_attr(ROOT, "data-theme", theme.as_str());
        self.document.add_class(ROOT, theme.class());
        *self.current.lock() = theme;

        if persist {
            self.storage.set(keys::PREFERRED_THEME, theme.as_str())?;
        }

        self.document.set_meta("theme-color", theme.theme_color());
        self.refresh_open_modal();
        self.dispatch_theme_changed(theme)?;
        debug!(theme = %theme, persist, "Theme applied");
        Ok(())
    }

    fn refresh_open_modal(&self) {
        let open = self
            .document
            .select(|e| e.has_class("modal") && e.has_class("show"));
        if let Some(&modal) = open.first() {
            document::flash_class(&self.document, modal, "theme-updating", MODAL_REFRESH_DURATION);
        }
    }

    fn dispatch_theme_changed(&self, theme: Theme) -> Result<(), StorageError> {
        let visitors = self.visitor_count.load(Ordering::SeqCst);
        if visitors > 0 {
            self.storage
                .set(keys::VISITOR_COUNT_BACKUP, &visitors.to_string())?;
            debug!(visitors, "Mirrored visitor count before theme change");
        }
        self.bus.emit(PageEvent::ThemeChanged {
            theme,
            previous_theme: theme.other(),
        });
        Ok(())
    }

    /// Sync `#theme-switch` and its container label with the current theme.
    pub fn update_theme_ui(&self) {
        let Some(switch) = self.document.by_id("theme-switch") else {
            return;
        };
        let theme = self.current_theme();
        self.document.set_flag(switch, "checked", theme == Theme::Dark);
        if let Some(container) = self.document.closest(switch, "switch-container") {
            let title = match theme {
                Theme::Dark => "切换到浅色模式",
                Theme::Light => "切换到深色模式",
            };
            self.document.set_attr(container, "title", title);
            self.document.set_attr(container, "aria-label", title);
        }
    }

    /// Switch to `theme` with a transition. No-op if it is already current.
    pub fn switch_theme(&self, theme: Theme) -> Result<(), StorageError> {
        if theme == self.current_theme() {
            return Ok(());
        }
        document::flash_class(&self.document, ROOT, "theme-transition", TRANSITION_DURATION);
        self.apply(theme, true)?;
        self.update_theme_ui();
        self.track_theme_usage()
    }

    pub fn toggle_theme(&self) -> Result<(), StorageError> {
        self.switch_theme(self.current_theme().other())
    }

    /// The OS colour scheme changed. Only followed while no explicit
    /// preference is stored.
    pub fn on_system_color_scheme_change(&self, dark: bool) {
        if self.storage.get(keys::PREFERRED_THEME).is_some() {
            debug!("Explicit theme preference set, ignoring OS change");
            return;
        }
        let theme = Theme::from_system(dark);
        if theme == self.current_theme() {
            return;
        }
        document::flash_class(&self.document, ROOT, "theme-transition", TRANSITION_DURATION);
        if let Err(e) = self.apply(theme, false) {
            warn!(error = %e, "Failed to follow OS colour scheme");
        }
        self.update_theme_ui();
    }

    fn spawn_listener(self: &Arc<Self>) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let weak: Weak<Self> = Arc::downgrade(self);
        let mut rx = self.bus.subscribe();
        let task = handle.spawn(async move {
            loop {
                let event = match rx.recv().await {
                    Ok(event) => event,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(_) => break,
                };
                let Some(manager) = weak.upgrade() else {
                    break;
                };
                match event {
                    PageEvent::ColorSchemeChange { dark } => {
                        manager.on_system_color_scheme_change(dark)
                    }
                    PageEvent::ThemeChanged { theme, .. } => {
                        debug!(theme = %theme, "Theme change observed");
                    }
                    _ => {}
                }
            }
        });
        *self.listener.lock() = Some(task);
    }

    // ─── High contrast ─────────────────────────────────────────────────

    pub fn enable_high_contrast(&self) -> Result<(), StorageError> {
        self.document.add_class(ROOT, "high-contrast");
        self.storage.set(keys::HIGH_CONTRAST, "true")
    }

    pub fn disable_high_contrast(&self) -> Result<(), StorageError> {
        self.document.remove_class(ROOT, "high-contrast");
        self.storage.remove(keys::HIGH_CONTRAST)
    }

    pub fn is_high_contrast_enabled(&self) -> bool {
        self.storage.get(keys::HIGH_CONTRAST).as_deref() == Some("true")
    }

    // ─── Usage ─────────────────────────────────────────────────────────

    fn track_theme_usage(&self) -> Result<(), StorageError> {
        let mut usage = self.theme_usage_stats();
        *usage.entry(self.current_theme().as_str().to_string()).or_insert(0) += 1;
        let json = serde_json::to_string(&usage)
            .map_err(|e| StorageError::Serialize(e.to_string()))?;
        self.storage.set(keys::THEME_USAGE, &json)
    }

    pub fn theme_usage_stats(&self) -> BTreeMap<String, u64> {
        self.storage
            .get(keys::THEME_USAGE)
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default()
    }

    // ─── Time-of-day theme ─────────────────────────────────────────────

    /// Switch to the time-of-day theme now and keep following it.
    pub fn enable_auto_theme(self: &Arc<Self>) -> Result<(), StorageError> {
        let now = chrono::Local::now().naive_local();
        self.switch_theme(Theme::for_time_of_day(now.time()))?;

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return Ok(());
        };
        let weak = Arc::downgrade(self);
        let task = handle.spawn(async move {
            loop {
                let now = chrono::Local::now().naive_local();
                let wait = (next_auto_switch(now) - now)
                    .to_std()
                    .unwrap_or(Duration::from_secs(60));
                tokio::time::sleep(wait).await;
                let Some(manager) = weak.upgrade() else {
                    break;
                };
                let theme = Theme::for_time_of_day(chrono::Local::now().naive_local().time());
                if let Err(e) = manager.switch_theme(theme) {
                    warn!(error = %e, "Scheduled theme switch failed");
                }
            }
        });
        if let Some(previous) = self.auto_theme.lock().replace(task) {
            previous.abort();
        }
        info!("Auto theme enabled");
        Ok(())
    }

    pub fn disable_auto_theme(&self) {
        if let Some(task) = self.auto_theme.lock().take() {
            task.abort();
        }
        info!("Auto theme disabled");
    }

    pub fn is_auto_theme_enabled(&self) -> bool {
        self.auto_theme.lock().is_some()
    }
}

impl Drop for ThemeManager {
    fn drop(&mut self) {
        if let Some(task) = self.auto_theme.get_mut().take() {
            task.abort();
        }
        if let Some(task) = self.listener.get_mut().take() {
            task.abort();
        }
    }
}
