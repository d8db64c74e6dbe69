//! Document-level event bus
//!
//! The typed replacement for `document.dispatchEvent(new CustomEvent(..))`.
//! Any module can emit; any module can subscribe. Delivery is broadcast, so
//! a slow subscriber only ever loses its own backlog.

use crate::app::ModuleHandle;
use crate::i18n::Language;
use crate::stats::UptimeSnapshot;
use crate::theme::Theme;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::trace;

const BUS_CAPACITY: usize = 256;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "detail", rename_all = "camelCase")]
pub enum PageEvent {
    ThemeManagerReady,
    StatsManagerReady,
    #[serde(rename_all = "camelCase")]
    ThemeChanged { theme: Theme, previous_theme: Theme },
    #[serde(rename_all = "camelCase")]
    LanguageChanged {
        new_language: Language,
        translations: Arc<serde_json::Value>,
    },
    UptimeUpdated(UptimeSnapshot),
    ScrollMilestone { percentage: u8 },
    VisibilityChange { hidden: bool },
    ColorSchemeChange { dark: bool },
    AppReady {
        modules: Vec<ModuleHandle>,
        timestamp: DateTime<Utc>,
    },
}

/// Discriminant of a [`PageEvent`], used to wait for a named event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ThemeManagerReady,
    StatsManagerReady,
    ThemeChanged,
    LanguageChanged,
    UptimeUpdated,
    ScrollMilestone,
    VisibilityChange,
    ColorSchemeChange,
    AppReady,
}

impl EventKind {
    /// The DOM event name this kind corresponds to.
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::ThemeManagerReady => "themeManagerReady",
            EventKind::StatsManagerReady => "statsManagerReady",
            EventKind::ThemeChanged => "themeChanged",
            EventKind::LanguageChanged => "languageChanged",
            EventKind::UptimeUpdated => "uptimeUpdated",
            EventKind::ScrollMilestone => "scrollMilestone",
            EventKind::VisibilityChange => "visibilitychange",
            EventKind::ColorSchemeChange => "colorSchemeChange",
            EventKind::AppReady => "appReady",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PageEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            PageEvent::ThemeManagerReady => EventKind::ThemeManagerReady,
            PageEvent::StatsManagerReady => EventKind::StatsManagerReady,
            PageEvent::ThemeChanged { .. } => EventKind::ThemeChanged,
            PageEvent::LanguageChanged { .. } => EventKind::LanguageChanged,
            PageEvent::UptimeUpdated(_) => EventKind::UptimeUpdated,
            PageEvent::ScrollMilestone { .. } => EventKind::ScrollMilestone,
            PageEvent::VisibilityChange { .. } => EventKind::VisibilityChange,
            PageEvent::ColorSchemeChange { .. } => EventKind::ColorSchemeChange,
            PageEvent::AppReady { .. } => EventKind::AppReady,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PageEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self { tx }
    }

    /// Dispatch an event. Having no listeners is not an error.
    pub fn emit(&self, event: PageEvent) {
        let kind = event.kind();
        let delivered = self.tx.send(event).unwrap_or(0);
        trace!(event = kind.as_str(), delivered, "Dispatched page event");
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PageEvent> {
        self.tx.subscribe()
    }

    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Wait on `rx` until an event of `kind` arrives.
///
/// Returns `None` if the bus is gone. Lagging is tolerated: the skipped
/// events are simply lost to this listener.
pub async fn next_of_kind(
    rx: &mut broadcast::Receiver<PageEvent>,
    kind: EventKind,
) -> Option<PageEvent> {
    loop {
        match rx.recv().await {
            Ok(event) if event.kind() == kind => return Some(event),
            Ok(_) => continue,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                trace!(skipped, "Event listener lagged");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}
