//! Service discovery slots
//!
//! Replaces the `window.<name>` globals. Each discoverable service has one
//! slot; publishing fills it, and the readiness predicate for a module is
//! simply "its slot is set". Services never hold the registry itself.

use crate::data_manager::DataManager;
use crate::i18n::I18n;
use crate::stats::StatsManager;
use crate::theme::ThemeManager;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

/// A single named, watchable reference.
pub struct Slot<T> {
    name: &'static str,
    tx: watch::Sender<Option<Arc<T>>>,
}

impl<T> Slot<T> {
    fn new(name: &'static str) -> Self {
        let (tx, _) = watch::channel(None);
        Self { name, tx }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn publish(&self, service: Arc<T>) {
        debug!(service = self.name, "Publishing service");
        self.tx.send_replace(Some(service));
    }

    pub fn clear(&self) {
        if self.tx.send_replace(None).is_some() {
            debug!(service = self.name, "Cleared service slot");
        }
    }

    pub fn get(&self) -> Option<Arc<T>> {
        self.tx.borrow().clone()
    }

    pub fn is_set(&self) -> bool {
        self.tx.borrow().is_some()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<T>>> {
        self.tx.subscribe()
    }
}

impl<T> std::fmt::Debug for Slot<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Slot")
            .field("name", &self.name)
            .field("set", &self.is_set())
            .finish()
    }
}

/// Names of the discoverable services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceName {
    I18n,
    ThemeManager,
    StatsManager,
    DataManager,
}

impl ServiceName {
    pub fn as_str(self) -> &'static str {
        match self {
            ServiceName::I18n => "i18n",
            ServiceName::ThemeManager => "themeManager",
            ServiceName::StatsManager => "statsManager",
            ServiceName::DataManager => "dataManager",
        }
    }
}

#[derive(Debug)]
pub struct ServiceRegistry {
    pub i18n: Slot<I18n>,
    pub theme: Slot<ThemeManager>,
    pub stats: Slot<StatsManager>,
    pub data_manager: Slot<DataManager>,
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self {
            i18n: Slot::new(ServiceName::I18n.as_str()),
            theme: Slot::new(ServiceName::ThemeManager.as_str()),
            stats: Slot::new(ServiceName::StatsManager.as_str()),
            data_manager: Slot::new(ServiceName::DataManager.as_str()),
        }
    }

    pub fn is_published(&self, service: ServiceName) -> bool {
        match service {
            ServiceName::I18n => self.i18n.is_set(),
            ServiceName::ThemeManager => self.theme.is_set(),
            ServiceName::StatsManager => self.stats.is_set(),
            ServiceName::DataManager => self.data_manager.is_set(),
        }
    }
}
