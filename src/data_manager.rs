//! Data manager overlay
//!
//! A panel over the locally cached site statistics (`site-stats`): show
//! totals, export the cache to a JSON file, import one back, refresh and
//! reset. Every action posts a short-lived notification.

use crate::document::{self, BatchParent, Document, Element, NodeId, BODY};
use crate::errors::{DataError, DocumentError};
use crate::i18n::format_number;
use crate::stats::{Clock, StatsManager};
use crate::storage::{keys, Storage};
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

pub const PANEL_ID: &str = "data-manager-panel";
const NOTIFICATION_LIFETIME: Duration = Duration::from_millis(3300);
const NO_DATA: &str = "暂无数据";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Milliseconds.
    #[serde(default)]
    pub duration: u64,
}

/// The `site-stats` document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsCache {
    pub total_visitors: u64,
    pub page_views: u64,
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub visits_by_type: BTreeMap<String, u64>,
    #[serde(default)]
    pub scroll_milestones: BTreeMap<String, u64>,
    #[serde(default)]
    pub user_sessions: Vec<SessionRecord>,
    #[serde(default)]
    pub daily_visitors: BTreeMap<NaiveDate, u64>,
}

impl StatsCache {
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            total_visitors: 0,
            page_views: 0,
            last_updated: now,
            visits_by_type: BTreeMap::new(),
            scroll_milestones: BTreeMap::new(),
            user_sessions: Vec::new(),
            daily_visitors: BTreeMap::new(),
        }
    }

    pub fn average_session(&self) -> Option<Duration> {
        if self.user_sessions.is_empty() {
            return None;
        }
        let total: u64 = self.user_sessions.iter().map(|s| s.duration).sum();
        Some(Duration::from_millis(total / self.user_sessions.len() as u64))
    }
}

/// `{m}分{s}秒`, or the no-data marker.
pub fn format_average_session(average: Option<Duration>) -> String {
    match average {
        Some(d) => {
            let secs = d.as_secs();
            format!("{}分{}秒", secs / 60, secs % 60)
        }
        None => NO_DATA.to_string(),
    }
}

fn join_or_no_data(parts: Vec<String>) -> String {
    if parts.is_empty() {
        NO_DATA.to_string()
    } else {
        parts.join(", ")
    }
}

/// The cache plus its persistence.
pub struct StatsStore {
    storage: Arc<dyn Storage>,
    cache: Mutex<StatsCache>,
}

impl StatsStore {
    /// Read `site-stats`. A missing or unreadable value starts a fresh cache.
    pub fn load(storage: Arc<dyn Storage>, now: DateTime<Utc>) -> Self {
        let cache = match storage.get(keys::SITE_STATS) {
            Some(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(error = %e, "Cached statistics are unreadable, starting fresh");
                StatsCache::empty(now)
            }),
            None => StatsCache::empty(now),
        };
        Self {
            storage,
            cache: Mutex::new(cache),
        }
    }

    pub fn stats(&self) -> StatsCache {
        self.cache.lock().clone()
    }

    pub fn save(&self) -> Result<(), DataError> {
        let cache = self.stats();
        self.persist(&cache)
    }

    fn persist(&self, cache: &StatsCache) -> Result<(), DataError> {
        let json = serde_json::to_string(cache)
            .map_err(|e| DataError::InvalidDocument(e.to_string()))?;
        self.storage.set(keys::SITE_STATS, &json)?;
        Ok(())
    }

    pub fn export_json(&self) -> Result<String, DataError> {
        serde_json::to_string_pretty(&*self.cache.lock())
            .map_err(|e| DataError::InvalidDocument(e.to_string()))
    }

    /// Validate and adopt an exported document. The cache only changes once
    /// the document has been written.
    pub fn import_json(&self, raw: &str) -> Result<(), DataError> {
        let imported: StatsCache =
            serde_json::from_str(raw).map_err(|e| DataError::InvalidDocument(e.to_string()))?;
        self.replace(imported)
    }

    pub fn reset(&self, now: DateTime<Utc>) -> Result<(), DataError> {
        self.replace(StatsCache::empty(now))
    }

    fn replace(&self, cache: StatsCache) -> Result<(), DataError> {
        self.persist(&cache)?;
        *self.cache.lock() = cache;
        Ok(())
    }

    pub fn today_visitors(&self, today: NaiveDate) -> u64 {
        self.cache
            .lock()
            .daily_visitors
            .get(&today)
            .copied()
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Error,
    Warning,
    Info,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationKind::Success => "success",
            NotificationKind::Error => "error",
            NotificationKind::Warning => "warning",
            NotificationKind::Info => "info",
        }
    }
}

#[derive(Clone)]
pub struct DataManagerDeps {
    pub document: Arc<Document>,
    pub storage: Arc<dyn Storage>,
    pub stats: watch::Receiver<Option<Arc<StatsManager>>>,
    pub export_dir: PathBuf,
    pub clock: Clock,
}

pub struct DataManager {
    document: Arc<Document>,
    store: StatsStore,
    stats: watch::Receiver<Option<Arc<StatsManager>>>,
    export_dir: PathBuf,
    clock: Clock,
    panel: NodeId,
    close_button: NodeId,
}

impl std::fmt::Debug for DataManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataManager")
            .field("visible", &self.is_visible())
            .field("export_dir", &self.export_dir)
            .finish()
    }
}

impl DataManager {
    pub fn initialize(deps: DataManagerDeps) -> Result<Arc<Self>, DocumentError> {
        let store = StatsStore::load(Arc::clone(&deps.storage), (deps.clock)());
        let (panel, close_button) = Self::create_panel(&deps.document)?;
        info!(panel, "Data manager initialized");
        Ok(Arc::new(Self {
            document: deps.document,
            store,
            stats: deps.stats,
            export_dir: deps.export_dir,
            clock: deps.clock,
            panel,
            close_button,
        }))
    }

    fn create_panel(doc: &Document) -> Result<(NodeId, NodeId), DocumentError> {
        use BatchParent::{Earlier, Node};

        let mut entries = vec![
            (Node(BODY), Element::new("div").id(PANEL_ID).class("data-manager-panel")),
            (Earlier(0), Element::new("div").class("data-manager-content")),
            (
                Earlier(1),
                Element::new("button")
                    .id("close-data-manager")
                    .class("close-btn")
                    .text("×"),
            ),
            (Earlier(1), Element::new("div").class("stats-grid")),
        ];
        for (id, label) in [
            ("total-visitors", "总访问者"),
            ("total-pageviews", "页面浏览量"),
            ("today-visitors", "今日访问"),
            ("last-updated", "最后更新"),
        ] {
            entries.push((Earlier(3), Element::new("span").class("stat-label").text(label)));
            entries.push((Earlier(3), Element::new("span").id(id).class("stat-value").text("-")));
        }
        for (id, label) in [
            ("export-data", "导出数据"),
            ("import-data", "导入数据"),
            ("refresh-stats", "刷新统计"),
            ("reset-data", "重置数据"),
        ] {
            entries.push((Earlier(1), Element::new("button").id(id).class("action-btn").text(label)));
        }
        for id in ["visitor-types", "scroll-milestones", "session-info"] {
            entries.push((Earlier(1), Element::new("div").id(id).text("-")));
        }

        let nodes = doc.append_batch(entries)?;
        Ok((nodes[0], nodes[2]))
    }

    pub fn is_visible(&self) -> bool {
        self.document.has_class(self.panel, "visible")
    }

    pub fn show(&self) {
        self.document.add_class(self.panel, "visible");
        self.update_display();
        self.document.set_style(BODY, "overflow", "hidden");
        debug!("Data manager shown");
    }

    /// Hide the panel. Returns whether it was visible.
    pub fn hide(&self) -> bool {
        let was_visible = self.is_visible();
        self.document.remove_class(self.panel, "visible");
        self.document.set_style(BODY, "overflow", "");
        was_visible
    }

    /// Clicks on the close button or the backdrop close the panel.
    pub fn handle_click(&self, target: NodeId) -> bool {
        if target == self.close_button || target == self.panel {
            return self.hide();
        }
        false
    }

    pub fn stats(&self) -> StatsCache {
        self.store.stats()
    }

    pub fn update_display(&self) {
        let stats = self.store.stats();
        let today = (self.clock)().date_naive();
        let set = |id: &str, text: &str| {
            if let Some(node) = self.document.by_id(id) {
                self.document.set_text(node, text);
            }
        };

        set("total-visitors", &format_number(to_i64(stats.total_visitors)));
        set("total-pageviews", &format_number(to_i64(stats.page_views)));
        set(
            "today-visitors",
            &format_number(to_i64(self.store.today_visitors(today))),
        );
        set(
            "last-updated",
            &stats.last_updated.format("%Y/%-m/%-d %H:%M:%S").to_string(),
        );

        let types = stats
            .visits_by_type
            .iter()
            .map(|(kind, count)| format!("{kind}: {count}"))
            .collect();
        set("visitor-types", &join_or_no_data(types));

        let milestones = stats
            .scroll_milestones
            .iter()
            .map(|(pct, count)| format!("{pct}%: {count}次"))
            .collect();
        set("scroll-milestones", &join_or_no_data(milestones));

        set(
            "session-info",
            &format!(
                "总会话: {}, 平均时长: {}",
                stats.user_sessions.len(),
                format_average_session(stats.average_session())
            ),
        );
    }

    fn notify(&self, message: &str, kind: NotificationKind) {
        let node = self.document.append(
            BODY,
            Element::new("div")
                .class(&format!("notification notification-{}", kind.as_str()))
                .text(message),
        );
        document::schedule(&self.document, NOTIFICATION_LIFETIME, move |doc| doc.remove(node));
    }

    pub fn notifications(&self) -> Vec<String> {
        self.document
            .by_class("notification")
            .into_iter()
            .filter_map(|n| self.document.text(n))
            .collect()
    }

    fn stats_manager(&self) -> Option<Arc<StatsManager>> {
        self.stats.borrow().clone()
    }

    async fn refetch_stats(&self) {
        if let Some(stats) = self.stats_manager() {
            stats.increment_visitor_count().await;
            stats.update_display();
        }
    }

    /// Write the cache as pretty JSON into the export directory.
    pub async fn export_data(&self) -> Result<PathBuf, DataError> {
        let result = self.write_export().await;
        match &result {
            Ok(path) => {
                info!(path = %path.display(), "Statistics exported");
                self.notify("✅ 数据导出成功", NotificationKind::Success);
            }
            Err(e) => {
                warn!(error = %e, "Statistics export failed");
                self.notify("❌ 数据导出失败", NotificationKind::Error);
            }
        }
        result
    }

    async fn write_export(&self) -> Result<PathBuf, DataError> {
        let json = self.store.export_json()?;
        let name = format!("site-stats-{}.json", (self.clock)().format("%Y-%m-%d"));
        let path = self.export_dir.join(name);
        tokio::fs::create_dir_all(&self.export_dir)
            .await
            .map_err(|e| io_error(&self.export_dir, e))?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|e| io_error(&path, e))?;
        Ok(path)
    }

    /// Replace the cache with an exported document.
    pub async fn import_data(&self, path: &Path) -> Result<(), DataError> {
        let result = match tokio::fs::read_to_string(path).await {
            Ok(raw) => self.store.import_json(&raw),
            Err(e) => Err(io_error(path, e)),
        };
        match &result {
            Ok(()) => {
                info!(path = %path.display(), "Statistics imported");
                self.notify("✅ 数据导入成功", NotificationKind::Success);
                self.update_display();
                self.refetch_stats().await;
            }
            Err(e) => {
                warn!(error = %e, "Statistics import failed");
                self.notify("❌ 数据导入失败", NotificationKind::Error);
            }
        }
        result
    }

    pub async fn refresh_stats(&self) {
        self.update_display();
        self.refetch_stats().await;
        self.notify("🔄 统计数据已刷新", NotificationKind::Info);
    }

    /// Reset the cache. Nothing happens without confirmation.
    pub async fn reset_data(&self, confirmed: bool) -> Result<bool, DataError> {
        if !confirmed {
            debug!("Reset not confirmed");
            return Ok(false);
        }
        self.store.reset((self.clock)())?;
        self.update_display();
        self.refetch_stats().await;
        self.notify("🗑️ 数据已重置", NotificationKind::Warning);
        info!("Statistics reset");
        Ok(true)
    }
}

fn to_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn io_error(path: &Path, e: std::io::Error) -> DataError {
    DataError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}
