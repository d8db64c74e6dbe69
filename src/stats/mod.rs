//! Site statistics
//!
//! The stats manager ticks the uptime display, performs the single
//! visitor-counter call for this page load and tracks session length and
//! scroll depth. Formatting follows the locale channel; when I18n is
//! absent Chinese templates and compact counts are used.

pub mod counter;
pub mod scroll;
pub mod uptime;

pub use counter::{CounterClient, CounterResponse, HttpCounterClient, OfflineCounterClient};
pub use scroll::{ScrollDepthTracker, MILESTONES};
pub use uptime::{site_epoch, UptimeSnapshot};

use crate::document::{self, Document};
use crate::events::{EventBus, PageEvent};
use crate::i18n::{self, Language, LocaleReceiver};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

pub const DEFAULT_TICK: Duration = Duration::from_secs(60);
const UPDATED_FLASH: Duration = Duration::from_millis(500);
const THEME_REDISPLAY_DELAY: Duration = Duration::from_millis(100);

/// Wall-clock source for uptime.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(Utc::now)
}

/// `1.2K` / `3.4M` style counts, used when no locale is available.
pub fn compact_number(n: u64) -> String {
    if n >= 1_000_000 {
        format!("{:.1}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.1}K", n as f64 / 1_000.0)
    } else {
        n.to_string()
    }
}

pub fn format_session_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let (minutes, seconds) = (secs / 60, secs % 60);
    if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentStats {
    pub uptime: UptimeSnapshot,
    pub visitors: u64,
    pub page_views: u64,
    pub session_duration_ms: u64,
}

/// Handles the stats manager needs from the page.
#[derive(Clone)]
pub struct StatsDeps {
    pub document: Arc<Document>,
    pub bus: EventBus,
    pub counter: Arc<dyn CounterClient>,
    pub locale: LocaleReceiver,
    /// Written on every counter result; read by the theme manager.
    pub visitor_count: Arc<AtomicU64>,
    pub site_id: String,
    pub epoch: DateTime<Utc>,
    pub tick: Duration,
    pub clock: Clock,
}

pub struct StatsManager {
    document: Arc<Document>,
    bus: EventBus,
    counter: Arc<dyn CounterClient>,
    locale: LocaleReceiver,
    visitor_count: Arc<AtomicU64>,
    page_views: AtomicU64,
    site_id: String,
    epoch: DateTime<Utc>,
    tick: Duration,
    clock: Clock,
    session_start: Instant,
    scroll: Mutex<ScrollDepthTracker>,
    ticker: Mutex<Option<JoinHandle<()>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for StatsManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatsManager")
            .field("site_id", &self.site_id)
            .field("visitors", &self.visitor_count())
            .field("page_views", &self.page_views())
            .finish()
    }
}

impl StatsManager {
    /// Start ticking, fire the visitor-counter call and subscribe to page
    /// events. Background work only starts inside a runtime.
    pub fn initialize(deps: StatsDeps) -> Arc<Self> {
        let manager = Arc::new(Self {
            document: deps.document,
            bus: deps.bus,
            counter: deps.counter,
            locale: deps.locale,
            visitor_count: deps.visitor_count,
            page_views: AtomicU64::new(0),
            site_id: deps.site_id,
            epoch: deps.epoch,
            tick: deps.tick,
            clock: deps.clock,
            session_start: Instant::now(),
            scroll: Mutex::new(ScrollDepthTracker::new()),
            ticker: Mutex::new(None),
            tasks: Mutex::new(Vec::new()),
        });

        manager.start_uptime_counter();
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let weak = Arc::downgrade(&manager);
            let increment = handle.spawn(async move {
                if let Some(manager) = weak.upgrade() {
                    manager.increment_visitor_count().await;
                }
            });
            let listener = handle.spawn(Self::listen(Arc::downgrade(&manager), manager.bus.subscribe()));
            manager.tasks.lock().extend([increment, listener]);
        }
        manager.update_display();
        info!(site = %manager.site_id, "Stats manager initialized");
        manager
    }

    fn language(&self) -> Language {
        (*self.locale.borrow()).unwrap_or(Language::ZhCn)
    }

    // ─── Uptime ────────────────────────────────────────────────────────

    pub fn uptime(&self) -> UptimeSnapshot {
        UptimeSnapshot::between(self.epoch, (self.clock)())
    }

    /// Recompute uptime, display it and announce it.
    pub fn update_uptime(&self) -> UptimeSnapshot {
        let snapshot = self.uptime();
        if let Some(node) = self.document.by_id("uptime-display") {
            self.document.set_text(node, &snapshot.format(self.language()));
            document::flash_class(&self.document, node, "updated", UPDATED_FLASH);
        }
        self.bus.emit(PageEvent::UptimeUpdated(snapshot));
        snapshot
    }

    fn start_uptime_counter(self: &Arc<Self>) {
        self.update_uptime();
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let weak = Arc::downgrade(self);
        let tick = self.tick;
        let task = handle.spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + tick, tick);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let Some(manager) = weak.upgrade() else {
                    break;
                };
                manager.update_uptime();
            }
        });
        if let Some(previous) = self.ticker.lock().replace(task) {
            previous.abort();
        }
    }

    pub fn pause_tracking(&self) {
        if let Some(task) = self.ticker.lock().take() {
            task.abort();
            debug!("Uptime ticking paused");
        }
    }

    pub fn resume_tracking(self: &Arc<Self>) {
        if self.ticker.lock().is_none() {
            self.start_uptime_counter();
            debug!("Uptime ticking resumed");
        }
    }

    pub fn is_ticking(&self) -> bool {
        self.ticker.lock().is_some()
    }

    // ─── Visitors ──────────────────────────────────────────────────────

    pub fn visitor_count(&self) -> u64 {
        self.visitor_count.load(Ordering::SeqCst)
    }

    pub fn page_views(&self) -> u64 {
        self.page_views.load(Ordering::SeqCst)
    }

    /// The one counter call for this page load. On failure both counts
    /// drop to zero.
    pub async fn increment_visitor_count(&self) {
        match self.counter.increment(&self.site_id).await {
            Ok(response) => {
                self.visitor_count.store(response.count, Ordering::SeqCst);
                if let Some(views) = response.page_views {
                    self.page_views.store(views, Ordering::SeqCst);
                }
                info!(visitors = response.count, "Visitor count updated");
            }
            Err(e) => {
                error!(error = %e, "Visitor counter call failed");
                self.visitor_count.store(0, Ordering::SeqCst);
                self.page_views.store(0, Ordering::SeqCst);
            }
        }
        self.update_display();
    }

    fn format_count(&self, n: u64) -> String {
        match *self.locale.borrow() {
            Some(_) => i18n::format_number(i64::try_from(n).unwrap_or(i64::MAX)),
            None => compact_number(n),
        }
    }

    pub fn update_display(&self) {
        self.display_visitor_count();
        self.display_page_views();
    }

    fn display_visitor_count(&self) {
        let Some(node) = self.document.by_id("visitor-count") else {
            warn!("Visitor count element #visitor-count not found");
            return;
        };
        let count = self.visitor_count();
        let text = if count == 0 {
            "-".to_string()
        } else {
            self.format_count(count)
        };
        self.document.set_text(node, &text);
        document::flash_class(&self.document, node, "updated", UPDATED_FLASH);
    }

    fn display_page_views(&self) {
        let Some(node) = self.document.by_id("page-views") else {
            return;
        };
        let views = self.page_views();
        let text = if views > 0 {
            views.to_string()
        } else {
            "-".to_string()
        };
        self.document.set_text(node, &text);
        document::flash_class(&self.document, node, "updated", UPDATED_FLASH);
    }

    // ─── Session and scroll ────────────────────────────────────────────

    pub fn session_duration(&self) -> Duration {
        self.session_start.elapsed()
    }

    pub fn formatted_session_duration(&self) -> String {
        format_session_duration(self.session_duration())
    }

    /// Feed a scroll position. A newly reached milestone is logged and
    /// announced on the bus.
    pub fn track_scroll(&self, scroll_top: f64, scroll_height: f64, viewport: f64) -> Option<u8> {
        let milestone = self.scroll.lock().record(scroll_top, scroll_height, viewport)?;
        info!(percentage = milestone, "Scroll milestone reached");
        self.bus.emit(PageEvent::ScrollMilestone {
            percentage: milestone,
        });
        Some(milestone)
    }

    pub fn scroll_milestones(&self) -> Vec<u8> {
        self.scroll.lock().reached()
    }

    pub fn current_stats(&self) -> CurrentStats {
        CurrentStats {
            uptime: self.uptime(),
            visitors: self.visitor_count(),
            page_views: self.page_views(),
            session_duration_ms: u64::try_from(self.session_duration().as_millis())
                .unwrap_or(u64::MAX),
        }
    }

    /// Stop ticking and log the end-of-session summary.
    pub fn destroy(&self) {
        self.pause_tracking();
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        info!(
            duration = %self.formatted_session_duration(),
            visitors = self.visitor_count(),
            milestones = ?self.scroll_milestones(),
            "Session ended"
        );
    }

    async fn listen(weak: Weak<Self>, mut rx: broadcast::Receiver<PageEvent>) {
        loop {
            let event = match rx.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            };
            let Some(manager) = weak.upgrade() else {
                break;
            };
            match event {
                PageEvent::LanguageChanged { .. } => {
                    manager.update_display();
                    manager.update_uptime();
                }
                PageEvent::ThemeChanged { .. } => {
                    let weak = Arc::downgrade(&manager);
                    tokio::spawn(async move {
                        tokio::time::sleep(THEME_REDISPLAY_DELAY).await;
                        if let Some(manager) = weak.upgrade() {
                            manager.update_display();
                        }
                    });
                }
                PageEvent::VisibilityChange { hidden: true } => manager.pause_tracking(),
                PageEvent::VisibilityChange { hidden: false } => manager.resume_tracking(),
                _ => {}
            }
        }
    }
}

impl Drop for StatsManager {
    fn drop(&mut self) {
        if let Some(task) = self.ticker.get_mut().take() {
            task.abort();
        }
        for task in self.tasks.get_mut().drain(..) {
            task.abort();
        }
    }
}
