//! Mobile menu and in-page anchor navigation.

use crate::app::PageModule;
use crate::document::{Document, NodeId, BODY};
use crate::errors::ModuleError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

/// Gap left between the sticky header and an anchor target.
const ANCHOR_MARGIN: f64 = 20.0;

#[derive(Debug, Default, Clone, Copy)]
struct MenuNodes {
    toggle: Option<NodeId>,
    nav: Option<NodeId>,
}

pub struct Navigation {
    document: Arc<Document>,
    menu: Mutex<MenuNodes>,
}

impl Navigation {
    pub fn new(document: Arc<Document>) -> Self {
        Self {
            document,
            menu: Mutex::new(MenuNodes::default()),
        }
    }

    pub fn is_menu_open(&self) -> bool {
        let menu = *self.menu.lock();
        menu.nav
            .map(|nav| self.document.has_class(nav, "nav-open"))
            .unwrap_or(false)
    }

    fn set_menu_open(&self, open: bool) {
        let menu = *self.menu.lock();
        let (Some(toggle), Some(nav)) = (menu.toggle, menu.nav) else {
            return;
        };
        self.document.toggle_class(nav, "nav-open", open);
        self.document.toggle_class(BODY, "nav-open", open);
        self.document
            .set_attr(toggle, "aria-expanded", if open { "true" } else { "false" });
    }

    /// Document-level click. Handles the menu toggle and clicks outside the
    /// open menu. Returns `true` if the click hit the toggle.
    pub fn handle_click(&self, target: NodeId) -> bool {
        let menu = *self.menu.lock();
        let (Some(toggle), Some(nav)) = (menu.toggle, menu.nav) else {
            return false;
        };
        if self.document.contains(toggle, target) {
            self.set_menu_open(!self.is_menu_open());
            return true;
        }
        if !self.document.contains(nav, target) {
            self.set_menu_open(false);
        }
        false
    }

    /// Escape closes an open menu and returns focus to the toggle.
    pub fn handle_escape(&self) -> bool {
        if !self.is_menu_open() {
            return false;
        }
        self.set_menu_open(false);
        if let Some(toggle) = self.menu.lock().toggle {
            self.document.focus(toggle);
        }
        true
    }

    /// Click on an `a[href^="#"]`. Returns the scroll position to move to,
    /// or `None` when the link has no in-page target.
    pub fn anchor_target(&self, link: NodeId) -> Option<f64> {
        let href = self.document.attr(link, "href")?;
        let id = href.strip_prefix('#')?;
        let target = self.document.by_id(id)?;
        let header_height = self
            .document
            .by_class("header")
            .into_iter()
            .next()
            .map(|h| self.document.metric(h, "data-offset-height"))
            .unwrap_or(0.0);
        let position = self.document.offset_top(target) - header_height - ANCHOR_MARGIN;

        self.document.set_location_hash(&format!("#{id}"));
        self.document.focus(target);
        debug!(target = id, position, "Anchor navigation");
        Some(position)
    }
}

#[async_trait]
impl PageModule for Navigation {
    fn name(&self) -> &str {
        "navigation"
    }

    async fn init(&self) -> Result<(), ModuleError> {
        let toggle = self.document.by_class("mobile-menu-toggle").into_iter().next();
        let nav = self.document.by_class("nav").into_iter().next();
        if toggle.is_none() || nav.is_none() {
            debug!("Mobile navigation not present");
        }
        *self.menu.lock() = MenuNodes { toggle, nav };
        Ok(())
    }
}
