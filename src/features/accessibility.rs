//! Skip link, live-region announcements, reduced motion and dialog focus trap.

use crate::app::PageModule;
use crate::document::{self, Document, Element, NodeId, BODY};
use crate::errors::ModuleError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub const LIVE_REGION_ID: &str = "aria-live-region";
const ANNOUNCEMENT_TTL: Duration = Duration::from_secs(1);

/// Screen-reader announcements through a single polite live region.
#[derive(Debug)]
pub struct Announcer {
    document: Arc<Document>,
}

impl Announcer {
    pub fn new(document: Arc<Document>) -> Self {
        Self { document }
    }

    /// Create the live region unless it already exists.
    pub fn ensure_live_region(&self) -> NodeId {
        if let Some(node) = self.document.by_id(LIVE_REGION_ID) {
            return node;
        }
        let region = Element::new("div")
            .id(LIVE_REGION_ID)
            .attr("aria-live", "polite")
            .attr("aria-atomic", "true");
        let node = self.document.append(BODY, region);
        for (property, value) in [
            ("position", "absolute"),
            ("left", "-10000px"),
            ("width", "1px"),
            ("height", "1px"),
            ("overflow", "hidden"),
        ] {
            self.document.set_style(node, property, value);
        }
        node
    }

    /// Announce `message`; the region is cleared again after a second.
    pub fn announce(&self, message: &str) {
        let Some(region) = self.document.by_id(LIVE_REGION_ID) else {
            return;
        };
        self.document.set_text(region, message);
        document::schedule(&self.document, ANNOUNCEMENT_TTL, move |doc| {
            doc.set_text(region, "");
        });
    }
}

pub struct Accessibility {
    document: Arc<Document>,
    announcer: Arc<Announcer>,
    reduced_motion: AtomicBool,
}

impl Accessibility {
    pub fn new(document: Arc<Document>, announcer: Arc<Announcer>, reduced_motion: bool) -> Self {
        Self {
            document,
            announcer,
            reduced_motion: AtomicBool::new(reduced_motion),
        }
    }

    pub fn announcer(&self) -> &Arc<Announcer> {
        &self.announcer
    }

    pub fn prefers_reduced_motion(&self) -> bool {
        self.reduced_motion.load(Ordering::SeqCst)
    }

    /// Follow the OS reduced-motion preference.
    pub fn set_reduced_motion(&self, reduce: bool) {
        self.reduced_motion.store(reduce, Ordering::SeqCst);
        self.document.toggle_class(BODY, "reduce-motion", reduce);
    }

    /// Activate the skip link: focus the main content. Returns the focused node.
    pub fn activate_skip_link(&self) -> Option<NodeId> {
        let main = self
            .document
            .by_id("main-content")
            .or_else(|| self.document.by_tag("main").into_iter().next())?;
        self.document.focus(main);
        Some(main)
    }

    /// Tab inside a dialog: wrap focus between the first and last focusable
    /// elements. Returns the newly focused node when focus wrapped.
    pub fn trap_focus(&self, dialog: NodeId, shift: bool) -> Option<NodeId> {
        let focusable = self.document.descendants_where(dialog, |e| {
            let tabindex = e.get_attr("tabindex");
            match e.tag.as_str() {
                "button" | "input" | "select" | "textarea" => true,
                _ if e.attributes.contains_key("href") => true,
                _ => tabindex.is_some() && tabindex != Some("-1"),
            }
        });
        let (first, last) = (*focusable.first()?, *focusable.last()?);
        let active = self.document.active_element();

        if shift && active == Some(first) {
            self.document.focus(last);
            Some(last)
        } else if !shift && active == Some(last) {
            self.document.focus(first);
            Some(first)
        } else {
            None
        }
    }
}

#[async_trait]
impl PageModule for Accessibility {
    fn name(&self) -> &str {
        "accessibility"
    }

    async fn init(&self) -> Result<(), ModuleError> {
        if self.document.by_class("skip-link").is_empty() {
            debug!("No skip link on page");
        }
        self.announcer.ensure_live_region();
        self.set_reduced_motion(self.prefers_reduced_motion());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::homepage_template;

    fn accessibility(reduced: bool) -> (Arc<Document>, Accessibility) {
        let doc = Arc::new(homepage_template());
        let announcer = Arc::new(Announcer::new(Arc::clone(&doc)));
        (Arc::clone(&doc), Accessibility::new(doc, announcer, reduced))
    }

    #[tokio::test(start_paused = true)]
    async fn test_live_region_created_once_and_cleared() {
        let (doc, a11y) = accessibility(false);
        a11y.init().await.unwrap();
        a11y.init().await.unwrap();
        assert_eq!(doc.select(|e| e.id.as_deref() == Some(LIVE_REGION_ID)).len(), 1);

        a11y.announcer().announce("Copied to clipboard");
        let region = doc.by_id(LIVE_REGION_ID).unwrap();
        assert_eq!(doc.text(region).as_deref(), Some("Copied to clipboard"));
        tokio::time::sleep(Duration::from_millis(1001)).await;
        assert_eq!(doc.text(region).as_deref(), Some(""));
    }

    #[tokio::test]
    async fn test_reduced_motion_class() {
        let (doc, a11y) = accessibility(true);
        a11y.init().await.unwrap();
        assert!(doc.has_class(BODY, "reduce-motion"));
        a11y.set_reduced_motion(false);
        assert!(!doc.has_class(BODY, "reduce-motion"));
    }

    #[test]
    fn test_skip_link_focuses_main() {
        let (doc, a11y) = accessibility(false);
        let main = a11y.activate_skip_link().unwrap();
        assert_eq!(doc.by_id("main-content"), Some(main));
        assert_eq!(doc.active_element(), Some(main));
    }

    #[test]
    fn test_focus_trap_wraps_both_ways() {
        let (doc, a11y) = accessibility(false);
        let dialog = doc.select(|e| e.get_attr("role") == Some("dialog"))[0];
        let first = doc.by_id("dialog-close").unwrap();
        let last = doc.by_id("dialog-link").unwrap();

        doc.focus(last);
        assert_eq!(a11y.trap_focus(dialog, false), Some(first));
        assert_eq!(a11y.trap_focus(dialog, true), Some(last));
        // Focus in the middle of nothing: no wrap
        doc.blur();
        assert_eq!(a11y.trap_focus(dialog, false), None);
    }
}
