//! Page-wide interaction wiring run after module bring-up: the scroll-to-top
//! button, external links and copy buttons.

use super::accessibility::Announcer;
use crate::document::{self, Document, Element, NodeId};
use crate::errors::InitError;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const SCROLL_TO_TOP_THRESHOLD: f64 = 300.0;
const COPY_FEEDBACK: Duration = Duration::from_secs(2);
const COPY_LABEL_ATTR: &str = "data-copy-label";

#[derive(Debug)]
pub struct PageInteractions {
    document: Arc<Document>,
    announcer: Option<Arc<Announcer>>,
    scroll_to_top: Mutex<Option<NodeId>>,
    copy_buttons: Mutex<BTreeSet<NodeId>>,
    clipboard: Mutex<Option<String>>,
}

impl PageInteractions {
    pub fn new(document: Arc<Document>, announcer: Option<Arc<Announcer>>) -> Self {
        Self {
            document,
            announcer,
            scroll_to_top: Mutex::new(None),
            copy_buttons: Mutex::new(BTreeSet::new()),
            clipboard: Mutex::new(None),
        }
    }

    pub fn setup(&self) -> Result<(), InitError> {
        *self.scroll_to_top.lock() = self.document.by_class("scroll-to-top").into_iter().next();
        let links = self.setup_external_links()?;
        let copy_buttons = self.document.by_attr("data-copy");
        let copy_count = copy_buttons.len();
        self.copy_buttons.lock().extend(copy_buttons);
        info!(external_links = links, copy_buttons = copy_count, "Page interactions wired");
        Ok(())
    }

    fn setup_external_links(&self) -> Result<usize, InitError> {
        let links = self
            .document
            .select(|e| e.tag == "a" && e.get_attr("href").is_some_and(|h| h.starts_with("http")));
        for &link in &links {
            let updated = self.document.update(link, |e| {
                e.attributes.insert("target".into(), "_blank".into());
                e.attributes.insert("rel".into(), "noopener noreferrer".into());
            });
            if updated.is_none() {
                return Err(InitError::Interactions(format!(
                    "external link {link} vanished during setup"
                )));
            }
            let has_icon = !self
                .document
                .children_where(link, |e| e.has_class("external-icon"))
                .is_empty();
            if !has_icon {
                self.document.append(
                    link,
                    Element::new("span")
                        .class("external-icon")
                        .attr("aria-hidden", "true")
                        .text(" ↗"),
                );
            }
        }
        Ok(links.len())
    }

    /// Window scrolled to `y`.
    pub fn on_scroll(&self, y: f64) {
        if let Some(button) = *self.scroll_to_top.lock() {
            self.document
                .toggle_class(button, "visible", y > SCROLL_TO_TOP_THRESHOLD);
        }
    }

    pub fn is_scroll_to_top(&self, node: NodeId) -> bool {
        *self.scroll_to_top.lock() == Some(node)
    }

    /// Click on a registered copy button. Returns `false` for other nodes.
    ///
    /// While the "Copied!" feedback is showing, the button's own label is
    /// parked in `data-copy-label`; further clicks copy again but leave the
    /// pending restore alone.
    pub fn handle_copy(&self, node: NodeId) -> bool {
        if !self.copy_buttons.lock().contains(&node) {
            return false;
        }
        let pending_label = self.document.attr(node, COPY_LABEL_ATTR);
        let label = pending_label
            .clone()
            .or_else(|| self.document.text(node))
            .unwrap_or_default();
        let text = self
            .document
            .attr(node, "data-copy")
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| label.clone());
        debug!(chars = text.chars().count(), "Copied to clipboard");
        *self.clipboard.lock() = Some(text);

        if let Some(announcer) = &self.announcer {
            announcer.announce("Copied to clipboard");
        }

        if pending_label.is_some() {
            return true;
        }
        self.document.set_attr(node, COPY_LABEL_ATTR, &label);
        self.document.set_text(node, "Copied!");
        self.document.add_class(node, "copied");
        document::schedule(&self.document, COPY_FEEDBACK, move |doc| {
            doc.set_text(node, &label);
            doc.remove_attr(node, COPY_LABEL_ATTR);
            doc.remove_class(node, "copied");
        });
        true
    }

    pub fn clipboard(&self) -> Option<String> {
        self.clipboard.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::homepage_template;

    fn wired() -> (Arc<Document>, PageInteractions) {
        let doc = Arc::new(homepage_template());
        let interactions = PageInteractions::new(Arc::clone(&doc), None);
        interactions.setup().unwrap();
        (doc, interactions)
    }

    #[test]
    fn test_external_links_get_target_and_single_icon() {
        let (doc, interactions) = wired();
        interactions.setup().unwrap();

        let github = doc
            .select(|e| e.get_attr("href") == Some("https://github.com/example"))[0];
        assert_eq!(doc.attr(github, "target").as_deref(), Some("_blank"));
        assert_eq!(doc.attr(github, "rel").as_deref(), Some("noopener noreferrer"));
        let icons = doc.children_where(github, |e| e.has_class("external-icon"));
        assert_eq!(icons.len(), 1);

        let anchor = doc.select(|e| e.get_attr("href") == Some("#about"))[0];
        assert_eq!(doc.attr(anchor, "target"), None);
    }

    #[test]
    fn test_scroll_to_top_visibility() {
        let (doc, interactions) = wired();
        let button = doc.by_class("scroll-to-top")[0];
        interactions.on_scroll(301.0);
        assert!(doc.has_class(button, "visible"));
        interactions.on_scroll(300.0);
        assert!(!doc.has_class(button, "visible"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_copy_button_feedback_and_restore() {
        let (doc, interactions) = wired();
        let button = doc.by_attr("data-copy")[0];
        assert!(interactions.handle_copy(button));
        assert_eq!(interactions.clipboard().as_deref(), Some("hello@example.com"));
        assert_eq!(doc.text(button).as_deref(), Some("Copied!"));

        tokio::time::sleep(COPY_FEEDBACK + Duration::from_millis(1)).await;
        assert_eq!(doc.text(button).as_deref(), Some("hello@example.com"));
        assert!(!doc.has_class(button, "copied"));

        assert!(!interactions.handle_copy(crate::document::BODY));
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeat_copy_during_feedback_restores_label() {
        let (doc, interactions) = wired();
        let button = doc.by_attr("data-copy")[0];
        let label = doc.text(button);

        assert!(interactions.handle_copy(button));
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(interactions.handle_copy(button));
        assert_eq!(doc.text(button).as_deref(), Some("Copied!"));
        assert_eq!(interactions.clipboard().as_deref(), Some("hello@example.com"));

        // The first click's timer restores the real label
        tokio::time::sleep(COPY_FEEDBACK).await;
        assert_eq!(doc.text(button), label);
        assert!(!doc.has_attr(button, "data-copy-label"));
        assert!(!doc.has_class(button, "copied"));

        // A later click starts a fresh feedback cycle
        assert!(interactions.handle_copy(button));
        assert_eq!(doc.text(button).as_deref(), Some("Copied!"));
    }
}
