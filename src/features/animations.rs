//! Reveal-on-scroll animations, hero parallax, header opacity and hover marks.

use crate::app::PageModule;
use crate::document::{Document, NodeId};
use crate::errors::ModuleError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

const PARALLAX_SPEED: f64 = 0.5;
const HOVER_TARGETS: [&str; 4] = ["card", "btn", "nav-link", "social-link"];

/// CSS class for a `data-animation` name.
pub fn animation_class(animation: &str) -> &str {
    match animation {
        "fadeIn" => "fade-in",
        "slideUp" => "slide-up",
        "scaleIn" => "scale-in",
        "bounceIn" => "bounce-in",
        other => other,
    }
}

pub struct Animations {
    document: Arc<Document>,
    observed: Mutex<BTreeSet<NodeId>>,
    reduced_motion: AtomicBool,
}

impl Animations {
    pub fn new(document: Arc<Document>, reduced_motion: bool) -> Self {
        Self {
            document,
            observed: Mutex::new(BTreeSet::new()),
            reduced_motion: AtomicBool::new(reduced_motion),
        }
    }

    pub fn set_reduced_motion(&self, reduce: bool) {
        self.reduced_motion.store(reduce, Ordering::SeqCst);
    }

    pub fn observed(&self) -> Vec<NodeId> {
        self.observed.lock().iter().copied().collect()
    }

    /// An observed element entered the viewport.
    pub fn reveal(&self, node: NodeId) {
        if !self.observed.lock().contains(&node) {
            return;
        }
        self.document.add_class(node, "in-view");
        if let Some(animation) = self.document.attr(node, "data-animation") {
            self.document.add_class(node, animation_class(&animation));
        }
        if !self.document.has_attr(node, "data-repeat-animation") {
            self.observed.lock().remove(&node);
        }
    }

    /// Reveal every observed element intersecting `[y, y + viewport)`.
    pub fn check_visibility(&self, y: f64, viewport: f64) {
        let candidates = self.observed();
        for node in candidates {
            let top = self.document.offset_top(node);
            if top < y + viewport && top >= y - viewport {
                self.reveal(node);
            }
        }
    }

    pub fn on_scroll(&self, y: f64) {
        if let Some(hero) = self.document.by_class("hero").into_iter().next() {
            let hero_height = self.document.metric(hero, "data-offset-height");
            if y < hero_height {
                self.document.set_style(
                    hero,
                    "transform",
                    &format!("translateY({}px)", y * PARALLAX_SPEED),
                );
            }
        }
        if let Some(header) = self.document.by_class("header").into_iter().next() {
            let opacity = (y / 100.0).min(1.0);
            self.document
                .set_style(header, "--header-bg-opacity", &opacity.to_string());
        }
    }

    /// Pointer entered (`true`) or left an element.
    pub fn hover(&self, node: NodeId, entered: bool) {
        let interactive = HOVER_TARGETS
            .iter()
            .any(|class| self.document.has_class(node, class));
        if !interactive {
            return;
        }
        if entered {
            if !self.reduced_motion.load(Ordering::SeqCst) {
                self.document.add_class(node, "hover-active");
            }
        } else {
            self.document.remove_class(node, "hover-active");
        }
    }
}

#[async_trait]
impl PageModule for Animations {
    fn name(&self) -> &str {
        "animations"
    }

    async fn init(&self) -> Result<(), ModuleError> {
        let targets = self.document.select(|e| {
            e.attributes.contains_key("data-animation") || e.has_class("animate-on-scroll")
        });
        debug!(count = targets.len(), "Observing animated elements");
        self.observed.lock().extend(targets);
        Ok(())
    }
}
