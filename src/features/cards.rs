//! Project cards: flip / navigate, lazy images and the image preview overlay.

use crate::app::PageModule;
use crate::document::{Document, NodeId, BODY, ROOT};
use crate::errors::ModuleError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, error};

/// What a click or key press on a card resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardAction {
    Flipped(bool),
    Navigate(String),
    PreviewOpened,
    PreviewClosed,
    Ignored,
}

pub struct Cards {
    document: Arc<Document>,
    mobile: bool,
    flipped: Mutex<BTreeSet<NodeId>>,
    lazy_images: Mutex<BTreeSet<NodeId>>,
    overlay: Mutex<Option<NodeId>>,
}

impl Cards {
    pub fn new(document: Arc<Document>, mobile: bool) -> Self {
        Self {
            document,
            mobile,
            flipped: Mutex::new(BTreeSet::new()),
            lazy_images: Mutex::new(BTreeSet::new()),
            overlay: Mutex::new(None),
        }
    }

    fn set_tap_hints(&self, card: NodeId) {
        let english = self.document.attr(ROOT, "lang").as_deref() == Some("en");
        let front = self
            .document
            .descendants_where(card, |e| e.has_class("card-front"));
        let back = self.document.descendants_where(card, |e| e.has_class("card-back"));
        if let Some(&front) = front.first() {
            let hint = if english { "👆 Tap to flip" } else { "👆 点击翻转" };
            self.document.set_attr(front, "data-tap-hint", hint);
        }
        if let Some(&back) = back.first() {
            let hint = if english { "👆 Tap to visit" } else { "👆 点击访问" };
            self.document.set_attr(back, "data-visit-hint", hint);
        }
    }

    fn card_link(&self, card: NodeId) -> Option<String> {
        let links = self.document.descendants_where(card, |e| e.tag == "a");
        links
            .first()
            .and_then(|&link| self.document.attr(link, "href"))
    }

    fn toggle_flip(&self, card: NodeId) -> CardAction {
        let mut flipped = self.flipped.lock();
        let now_flipped = if flipped.remove(&card) {
            false
        } else {
            flipped.insert(card);
            true
        };
        self.document.toggle_class(card, "flipped", now_flipped);
        CardAction::Flipped(now_flipped)
    }

    pub fn is_flipped(&self, card: NodeId) -> bool {
        self.flipped.lock().contains(&card)
    }

    /// Click somewhere inside the page. Handles card images, the overlay and
    /// the cards themselves.
    pub fn handle_click(&self, target: NodeId) -> CardAction {
        if self.document.has_class(target, "card-img") && self.document.has_attr(target, "src") {
            return self.toggle_preview(target);
        }
        if Some(target) == *self.overlay.lock() {
            return if self.close_preview() {
                CardAction::PreviewClosed
            } else {
                CardAction::Ignored
            };
        }
        let Some(card) = self.document.closest(target, "card") else {
            return CardAction::Ignored;
        };
        let on_control = self
            .document
            .with_element(target, |e| e.tag == "a" || e.tag == "button")
            .unwrap_or(false);
        if on_control {
            // Links and buttons handle themselves
            return CardAction::Ignored;
        }

        if self.mobile {
            let on_back = self.document.closest(target, "card-back").is_some();
            if self.is_flipped(card) && on_back {
                if let Some(href) = self.card_link(card) {
                    return CardAction::Navigate(href);
                }
            }
            self.toggle_flip(card)
        } else {
            match self.card_link(card) {
                Some(href) => CardAction::Navigate(href),
                None => CardAction::Ignored,
            }
        }
    }

    /// Enter or Space on a focused card.
    pub fn handle_key(&self, card: NodeId, key: &str) -> CardAction {
        if (key != "Enter" && key != " ") || !self.document.has_class(card, "card") {
            return CardAction::Ignored;
        }
        if self.mobile {
            self.toggle_flip(card)
        } else {
            self.card_link(card)
                .map(CardAction::Navigate)
                .unwrap_or(CardAction::Ignored)
        }
    }

    /// A lazy image scrolled into view: swap in its real source.
    pub fn reveal_image(&self, img: NodeId) -> bool {
        if !self.lazy_images.lock().remove(&img) {
            return false;
        }
        if let Some(src) = self.document.attr(img, "data-src") {
            self.document.set_attr(img, "src", &src);
            self.document.remove_attr(img, "data-src");
            self.document.add_class(img, "loaded");
            self.mark_placeholder(img);
        }
        true
    }

    pub fn check_visibility(&self, y: f64, viewport: f64) {
        let pending: Vec<NodeId> = self.lazy_images.lock().iter().copied().collect();
        for img in pending {
            let top = self.document.offset_top(img);
            if top < y + viewport && top >= y - viewport {
                self.reveal_image(img);
            }
        }
    }

    fn mark_placeholder(&self, img: NodeId) {
        if let Some(placeholder) = self.document.closest(img, "image-placeholder") {
            self.document.add_class(placeholder, "has-image");
        }
    }

    fn set_all_images_visible(&self, visible_except: Option<NodeId>) {
        for img in self.document.by_class("card-img") {
            let visible = visible_except.is_none() || visible_except == Some(img);
            self.document.set_style(
                img,
                "visibility",
                if visible { "visible" } else { "hidden" },
            );
        }
    }

    fn toggle_preview(&self, img: NodeId) -> CardAction {
        if self.document.has_class(img, "enlarged") {
            self.close_preview();
            return CardAction::PreviewClosed;
        }
        let Some(overlay) = *self.overlay.lock() else {
            error!("Image preview overlay missing");
            return CardAction::Ignored;
        };
        for other in self.document.by_class("enlarged") {
            self.document.remove_class(other, "enlarged");
        }
        self.set_all_images_visible(Some(img));
        self.document.add_class(overlay, "active");
        self.document.set_style(BODY, "overflow", "hidden");
        self.document.add_class(BODY, "image-preview-active");
        self.document.add_class(img, "enlarged");
        debug!(image = img, "Image preview opened");
        CardAction::PreviewOpened
    }

    /// Close any open preview. Returns whether one was open.
    pub fn close_preview(&self) -> bool {
        let enlarged = self.document.by_class("enlarged");
        let was_open = !enlarged.is_empty();
        for img in enlarged {
            self.document.remove_class(img, "enlarged");
        }
        self.set_all_images_visible(None);
        if let Some(overlay) = *self.overlay.lock() {
            self.document.remove_class(overlay, "active");
        }
        self.document.set_style(BODY, "overflow", "");
        self.document.remove_class(BODY, "image-preview-active");
        was_open
    }

    pub fn is_preview_open(&self) -> bool {
        !self.document.by_class("enlarged").is_empty()
    }
}

#[async_trait]
impl PageModule for Cards {
    fn name(&self) -> &str {
        "cards"
    }

    async fn init(&self) -> Result<(), ModuleError> {
        let cards = self.document.by_class("card");
        for &card in &cards {
            if self.mobile {
                self.set_tap_hints(card);
            }
            self.document.set_attr(card, "tabindex", "0");
            self.document.set_attr(card, "role", "button");
        }

        let lazy = self
            .document
            .select(|e| e.tag == "img" && e.attributes.contains_key("data-src"))
            .into_iter()
            .filter(|&img| self.document.closest(img, "card").is_some());
        self.lazy_images.lock().extend(lazy);

        let loaded = self.document.select(|e| {
            e.has_class("card-img") && e.get_attr("src").is_some_and(|s| !s.is_empty())
        });
        for img in loaded {
            self.mark_placeholder(img);
        }

        let overlay = self.document.by_class("image-overlay").into_iter().next();
        if overlay.is_none() {
            error!("Image preview overlay missing");
        }
        *self.overlay.lock() = overlay;
        debug!(cards = cards.len(), mobile = self.mobile, "Cards ready");
        Ok(())
    }
}
