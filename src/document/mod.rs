//! Headless document model
//!
//! A flat arena of elements with parent links, standing in for the browser
//! DOM. Modules mutate it through short, synchronous critical sections;
//! structural additions are announced on a broadcast channel so that
//! interested modules (i18n) can re-scan new content.

mod template;

use crate::errors::{DocumentError, InitError};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};

pub use template::homepage_template;

/// Index of an element in the document arena.
pub type NodeId = usize;

/// Node id of the `<html>` element.
pub const ROOT: NodeId = 0;
/// Node id of the `<body>` element.
pub const BODY: NodeId = 1;

/// Lifecycle of the document, mirroring `document.readyState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Loading,
    Interactive,
    /// The page was torn down before it became interactive.
    Aborted,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    pub id: Option<String>,
    pub parent: Option<NodeId>,
    pub classes: BTreeSet<String>,
    pub attributes: BTreeMap<String, String>,
    pub style: BTreeMap<String, String>,
    pub text: String,
    /// Removed from the tree; invisible to queries.
    pub detached: bool,
}

impl Element {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            ..Default::default()
        }
    }

    pub fn id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn class(mut self, class: &str) -> Self {
        for c in class.split_whitespace() {
            self.classes.insert(c.to_string());
        }
        self
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.contains(class)
    }

    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// One batch of structural additions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    pub added: Vec<NodeId>,
}

#[derive(Debug)]
struct Tree {
    nodes: Vec<Element>,
    title: String,
    location_hash: String,
    active: Option<NodeId>,
}

pub struct Document {
    tree: RwLock<Tree>,
    mutations: broadcast::Sender<MutationRecord>,
    ready: watch::Sender<ReadyState>,
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("nodes", &self.tree.read().nodes.len())
            .field("ready", &*self.ready.borrow())
            .finish()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// An empty document containing only `<html>` and `<body>`, still loading.
    pub fn new() -> Self {
        let html = Element::new("html");
        let mut body = Element::new("body");
        body.parent = Some(ROOT);
        let (mutations, _) = broadcast::channel(64);
        let (ready, _) = watch::channel(ReadyState::Loading);
        Self {
            tree: RwLock::new(Tree {
                nodes: vec![html, body],
                title: String::new(),
                location_hash: String::new(),
                active: None,
            }),
            mutations,
            ready,
        }
    }

    // ─── Lifecycle ─────────────────────────────────────────────────────

    pub fn ready_state(&self) -> ReadyState {
        *self.ready.borrow()
    }

    /// Fire the equivalent of `DOMContentLoaded`.
    pub fn mark_interactive(&self) {
        self.ready.send_if_modified(|state| {
            if *state == ReadyState::Loading {
                *state = ReadyState::Interactive;
                true
            } else {
                false
            }
        });
    }

    pub fn abort(&self) {
        self.ready.send_if_modified(|state| {
            if *state == ReadyState::Loading {
                *state = ReadyState::Aborted;
                true
            } else {
                false
            }
        });
    }

    /// Resolve once the document is interactive.
    pub async fn wait_interactive(&self) -> Result<(), InitError> {
        let mut rx = self.ready.subscribe();
        let state = rx
            .wait_for(|s| *s != ReadyState::Loading)
            .await
            .map_err(|_| InitError::DomUnavailable)?;
        match *state {
            ReadyState::Interactive => Ok(()),
            _ => Err(InitError::DomUnavailable),
        }
    }

    // ─── Structure ─────────────────────────────────────────────────────

    pub fn append(&self, parent: NodeId, element: Element) -> NodeId {
        let id = self.insert(parent, element);
        let _ = self.mutations.send(MutationRecord { added: vec![id] });
        id
    }

    /// Append several elements, announcing them as a single mutation record.
    /// Each entry's parent is either an existing node or an earlier entry
    /// of the same batch (by index, via [`BatchParent`]).
    ///
    /// A batch naming a parent that is not an earlier entry is rejected
    /// whole; nothing is inserted.
    pub fn append_batch(
        &self,
        entries: Vec<(BatchParent, Element)>,
    ) -> Result<Vec<NodeId>, DocumentError> {
        for (entry, (parent, _)) in entries.iter().enumerate() {
            if let BatchParent::Earlier(index) = *parent {
                if index >= entry {
                    return Err(DocumentError::UnknownBatchParent { entry, index });
                }
            }
        }

        let mut added: Vec<NodeId> = Vec::with_capacity(entries.len());
        for (parent, element) in entries {
            let parent = match parent {
                BatchParent::Node(id) => id,
                BatchParent::Earlier(index) => added[index],
            };
            added.push(self.insert(parent, element));
        }
        let _ = self.mutations.send(MutationRecord {
            added: added.clone(),
        });
        Ok(added)
    }

    fn insert(&self, parent: NodeId, mut element: Element) -> NodeId {
        let mut tree = self.tree.write();
        element.parent = Some(parent);
        tree.nodes.push(element);
        tree.nodes.len() - 1
    }

    pub fn subscribe_mutations(&self) -> broadcast::Receiver<MutationRecord> {
        self.mutations.subscribe()
    }

    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.tree.read().nodes.len()
    }

    // ─── Queries ───────────────────────────────────────────────────────

    pub fn by_id(&self, id: &str) -> Option<NodeId> {
        self.tree
            .read()
            .nodes
            .iter()
            .position(|e| !e.detached && e.id.as_deref() == Some(id))
    }

    pub fn by_class(&self, class: &str) -> Vec<NodeId> {
        self.select(|e| e.has_class(class))
    }

    pub fn by_attr(&self, name: &str) -> Vec<NodeId> {
        self.select(|e| e.attributes.contains_key(name))
    }

    pub fn by_tag(&self, tag: &str) -> Vec<NodeId> {
        self.select(|e| e.tag == tag)
    }

    pub fn select(&self, pred: impl Fn(&Element) -> bool) -> Vec<NodeId> {
        self.tree
            .read()
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, e)| !e.detached && pred(e))
            .map(|(i, _)| i)
            .collect()
    }

    /// Remove `node` and its subtree from the document.
    pub fn remove(&self, node: NodeId) {
        if node == ROOT || node == BODY {
            return;
        }
        let doomed: Vec<NodeId> = self
            .select(|_| true)
            .into_iter()
            .filter(|id| self.contains(node, *id))
            .collect();
        let mut tree = self.tree.write();
        for id in doomed {
            if let Some(element) = tree.nodes.get_mut(id) {
                element.detached = true;
            }
        }
    }

    pub fn is_attached(&self, node: NodeId) -> bool {
        self.with_element(node, |e| !e.detached).unwrap_or(false)
    }

    /// Nearest ancestor-or-self carrying `class`.
    pub fn closest(&self, node: NodeId, class: &str) -> Option<NodeId> {
        let tree = self.tree.read();
        let mut current = Some(node);
        while let Some(id) = current {
            let element = tree.nodes.get(id)?;
            if element.has_class(class) {
                return Some(id);
            }
            current = element.parent.filter(|p| *p != id);
        }
        None
    }

    /// `true` if `ancestor` is `node` or one of its ancestors.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let tree = self.tree.read();
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = tree.nodes.get(id).and_then(|e| e.parent).filter(|p| *p != id);
        }
        false
    }

    /// Children of `parent` matching `pred`, in document order.
    pub fn children_where(&self, parent: NodeId, pred: impl Fn(&Element) -> bool) -> Vec<NodeId> {
        self.tree
            .read()
            .nodes
            .iter()
            .enumerate()
            .filter(|(i, e)| *i != parent && !e.detached && e.parent == Some(parent) && pred(e))
            .map(|(i, _)| i)
            .collect()
    }

    /// Descendants of `ancestor` (excluding itself) matching `pred`.
    pub fn descendants_where(&self, ancestor: NodeId, pred: impl Fn(&Element) -> bool) -> Vec<NodeId> {
        let candidates = self.select(pred);
        candidates
            .into_iter()
            .filter(|id| *id != ancestor && self.contains(ancestor, *id))
            .collect()
    }

    pub fn element(&self, node: NodeId) -> Option<Element> {
        self.tree.read().nodes.get(node).cloned()
    }

    pub fn with_element<R>(&self, node: NodeId, f: impl FnOnce(&Element) -> R) -> Option<R> {
        self.tree.read().nodes.get(node).map(f)
    }

    pub fn update<R>(&self, node: NodeId, f: impl FnOnce(&mut Element) -> R) -> Option<R> {
        self.tree.write().nodes.get_mut(node).map(f)
    }

    // ─── Classes, attributes, text, style ─────────────────────────────

    pub fn add_class(&self, node: NodeId, class: &str) {
        self.update(node, |e| e.classes.insert(class.to_string()));
    }

    pub fn remove_class(&self, node: NodeId, class: &str) {
        self.update(node, |e| e.classes.remove(class));
    }

    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.with_element(node, |e| e.has_class(class)).unwrap_or(false)
    }

    /// Set or clear `class` according to `on`. Returns the resulting state.
    pub fn toggle_class(&self, node: NodeId, class: &str, on: bool) -> bool {
        if on {
            self.add_class(node, class);
        } else {
            self.remove_class(node, class);
        }
        on
    }

    pub fn attr(&self, node: NodeId, name: &str) -> Option<String> {
        self.with_element(node, |e| e.attributes.get(name).cloned())
            .flatten()
    }

    pub fn has_attr(&self, node: NodeId, name: &str) -> bool {
        self.with_element(node, |e| e.attributes.contains_key(name))
            .unwrap_or(false)
    }

    pub fn set_attr(&self, node: NodeId, name: &str, value: &str) {
        self.update(node, |e| e.attributes.insert(name.to_string(), value.to_string()));
    }

    pub fn remove_attr(&self, node: NodeId, name: &str) {
        self.update(node, |e| e.attributes.remove(name));
    }

    /// Boolean attributes (`checked`, `disabled`) are present-or-absent.
    pub fn set_flag(&self, node: NodeId, name: &str, on: bool) {
        if on {
            self.set_attr(node, name, "");
        } else {
            self.remove_attr(node, name);
        }
    }

    pub fn text(&self, node: NodeId) -> Option<String> {
        self.with_element(node, |e| e.text.clone())
    }

    pub fn set_text(&self, node: NodeId, text: &str) {
        self.update(node, |e| e.text = text.to_string());
    }

    pub fn style(&self, node: NodeId, property: &str) -> Option<String> {
        self.with_element(node, |e| e.style.get(property).cloned())
            .flatten()
    }

    pub fn set_style(&self, node: NodeId, property: &str, value: &str) {
        self.update(node, |e| {
            if value.is_empty() {
                e.style.remove(property);
            } else {
                e.style.insert(property.to_string(), value.to_string());
            }
        });
    }

    /// Numeric layout attribute (`data-offset-top` and friends), 0 when absent.
    pub fn metric(&self, node: NodeId, name: &str) -> f64 {
        self.attr(node, name)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0.0)
    }

    /// Vertical position of `node`: its own `data-offset-top`, or the nearest
    /// positioned ancestor's.
    pub fn offset_top(&self, node: NodeId) -> f64 {
        let tree = self.tree.read();
        let mut current = Some(node);
        while let Some(id) = current {
            let Some(element) = tree.nodes.get(id) else {
                break;
            };
            if let Some(top) = element
                .get_attr("data-offset-top")
                .and_then(|v| v.parse::<f64>().ok())
            {
                return top;
            }
            current = element.parent.filter(|p| *p != id);
        }
        0.0
    }

    // ─── Focus ─────────────────────────────────────────────────────────

    pub fn focus(&self, node: NodeId) {
        self.tree.write().active = Some(node);
    }

    pub fn blur(&self) {
        self.tree.write().active = None;
    }

    pub fn active_element(&self) -> Option<NodeId> {
        self.tree.read().active
    }

    // ─── Document-level properties ─────────────────────────────────────

    pub fn title(&self) -> String {
        self.tree.read().title.clone()
    }

    pub fn set_title(&self, title: &str) {
        self.tree.write().title = title.to_string();
    }

    pub fn location_hash(&self) -> String {
        self.tree.read().location_hash.clone()
    }

    pub fn set_location_hash(&self, hash: &str) {
        self.tree.write().location_hash = hash.to_string();
    }

    fn meta_node(&self, name: &str) -> Option<NodeId> {
        self.select(|e| e.tag == "meta" && e.get_attr("name") == Some(name))
            .into_iter()
            .next()
    }

    pub fn meta_content(&self, name: &str) -> Option<String> {
        self.meta_node(name).and_then(|n| self.attr(n, "content"))
    }

    pub fn has_meta(&self, name: &str) -> bool {
        self.meta_node(name).is_some()
    }

    /// Set `<meta name=… content=…>`, creating the tag under `<html>` if absent.
    pub fn set_meta(&self, name: &str, content: &str) {
        match self.meta_node(name) {
            Some(node) => self.set_attr(node, "content", content),
            None => {
                self.append(
                    ROOT,
                    Element::new("meta").attr("name", name).attr("content", content),
                );
            }
        }
    }
}

/// Run `f` against the document once `delay` has passed.
///
/// Used for the short-lived visual markers (`updated`, `theme-transition`,
/// ...). Outside a runtime the callback runs immediately.
pub fn schedule(
    document: &Arc<Document>,
    delay: Duration,
    f: impl FnOnce(&Document) + Send + 'static,
) {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            let document = Arc::clone(document);
            handle.spawn(async move {
                tokio::time::sleep(delay).await;
                f(&document);
            });
        }
        Err(_) => f(document),
    }
}

/// Add `class` to `node` and take it off again after `duration`.
pub fn flash_class(document: &Arc<Document>, node: NodeId, class: &'static str, duration: Duration) {
    document.add_class(node, class);
    schedule(document, duration, move |doc| doc.remove_class(node, class));
}

/// Parent reference inside [`Document::append_batch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchParent {
    Node(NodeId),
    Earlier(usize),
}
