//! Document-level keyboard shortcuts.
//!
//! Shortcuts fire regardless of which element has focus, including text
//! inputs.

use serde::Deserialize;

/// A `keydown` as seen by the document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct KeyEvent {
    pub key: String,
    #[serde(default)]
    pub ctrl: bool,
    #[serde(default)]
    pub meta: bool,
    #[serde(default)]
    pub shift: bool,
}

impl KeyEvent {
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            ..Default::default()
        }
    }

    pub fn ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    pub fn meta(mut self) -> Self {
        self.meta = true;
        self
    }

    pub fn shift(mut self) -> Self {
        self.shift = true;
        self
    }

    fn command(&self) -> bool {
        self.ctrl || self.meta
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutAction {
    ToggleTheme,
    ToggleLanguage,
    OpenDataManager,
    Search,
    CloseMobileMenu,
    CloseImagePreview,
    CloseDataManager,
}

/// Every action bound to `event`, in dispatch order.
///
/// Several listeners can react to the same key: Ctrl+Shift+D both toggles
/// the theme and opens the data manager.
pub fn resolve(event: &KeyEvent) -> Vec<ShortcutAction> {
    let mut actions = Vec::new();
    let key = event.key.as_str();

    if key == "Escape" {
        actions.extend([
            ShortcutAction::CloseMobileMenu,
            ShortcutAction::CloseImagePreview,
            ShortcutAction::CloseDataManager,
        ]);
        return actions;
    }
    if event.command() && key == "k" {
        actions.push(ShortcutAction::Search);
    }
    if event.command() && event.shift {
        match key {
            "D" | "T" => actions.push(ShortcutAction::ToggleTheme),
            "L" => actions.push(ShortcutAction::ToggleLanguage),
            _ => {}
        }
    }
    if event.ctrl && event.shift && key == "D" {
        actions.push(ShortcutAction::OpenDataManager);
    }
    actions
}
