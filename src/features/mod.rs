//! Auxiliary page features
//!
//! Independent DOM modules with no cross-dependencies. Each one is brought
//! up by the orchestrator as a [`PageModule`](crate::app::PageModule) and
//! afterwards driven by the page's input handlers.

pub mod accessibility;
pub mod animations;
pub mod cards;
pub mod interactions;
pub mod navigation;
pub mod shortcuts;

pub use accessibility::{Accessibility, Announcer};
pub use animations::Animations;
pub use cards::{CardAction, Cards};
pub use interactions::PageInteractions;
pub use navigation::Navigation;
pub use shortcuts::{KeyEvent, ShortcutAction};
