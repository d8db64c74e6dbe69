//! Homepage - headless runtime for a personal homepage
//!
//! The client-side behaviour of a static personal site, run against an
//! in-memory document model instead of a browser:
//!
//! - **Orchestrator**: ordered module bring-up with dual-path readiness waits
//! - **Theme**: light/dark switching, OS following, high contrast, auto theme
//! - **I18n**: language detection, translation tables, DOM translation
//! - **Stats**: uptime ticker, visitor counter, session and scroll tracking
//! - **Data manager**: cached statistics overlay with export and import
//!
//! # Quick Start
//!
//! ```ignore
//! use homepage::{Config, PageContext};
//!
//! let page = PageContext::builder(Config::load(None)?).build()?;
//! let state = page.boot().await;
//! println!("{:?}", page.app().all_module_status());
//! ```

// ─── Runtime core ──────────────────────────────────────────────────
pub mod app;
pub mod config;
pub mod document;
pub mod errors;
pub mod events;
pub mod page;
pub mod readiness;
pub mod registry;
pub mod storage;

// ─── Services ──────────────────────────────────────────────────────
pub mod data_manager;
pub mod i18n;
pub mod stats;
pub mod theme;

// ─── Page features ─────────────────────────────────────────────────
pub mod features;

// ─── Infrastructure ────────────────────────────────────────────────
pub mod cli;
pub mod observability;
pub mod testing;

pub use app::{App, AppState, ModuleStatus};
pub use config::Config;
pub use page::{LoadPlan, LoadPlans, PageContext};
