//! Integration tests for the homepage runtime
//!
//! Scenarios run against the in-memory document, mostly with paused time.
//! The only network I/O is the loopback mock counter.

mod helpers;
mod test_data_manager;
mod test_i18n;
mod test_orchestrator;
mod test_page;
mod test_stats;
mod test_theme;
