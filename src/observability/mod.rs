//! Observability
//!
//! Structured logging setup and the span helpers used by the orchestrator
//! and the stateful services.

pub mod telemetry;
