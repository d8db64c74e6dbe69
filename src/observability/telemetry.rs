//! Telemetry & Observability
//!
//! Provides structured logging and tracing for page bring-up.
//! Features:
//! - Module initialization spans with timing
//! - Application state transition logging
//! - Configurable log levels via RUST_LOG
//! - Compact (human) or JSON output
//! - Panics routed through the log, including those in detached tasks

use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info, info_span};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Sanitize a string for safe log output by escaping control characters.
/// Translation keys and imported documents are user-controlled, so they go
/// through here before being echoed.
pub fn sanitize_for_log(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\x1b' => out.push_str("\\e"),
            '\x00' => out.push_str("\\0"),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            _ => out.push(c),
        }
    }
    out
}

/// Initialize global tracing subscriber with configurable output
/// By default, only enables tracing if RUST_LOG is explicitly set
pub fn init_tracing() {
    if let Ok(filter) = std::env::var("RUST_LOG") {
        init_tracing_with_filter(&filter, false);
    }
}

/// Initialize tracing for verbose mode
pub fn init_tracing_verbose(json: bool) {
    init_tracing_with_filter("homepage=debug,info", json)
}

/// Initialize with custom filter string
pub fn init_tracing_with_filter(filter: &str, json: bool) {
    use std::sync::Once;
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let filter_layer = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("warn"));

        if json {
            let _ = tracing_subscriber::registry()
                .with(filter_layer)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .try_init();
        } else {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false)
                .with_file(false)
                .with_line_number(false)
                .with_level(true)
                .compact()
                .with_writer(std::io::stderr);

            let _ = tracing_subscriber::registry()
                .with(filter_layer)
                .with(fmt_layer)
                .try_init();
        }
    });
}

static PANICS: AtomicU64 = AtomicU64::new(0);

/// Readable message from a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Log every panic through tracing before the previous hook runs.
///
/// Listener and observer tasks are spawned detached, so a panic there would
/// otherwise only reach stderr. Installing more than once is a no-op.
pub fn install_panic_hook() {
    use std::sync::Once;
    static INSTALL: Once = Once::new();

    INSTALL.call_once(|| {
        let original_hook = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |panic_info| {
            PANICS.fetch_add(1, Ordering::SeqCst);
            let message = sanitize_for_log(&panic_message(panic_info.payload()));
            let location = panic_info
                .location()
                .map(|l| format!("{}:{}", l.file(), l.line()))
                .unwrap_or_default();
            let thread = std::thread::current();
            error!(
                thread = thread.name().unwrap_or("unnamed"),
                location = location.as_str(),
                message = message.as_str(),
                "Uncaught panic"
            );
            original_hook(panic_info);
        }));
    });
}

/// Panics observed since the hook was installed.
pub fn panic_count() -> u64 {
    PANICS.load(Ordering::SeqCst)
}

/// Run one module initializer inside a span, logging duration and outcome.
///
/// Returns the initializer's result together with the elapsed time so the
/// orchestrator can keep per-module timings.
pub async fn track_module_init<F, Fut, T, E>(module: &str, f: F) -> (Result<T, E>, Duration)
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let start = Instant::now();
    let span = info_span!(
        "module.init",
        module = module,
        duration_ms = tracing::field::Empty,
        success = tracing::field::Empty,
    );

    info!(parent: &span, module, "Initializing module");
    let result = f().await;
    let elapsed = start.elapsed();
    let duration_ms = elapsed.as_millis() as u64;
    span.record("duration_ms", duration_ms);

    match &result {
        Ok(_) => {
            span.record("success", true);
            info!(parent: &span, module, duration_ms, "Module initialized");
        }
        Err(e) => {
            span.record("success", false);
            let safe_err = sanitize_for_log(&e.to_string());
            error!(parent: &span, module, duration_ms, error = safe_err.as_str(), "Module initialization failed");
        }
    }

    (result, elapsed)
}

/// Record an application state transition
pub fn record_state_transition(from: &str, to: &str) {
    info!(from, to, "Application state transition");
}

/// Initialize tracing for tests with a simple subscriber
#[cfg(test)]
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
