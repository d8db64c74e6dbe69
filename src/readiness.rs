//! Dual-path readiness wait
//!
//! A dependency is ready once its registry slot is set. The wait resolves on
//! the first of: the slot already being set at call time, the dependency's
//! readiness event arriving on the bus, or a poll tick observing the slot.
//! When the attempt budget runs out the wait resolves anyway; it never
//! blocks bring-up indefinitely.

use crate::events::{next_of_kind, EventBus, EventKind, PageEvent};
use crate::registry::{ServiceName, ServiceRegistry};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, warn};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// What to wait for and for how long.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessProbe {
    pub service: ServiceName,
    /// Readiness event announcing the service, if it fires one.
    pub event: Option<EventKind>,
    pub max_attempts: u32,
    pub poll_interval: Duration,
}

impl ReadinessProbe {
    pub fn new(service: ServiceName, max_attempts: u32) -> Self {
        Self {
            service,
            event: None,
            max_attempts,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_event(mut self, event: EventKind) -> Self {
        self.event = Some(event);
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Upper bound on the time a wait can take.
    pub fn budget(&self) -> Duration {
        self.poll_interval * self.max_attempts
    }
}

/// How a wait resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The slot was already set when the wait started.
    Immediate,
    /// The readiness event arrived after `attempts` poll ticks.
    Event { attempts: u32 },
    /// A poll tick observed the slot.
    Poll { attempts: u32 },
    /// The attempt budget ran out.
    TimedOut { attempts: u32 },
}

impl WaitOutcome {
    pub fn is_ready(&self) -> bool {
        !matches!(self, WaitOutcome::TimedOut { .. })
    }
}

/// Wait until `probe.service` is published or its budget is exhausted.
pub async fn wait_for_service(
    registry: &ServiceRegistry,
    bus: &EventBus,
    probe: &ReadinessProbe,
) -> WaitOutcome {
    // Subscribe before the immediate check so an event fired in between is kept
    let mut events = bus.subscribe();

    if registry.is_published(probe.service) {
        debug!(service = probe.service.as_str(), "Service already available");
        return WaitOutcome::Immediate;
    }

    let start = Instant::now() + probe.poll_interval;
    let mut ticker = interval_at(start, probe.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut attempts = 0u32;

    loop {
        tokio::select! {
            biased;
            _ = readiness_event(&mut events, probe.event) => {
                debug!(service = probe.service.as_str(), attempts, "Service announced readiness");
                return WaitOutcome::Event { attempts };
            }
            _ = ticker.tick() => {
                attempts += 1;
                if registry.is_published(probe.service) {
                    debug!(service = probe.service.as_str(), attempts, "Service found by polling");
                    return WaitOutcome::Poll { attempts };
                }
                if attempts >= probe.max_attempts {
                    warn!(
                        service = probe.service.as_str(),
                        attempts,
                        "Service not ready within attempt budget"
                    );
                    return WaitOutcome::TimedOut { attempts };
                }
            }
        }
    }
}

/// Resolves when `kind` is seen. Never resolves without an event kind or
/// once the bus is gone, leaving the poll path to decide.
async fn readiness_event(rx: &mut broadcast::Receiver<PageEvent>, kind: Option<EventKind>) {
    if let Some(kind) = kind {
        if next_of_kind(rx, kind).await.is_some() {
            return;
        }
    }
    std::future::pending::<()>().await
}
