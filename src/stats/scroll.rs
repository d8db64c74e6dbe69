//! Scroll depth milestones.

use std::collections::BTreeSet;

pub const MILESTONES: [u8; 4] = [25, 50, 75, 90];

/// Scroll depth as a rounded percentage, or `None` when the page cannot
/// scroll.
pub fn scroll_depth(scroll_top: f64, scroll_height: f64, viewport: f64) -> Option<u8> {
    let range = scroll_height - viewport;
    if range <= 0.0 || !range.is_finite() {
        return None;
    }
    let depth = (scroll_top.max(0.0) / range * 100.0).round().min(100.0);
    Some(depth as u8)
}

/// Per-load high-water mark. Each milestone is recorded at most once.
#[derive(Debug, Clone, Default)]
pub struct ScrollDepthTracker {
    max_depth: u8,
    reached: BTreeSet<u8>,
}

impl ScrollDepthTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_depth(&self) -> u8 {
        self.max_depth
    }

    pub fn reached(&self) -> Vec<u8> {
        self.reached.iter().copied().collect()
    }

    /// Feed one scroll event. Returns the milestone recorded by it, if any.
    ///
    /// Only a new high-water mark is considered, and at most one milestone
    /// per event: the lowest unrecorded one the depth has crossed.
    pub fn record(&mut self, scroll_top: f64, scroll_height: f64, viewport: f64) -> Option<u8> {
        let depth = scroll_depth(scroll_top, scroll_height, viewport)?;
        if depth <= self.max_depth {
            return None;
        }
        self.max_depth = depth;
        let milestone = MILESTONES
            .into_iter()
            .find(|&m| depth >= m && !self.reached.contains(&m))?;
        self.reached.insert(milestone);
        Some(milestone)
    }
}
