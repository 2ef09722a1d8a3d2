// Copyright (c) 2025 - Cowboy AI, Inc.
//! Snapshot Policy
//!
//! Pure decision over two thresholds: events folded since the last snapshot,
//! and time elapsed since it was taken. Either one is enough.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::config::SnapshotConfig;

/// Which threshold asked for a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SnapshotTrigger {
    /// Enough events were folded
    EventBuffer,
    /// The previous snapshot is old enough
    Interval,
}

impl fmt::Display for SnapshotTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotTrigger::EventBuffer => write!(f, "event buffer"),
            SnapshotTrigger::Interval => write!(f, "interval"),
        }
    }
}

/// Decides whether a freshly folded state should be persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotPolicy {
    event_buffer: u64,
    interval: Duration,
}

impl SnapshotPolicy {
    /// Create a policy with explicit thresholds
    pub fn new(event_buffer: u64, interval: Duration) -> Self {
        Self {
            event_buffer,
            interval,
        }
    }

    /// Which threshold, if any, is met
    ///
    /// The event buffer is checked first.
    pub fn evaluate(
        &self,
        events_applied: u64,
        since_snapshot: Duration,
    ) -> Option<SnapshotTrigger> {
        if events_applied >= self.event_buffer {
            Some(SnapshotTrigger::EventBuffer)
        } else if since_snapshot >= self.interval {
            Some(SnapshotTrigger::Interval)
        } else {
            None
        }
    }

    /// Whether a snapshot should be taken
    pub fn should_snapshot(&self, events_applied: u64, since_snapshot: Duration) -> bool {
        self.evaluate(events_applied, since_snapshot).is_some()
    }

    /// Time between a snapshot version and `now_millis`
    ///
    /// A version ahead of the clock counts as no time elapsed.
    pub fn elapsed_since(version: i64, now_millis: i64) -> Duration {
        let millis = now_millis.saturating_sub(version);
        u64::try_from(millis)
            .map(Duration::from_millis)
            .unwrap_or(Duration::ZERO)
    }
}

impl Default for SnapshotPolicy {
    fn default() -> Self {
        Self::from(&SnapshotConfig::default())
    }
}

impl From<&SnapshotConfig> for SnapshotPolicy {
    fn from(config: &SnapshotConfig) -> Self {
        Self::new(config.snapshot_event_buffer, config.snapshot_interval)
    }
}

/// Free-function form of [`SnapshotPolicy::should_snapshot`]
pub fn should_snapshot(
    events_applied: u64,
    since_snapshot: Duration,
    config: &SnapshotConfig,
) -> bool {
    SnapshotPolicy::from(config).should_snapshot(events_applied, since_snapshot)
}
