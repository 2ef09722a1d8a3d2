// Copyright (c) 2025 - Cowboy AI, Inc.
//! Snapshot configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::{QueryModelError, QueryModelResult};

/// Environment variable overriding [`SnapshotConfig::snapshot_event_buffer`]
pub const ENV_SNAPSHOT_EVENT_BUFFER: &str = "QUERY_MODEL_SNAPSHOT_EVENT_BUFFER";

/// Environment variable overriding [`SnapshotConfig::snapshot_interval`], in seconds
pub const ENV_SNAPSHOT_INTERVAL_SECS: &str = "QUERY_MODEL_SNAPSHOT_INTERVAL_SECS";

/// Default number of folded events that forces a snapshot
pub const DEFAULT_SNAPSHOT_EVENT_BUFFER: u64 = 100;

/// Default maximum age of a snapshot (30 days)
pub const DEFAULT_SNAPSHOT_INTERVAL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// When a freshly folded state is worth persisting
///
/// A snapshot is written once either threshold is reached, which bounds the
/// next replay to at most `snapshot_event_buffer` events or
/// `snapshot_interval` of staleness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Events folded in one call that trigger a snapshot
    pub snapshot_event_buffer: u64,

    /// Age of the previous snapshot that triggers a new one
    pub snapshot_interval: Duration,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            snapshot_event_buffer: DEFAULT_SNAPSHOT_EVENT_BUFFER,
            snapshot_interval: DEFAULT_SNAPSHOT_INTERVAL,
        }
    }
}

impl SnapshotConfig {
    /// Set the event buffer threshold
    pub fn with_event_buffer(mut self, events: u64) -> Self {
        self.snapshot_event_buffer = events;
        self
    }

    /// Set the interval threshold
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.snapshot_interval = interval;
        self
    }

    /// Load configuration from environment variables
    ///
    /// Unset variables keep their defaults.
    pub fn from_env() -> QueryModelResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> QueryModelResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_SNAPSHOT_EVENT_BUFFER) {
            config.snapshot_event_buffer = parse_u64(ENV_SNAPSHOT_EVENT_BUFFER, &raw)?;
        }

        if let Some(raw) = lookup(ENV_SNAPSHOT_INTERVAL_SECS) {
            config.snapshot_interval =
                Duration::from_secs(parse_u64(ENV_SNAPSHOT_INTERVAL_SECS, &raw)?);
        }

        Ok(config)
    }
}

fn parse_u64(key: &str, raw: &str) -> QueryModelResult<u64> {
    raw.trim().parse().map_err(|e| {
        QueryModelError::configuration(format!(
            "{key} must be a non-negative integer, got {raw:?}: {e}"
        ))
    })
}
