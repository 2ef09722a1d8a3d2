// Copyright (c) 2025 - Cowboy AI, Inc.
//! Snapshots of folded query model state
//!
//! A snapshot pairs a folded state with the `version` it was taken at. The
//! version is read two ways:
//!
//! 1. as the stream cursor: replay resumes with events strictly after it;
//! 2. as a Unix-millisecond timestamp: the snapshot policy measures the age
//!    of the snapshot from it.
//!
//! An entity that has never been snapshotted has `version = 0` and no state.
//!
//! ```text
//! get_snapshot ──> (state?, version) ──> replay events > version ──> fold
//!                                                                     │
//!                   save_snapshot(state, now) <── policy says yes <───┘
//! ```

pub mod policy;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::QueryModelResult;

pub use policy::{SnapshotPolicy, SnapshotTrigger};

/// Folded state at a point in an entity's stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot<S> {
    /// Folded state, absent when no snapshot was ever taken
    pub state: Option<S>,

    /// Stream cursor and Unix-millisecond timestamp of the snapshot
    pub version: i64,
}

impl<S> Snapshot<S> {
    /// The snapshot of an entity that has none
    pub fn empty() -> Self {
        Self {
            state: None,
            version: 0,
        }
    }

    /// A snapshot holding `state` at `version`
    pub fn new(state: S, version: i64) -> Self {
        Self {
            state: Some(state),
            version,
        }
    }

    /// Whether this snapshot carries no state
    pub fn is_empty(&self) -> bool {
        self.state.is_none()
    }

    /// The version read as a wall-clock time
    pub fn taken_at(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.version)
            .single()
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }
}

impl<S> Default for Snapshot<S> {
    fn default() -> Self {
        Self::empty()
    }
}

/// Persistence for snapshots of one state type
///
/// Implementations must be safe for concurrent use. The engine adds no
/// coordination: two concurrent replays of the same entity may both save,
/// and the store decides which write wins.
#[async_trait]
pub trait SnapshotStore<S>: Send + Sync {
    /// Latest snapshot for an entity, or [`Snapshot::empty`] if there is none
    async fn get_snapshot(&self, entity_id: &str) -> QueryModelResult<Snapshot<S>>;

    /// Persist a snapshot, overwriting any previous one for the entity
    async fn save_snapshot(&self, entity_id: &str, state: &S, version: i64)
        -> QueryModelResult<()>;
}
