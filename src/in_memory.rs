// Copyright (c) 2025 - Cowboy AI, Inc.
//! In-Memory Collaborators
//!
//! Process-local implementations of [`SnapshotStore`] and [`EventSource`] for
//! tests and for embedding the engine without external storage.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock as StdRwLock};
use tokio::sync::RwLock;
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::errors::{QueryModelError, QueryModelResult};
use crate::event::{erase, DomainEvent, DynEvent, EntityId, EventType};
use crate::event_source::{EventSource, EventStream};
use crate::snapshot::{Snapshot, SnapshotStore};

/// Snapshot store backed by a map
pub struct InMemorySnapshotStore<S> {
    snapshots: RwLock<HashMap<EntityId, Snapshot<S>>>,
    saves: AtomicU64,
}

impl<S> InMemorySnapshotStore<S> {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            snapshots: RwLock::new(HashMap::new()),
            saves: AtomicU64::new(0),
        }
    }

    /// Create a store pre-seeded with one snapshot
    pub fn with_snapshot(entity_id: impl Into<EntityId>, snapshot: Snapshot<S>) -> Self {
        let mut snapshots = HashMap::new();
        snapshots.insert(entity_id.into(), snapshot);
        Self {
            snapshots: RwLock::new(snapshots),
            saves: AtomicU64::new(0),
        }
    }

    /// Number of successful `save_snapshot` calls
    pub fn save_count(&self) -> u64 {
        self.saves.load(Ordering::SeqCst)
    }

    /// Number of entities with a snapshot
    pub async fn len(&self) -> usize {
        self.snapshots.read().await.len()
    }

    /// Whether no snapshots are stored
    pub async fn is_empty(&self) -> bool {
        self.snapshots.read().await.is_empty()
    }
}

impl<S> Default for InMemorySnapshotStore<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<S> SnapshotStore<S> for InMemorySnapshotStore<S>
where
    S: Clone + Send + Sync,
{
    async fn get_snapshot(&self, entity_id: &str) -> QueryModelResult<Snapshot<S>> {
        let snapshots = self.snapshots.read().await;
        Ok(snapshots.get(entity_id).cloned().unwrap_or_default())
    }

    async fn save_snapshot(
        &self,
        entity_id: &str,
        state: &S,
        version: i64,
    ) -> QueryModelResult<()> {
        let mut snapshots = self.snapshots.write().await;
        snapshots.insert(entity_id.to_string(), Snapshot::new(state.clone(), version));
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Clone)]
struct RecordedEvent {
    version: i64,
    event: DynEvent,
}

/// Event source backed by per-entity ordered logs
///
/// Versions share the snapshot's unit: [`record_now`](Self::record_now)
/// stamps events with the clock's Unix-millisecond time.
pub struct InMemoryEventSource {
    streams: StdRwLock<HashMap<EntityId, Vec<RecordedEvent>>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryEventSource {
    /// Create an empty source on the system clock
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty source on a custom clock
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            streams: StdRwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Record an event at an explicit version
    ///
    /// # Errors
    ///
    /// `EventSource` if `version` is not greater than the entity's last version.
    pub fn record<E: DomainEvent>(
        &self,
        entity_id: impl Into<EntityId>,
        version: i64,
        event: E,
    ) -> QueryModelResult<()> {
        let entity_id = entity_id.into();
        let mut streams = self.streams.write().unwrap_or_else(PoisonError::into_inner);
        let stream = streams.entry(entity_id.clone()).or_default();

        if let Some(last) = stream.last() {
            if version <= last.version {
                return Err(QueryModelError::event_source(format!(
                    "version {} for {} is not after {}",
                    version, entity_id, last.version
                )));
            }
        }

        stream.push(RecordedEvent {
            version,
            event: erase(event),
        });
        Ok(())
    }

    /// Record an event stamped with the current clock time
    ///
    /// The version is bumped past the entity's last version when the clock
    /// has not moved. Returns the assigned version.
    pub fn record_now<E: DomainEvent>(&self, entity_id: impl Into<EntityId>, event: E) -> i64 {
        let entity_id = entity_id.into();
        let now = self.clock.now_millis();
        let mut streams = self.streams.write().unwrap_or_else(PoisonError::into_inner);
        let stream = streams.entry(entity_id).or_default();

        let version = match stream.last() {
            Some(last) if last.version >= now => last.version + 1,
            _ => now,
        };

        stream.push(RecordedEvent {
            version,
            event: erase(event),
        });
        version
    }

    /// Number of events recorded for an entity
    pub fn len(&self, entity_id: &str) -> usize {
        self.streams
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(entity_id)
            .map_or(0, Vec::len)
    }
}

impl Default for InMemoryEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSource for InMemoryEventSource {
    fn stream_events(
        &self,
        entity_id: &str,
        event_types: &[EventType],
        from_version: i64,
    ) -> EventStream<'_> {
        let suffix: Vec<DynEvent> = self
            .streams
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(entity_id)
            .map(|stream| {
                stream
                    .iter()
                    .filter(|recorded| recorded.version > from_version)
                    .filter(|recorded| event_types.contains(&recorded.event.event_type()))
                    .map(|recorded| Arc::clone(&recorded.event))
                    .collect()
            })
            .unwrap_or_default();

        debug!(
            entity_id,
            from_version,
            events = suffix.len(),
            "Streaming in-memory events"
        );

        stream::iter(suffix.into_iter().map(Ok)).boxed()
    }
}
