// Copyright (c) 2025 - Cowboy AI, Inc.
//! Projection Engine
//!
//! Rebuilds a query model's state for one entity:
//!
//! ```text
//! SnapshotStore ──get──> (state?, version)
//!                               │
//! EventSource ──events > version──> registry lookup ─> correlate ─> fold
//!                                                                    │
//! SnapshotStore <──save(state, now)── SnapshotPolicy <── applied, age ┘
//! ```
//!
//! # Replay Semantics
//!
//! - Events are folded strictly in stream order, one at a time; each fold is
//!   awaited before the next event is pulled.
//! - Events of a type the model does not handle are skipped.
//! - Events that correlate to a different entity are skipped.
//! - A failed fold aborts the call; nothing is returned and no snapshot is
//!   written.
//! - A failed snapshot write is logged and reported in the outcome; the folded
//!   state is still returned.
//!
//! The engine holds no per-call state, so `get_state` may be called
//! concurrently for the same or different entities.

use futures::StreamExt;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::SnapshotConfig;
use crate::errors::{QueryModelError, QueryModelResult};
use crate::event::EventType;
use crate::event_source::EventSource;
use crate::model::QueryModel;
use crate::registry::HandlerRegistry;
use crate::snapshot::{SnapshotPolicy, SnapshotStore, SnapshotTrigger};

/// Collaborators a query model replays against
pub struct QueryModelServices<S> {
    /// Where snapshots are read from and written to
    pub snapshot_store: Arc<dyn SnapshotStore<S>>,

    /// Where events are streamed from
    pub event_source: Arc<dyn EventSource>,

    /// Snapshot thresholds
    pub config: SnapshotConfig,

    /// Time source for snapshot versions
    pub clock: Arc<dyn Clock>,
}

impl<S> QueryModelServices<S> {
    /// Bundle a snapshot store and event source with default configuration
    pub fn new(
        snapshot_store: Arc<dyn SnapshotStore<S>>,
        event_source: Arc<dyn EventSource>,
    ) -> Self {
        Self {
            snapshot_store,
            event_source,
            config: SnapshotConfig::default(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the snapshot configuration
    pub fn with_config(mut self, config: SnapshotConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the clock
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

impl<S> Clone for QueryModelServices<S> {
    fn clone(&self) -> Self {
        Self {
            snapshot_store: Arc::clone(&self.snapshot_store),
            event_source: Arc::clone(&self.event_source),
            config: self.config.clone(),
            clock: Arc::clone(&self.clock),
        }
    }
}

/// What happened to the snapshot at the end of a replay
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotOutcome {
    /// Neither threshold was met
    NotDue,

    /// A snapshot was written
    Saved {
        /// Version the snapshot was written at
        version: i64,
        /// Threshold that caused it
        trigger: SnapshotTrigger,
    },

    /// A snapshot was due but the write failed
    Failed {
        /// Threshold that caused the attempt
        trigger: SnapshotTrigger,
        /// Store failure message
        error: String,
    },
}

/// Folded state plus replay diagnostics
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedState<S> {
    /// The folded state
    pub state: S,

    /// Version replay resumed from
    pub from_version: i64,

    /// Events folded into the state
    pub events_applied: u64,

    /// Events skipped for unknown type or foreign correlation
    pub events_skipped: u64,

    /// Snapshot persistence result
    pub snapshot: SnapshotOutcome,
}

/// Replays a query model's events into state, snapshotting as configured
pub struct ProjectionEngine<M: QueryModel> {
    model: M,
    registry: HandlerRegistry<M>,
    event_types: Vec<EventType>,
    policy: SnapshotPolicy,
    services: QueryModelServices<M::State>,
}

impl<M: QueryModel> ProjectionEngine<M> {
    /// Build the engine and its handler registry
    ///
    /// # Errors
    ///
    /// `Configuration` if the model's handler declarations are inconsistent.
    pub fn new(model: M, services: QueryModelServices<M::State>) -> QueryModelResult<Self> {
        let registry = HandlerRegistry::<M>::for_model()?;
        let event_types = registry.event_types();
        let policy = SnapshotPolicy::from(&services.config);

        debug!(
            model = M::NAME,
            event_types = ?event_types.iter().map(|t| t.name()).collect::<Vec<_>>(),
            "Registered query model handlers"
        );

        Ok(Self {
            model,
            registry,
            event_types,
            policy,
            services,
        })
    }

    /// The query model
    pub fn model(&self) -> &M {
        &self.model
    }

    /// The compiled handler registry
    pub fn registry(&self) -> &HandlerRegistry<M> {
        &self.registry
    }

    /// The snapshot policy in effect
    pub fn policy(&self) -> SnapshotPolicy {
        self.policy
    }

    /// Current state of an entity
    pub async fn get_state(&self, entity_id: &str) -> QueryModelResult<M::State> {
        Ok(self.project(entity_id).await?.state)
    }

    /// Current state of an entity, with replay diagnostics
    ///
    /// # Errors
    ///
    /// - `SnapshotStore` if the snapshot cannot be read
    /// - `EventSource` (or any error the source yields) if streaming fails
    /// - `Handler` if a fold rule fails
    pub async fn project(&self, entity_id: &str) -> QueryModelResult<ProjectedState<M::State>> {
        let snapshot = self.services.snapshot_store.get_snapshot(entity_id).await?;
        let from_version = snapshot.version;
        let mut state = match snapshot.state {
            Some(state) => state,
            None => self.model.initial_state(),
        };

        debug!(
            model = M::NAME,
            entity_id,
            from_version,
            "Replaying events"
        );

        let mut events_applied: u64 = 0;
        let mut events_skipped: u64 = 0;
        let mut events = self
            .services
            .event_source
            .stream_events(entity_id, &self.event_types, from_version);

        while let Some(event) = events.next().await {
            let event = event?;

            let Some(binding) = self.registry.binding_for(&*event) else {
                trace!(
                    model = M::NAME,
                    entity_id,
                    event_type = event.event_type().name(),
                    "Skipping unhandled event type"
                );
                events_skipped += 1;
                continue;
            };

            match binding.correlate(&self.model, &*event) {
                Some(correlated) if correlated == entity_id => {}
                correlated => {
                    trace!(
                        model = M::NAME,
                        entity_id,
                        correlated = ?correlated,
                        event_type = binding.event_type().name(),
                        "Skipping event for another entity"
                    );
                    events_skipped += 1;
                    continue;
                }
            }

            state = binding
                .fold(&self.model, state, &*event)
                .await
                .map_err(|e| QueryModelError::Handler {
                    model: M::NAME,
                    event_type: binding.event_type().name(),
                    entity_id: entity_id.to_string(),
                    reason: e.to_string(),
                })?;
            events_applied += 1;
        }
        drop(events);

        let snapshot = self
            .update_snapshot(entity_id, from_version, events_applied, &state)
            .await;

        debug!(
            model = M::NAME,
            entity_id,
            events_applied,
            events_skipped,
            "Replay finished"
        );

        Ok(ProjectedState {
            state,
            from_version,
            events_applied,
            events_skipped,
            snapshot,
        })
    }

    async fn update_snapshot(
        &self,
        entity_id: &str,
        from_version: i64,
        events_applied: u64,
        state: &M::State,
    ) -> SnapshotOutcome {
        let now = self.services.clock.now_millis();
        let since_snapshot = SnapshotPolicy::elapsed_since(from_version, now);

        let Some(trigger) = self.policy.evaluate(events_applied, since_snapshot) else {
            return SnapshotOutcome::NotDue;
        };

        match self
            .services
            .snapshot_store
            .save_snapshot(entity_id, state, now)
            .await
        {
            Ok(()) => {
                info!(
                    model = M::NAME,
                    entity_id,
                    version = now,
                    %trigger,
                    "Saved snapshot"
                );
                SnapshotOutcome::Saved {
                    version: now,
                    trigger,
                }
            }
            Err(e) => {
                warn!(
                    model = M::NAME,
                    entity_id,
                    %trigger,
                    error = %e,
                    "Failed to save snapshot; returning folded state"
                );
                SnapshotOutcome::Failed {
                    trigger,
                    error: e.to_string(),
                }
            }
        }
    }
}

impl<M: QueryModel> fmt::Debug for ProjectionEngine<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectionEngine")
            .field("model", &M::NAME)
            .field("registry", &self.registry)
            .field("policy", &self.policy)
            .finish()
    }
}
