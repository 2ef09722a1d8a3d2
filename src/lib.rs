// Copyright (c) 2025 - Cowboy AI, Inc.
//! Query model projection engine for the Composable Information Machine
//!
//! A query model is a read-side view of an entity, rebuilt on demand by
//! folding the entity's events over its most recent snapshot:
//!
//! 1. load the snapshot (or start from the model's initial state);
//! 2. stream the entity's events newer than the snapshot;
//! 3. route each event by type to the model's fold rule, skipping events
//!    that belong to another entity;
//! 4. persist a fresh snapshot when enough events were folded or the old one
//!    is stale.
//!
//! Models declare the events they handle explicitly, through [`Handles`]
//! impls listed in [`QueryModel::register`]. The engine itself is generic
//! and never changes when a model grows new events.
//!
//! # Modules
//!
//! - [`model`]: the [`QueryModel`] and [`Handles`] contracts
//! - [`registry`]: type-indexed dispatch table built from a model
//! - [`engine`]: [`ProjectionEngine`], the replay and snapshot loop
//! - [`snapshot`]: [`Snapshot`], [`SnapshotStore`] and the snapshot policy
//! - [`event_source`]: the [`EventSource`] abstraction
//! - [`in_memory`]: process-local collaborators
//! - [`nats`]: JetStream collaborators (feature `nats`)

pub mod clock;
pub mod config;
pub mod engine;
pub mod errors;
pub mod event;
pub mod event_source;
pub mod in_memory;
pub mod model;
#[cfg(feature = "nats")]
pub mod nats;
pub mod registry;
pub mod snapshot;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::SnapshotConfig;
pub use engine::{ProjectedState, ProjectionEngine, QueryModelServices, SnapshotOutcome};
pub use errors::{HandlerError, QueryModelError, QueryModelResult};
pub use event::{erase, AnyEvent, DomainEvent, DynEvent, EntityId, EventType};
pub use event_source::{EventSource, EventStream};
pub use in_memory::{InMemoryEventSource, InMemorySnapshotStore};
pub use model::{Handles, QueryModel};
pub use registry::{HandlerRegistry, HandlerRegistryBuilder};
pub use snapshot::{Snapshot, SnapshotPolicy, SnapshotStore, SnapshotTrigger};

#[cfg(feature = "nats")]
pub use nats::{
    EventDecoders, EventEnvelope, JetStreamEventSource, JetStreamSourceConfig, NatsConfig,
    NatsKvSnapshotStore,
};
