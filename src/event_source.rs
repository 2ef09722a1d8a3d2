// Copyright (c) 2025 - Cowboy AI, Inc.
//! Event Source Abstraction
//!
//! The engine reads an entity's events through this trait. The source owns
//! storage, ordering and decoding; the engine only needs a lazy, finite,
//! ordered stream of type-erased events.
//!
//! # Source Requirements
//!
//! 1. **Ordered**: events arrive in stream order
//! 2. **Suffix**: only events with a version strictly greater than `from_version`
//! 3. **Scoped**: only event types in `event_types`, only for `entity_id`
//! 4. **Finite**: the stream ends at the head of the stream as of the call
//!
//! Being over-inclusive on scope is allowed; the engine re-checks type and
//! correlation on every event.

use futures::stream::BoxStream;

use crate::errors::QueryModelResult;
use crate::event::{DynEvent, EventType};

/// Lazily produced events for one replay
///
/// Failures, including failure to open the stream, arrive as `Err` items.
pub type EventStream<'a> = BoxStream<'a, QueryModelResult<DynEvent>>;

/// Supplier of per-entity event streams
pub trait EventSource: Send + Sync {
    /// Stream the events of `entity_id` after `from_version`
    ///
    /// # Arguments
    ///
    /// * `entity_id` - Entity whose stream is read
    /// * `event_types` - Event types the caller can fold
    /// * `from_version` - Exclusive lower bound on event versions
    fn stream_events(
        &self,
        entity_id: &str,
        event_types: &[EventType],
        from_version: i64,
    ) -> EventStream<'_>;
}
