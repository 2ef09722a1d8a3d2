// Copyright (c) 2025 - Cowboy AI, Inc.
//! Events and Event Types
//!
//! Events reach the engine type-erased. The concrete Rust type of an event is
//! its dispatch key: distinct event shapes are distinct types, not a tag
//! field. Each type also carries a stable name used in logs and on the wire.
//!
//! ```rust
//! use cim_query_model::{DomainEvent, EventType};
//!
//! struct EmployeeAssigned {
//!     project_id: String,
//!     employee_id: String,
//! }
//!
//! impl DomainEvent for EmployeeAssigned {
//!     const EVENT_TYPE: &'static str = "project.employee_assigned";
//! }
//!
//! let ty = EventType::of::<EmployeeAssigned>();
//! assert_eq!(ty.name(), "project.employee_assigned");
//! ```

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Identity of the entity whose events and snapshots are being handled
pub type EntityId = String;

/// A domain event the engine can dispatch on
///
/// Events are immutable facts. The engine never mutates them.
pub trait DomainEvent: Any + Send + Sync {
    /// Stable, unique name of this event type
    const EVENT_TYPE: &'static str;
}

/// Runtime identifier of an event type
///
/// Equality and hashing use the Rust type identity; the name is carried for
/// logging and for sources that filter by name.
#[derive(Debug, Clone, Copy)]
pub struct EventType {
    id: TypeId,
    name: &'static str,
}

impl EventType {
    /// Event type of `E`
    pub fn of<E: DomainEvent>() -> Self {
        Self {
            id: TypeId::of::<E>(),
            name: E::EVENT_TYPE,
        }
    }

    /// Rust type identity
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Stable event type name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether this identifies `E`
    pub fn is<E: DomainEvent>(&self) -> bool {
        self.id == TypeId::of::<E>()
    }
}

impl PartialEq for EventType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EventType {}

impl Hash for EventType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Object-safe view of a [`DomainEvent`]
///
/// Implemented for every `DomainEvent`; never implement it by hand.
pub trait AnyEvent: Send + Sync {
    /// Event type of the concrete event
    fn event_type(&self) -> EventType;

    /// Borrow the concrete event for downcasting
    fn as_any(&self) -> &dyn Any;
}

impl<E: DomainEvent> AnyEvent for E {
    fn event_type(&self) -> EventType {
        EventType::of::<E>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Debug for dyn AnyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AnyEvent").field(&self.event_type().name()).finish()
    }
}

/// A type-erased, shareable event as yielded by an event source
pub type DynEvent = Arc<dyn AnyEvent>;

/// Erase a concrete event into a [`DynEvent`]
pub fn erase<E: DomainEvent>(event: E) -> DynEvent {
    Arc::new(event)
}

/// Borrow the concrete event behind a [`DynEvent`], if it is an `E`
pub fn downcast<E: DomainEvent>(event: &dyn AnyEvent) -> Option<&E> {
    event.as_any().downcast_ref::<E>()
}
