// Copyright (c) 2025 - Cowboy AI, Inc.
//! Handler Registry
//!
//! Compiles a model's [`Handles`] declarations into a dispatch table keyed by
//! event type. Each entry holds the type-erased correlation rule and fold
//! rule for one event type, so replay can route an erased event in O(1).
//!
//! The table is built once, when the engine is constructed, and is read-only
//! afterwards.

use futures::future::{self, BoxFuture};
use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;

use crate::errors::{HandlerError, QueryModelError, QueryModelResult};
use crate::event::{downcast, AnyEvent, DomainEvent, EntityId, EventType};
use crate::model::{Handles, QueryModel};

type CorrelateFn<M> = fn(&M, &dyn AnyEvent) -> Option<EntityId>;

type FoldFn<M> = for<'a> fn(
    &'a M,
    <M as QueryModel>::State,
    &'a dyn AnyEvent,
) -> BoxFuture<'a, Result<<M as QueryModel>::State, HandlerError>>;

fn correlate_erased<M, E>(model: &M, event: &dyn AnyEvent) -> Option<EntityId>
where
    M: Handles<E>,
    E: DomainEvent,
{
    downcast::<E>(event).map(|event| model.correlate(event))
}

fn fold_erased<'a, M, E>(
    model: &'a M,
    state: M::State,
    event: &'a dyn AnyEvent,
) -> BoxFuture<'a, Result<M::State, HandlerError>>
where
    M: Handles<E>,
    E: DomainEvent,
{
    match downcast::<E>(event) {
        Some(event) => model.handle(state, event),
        None => Box::pin(future::ready(Err(HandlerError::new(format!(
            "event is not a {}",
            E::EVENT_TYPE
        ))))),
    }
}

/// Correlation and fold rules for one event type
pub struct HandlerBinding<M: QueryModel> {
    event_type: EventType,
    correlate: CorrelateFn<M>,
    fold: FoldFn<M>,
}

impl<M: QueryModel> HandlerBinding<M> {
    fn new<E>() -> Self
    where
        M: Handles<E>,
        E: DomainEvent,
    {
        Self {
            event_type: EventType::of::<E>(),
            correlate: correlate_erased::<M, E>,
            fold: fold_erased::<M, E>,
        }
    }

    /// Event type this binding handles
    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    /// Run the correlation rule
    ///
    /// Returns `None` if the event is not of this binding's type.
    pub fn correlate(&self, model: &M, event: &dyn AnyEvent) -> Option<EntityId> {
        (self.correlate)(model, event)
    }

    /// Run the fold rule
    pub fn fold<'a>(
        &self,
        model: &'a M,
        state: M::State,
        event: &'a dyn AnyEvent,
    ) -> BoxFuture<'a, Result<M::State, HandlerError>> {
        (self.fold)(model, state, event)
    }
}

impl<M: QueryModel> fmt::Debug for HandlerBinding<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerBinding")
            .field("event_type", &self.event_type.name())
            .finish()
    }
}

/// Dispatch table from event type to handler binding
pub struct HandlerRegistry<M: QueryModel> {
    bindings: HashMap<TypeId, HandlerBinding<M>>,
}

impl<M: QueryModel> HandlerRegistry<M> {
    /// Start an empty builder
    pub fn builder() -> HandlerRegistryBuilder<M> {
        HandlerRegistryBuilder {
            bindings: HashMap::new(),
        }
    }

    /// Build the registry `M` declares in [`QueryModel::register`]
    pub fn for_model() -> QueryModelResult<Self> {
        M::register(Self::builder())?.build()
    }

    /// Binding for an erased event, or `None` if the model does not handle its type
    pub fn binding_for(&self, event: &dyn AnyEvent) -> Option<&HandlerBinding<M>> {
        self.bindings.get(&event.event_type().id())
    }

    /// Whether `E` is handled
    pub fn supports<E: DomainEvent>(&self) -> bool {
        self.bindings.contains_key(&TypeId::of::<E>())
    }

    /// Every handled event type, ordered by name
    pub fn event_types(&self) -> Vec<EventType> {
        let mut types: Vec<EventType> = self.bindings.values().map(|b| b.event_type).collect();
        types.sort_by_key(|t| t.name());
        types
    }

    /// Number of handled event types
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Whether no event types are handled
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl<M: QueryModel> fmt::Debug for HandlerRegistry<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("model", &M::NAME)
            .field(
                "event_types",
                &self.event_types().iter().map(|t| t.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Collects a model's handler declarations
pub struct HandlerRegistryBuilder<M: QueryModel> {
    bindings: HashMap<TypeId, HandlerBinding<M>>,
}

impl<M: QueryModel> HandlerRegistryBuilder<M> {
    /// Declare that the model handles `E`
    ///
    /// # Errors
    ///
    /// - `Configuration` if `E` is already registered
    /// - `Configuration` if another event type already uses `E::EVENT_TYPE`
    pub fn handle<E>(mut self) -> QueryModelResult<Self>
    where
        M: Handles<E>,
        E: DomainEvent,
    {
        let event_type = EventType::of::<E>();

        if self.bindings.contains_key(&event_type.id()) {
            return Err(QueryModelError::configuration(format!(
                "{} registers a handler for {} more than once",
                M::NAME,
                event_type
            )));
        }

        if self
            .bindings
            .values()
            .any(|b| b.event_type.name() == event_type.name())
        {
            return Err(QueryModelError::configuration(format!(
                "{} registers two event types named {}",
                M::NAME,
                event_type
            )));
        }

        self.bindings
            .insert(event_type.id(), HandlerBinding::new::<E>());
        Ok(self)
    }

    /// Finish the registry
    ///
    /// # Errors
    ///
    /// `Configuration` if no event types were registered.
    pub fn build(self) -> QueryModelResult<HandlerRegistry<M>> {
        if self.bindings.is_empty() {
            return Err(QueryModelError::configuration(format!(
                "{} registers no event handlers",
                M::NAME
            )));
        }

        Ok(HandlerRegistry {
            bindings: self.bindings,
        })
    }
}
