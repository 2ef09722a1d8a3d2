// Copyright (c) 2025 - Cowboy AI, Inc.
//! Query Model Capability Contract
//!
//! A query model declares:
//!
//! - its state type and initial state ([`QueryModel`]);
//! - for each event type it understands, how that event correlates to an
//!   entity and how it folds into state ([`Handles`]);
//! - the list of those event types, registered in [`QueryModel::register`].
//!
//! Adding a new event to a model means one new `Handles<E>` impl and one
//! `.handle::<E>()` line; the replay loop never changes.
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use cim_query_model::{
//!     DomainEvent, Handles, HandlerError, HandlerRegistryBuilder, QueryModel, QueryModelResult,
//! };
//!
//! struct Deposited { account: String, amount: i64 }
//!
//! impl DomainEvent for Deposited {
//!     const EVENT_TYPE: &'static str = "account.deposited";
//! }
//!
//! struct Balance;
//!
//! impl QueryModel for Balance {
//!     type State = i64;
//!     const NAME: &'static str = "balance";
//!
//!     fn initial_state(&self) -> i64 { 0 }
//!
//!     fn register(
//!         registry: HandlerRegistryBuilder<Self>,
//!     ) -> QueryModelResult<HandlerRegistryBuilder<Self>> {
//!         registry.handle::<Deposited>()
//!     }
//! }
//!
//! #[async_trait]
//! impl Handles<Deposited> for Balance {
//!     fn correlate(&self, event: &Deposited) -> String {
//!         event.account.clone()
//!     }
//!
//!     async fn handle(&self, state: i64, event: &Deposited) -> Result<i64, HandlerError> {
//!         Ok(state + event.amount)
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::errors::{HandlerError, QueryModelResult};
use crate::event::{DomainEvent, EntityId};
use crate::registry::HandlerRegistryBuilder;

/// A projection from an entity's events to a materialized state
pub trait QueryModel: Send + Sync + Sized + 'static {
    /// Materialized view produced by folding
    type State: Clone + Send + Sync + 'static;

    /// Name used in logs and errors
    const NAME: &'static str;

    /// State of an entity with no snapshot and no events folded yet
    fn initial_state(&self) -> Self::State;

    /// List every event type this model handles
    fn register(
        registry: HandlerRegistryBuilder<Self>,
    ) -> QueryModelResult<HandlerRegistryBuilder<Self>>;
}

/// Capability to fold events of type `E`
///
/// The state type is the model's own, so a handler for a different state
/// type cannot be registered.
#[async_trait]
pub trait Handles<E: DomainEvent>: QueryModel {
    /// Entity the event belongs to
    fn correlate(&self, event: &E) -> EntityId;

    /// Produce the next state from the current one and the event
    async fn handle(&self, state: Self::State, event: &E) -> Result<Self::State, HandlerError>;
}
