// Copyright (c) 2025 - Cowboy AI, Inc.
//! Test Fixtures for cim-query-model
//!
//! An employee/project allocation query model and deterministic helpers for
//! wiring it to in-memory collaborators.
//!
//! # Design Principles
//! - All versions are fixed constants around [`NOW`] (no `Utc::now()`)
//! - The engine clock is always a `ManualClock`
//! - Fixtures are the only place that constructs domain events

#![allow(dead_code)]

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use cim_query_model::{
    DomainEvent, EntityId, HandlerError, HandlerRegistryBuilder, Handles, InMemoryEventSource,
    InMemorySnapshotStore, ManualClock, ProjectionEngine, QueryModel, QueryModelResult,
    QueryModelServices, SnapshotConfig,
};

// Fixed engine time (2026-01-19T12:00:00Z) in Unix milliseconds
pub const NOW: i64 = 1_768_824_000_000;

/// A snapshot version recent enough that the interval threshold is not met
pub const RECENT: i64 = NOW - 60_000;

pub const EMPLOYEE_1: &str = "employee-123";
pub const EMPLOYEE_2: &str = "employee-456";

pub const PROJECT_A: &str = "project-a";
pub const PROJECT_B: &str = "project-b";
pub const PROJECT_C: &str = "project-c";

// ============================================================================
// Events
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmployeeAssigned {
    pub project_id: String,
    pub employee_id: String,
}

impl DomainEvent for EmployeeAssigned {
    const EVENT_TYPE: &'static str = "project.employee_assigned";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmployeeUnassigned {
    pub project_id: String,
    pub employee_id: String,
}

impl DomainEvent for EmployeeUnassigned {
    const EVENT_TYPE: &'static str = "project.employee_unassigned";
}

/// An event the allocation model does not handle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectArchived {
    pub project_id: String,
}

impl DomainEvent for ProjectArchived {
    const EVENT_TYPE: &'static str = "project.archived";
}

pub fn assigned(project_id: &str, employee_id: &str) -> EmployeeAssigned {
    EmployeeAssigned {
        project_id: project_id.to_string(),
        employee_id: employee_id.to_string(),
    }
}

pub fn unassigned(project_id: &str, employee_id: &str) -> EmployeeUnassigned {
    EmployeeUnassigned {
        project_id: project_id.to_string(),
        employee_id: employee_id.to_string(),
    }
}

pub fn archived(project_id: &str) -> ProjectArchived {
    ProjectArchived {
        project_id: project_id.to_string(),
    }
}

// ============================================================================
// Query Model
// ============================================================================

/// Projects an employee is currently allocated to, in assignment order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub project_ids: Vec<String>,
}

impl Allocation {
    pub fn of(project_ids: &[&str]) -> Self {
        Self {
            project_ids: project_ids.iter().map(|p| p.to_string()).collect(),
        }
    }
}

/// Allocation of employees to projects, keyed by employee
///
/// Assigning an employee to a project they are already on is a fold
/// failure; unassigning from a project they are not on is a no-op.
pub struct EmployeeProjectAllocation;

impl QueryModel for EmployeeProjectAllocation {
    type State = Allocation;
    const NAME: &'static str = "employee_project_allocation";

    fn initial_state(&self) -> Allocation {
        Allocation::default()
    }

    fn register(
        registry: HandlerRegistryBuilder<Self>,
    ) -> QueryModelResult<HandlerRegistryBuilder<Self>> {
        registry
            .handle::<EmployeeAssigned>()?
            .handle::<EmployeeUnassigned>()
    }
}

#[async_trait]
impl Handles<EmployeeAssigned> for EmployeeProjectAllocation {
    fn correlate(&self, event: &EmployeeAssigned) -> EntityId {
        event.employee_id.clone()
    }

    async fn handle(
        &self,
        mut state: Allocation,
        event: &EmployeeAssigned,
    ) -> Result<Allocation, HandlerError> {
        tokio::task::yield_now().await;
        if state.project_ids.contains(&event.project_id) {
            return Err(HandlerError::new(format!(
                "already assigned to {}",
                event.project_id
            )));
        }
        state.project_ids.push(event.project_id.clone());
        Ok(state)
    }
}

#[async_trait]
impl Handles<EmployeeUnassigned> for EmployeeProjectAllocation {
    fn correlate(&self, event: &EmployeeUnassigned) -> EntityId {
        event.employee_id.clone()
    }

    async fn handle(
        &self,
        mut state: Allocation,
        event: &EmployeeUnassigned,
    ) -> Result<Allocation, HandlerError> {
        tokio::task::yield_now().await;
        state.project_ids.retain(|p| p != &event.project_id);
        Ok(state)
    }
}

// ============================================================================
// Wiring
// ============================================================================

/// Install a test subscriber once; output shows with `--nocapture`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Services over the given collaborators, clocked at [`NOW`]
pub fn services(
    store: Arc<InMemorySnapshotStore<Allocation>>,
    source: Arc<InMemoryEventSource>,
    config: SnapshotConfig,
) -> QueryModelServices<Allocation> {
    QueryModelServices::<Allocation>::new(store, source)
        .with_config(config)
        .with_clock(Arc::new(ManualClock::new(NOW)))
}

/// Engine over the given collaborators with default thresholds
pub fn engine(
    store: Arc<InMemorySnapshotStore<Allocation>>,
    source: Arc<InMemoryEventSource>,
) -> ProjectionEngine<EmployeeProjectAllocation> {
    engine_with_config(store, source, SnapshotConfig::default())
}

/// Engine over the given collaborators with explicit thresholds
pub fn engine_with_config(
    store: Arc<InMemorySnapshotStore<Allocation>>,
    source: Arc<InMemoryEventSource>,
    config: SnapshotConfig,
) -> ProjectionEngine<EmployeeProjectAllocation> {
    ProjectionEngine::new(EmployeeProjectAllocation, services(store, source, config))
        .expect("allocation model registers cleanly")
}

/// Record events for one entity at consecutive versions after `after`
pub fn record_after<E: DomainEvent>(
    source: &InMemoryEventSource,
    entity_id: &str,
    after: i64,
    events: Vec<E>,
) {
    for (offset, event) in events.into_iter().enumerate() {
        source
            .record(entity_id, after + 1 + offset as i64, event)
            .expect("fixture versions increase");
    }
}
