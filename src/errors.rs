// Copyright (c) 2025 - Cowboy AI, Inc.
//! Error types for query model construction and replay

use thiserror::Error;

/// Errors that can occur while building or replaying a query model
#[derive(Debug, Error)]
pub enum QueryModelError {
    /// A model declared its handlers inconsistently
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A fold rule failed while replaying an entity's events
    #[error("Handler for {event_type} in {model} failed on entity {entity_id}: {reason}")]
    Handler {
        /// Name of the query model whose handler failed
        model: &'static str,
        /// Name of the event type being folded
        event_type: &'static str,
        /// Entity whose projection was being built
        entity_id: String,
        /// Failure reported by the handler
        reason: String,
    },

    /// Reading from the event source failed
    #[error("Event source error: {0}")]
    EventSource(String),

    /// Reading or writing a snapshot failed
    #[error("Snapshot store error: {0}")]
    SnapshotStore(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// NATS transport error
    #[error("NATS error: {0}")]
    Nats(String),
}

/// Result type for query model operations
pub type QueryModelResult<T> = Result<T, QueryModelError>;

impl QueryModelError {
    /// Build a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Build an event source error
    pub fn event_source(msg: impl Into<String>) -> Self {
        Self::EventSource(msg.into())
    }

    /// Build a snapshot store error
    pub fn snapshot_store(msg: impl Into<String>) -> Self {
        Self::SnapshotStore(msg.into())
    }
}

impl From<serde_json::Error> for QueryModelError {
    fn from(err: serde_json::Error) -> Self {
        QueryModelError::Serialization(err.to_string())
    }
}

/// Failure returned by a fold rule
///
/// The engine attaches the model, event type and entity before surfacing it
/// as [`QueryModelError::Handler`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct HandlerError(String);

impl HandlerError {
    /// Create a handler error with a message
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// The failure message
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl From<String> for HandlerError {
    fn from(msg: String) -> Self {
        Self(msg)
    }
}

impl From<&str> for HandlerError {
    fn from(msg: &str) -> Self {
        Self(msg.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_error_display() {
        let err = QueryModelError::Handler {
            model: "allocations",
            event_type: "project.employee_assigned",
            entity_id: "employee123".to_string(),
            reason: "project is archived".to_string(),
        };

        assert_eq!(
            err.to_string(),
            "Handler for project.employee_assigned in allocations failed on entity employee123: \
             project is archived"
        );
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let err = serde_json::from_str::<u32>("not json").unwrap_err();
        let converted: QueryModelError = err.into();

        assert!(matches!(converted, QueryModelError::Serialization(_)));
    }

    #[test]
    fn test_handler_error_from_str() {
        let err: HandlerError = "boom".into();
        assert_eq!(err.message(), "boom");
        assert_eq!(err.to_string(), "boom");
    }
}
