// Copyright (c) 2025 - Cowboy AI, Inc.
//! NATS JetStream Collaborators
//!
//! Durable implementations of the engine's two ports:
//!
//! - [`NatsKvSnapshotStore`]: snapshots in a JetStream key-value bucket
//! - [`JetStreamEventSource`]: event envelopes read from a JetStream stream
//!
//! # Layout
//!
//! ```text
//! KV bucket <bucket>        key   <model>.<entity key>
//!                           value {"state": .., "version": ..}
//!
//! Stream    <stream_name>   subject <prefix>.<entity key>.<event_type>
//!                           payload EventEnvelope (JSON)
//! ```
//!
//! Entity ids are escaped into a single subject token, see [`subject_token`].

mod event_source;
mod snapshot_store;

pub use event_source::{EventDecoders, EventEnvelope, JetStreamEventSource, JetStreamSourceConfig};
pub use snapshot_store::NatsKvSnapshotStore;

use async_nats::jetstream;
use async_nats::ConnectOptions;
use std::fmt::Write as _;
use std::time::Duration;
use tracing::info;

use crate::errors::{QueryModelError, QueryModelResult};

/// Configuration for NATS connection
#[derive(Debug, Clone)]
pub struct NatsConfig {
    /// NATS server URLs
    pub servers: Vec<String>,
    /// Client name
    pub name: String,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Request timeout
    pub request_timeout: Duration,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            servers: vec!["nats://localhost:4222".to_string()],
            name: "cim-query-model".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(5),
        }
    }
}

/// Connect to NATS and open a JetStream context
pub async fn connect_jetstream(config: &NatsConfig) -> QueryModelResult<jetstream::Context> {
    let connect_options = ConnectOptions::new()
        .name(&config.name)
        .connection_timeout(config.connect_timeout)
        .request_timeout(Some(config.request_timeout));

    let client = async_nats::connect_with_options(config.servers.join(","), connect_options)
        .await
        .map_err(|e| QueryModelError::Nats(e.to_string()))?;

    info!(servers = ?config.servers, "Connected to NATS");

    Ok(jetstream::new(client))
}

/// Escape a value into one NATS subject token
///
/// ASCII letters, digits and `-` pass through. Every other byte of the UTF-8
/// encoding becomes `_hh` (lowercase hex), so `.`, `*`, `>` and whitespace
/// never reach the subject and distinct inputs stay distinct.
pub fn subject_token(value: &str) -> String {
    let mut token = String::with_capacity(value.len());
    for byte in value.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            token.push(byte as char);
        } else {
            let _ = write!(token, "_{:02x}", byte);
        }
    }
    token
}

/// KV key of a model's snapshot for an entity
pub fn snapshot_key(model: &str, entity_id: &str) -> String {
    format!("{}.{}", subject_token(model), subject_token(entity_id))
}
