// Copyright (c) 2025 - Cowboy AI, Inc.
//! Event source on a JetStream stream
//!
//! Events are stored as JSON [`EventEnvelope`]s. Reading decodes each
//! envelope's `data` into the concrete Rust event type registered for its
//! `event_type` in an [`EventDecoders`] table.

use async_nats::jetstream::consumer::{pull, DeliverPolicy, PullConsumer};
use async_nats::jetstream::{self, stream::Stream};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::{debug, info};
use uuid::Uuid;

use super::subject_token;
use crate::errors::{QueryModelError, QueryModelResult};
use crate::event::{erase, DomainEvent, DynEvent, EntityId, EventType};
use crate::event_source::{EventSource, EventStream};

/// Wire form of a stored event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique event ID (UUID v7 for time-ordering)
    pub event_id: Uuid,

    /// Entity this event was recorded for
    pub entity_id: EntityId,

    /// Position in the entity's stream, in Unix milliseconds
    pub version: i64,

    /// Event type name (for decoding)
    pub event_type: String,

    /// When the event was recorded
    pub timestamp: DateTime<Utc>,

    /// The event body
    pub data: serde_json::Value,
}

impl EventEnvelope {
    /// Wrap a domain event
    pub fn wrap<E>(
        entity_id: impl Into<EntityId>,
        version: i64,
        event: &E,
    ) -> QueryModelResult<Self>
    where
        E: DomainEvent + Serialize,
    {
        Ok(Self {
            event_id: Uuid::now_v7(),
            entity_id: entity_id.into(),
            version,
            event_type: E::EVENT_TYPE.to_string(),
            timestamp: Utc::now(),
            data: serde_json::to_value(event)?,
        })
    }
}

type DecodeFn = fn(serde_json::Value) -> QueryModelResult<DynEvent>;

fn decode_as<E>(data: serde_json::Value) -> QueryModelResult<DynEvent>
where
    E: DomainEvent + DeserializeOwned,
{
    serde_json::from_value::<E>(data)
        .map(erase)
        .map_err(|e| QueryModelError::Deserialization(format!("{}: {}", E::EVENT_TYPE, e)))
}

/// Table from event type name to decoder
#[derive(Default, Clone)]
pub struct EventDecoders {
    decoders: HashMap<&'static str, DecodeFn>,
}

impl EventDecoders {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode envelopes named `E::EVENT_TYPE` as `E`
    ///
    /// # Errors
    ///
    /// `Configuration` if the name already has a decoder.
    pub fn register<E>(mut self) -> QueryModelResult<Self>
    where
        E: DomainEvent + DeserializeOwned,
    {
        if self.decoders.contains_key(E::EVENT_TYPE) {
            return Err(QueryModelError::configuration(format!(
                "decoder for {} registered more than once",
                E::EVENT_TYPE
            )));
        }
        self.decoders.insert(E::EVENT_TYPE, decode_as::<E>);
        Ok(self)
    }

    /// Whether a decoder exists for the name
    pub fn contains(&self, event_type: &str) -> bool {
        self.decoders.contains_key(event_type)
    }

    /// Decode an envelope, or `None` if its type has no decoder
    pub fn decode(&self, envelope: EventEnvelope) -> Option<QueryModelResult<DynEvent>> {
        self.decoders
            .get(envelope.event_type.as_str())
            .map(|decode| decode(envelope.data))
    }
}

impl fmt::Debug for EventDecoders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.decoders.keys().collect();
        names.sort();
        f.debug_struct("EventDecoders").field("event_types", &names).finish()
    }
}

/// Configuration for the JetStream event source
#[derive(Debug, Clone)]
pub struct JetStreamSourceConfig {
    /// Stream name
    pub stream_name: String,

    /// Subject prefix; the stream captures `<prefix>.>`
    pub subject_prefix: String,

    /// Maximum messages per fetch
    pub batch_size: usize,

    /// How long a fetch waits for messages
    pub fetch_timeout: Duration,

    /// How far before `from_version` delivery starts
    ///
    /// Versions are stamped by producers and delivery start times are
    /// compared against server receive times, so the two clocks may differ
    /// by up to this much.
    pub clock_skew: Duration,
}

impl Default for JetStreamSourceConfig {
    fn default() -> Self {
        Self {
            stream_name: "QUERY_MODEL_EVENTS".to_string(),
            subject_prefix: "events".to_string(),
            batch_size: 1000,
            fetch_timeout: Duration::from_secs(2),
            clock_skew: Duration::from_secs(300),
        }
    }
}

impl JetStreamSourceConfig {
    /// Subject an event of `event_type` for `entity_id` is published on
    ///
    /// Format: `<prefix>.<entity token>.<event_type>`
    pub fn subject_for(&self, entity_id: &str, event_type: &str) -> String {
        format!(
            "{}.{}.{}",
            self.subject_prefix,
            subject_token(entity_id),
            event_type
        )
    }

    /// Filter matching every event of `entity_id`
    ///
    /// Format: `<prefix>.<entity token>.>`
    pub fn entity_filter(&self, entity_id: &str) -> String {
        format!("{}.{}.>", self.subject_prefix, subject_token(entity_id))
    }

    /// Delivery policy for a replay resuming after `from_version`
    ///
    /// Replays from version 0 read the whole subject. Later replays start at
    /// `from_version - clock_skew`; envelopes between that point and
    /// `from_version` are still dropped by the version check.
    pub fn deliver_policy(&self, from_version: i64) -> DeliverPolicy {
        let skew = i64::try_from(self.clock_skew.as_millis()).unwrap_or(i64::MAX);
        let start_millis = from_version.saturating_sub(skew);
        if from_version <= 0 || start_millis <= 0 {
            return DeliverPolicy::All;
        }

        match OffsetDateTime::from_unix_timestamp_nanos(i128::from(start_millis) * 1_000_000) {
            Ok(start_time) => DeliverPolicy::ByStartTime { start_time },
            Err(_) => DeliverPolicy::All,
        }
    }
}

/// Whether a read envelope belongs in a replay
///
/// Subject filtering already scopes reads to the entity's token; the entity
/// check here also rejects envelopes filed under the wrong subject.
fn selects(
    envelope: &EventEnvelope,
    entity_id: &str,
    type_names: &[&'static str],
    from_version: i64,
) -> bool {
    envelope.version > from_version
        && envelope.entity_id == entity_id
        && type_names.contains(&envelope.event_type.as_str())
}

/// Whether a fetch error only means the stream has nothing more to deliver
fn is_end_of_fetch(error: &str) -> bool {
    let error = error.to_lowercase();
    error.contains("timeout") || error.contains("timed out") || error.contains("no messages")
}

/// What one replay is reading
struct ReadScope {
    entity_id: EntityId,
    type_names: Vec<&'static str>,
    from_version: i64,
}

/// Position of one replay between fetches
struct ReadCursor {
    scope: ReadScope,
    consumer: Option<PullConsumer>,
    exhausted: bool,
}

/// Event source reading envelopes from a JetStream stream
///
/// Events are yielded in stream order, one fetch batch at a time; a batch is
/// only requested once the engine has folded the previous one.
pub struct JetStreamEventSource {
    stream: Stream,
    config: JetStreamSourceConfig,
    decoders: EventDecoders,
}

impl JetStreamEventSource {
    /// Get or create the stream and build the source
    pub async fn connect(
        jetstream: jetstream::Context,
        config: JetStreamSourceConfig,
        decoders: EventDecoders,
    ) -> QueryModelResult<Self> {
        let stream = jetstream
            .get_or_create_stream(jetstream::stream::Config {
                name: config.stream_name.clone(),
                subjects: vec![format!("{}.>", config.subject_prefix)],
                ..Default::default()
            })
            .await
            .map_err(|e| QueryModelError::Nats(e.to_string()))?;

        info!(
            stream = %config.stream_name,
            decoders = ?decoders,
            "Opened JetStream event source"
        );

        Ok(Self {
            stream,
            config,
            decoders,
        })
    }

    /// Configuration in use
    pub fn config(&self) -> &JetStreamSourceConfig {
        &self.config
    }

    async fn open_consumer(&self, scope: &ReadScope) -> QueryModelResult<PullConsumer> {
        let filter_subject = self.config.entity_filter(&scope.entity_id);
        let deliver_policy = self.config.deliver_policy(scope.from_version);

        debug!(
            filter_subject = %filter_subject,
            from_version = scope.from_version,
            deliver_policy = ?deliver_policy,
            "Opening replay consumer"
        );

        self.stream
            .create_consumer(pull::Config {
                filter_subject,
                deliver_policy,
                ..Default::default()
            })
            .await
            .map_err(|e| QueryModelError::event_source(e.to_string()))
    }

    /// Fetch, filter and decode the next batch of a replay
    ///
    /// Returns `None` once the stream is exhausted.
    async fn next_batch(
        &self,
        mut cursor: ReadCursor,
    ) -> QueryModelResult<Option<(Vec<DynEvent>, ReadCursor)>> {
        let consumer = match cursor.consumer.take() {
            Some(consumer) => consumer,
            None if cursor.exhausted => return Ok(None),
            None => self.open_consumer(&cursor.scope).await?,
        };

        // An empty fetch times out; that is the end of the stream
        let mut messages = match consumer
            .fetch()
            .max_messages(self.config.batch_size)
            .expires(self.config.fetch_timeout)
            .messages()
            .await
        {
            Ok(msgs) => msgs,
            Err(e) if is_end_of_fetch(&e.to_string()) => return Ok(None),
            Err(e) => return Err(QueryModelError::event_source(e.to_string())),
        };

        let scope = &cursor.scope;
        let mut batch = Vec::new();
        let mut batch_count = 0;

        while let Some(message) = messages.next().await {
            let msg = message.map_err(|e| QueryModelError::event_source(e.to_string()))?;

            let envelope: EventEnvelope = serde_json::from_slice(&msg.payload)
                .map_err(|e| QueryModelError::Deserialization(e.to_string()))?;

            msg.ack()
                .await
                .map_err(|e| QueryModelError::event_source(e.to_string()))?;
            batch_count += 1;

            if !selects(&envelope, &scope.entity_id, &scope.type_names, scope.from_version) {
                continue;
            }

            let event_type = envelope.event_type.clone();
            match self.decoders.decode(envelope) {
                Some(event) => batch.push(event?),
                None => debug!(event_type = %event_type, "No decoder for event type; skipping"),
            }
        }

        debug!(
            entity_id = %scope.entity_id,
            fetched = batch_count,
            selected = batch.len(),
            "Read event batch"
        );

        if batch_count < self.config.batch_size {
            cursor.exhausted = true;
        } else {
            cursor.consumer = Some(consumer);
        }

        Ok(Some((batch, cursor)))
    }
}

impl EventSource for JetStreamEventSource {
    fn stream_events(
        &self,
        entity_id: &str,
        event_types: &[EventType],
        from_version: i64,
    ) -> EventStream<'_> {
        let cursor = ReadCursor {
            scope: ReadScope {
                entity_id: entity_id.to_string(),
                type_names: event_types.iter().map(|t| t.name()).collect(),
                from_version,
            },
            consumer: None,
            exhausted: false,
        };

        stream::try_unfold(cursor, move |cursor| self.next_batch(cursor))
            .map_ok(|batch| stream::iter(batch.into_iter().map(Ok)))
            .try_flatten()
            .boxed()
    }
}
