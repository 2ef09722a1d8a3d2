// Copyright (c) 2025 - Cowboy AI, Inc.
//! Snapshot store on a JetStream key-value bucket

use async_nats::jetstream::kv::{Config as KvConfig, Store as KvStore};
use async_nats::jetstream::Context as JetStreamContext;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use tracing::{debug, info};

use super::snapshot_key;
use crate::errors::{QueryModelError, QueryModelResult};
use crate::snapshot::{Snapshot, SnapshotStore};

/// Borrowed form of [`Snapshot`] for writing without cloning the state
#[derive(Serialize)]
struct SnapshotRef<'a, S> {
    state: &'a S,
    version: i64,
}

/// Snapshots of one query model, one KV entry per entity
///
/// The bucket keeps only the latest revision of each key.
pub struct NatsKvSnapshotStore<S> {
    kv: KvStore,
    model: String,
    _state: PhantomData<fn() -> S>,
}

impl<S> NatsKvSnapshotStore<S> {
    /// Open the bucket, creating it if it does not exist
    ///
    /// # Arguments
    ///
    /// * `jetstream` - JetStream context
    /// * `bucket` - KV bucket name
    /// * `model` - Query model name, used as the key namespace
    pub async fn open(
        jetstream: &JetStreamContext,
        bucket: &str,
        model: impl Into<String>,
    ) -> QueryModelResult<Self> {
        let kv = match jetstream.get_key_value(bucket).await {
            Ok(kv) => kv,
            Err(_) => {
                info!(bucket, "Creating snapshot bucket");
                jetstream
                    .create_key_value(KvConfig {
                        bucket: bucket.to_string(),
                        history: 1,
                        ..Default::default()
                    })
                    .await
                    .map_err(|e| QueryModelError::Nats(e.to_string()))?
            }
        };

        Ok(Self {
            kv,
            model: model.into(),
            _state: PhantomData,
        })
    }

    /// Key namespace of this store
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl<S> SnapshotStore<S> for NatsKvSnapshotStore<S>
where
    S: Serialize + DeserializeOwned + Send + Sync,
{
    async fn get_snapshot(&self, entity_id: &str) -> QueryModelResult<Snapshot<S>> {
        let key = snapshot_key(&self.model, entity_id);

        match self.kv.get(&key).await {
            Ok(Some(entry)) => serde_json::from_slice(&entry)
                .map_err(|e| QueryModelError::Deserialization(format!("snapshot {}: {}", key, e))),
            Ok(None) => {
                debug!(key = %key, "No snapshot in KV store");
                Ok(Snapshot::empty())
            }
            Err(e) => Err(QueryModelError::snapshot_store(format!("get {}: {}", key, e))),
        }
    }

    async fn save_snapshot(
        &self,
        entity_id: &str,
        state: &S,
        version: i64,
    ) -> QueryModelResult<()> {
        let key = snapshot_key(&self.model, entity_id);
        let data = serde_json::to_vec(&SnapshotRef { state, version })?;

        self.kv
            .put(&key, data.into())
            .await
            .map_err(|e| QueryModelError::snapshot_store(format!("put {}: {}", key, e)))?;

        debug!(key = %key, version, "Wrote snapshot to KV store");
        Ok(())
    }
}
