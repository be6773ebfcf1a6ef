use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tidemark_shared::kv::KVStore;
use tracing::debug;

use super::CompanyCheckpoint;
use crate::{Error, Result};

/// Persisted form of a timestamp watermark.
#[derive(Debug, Serialize, Deserialize)]
struct StoredWatermark {
    most_recent_date_seen: String,
}

/// Typed access to collector state in a [KVStore], one JSON document per key.
#[derive(Clone)]
pub struct WatermarkStore {
    kv: Arc<dyn KVStore>,
}

impl std::fmt::Debug for WatermarkStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatermarkStore")
            .field("kv", &self.kv.name())
            .finish()
    }
}

impl WatermarkStore {
    pub fn new(kv: Arc<dyn KVStore>) -> Self {
        Self { kv }
    }

    pub async fn read(&self, key: &str) -> Result<Option<DateTime<Utc>>> {
        let Some(stored) = self.read_document::<StoredWatermark>(key).await? else {
            return Ok(None);
        };

        DateTime::parse_from_rfc3339(&stored.most_recent_date_seen)
            .map(|at| Some(at.with_timezone(&Utc)))
            .map_err(|e| {
                Error::CorruptCheckpoint(format!(
                    "{key}: invalid date {}: {e}",
                    stored.most_recent_date_seen
                ))
            })
    }

    pub async fn write(&self, key: &str, watermark: DateTime<Utc>) -> Result<()> {
        let stored = StoredWatermark {
            most_recent_date_seen: watermark.to_rfc3339_opts(SecondsFormat::Micros, true),
        };
        self.write_document(key, &stored).await
    }

    pub async fn read_checkpoint(&self, key: &str) -> Result<Option<CompanyCheckpoint>> {
        self.read_document(key).await
    }

    pub async fn write_checkpoint(&self, key: &str, checkpoint: &CompanyCheckpoint) -> Result<()> {
        self.write_document(key, checkpoint).await
    }

    async fn read_document<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: for<'de> Deserialize<'de>,
    {
        let value = self
            .kv
            .get(key)
            .await
            .map_err(|e| Error::StorageUnavailable(format!("{}/{key}: {e}", self.kv.name())))?;

        let Some(value) = value else {
            debug!(key, "No stored state");
            return Ok(None);
        };

        serde_json::from_slice(&value)
            .map(Some)
            .map_err(|e| Error::CorruptCheckpoint(format!("{key}: {e}")))
    }

    async fn write_document<T: Serialize>(&self, key: &str, document: &T) -> Result<()> {
        let value = serde_json::to_vec(document)
            .map_err(|e| Error::CheckpointWrite(format!("{key}: {e}")))?;

        self.kv
            .put(key, Bytes::from(value))
            .await
            .map_err(|e| Error::CheckpointWrite(format!("{}/{key}: {e}", self.kv.name())))
    }
}
