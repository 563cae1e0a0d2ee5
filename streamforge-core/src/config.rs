//! Byte-addressable configuration map and eager value serialization.
//!
//! Vertex settings travel to the runtime as opaque bytes inside each job
//! vertex. [`Configuration`] is the underlying key/value store; typed access
//! for operator settings lives in [`crate::graph::StreamConfig`].

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{PlanError, Result};

/// A map of string keys to serialized values.
///
/// Keys are ordered so that serializing the same logical configuration twice
/// yields identical bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    entries: BTreeMap<String, Vec<u8>>,
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize `value` under `key`, replacing any previous entry.
    pub fn set<T: Serialize>(&mut self, key: &str, value: &T) -> Result<()> {
        let bytes =
            bincode::serialize(value).map_err(|source| PlanError::ConfigValueNotSerializable {
                key: key.to_string(),
                source,
            })?;
        self.entries.insert(key.to_string(), bytes);
        Ok(())
    }

    /// Decode the value stored under `key`, or `None` if absent or of a
    /// different shape.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.entries
            .get(key)
            .and_then(|bytes| bincode::deserialize(bytes).ok())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// An eagerly serialized value.
///
/// User-supplied objects (execution config, master hooks, state backends) are
/// serialized at compile time so that a non-serializable object fails the
/// submission instead of the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedValue {
    bytes: Vec<u8>,
}

impl SerializedValue {
    pub fn new<T: Serialize>(value: &T) -> std::result::Result<Self, bincode::Error> {
        Ok(Self {
            bytes: bincode::serialize(value)?,
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn deserialize<T: DeserializeOwned>(&self) -> std::result::Result<T, bincode::Error> {
        bincode::deserialize(&self.bytes)
    }
}

/// Whether operators see processing time, ingestion time, or event time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeCharacteristic {
    ProcessingTime,
    IngestionTime,
    EventTime,
}

/// Job-wide execution settings, serialized into the job graph as a blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Parallelism applied to nodes that declare none. `-1` keeps the
    /// cluster default.
    pub default_parallelism: i32,
    /// Interval in milliseconds between automatic watermark emissions.
    pub auto_watermark_interval: i64,
    /// Whether a task fails when its checkpoint fails. Propagated from the
    /// checkpoint config during compilation.
    pub fail_task_on_checkpoint_error: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            default_parallelism: -1,
            auto_watermark_interval: 200,
            fail_task_on_checkpoint_error: true,
        }
    }
}
