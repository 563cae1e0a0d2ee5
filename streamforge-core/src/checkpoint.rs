//! Checkpoint configuration and the coordination descriptor attached to a
//! compiled job graph.

use serde::{Deserialize, Serialize};

use crate::config::SerializedValue;
use crate::types::JobVertexId;

/// Consistency guarantee of the checkpointing protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckpointingMode {
    ExactlyOnce,
    AtLeastOnce,
}

/// What happens to an externalized checkpoint when the job is cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExternalizedCheckpointCleanup {
    DeleteOnCancellation,
    RetainOnCancellation,
}

impl ExternalizedCheckpointCleanup {
    pub fn delete_on_cancellation(&self) -> bool {
        matches!(self, ExternalizedCheckpointCleanup::DeleteOnCancellation)
    }
}

/// Retention of completed checkpoints after the job reaches a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckpointRetentionPolicy {
    NeverRetainAfterTermination,
    RetainOnFailure,
    RetainOnCancellation,
}

/// User-facing checkpoint settings read from the stream graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// Interval in milliseconds between checkpoint triggers. Values <= 0
    /// disable periodic checkpointing.
    pub interval: i64,
    /// Time in milliseconds after which an in-flight checkpoint is aborted.
    pub timeout: i64,
    pub min_pause_between_checkpoints: i64,
    pub max_concurrent_checkpoints: u32,
    pub mode: CheckpointingMode,
    /// Whether completed checkpoints are persisted outside the job lifecycle.
    pub externalized: bool,
    /// Cleanup behavior for externalized checkpoints. Must be set when
    /// `externalized` is true.
    pub externalized_cleanup: Option<ExternalizedCheckpointCleanup>,
    pub fail_on_checkpointing_errors: bool,
}

impl CheckpointConfig {
    pub fn is_checkpointing_enabled(&self) -> bool {
        self.interval > 0
    }
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            interval: -1,
            timeout: 10 * 60 * 1000,
            min_pause_between_checkpoints: 0,
            max_concurrent_checkpoints: 1,
            mode: CheckpointingMode::ExactlyOnce,
            externalized: false,
            externalized_cleanup: None,
            fail_on_checkpointing_errors: true,
        }
    }
}

/// Settings handed to the checkpoint coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointCoordinatorConfiguration {
    /// Trigger interval in milliseconds; `i64::MAX` means periodic
    /// checkpointing is disabled.
    pub checkpoint_interval: i64,
    pub checkpoint_timeout: i64,
    pub min_pause_between_checkpoints: i64,
    pub max_concurrent_checkpoints: u32,
    pub retention_policy: CheckpointRetentionPolicy,
    pub exactly_once: bool,
}

/// The checkpointing coordination descriptor of a compiled job.
///
/// Trigger vertices receive "trigger checkpoint" messages (the input
/// vertices); ack and commit vertices participate in acknowledgement and
/// commit notification (all vertices).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCheckpointingSettings {
    pub trigger_vertices: Vec<JobVertexId>,
    pub ack_vertices: Vec<JobVertexId>,
    pub commit_vertices: Vec<JobVertexId>,
    pub coordinator_configuration: CheckpointCoordinatorConfiguration,
    /// Eagerly serialized state backend, if the graph declares one.
    pub serialized_state_backend: Option<SerializedValue>,
    /// Eagerly serialized master hook factories, if any operator declares
    /// the capability.
    pub serialized_master_hooks: Option<SerializedValue>,
}
