//! The physical execution plan produced by the compiler.
//!
//! One [`JobVertex`] per operator chain; [`JobEdge`]s hang off their
//! downstream vertex. Vertex identities are content-derived so that an
//! unchanged graph resubmitted later maps onto the same state.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::checkpoint::JobCheckpointingSettings;
use crate::config::{Configuration, SerializedValue};
use crate::descriptors::{CachedFile, TaskKind};
use crate::types::{JobId, JobVertexId, OperatorId, ResourceSpec};

/// When vertices are brought up relative to their inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduleMode {
    /// Deploy every vertex immediately. Streaming jobs always use this.
    Eager,
    /// Deploy vertices as their inputs produce data.
    LazyFromSources,
}

/// How an upstream vertex's subtasks connect to a downstream vertex's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistributionPattern {
    /// Each producer reaches one or a few consumers.
    Pointwise,
    /// Every producer reaches every consumer.
    AllToAll,
}

/// How an intermediate result is materialized between vertices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultPartitionType {
    Pipelined,
    /// Pipelined with a bounded amount of in-flight data. Streaming jobs
    /// always use this.
    PipelinedBounded,
    Blocking,
}

/// Marker for which parallelism a vertex inherits at deployment.
pub const DEFAULT_PARALLELISM: i32 = -1;

/// A link between two job vertices, stored on the downstream vertex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobEdge {
    pub source: JobVertexId,
    pub target: JobVertexId,
    pub distribution_pattern: DistributionPattern,
    pub partition_type: ResultPartitionType,
    /// Display name of the originating partitioner.
    pub ship_strategy_name: String,
}

/// Distinguishes vertices whose input format is driven by the master.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobVertexKind {
    Plain,
    InputFormat,
}

/// Numeric handle of an interned slot-sharing group.
pub type SlotSharingGroupId = u32;

/// Numeric handle of an interned co-location group.
pub type CoLocationGroupId = u32;

/// A vertex in the job graph: one operator chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobVertex {
    pub id: JobVertexId,
    /// Concatenated from the chain members, e.g. `"Source -> Map"`.
    pub name: String,
    pub kind: JobVertexKind,
    /// Ids this vertex is also known under, from user-pinned hashes.
    pub alternative_ids: Vec<JobVertexId>,
    /// Identities of the chained operators, deepest member first.
    pub chained_operator_ids: Vec<OperatorId>,
    /// User-pinned identities aligned with `chained_operator_ids`; members
    /// without one hold `None`.
    pub user_defined_operator_ids: Vec<Option<OperatorId>>,
    pub task_kind: TaskKind,
    /// `-1` inherits the default at deployment.
    pub parallelism: i32,
    pub max_parallelism: u32,
    pub min_resources: ResourceSpec,
    pub preferred_resources: ResourceSpec,
    /// Serialized per-operator settings; populated from the chain head's
    /// stream config once compilation finishes.
    pub configuration: Configuration,
    /// Incoming edges, in connect order.
    pub inputs: Vec<JobEdge>,
    pub slot_sharing_group: Option<SlotSharingGroupId>,
    pub co_location_group: Option<CoLocationGroupId>,
}

impl JobVertex {
    pub fn new(id: JobVertexId, name: &str, kind: JobVertexKind, task_kind: TaskKind) -> Self {
        Self {
            id,
            name: name.to_string(),
            kind,
            alternative_ids: Vec::new(),
            chained_operator_ids: Vec::new(),
            user_defined_operator_ids: Vec::new(),
            task_kind,
            parallelism: DEFAULT_PARALLELISM,
            max_parallelism: 128,
            min_resources: ResourceSpec::ZERO,
            preferred_resources: ResourceSpec::ZERO,
            configuration: Configuration::new(),
            inputs: Vec::new(),
            slot_sharing_group: None,
            co_location_group: None,
        }
    }

    /// Vertices without inputs are the checkpoint trigger points.
    pub fn is_input_vertex(&self) -> bool {
        self.inputs.is_empty()
    }
}

/// A named equivalence class of vertices whose subtasks may share slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotSharingGroup {
    pub id: SlotSharingGroupId,
    pub vertices: Vec<JobVertexId>,
}

/// Forces corresponding subtasks of its vertices into the same slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoLocationGroup {
    pub id: CoLocationGroupId,
    pub vertices: Vec<JobVertexId>,
}

/// The physical execution plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobGraph {
    pub job_id: JobId,
    pub name: String,
    pub schedule_mode: ScheduleMode,
    /// Vertices in chain-materialization order.
    pub vertices: Vec<JobVertex>,
    pub slot_sharing_groups: Vec<SlotSharingGroup>,
    pub co_location_groups: Vec<CoLocationGroup>,
    pub snapshot_settings: Option<JobCheckpointingSettings>,
    pub serialized_execution_config: Option<SerializedValue>,
    pub user_artifacts: Vec<CachedFile>,
}

impl JobGraph {
    pub fn new(job_id: Option<JobId>, name: &str) -> Self {
        Self {
            job_id: job_id.unwrap_or_else(|| JobId::generate(name)),
            name: name.to_string(),
            schedule_mode: ScheduleMode::Eager,
            vertices: Vec::new(),
            slot_sharing_groups: Vec::new(),
            co_location_groups: Vec::new(),
            snapshot_settings: None,
            serialized_execution_config: None,
            user_artifacts: Vec::new(),
        }
    }

    /// Append a vertex and return its position.
    pub fn add_vertex(&mut self, vertex: JobVertex) -> usize {
        self.vertices.push(vertex);
        self.vertices.len() - 1
    }

    pub fn vertex(&self, id: JobVertexId) -> Option<&JobVertex> {
        self.vertices.iter().find(|v| v.id == id)
    }

    pub fn vertex_by_name(&self, name: &str) -> Option<&JobVertex> {
        self.vertices.iter().find(|v| v.name == name)
    }

    /// All job edges, grouped by downstream vertex in vertex order.
    pub fn edges(&self) -> impl Iterator<Item = &JobEdge> {
        self.vertices.iter().flat_map(|v| v.inputs.iter())
    }

    pub fn slot_sharing_group(&self, id: SlotSharingGroupId) -> Option<&SlotSharingGroup> {
        self.slot_sharing_groups.iter().find(|g| g.id == id)
    }

    pub fn co_location_group(&self, id: CoLocationGroupId) -> Option<&CoLocationGroup> {
        self.co_location_groups.iter().find(|g| g.id == id)
    }

    /// Serialize the plan for shipping to the cluster.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(data)?)
    }
}

#[cfg(test)]
#[path = "tests/job_graph_tests.rs"]
mod tests;
