//! The logical DAG handed to the compiler.
//!
//! A [`StreamGraph`] is authored by an upstream fluent API and is read-only
//! input here: nodes describe operators, edges describe how records travel
//! between them.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::checkpoint::CheckpointConfig;
use crate::config::{ExecutionConfig, TimeCharacteristic};
use crate::descriptors::{
    CachedFile, InputFormatDescriptor, KeySelectorDescriptor, OperatorDescriptor,
    SerializerDescriptor, StateBackendDescriptor, TaskKind,
};
use crate::types::{NodeHash, NodeId, ResourceSpec};

/// How eagerly an operator fuses with its neighbors into one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainingStrategy {
    /// Chain with a predecessor whenever the edge permits it.
    Always,
    /// Never participate in a chain.
    Never,
    /// Start a chain but never attach to a predecessor. The default for
    /// sources.
    Head,
}

/// How data is distributed between upstream and downstream operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Partitioner {
    /// One-to-one, same parallelism required. The only chainable variant.
    Forward,
    /// Round-robin within adjacent groups of subtasks.
    Rescale,
    /// Round-robin across all downstream subtasks.
    Rebalance,
    /// Send every record to all downstream subtasks.
    Broadcast,
    /// Hash-partition by key group.
    KeyGroup,
    /// User-supplied partition function.
    Custom { name: String },
}

impl fmt::Display for Partitioner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Partitioner::Forward => "FORWARD",
            Partitioner::Rescale => "RESCALE",
            Partitioner::Rebalance => "REBALANCE",
            Partitioner::Broadcast => "BROADCAST",
            Partitioner::KeyGroup => "HASH",
            Partitioner::Custom { .. } => "CUSTOM",
        };
        f.write_str(label)
    }
}

/// Marks an edge as carrying a named side output instead of the main stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputTag {
    pub id: String,
    /// Element type of the side output; its serializer is derived from this.
    pub type_name: String,
}

/// An edge connecting two nodes in the DAG.
///
/// Position inside the source node's out-edge list is order-stable and part
/// of the graph's identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamEdge {
    pub source_id: NodeId,
    pub target_id: NodeId,
    pub partitioner: Partitioner,
    pub output_tag: Option<OutputTag>,
}

/// A node in the logical DAG.
#[derive(Debug, Clone)]
pub struct StreamNode {
    pub id: NodeId,
    pub operator_name: String,
    pub operator: Option<OperatorDescriptor>,
    pub input_format: Option<InputFormatDescriptor>,
    /// Declared parallelism; `-1` inherits the default at deployment.
    pub parallelism: i32,
    pub max_parallelism: u32,
    pub chaining_strategy: ChainingStrategy,
    pub slot_sharing_group: Option<String>,
    pub co_location_group: Option<String>,
    /// Output flush timeout in milliseconds; `-1` means undefined.
    pub buffer_timeout: i64,
    pub serializer_in1: Option<SerializerDescriptor>,
    pub serializer_in2: Option<SerializerDescriptor>,
    pub serializer_out: Option<SerializerDescriptor>,
    pub state_partitioner1: Option<KeySelectorDescriptor>,
    pub state_partitioner2: Option<KeySelectorDescriptor>,
    pub state_key_serializer: Option<SerializerDescriptor>,
    pub output_selectors: Vec<String>,
    pub task_kind: TaskKind,
    pub min_resources: ResourceSpec,
    pub preferred_resources: ResourceSpec,
    /// Stable user-assigned id folded into the node's content hash.
    pub uid: Option<String>,
    /// Externally supplied identity, surfaced by the user-hash hasher.
    pub user_hash: Option<NodeHash>,
    /// Broker channel closing the feedback loop, for iteration nodes.
    pub iteration_broker_id: Option<String>,
    /// Milliseconds an iteration waits for feedback before shutting down.
    pub loop_timeout: i64,
    pub in_edges: Vec<StreamEdge>,
    pub out_edges: Vec<StreamEdge>,
}

/// The logical DAG representing a streaming topology.
#[derive(Debug, Clone)]
pub struct StreamGraph {
    pub job_name: String,
    pub chaining_enabled: bool,
    pub time_characteristic: TimeCharacteristic,
    pub execution_config: ExecutionConfig,
    pub checkpoint_config: CheckpointConfig,
    pub state_backend: Option<StateBackendDescriptor>,
    pub cached_files: Vec<CachedFile>,
    nodes: BTreeMap<NodeId, StreamNode>,
    iteration_pairs: Vec<(NodeId, NodeId)>,
    next_id: NodeId,
}

impl StreamGraph {
    pub fn new(job_name: &str) -> Self {
        Self {
            job_name: job_name.to_string(),
            chaining_enabled: true,
            time_characteristic: TimeCharacteristic::ProcessingTime,
            execution_config: ExecutionConfig::default(),
            checkpoint_config: CheckpointConfig::default(),
            state_backend: None,
            cached_files: Vec::new(),
            nodes: BTreeMap::new(),
            iteration_pairs: Vec::new(),
            next_id: 1,
        }
    }

    /// Add a node and return its assigned id. Detailed settings are adjusted
    /// through [`StreamGraph::node_mut`].
    pub fn add_node(
        &mut self,
        operator_name: &str,
        operator: Option<OperatorDescriptor>,
        task_kind: TaskKind,
        parallelism: i32,
    ) -> NodeId {
        let id = self.next_id;
        self.next_id += 1;
        self.nodes.insert(
            id,
            StreamNode {
                id,
                operator_name: operator_name.to_string(),
                operator,
                input_format: None,
                parallelism,
                max_parallelism: 128,
                chaining_strategy: ChainingStrategy::Always,
                slot_sharing_group: Some("default".to_string()),
                co_location_group: None,
                buffer_timeout: -1,
                serializer_in1: None,
                serializer_in2: None,
                serializer_out: None,
                state_partitioner1: None,
                state_partitioner2: None,
                state_key_serializer: None,
                output_selectors: Vec::new(),
                task_kind,
                min_resources: ResourceSpec::ZERO,
                preferred_resources: ResourceSpec::ZERO,
                uid: None,
                user_hash: None,
                iteration_broker_id: None,
                loop_timeout: 0,
                in_edges: Vec::new(),
                out_edges: Vec::new(),
            },
        );
        id
    }

    /// Add an edge between two existing nodes.
    pub fn add_edge(&mut self, source: NodeId, target: NodeId, partitioner: Partitioner) {
        self.add_edge_internal(StreamEdge {
            source_id: source,
            target_id: target,
            partitioner,
            output_tag: None,
        });
    }

    /// Add an edge carrying a named side output.
    pub fn add_side_output_edge(
        &mut self,
        source: NodeId,
        target: NodeId,
        partitioner: Partitioner,
        tag: OutputTag,
    ) {
        self.add_edge_internal(StreamEdge {
            source_id: source,
            target_id: target,
            partitioner,
            output_tag: Some(tag),
        });
    }

    fn add_edge_internal(&mut self, edge: StreamEdge) {
        self.node_mut(edge.source_id).out_edges.push(edge.clone());
        self.node_mut(edge.target_id).in_edges.push(edge);
    }

    /// Declare an iteration: `head` replays feedback into the loop, `tail`
    /// feeds results back through the named broker channel. The feedback
    /// channel is implicit; no stream edge runs from tail to head.
    pub fn add_iteration_pair(
        &mut self,
        head: NodeId,
        tail: NodeId,
        broker_id: &str,
        loop_timeout: i64,
    ) {
        for id in [head, tail] {
            let node = self.node_mut(id);
            node.iteration_broker_id = Some(broker_id.to_string());
            node.loop_timeout = loop_timeout;
        }
        self.iteration_pairs.push((head, tail));
    }

    /// Look up a node. Panics on an unknown id: edges only ever reference
    /// nodes added through this graph.
    pub fn node(&self, id: NodeId) -> &StreamNode {
        &self.nodes[&id]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut StreamNode {
        self.nodes.get_mut(&id).expect("unknown stream node id")
    }

    /// All nodes in ascending id order.
    pub fn nodes(&self) -> impl Iterator<Item = &StreamNode> {
        self.nodes.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Ids of all nodes without inputs, ascending.
    pub fn source_ids(&self) -> Vec<NodeId> {
        self.nodes
            .values()
            .filter(|node| node.in_edges.is_empty())
            .map(|node| node.id)
            .collect()
    }

    pub fn iteration_source_sink_pairs(&self) -> &[(NodeId, NodeId)] {
        &self.iteration_pairs
    }

    /// True for an explicit feedback edge from an iteration tail into its
    /// head. Such edges are excluded from hash-predecessor sets.
    pub fn is_iteration_back_edge(&self, edge: &StreamEdge) -> bool {
        self.iteration_pairs
            .iter()
            .any(|(head, tail)| edge.source_id == *tail && edge.target_id == *head)
    }
}

#[cfg(test)]
#[path = "tests/stream_graph_tests.rs"]
mod tests;
