//! Compiles a [`StreamGraph`] into a [`JobGraph`].
//!
//! Chains of operators that can legally share a thread are fused into single
//! job vertices; the remaining edges are wired with their distribution
//! pattern; placement constraints and the checkpointing descriptor are
//! attached last. Identities are content-derived: resubmitting an unchanged
//! graph yields byte-equal vertex and operator ids.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::checkpoint::{
    CheckpointCoordinatorConfiguration, CheckpointRetentionPolicy, CheckpointingMode,
    JobCheckpointingSettings,
};
use crate::config::{Configuration, ExecutionConfig, SerializedValue};
use crate::descriptors::SerializerDescriptor;
use crate::error::{PlanError, Result};
use crate::graph::hasher::{DeterministicGraphHasher, GraphHasher, UserHashGraphHasher};
use crate::graph::job_graph::{
    CoLocationGroup, CoLocationGroupId, DistributionPattern, JobEdge, JobGraph, JobVertex,
    JobVertexKind, ResultPartitionType, ScheduleMode, SlotSharingGroup, SlotSharingGroupId,
};
use crate::graph::stream_config::StreamConfig;
use crate::graph::stream_graph::{ChainingStrategy, Partitioner, StreamEdge, StreamGraph};
use crate::types::{JobId, JobVertexId, NodeHash, NodeId, OperatorId, ResourceSpec};

/// Compile `graph` into a job graph with a freshly generated job id.
pub fn build_job_graph(graph: &StreamGraph) -> Result<JobGraph> {
    JobGraphGenerator::new(graph, None).create_job_graph()
}

/// Compile `graph` into a job graph under the given job id.
pub fn build_job_graph_with_id(graph: &StreamGraph, job_id: JobId) -> Result<JobGraph> {
    JobGraphGenerator::new(graph, Some(job_id)).create_job_graph()
}

/// Decides whether `edge` may be fused into an operator chain.
///
/// All of the following must hold: the target has exactly one input, both
/// endpoints carry an operator, both share a slot-sharing group, the target
/// chains ALWAYS, the source chains HEAD or ALWAYS, the edge forwards
/// one-to-one, the parallelisms match, and chaining is enabled on the graph.
pub fn is_chainable(edge: &StreamEdge, graph: &StreamGraph) -> bool {
    let up = graph.node(edge.source_id);
    let down = graph.node(edge.target_id);

    down.in_edges.len() == 1
        && down.operator.is_some()
        && up.operator.is_some()
        && up.slot_sharing_group == down.slot_sharing_group
        && down.chaining_strategy == ChainingStrategy::Always
        && matches!(
            up.chaining_strategy,
            ChainingStrategy::Head | ChainingStrategy::Always
        )
        && edge.partitioner == Partitioner::Forward
        && up.parallelism == down.parallelism
        && graph.chaining_enabled
}

/// One compilation pass. All intermediate maps live only for its duration.
struct JobGraphGenerator<'a> {
    stream_graph: &'a StreamGraph,
    job_graph: JobGraph,
    /// Copy of the graph's execution config; the checkpointing step may
    /// update it before it is serialized into the job graph.
    execution_config: ExecutionConfig,

    default_hasher: DeterministicGraphHasher,
    legacy_hashers: Vec<Box<dyn GraphHasher>>,
    hashes: HashMap<NodeId, NodeHash>,
    legacy_hashes: Vec<HashMap<NodeId, NodeHash>>,

    /// Chain-head node id -> position of its vertex in the job graph.
    job_vertices: HashMap<NodeId, usize>,
    built_vertices: HashSet<NodeId>,
    /// Every non-chained edge, in connect order.
    physical_edges_in_order: Vec<StreamEdge>,
    /// Chain-head node id -> the head's stream config, written into the
    /// vertex once all edges are indexed.
    vertex_configs: HashMap<NodeId, StreamConfig>,
    /// Chain-head node id -> configs of the chained members.
    chained_configs: HashMap<NodeId, BTreeMap<NodeId, Configuration>>,
    chained_names: HashMap<NodeId, String>,
    chained_min_resources: HashMap<NodeId, ResourceSpec>,
    chained_preferred_resources: HashMap<NodeId, ResourceSpec>,
    /// Chain-head node id -> (primary, user-defined) hash per member, in
    /// recursion order: deepest member first, head last.
    chained_operator_hashes: HashMap<NodeId, Vec<(NodeHash, Option<NodeHash>)>>,
}

impl<'a> JobGraphGenerator<'a> {
    fn new(stream_graph: &'a StreamGraph, job_id: Option<JobId>) -> Self {
        Self {
            stream_graph,
            job_graph: JobGraph::new(job_id, &stream_graph.job_name),
            execution_config: stream_graph.execution_config.clone(),
            default_hasher: DeterministicGraphHasher,
            legacy_hashers: vec![Box::new(UserHashGraphHasher)],
            hashes: HashMap::new(),
            legacy_hashes: Vec::new(),
            job_vertices: HashMap::new(),
            built_vertices: HashSet::new(),
            physical_edges_in_order: Vec::new(),
            vertex_configs: HashMap::new(),
            chained_configs: HashMap::new(),
            chained_names: HashMap::new(),
            chained_min_resources: HashMap::new(),
            chained_preferred_resources: HashMap::new(),
            chained_operator_hashes: HashMap::new(),
        }
    }

    fn create_job_graph(mut self) -> Result<JobGraph> {
        // Streaming jobs deploy all vertices up front.
        self.job_graph.schedule_mode = ScheduleMode::Eager;

        // Content-derived identities first; everything downstream keys off
        // them.
        self.hashes = self.default_hasher.generate_hashes(self.stream_graph)?;
        self.legacy_hashes = self
            .legacy_hashers
            .iter()
            .map(|hasher| hasher.generate_hashes(self.stream_graph))
            .collect::<Result<Vec<_>>>()?;

        self.set_chaining()?;
        self.set_physical_edges()?;
        self.write_vertex_configurations();
        self.set_slot_sharing_and_co_location()?;
        self.configure_checkpointing()?;

        self.job_graph.user_artifacts = self.stream_graph.cached_files.clone();

        // Serialize the execution config last, once it is final.
        self.job_graph.serialized_execution_config = Some(
            SerializedValue::new(&self.execution_config)
                .map_err(PlanError::ExecutionConfigNotSerializable)?,
        );

        Ok(self.job_graph)
    }

    /// Builds task chains from the sources, materializing one job vertex per
    /// chain.
    fn set_chaining(&mut self) -> Result<()> {
        for source_id in self.stream_graph.source_ids() {
            self.create_chain(source_id, source_id, 0)?;
        }
        Ok(())
    }

    /// Walks the chain rooted at `start_node_id`, returning the edges that
    /// leave it. `current_node_id` is the member under construction;
    /// `chain_index` its position within the chain.
    fn create_chain(
        &mut self,
        start_node_id: NodeId,
        current_node_id: NodeId,
        chain_index: u32,
    ) -> Result<Vec<StreamEdge>> {
        if self.built_vertices.contains(&start_node_id) {
            // Reached again through another non-chained predecessor.
            return Ok(Vec::new());
        }

        let graph = self.stream_graph;

        let mut chainable_outputs = Vec::new();
        let mut non_chainable_outputs = Vec::new();
        for out_edge in &graph.node(current_node_id).out_edges {
            if is_chainable(out_edge, graph) {
                chainable_outputs.push(out_edge.clone());
            } else {
                non_chainable_outputs.push(out_edge.clone());
            }
        }

        let mut transitive_out_edges = Vec::new();
        for chainable in &chainable_outputs {
            transitive_out_edges.extend(self.create_chain(
                start_node_id,
                chainable.target_id,
                chain_index + 1,
            )?);
        }
        for non_chainable in &non_chainable_outputs {
            transitive_out_edges.push(non_chainable.clone());
            self.create_chain(non_chainable.target_id, non_chainable.target_id, 0)?;
        }

        let primary_hash = *self
            .hashes
            .get(&current_node_id)
            .ok_or(PlanError::MissingHash(current_node_id))?;
        let operator_hashes = self.chained_operator_hashes.entry(start_node_id).or_default();
        for legacy_hashes in &self.legacy_hashes {
            operator_hashes.push((primary_hash, legacy_hashes.get(&current_node_id).copied()));
        }

        let chained_name = self.create_chained_name(current_node_id, &chainable_outputs);
        self.chained_names.insert(current_node_id, chained_name);
        let min_resources = self.create_chained_min_resources(current_node_id, &chainable_outputs);
        self.chained_min_resources.insert(current_node_id, min_resources);
        let preferred_resources =
            self.create_chained_preferred_resources(current_node_id, &chainable_outputs);
        self.chained_preferred_resources
            .insert(current_node_id, preferred_resources);

        // Heads get the config owned by their new job vertex; members get a
        // fresh one that ends up embedded in the head's.
        let mut config = if current_node_id == start_node_id {
            self.create_job_vertex(start_node_id)?
        } else {
            StreamConfig::new()
        };

        self.set_vertex_config(
            current_node_id,
            &mut config,
            &chainable_outputs,
            &non_chainable_outputs,
        )?;

        config.set_operator_id(OperatorId::from_hash(primary_hash))?;
        if chainable_outputs.is_empty() {
            config.set_chain_end()?;
        }

        if current_node_id == start_node_id {
            config.set_chain_start()?;
            config.set_chain_index(0)?;
            config.set_out_edges_in_order(&transitive_out_edges)?;
            config.set_out_edges(&graph.node(current_node_id).out_edges)?;

            for edge in &transitive_out_edges {
                self.connect(start_node_id, edge)?;
            }

            let member_configs = self
                .chained_configs
                .get(&start_node_id)
                .cloned()
                .unwrap_or_default();
            config.set_chained_task_configs(&member_configs)?;

            self.vertex_configs.insert(start_node_id, config);
        } else {
            config.set_chain_index(chain_index)?;
            self.chained_configs
                .entry(start_node_id)
                .or_default()
                .insert(current_node_id, config.into_configuration());
        }

        Ok(transitive_out_edges)
    }

    /// `op` alone, `op -> child`, or `op -> (a, b)` for several chained
    /// children, in edge order.
    fn create_chained_name(&self, node_id: NodeId, chainable_outputs: &[StreamEdge]) -> String {
        let operator_name = &self.stream_graph.node(node_id).operator_name;
        match chainable_outputs {
            [] => operator_name.clone(),
            [only] => format!("{} -> {}", operator_name, self.chained_names[&only.target_id]),
            many => {
                let children: Vec<&str> = many
                    .iter()
                    .map(|edge| self.chained_names[&edge.target_id].as_str())
                    .collect();
                format!("{} -> ({})", operator_name, children.join(", "))
            }
        }
    }

    fn create_chained_min_resources(
        &self,
        node_id: NodeId,
        chainable_outputs: &[StreamEdge],
    ) -> ResourceSpec {
        let mut resources = self.stream_graph.node(node_id).min_resources;
        for edge in chainable_outputs {
            resources = resources.merge(self.chained_min_resources[&edge.target_id]);
        }
        resources
    }

    fn create_chained_preferred_resources(
        &self,
        node_id: NodeId,
        chainable_outputs: &[StreamEdge],
    ) -> ResourceSpec {
        let mut resources = self.stream_graph.node(node_id).preferred_resources;
        for edge in chainable_outputs {
            resources = resources.merge(self.chained_preferred_resources[&edge.target_id]);
        }
        resources
    }

    /// Materialize the job vertex for a chain head and hand back the config
    /// that will be stored inside it.
    fn create_job_vertex(&mut self, start_node_id: NodeId) -> Result<StreamConfig> {
        let node = self.stream_graph.node(start_node_id);

        let hash = *self
            .hashes
            .get(&start_node_id)
            .ok_or(PlanError::MissingHash(start_node_id))?;
        let vertex_id = JobVertexId::from_hash(hash);

        let alternative_ids = self
            .legacy_hashes
            .iter()
            .filter_map(|hashes| hashes.get(&start_node_id))
            .map(|hash| JobVertexId::from_hash(*hash))
            .collect();

        let mut chained_operator_ids = Vec::new();
        let mut user_defined_operator_ids = Vec::new();
        if let Some(operator_hashes) = self.chained_operator_hashes.get(&start_node_id) {
            for (primary, user_defined) in operator_hashes {
                chained_operator_ids.push(OperatorId::from_hash(*primary));
                user_defined_operator_ids.push(user_defined.map(OperatorId::from_hash));
            }
        }

        let mut config = StreamConfig::new();
        let kind = if let Some(input_format) = &node.input_format {
            config.set_input_format_stub(input_format)?;
            JobVertexKind::InputFormat
        } else {
            JobVertexKind::Plain
        };

        let mut vertex = JobVertex::new(
            vertex_id,
            &self.chained_names[&start_node_id],
            kind,
            node.task_kind,
        );
        vertex.alternative_ids = alternative_ids;
        vertex.chained_operator_ids = chained_operator_ids;
        vertex.user_defined_operator_ids = user_defined_operator_ids;
        vertex.min_resources = self.chained_min_resources[&start_node_id];
        vertex.preferred_resources = self.chained_preferred_resources[&start_node_id];
        if node.parallelism > 0 {
            vertex.parallelism = node.parallelism;
        }
        vertex.max_parallelism = node.max_parallelism;

        tracing::debug!(
            "parallelism set: {} for {}",
            vertex.parallelism,
            start_node_id
        );

        let vertex_index = self.job_graph.add_vertex(vertex);
        self.job_vertices.insert(start_node_id, vertex_index);
        self.built_vertices.insert(start_node_id);

        Ok(config)
    }

    /// Write one member's operator settings into its stream config.
    fn set_vertex_config(
        &self,
        node_id: NodeId,
        config: &mut StreamConfig,
        chainable_outputs: &[StreamEdge],
        non_chainable_outputs: &[StreamEdge],
    ) -> Result<()> {
        let graph = self.stream_graph;
        let node = graph.node(node_id);

        config.set_vertex_id(node_id)?;
        config.set_buffer_timeout(node.buffer_timeout)?;
        config.set_serializer_in1(node.serializer_in1.as_ref())?;
        config.set_serializer_in2(node.serializer_in2.as_ref())?;
        config.set_serializer_out(node.serializer_out.as_ref())?;

        let mut side_output_serializers = BTreeMap::new();
        for edge in chainable_outputs.iter().chain(non_chainable_outputs) {
            if let Some(tag) = &edge.output_tag {
                side_output_serializers
                    .insert(tag.id.clone(), SerializerDescriptor::of(&tag.type_name));
            }
        }
        config.set_side_output_serializers(&side_output_serializers)?;

        config.set_operator(node.operator.as_ref())?;
        config.set_operator_name(&node.operator_name)?;
        config.set_output_selectors(&node.output_selectors)?;
        config.set_number_of_outputs(non_chainable_outputs.len())?;
        config.set_non_chained_outputs(non_chainable_outputs)?;
        config.set_chained_outputs(chainable_outputs)?;
        config.set_time_characteristic(graph.time_characteristic)?;
        config.set_state_backend(graph.state_backend.as_ref())?;

        let checkpoint_config = &graph.checkpoint_config;
        let checkpointing = checkpoint_config.is_checkpointing_enabled();
        config.set_checkpointing_enabled(checkpointing)?;
        if checkpointing {
            config.set_checkpoint_mode(checkpoint_config.mode)?;
        } else {
            // The at-least-once input handler is cheaper when no barriers
            // flow.
            config.set_checkpoint_mode(CheckpointingMode::AtLeastOnce)?;
        }

        config.set_state_partitioner1(node.state_partitioner1.as_ref())?;
        config.set_state_partitioner2(node.state_partitioner2.as_ref())?;
        config.set_state_key_serializer(node.state_key_serializer.as_ref())?;

        if node.task_kind.is_iterative() {
            if let Some(broker_id) = &node.iteration_broker_id {
                config.set_iteration_id(broker_id)?;
            }
            config.set_iteration_wait_time(node.loop_timeout)?;
        }

        Ok(())
    }

    /// Wire one edge leaving the chain headed by `head_of_chain` to the
    /// downstream chain's vertex.
    fn connect(&mut self, head_of_chain: NodeId, edge: &StreamEdge) -> Result<()> {
        self.physical_edges_in_order.push(edge.clone());

        let downstream_node_id = edge.target_id;
        let head_index = self.job_vertices[&head_of_chain];
        let downstream_index = self.job_vertices[&downstream_node_id];

        let downstream_config = self
            .vertex_configs
            .get_mut(&downstream_node_id)
            .expect("downstream chain head built before connect");
        let inputs = downstream_config.number_of_inputs();
        downstream_config.set_number_of_inputs(inputs + 1)?;

        let distribution_pattern = match edge.partitioner {
            Partitioner::Forward | Partitioner::Rescale => DistributionPattern::Pointwise,
            _ => DistributionPattern::AllToAll,
        };

        let job_edge = JobEdge {
            source: self.job_graph.vertices[head_index].id,
            target: self.job_graph.vertices[downstream_index].id,
            distribution_pattern,
            partition_type: ResultPartitionType::PipelinedBounded,
            ship_strategy_name: edge.partitioner.to_string(),
        };
        self.job_graph.vertices[downstream_index].inputs.push(job_edge);

        tracing::debug!(
            "connected: {} - {} -> {}",
            edge.partitioner,
            head_of_chain,
            downstream_node_id
        );
        Ok(())
    }

    /// Invert the ordered physical-edge list into per-vertex in-edge lists.
    fn set_physical_edges(&mut self) -> Result<()> {
        let mut in_edges_per_target: HashMap<NodeId, Vec<StreamEdge>> = HashMap::new();
        for edge in &self.physical_edges_in_order {
            in_edges_per_target
                .entry(edge.target_id)
                .or_default()
                .push(edge.clone());
        }

        for (target, in_edges) in in_edges_per_target {
            self.vertex_configs
                .get_mut(&target)
                .expect("physical edge targets a chain head")
                .set_in_physical_edges(&in_edges)?;
        }
        Ok(())
    }

    /// Move each finished head config into its job vertex.
    fn write_vertex_configurations(&mut self) {
        let assignments: Vec<(NodeId, usize)> = self
            .job_vertices
            .iter()
            .map(|(&node_id, &index)| (node_id, index))
            .collect();
        for (node_id, vertex_index) in assignments {
            if let Some(config) = self.vertex_configs.remove(&node_id) {
                self.job_graph.vertices[vertex_index].configuration = config.into_configuration();
            }
        }
    }

    /// Intern slot-sharing and co-location groups by name and pin iteration
    /// heads to their tails.
    fn set_slot_sharing_and_co_location(&mut self) -> Result<()> {
        let graph = self.stream_graph;
        let mut slot_groups: HashMap<String, SlotSharingGroupId> = HashMap::new();
        let mut co_groups: HashMap<String, (SlotSharingGroupId, CoLocationGroupId)> =
            HashMap::new();

        let mut head_node_ids: Vec<NodeId> = self.job_vertices.keys().copied().collect();
        head_node_ids.sort_unstable();

        for node_id in head_node_ids {
            let vertex_index = self.job_vertices[&node_id];
            let node = graph.node(node_id);

            let sharing_group = if let Some(group_name) = &node.slot_sharing_group {
                let next_id = self.job_graph.slot_sharing_groups.len() as SlotSharingGroupId;
                let group_id = *slot_groups.entry(group_name.clone()).or_insert_with(|| {
                    self.job_graph.slot_sharing_groups.push(SlotSharingGroup {
                        id: next_id,
                        vertices: Vec::new(),
                    });
                    next_id
                });
                let vertex_id = self.job_graph.vertices[vertex_index].id;
                self.job_graph.slot_sharing_groups[group_id as usize]
                    .vertices
                    .push(vertex_id);
                self.job_graph.vertices[vertex_index].slot_sharing_group = Some(group_id);
                Some(group_id)
            } else {
                None
            };

            if let Some(co_location_name) = &node.co_location_group {
                let Some(sharing_group) = sharing_group else {
                    return Err(PlanError::CoLocationWithoutSlotSharing {
                        vertex: self.job_graph.vertices[vertex_index].name.clone(),
                    });
                };

                let constraint = *co_groups.entry(co_location_name.clone()).or_insert_with(|| {
                    let next_id =
                        self.job_graph.co_location_groups.len() as CoLocationGroupId;
                    self.job_graph.co_location_groups.push(CoLocationGroup {
                        id: next_id,
                        vertices: Vec::new(),
                    });
                    (sharing_group, next_id)
                });
                if constraint.0 != sharing_group {
                    return Err(PlanError::CoLocationAcrossSlotSharingGroups {
                        group: co_location_name.clone(),
                    });
                }
                self.apply_co_location(vertex_index, constraint.1);
            }
        }

        // An iteration's head and tail must execute in the same slot; a
        // fresh group overrides whatever was assigned above.
        for &(head, tail) in graph.iteration_source_sink_pairs() {
            let next_id = self.job_graph.co_location_groups.len() as CoLocationGroupId;
            self.job_graph.co_location_groups.push(CoLocationGroup {
                id: next_id,
                vertices: Vec::new(),
            });
            for node_id in [head, tail] {
                let vertex_index = self.job_vertices[&node_id];
                self.apply_co_location(vertex_index, next_id);
            }
        }

        Ok(())
    }

    fn apply_co_location(&mut self, vertex_index: usize, group_id: CoLocationGroupId) {
        let vertex_id = self.job_graph.vertices[vertex_index].id;
        if let Some(previous) = self.job_graph.vertices[vertex_index].co_location_group {
            if previous == group_id {
                return;
            }
            self.job_graph.co_location_groups[previous as usize]
                .vertices
                .retain(|id| *id != vertex_id);
        }
        self.job_graph.vertices[vertex_index].co_location_group = Some(group_id);
        self.job_graph.co_location_groups[group_id as usize]
            .vertices
            .push(vertex_id);
    }

    /// Assemble the checkpointing descriptor: trigger vertices are the
    /// inputs, ack and commit vertices are everyone.
    fn configure_checkpointing(&mut self) -> Result<()> {
        let checkpoint_config = &self.stream_graph.checkpoint_config;

        let interval = if checkpoint_config.interval > 0 {
            self.execution_config.fail_task_on_checkpoint_error =
                checkpoint_config.fail_on_checkpointing_errors;
            checkpoint_config.interval
        } else {
            // Max interval disables periodic checkpoints.
            i64::MAX
        };

        let mut trigger_vertices = Vec::new();
        let mut ack_vertices = Vec::with_capacity(self.job_graph.vertices.len());
        let mut commit_vertices = Vec::with_capacity(self.job_graph.vertices.len());
        for vertex in &self.job_graph.vertices {
            if vertex.is_input_vertex() {
                trigger_vertices.push(vertex.id);
            }
            ack_vertices.push(vertex.id);
            commit_vertices.push(vertex.id);
        }

        let retention_policy = if checkpoint_config.externalized {
            match checkpoint_config.externalized_cleanup {
                Some(cleanup) if cleanup.delete_on_cancellation() => {
                    CheckpointRetentionPolicy::RetainOnFailure
                }
                Some(_) => CheckpointRetentionPolicy::RetainOnCancellation,
                None => return Err(PlanError::ExternalizedCleanupUnset),
            }
        } else {
            CheckpointRetentionPolicy::NeverRetainAfterTermination
        };

        let exactly_once = checkpoint_config.mode == CheckpointingMode::ExactlyOnce;

        let mut hooks = Vec::new();
        for node in self.stream_graph.nodes() {
            if let Some(factory) = node
                .operator
                .as_ref()
                .and_then(|operator| operator.master_checkpoint_hook())
            {
                hooks.push(factory);
            }
        }
        // Hooks carry user code, so they are serialized eagerly.
        let serialized_master_hooks = if hooks.is_empty() {
            None
        } else {
            Some(SerializedValue::new(&hooks).map_err(PlanError::MasterHooksNotSerializable)?)
        };

        let serialized_state_backend = match &self.stream_graph.state_backend {
            None => None,
            Some(backend) => Some(
                SerializedValue::new(backend).map_err(PlanError::StateBackendNotSerializable)?,
            ),
        };

        self.job_graph.snapshot_settings = Some(JobCheckpointingSettings {
            trigger_vertices,
            ack_vertices,
            commit_vertices,
            coordinator_configuration: CheckpointCoordinatorConfiguration {
                checkpoint_interval: interval,
                checkpoint_timeout: checkpoint_config.timeout,
                min_pause_between_checkpoints: checkpoint_config.min_pause_between_checkpoints,
                max_concurrent_checkpoints: checkpoint_config.max_concurrent_checkpoints,
                retention_policy,
                exactly_once,
            },
            serialized_state_backend,
            serialized_master_hooks,
        });

        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/job_graph_generator_tests.rs"]
mod tests;
