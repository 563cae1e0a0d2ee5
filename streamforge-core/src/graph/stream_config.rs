//! Typed view over a vertex [`Configuration`] for per-operator settings.
//!
//! One `StreamConfig` exists per stream node. A chain head's config is the
//! one embedded in its job vertex; the configs of the remaining chain
//! members are nested inside the head's under [`keys::CHAINED_TASK_CONFIGS`].

use std::collections::BTreeMap;

use crate::checkpoint::CheckpointingMode;
use crate::config::{Configuration, TimeCharacteristic};
use crate::descriptors::{
    InputFormatDescriptor, KeySelectorDescriptor, OperatorDescriptor, SerializerDescriptor,
    StateBackendDescriptor,
};
use crate::error::Result;
use crate::graph::stream_graph::StreamEdge;
use crate::types::{NodeId, OperatorId};

/// Well-known configuration keys.
pub mod keys {
    pub const VERTEX_ID: &str = "vertexID";
    pub const BUFFER_TIMEOUT: &str = "bufferTimeout";
    pub const SERIALIZER_IN_1: &str = "typeSerializer.in.1";
    pub const SERIALIZER_IN_2: &str = "typeSerializer.in.2";
    pub const SERIALIZER_OUT: &str = "typeSerializer.out";
    pub const SERIALIZERS_SIDE_OUT: &str = "typeSerializer.sideout";
    pub const OPERATOR: &str = "operator";
    pub const OPERATOR_NAME: &str = "operatorName";
    pub const OPERATOR_ID: &str = "operatorID";
    pub const OUTPUT_SELECTORS: &str = "outputSelectors";
    pub const NUMBER_OF_INPUTS: &str = "numberOfInputs";
    pub const NUMBER_OF_OUTPUTS: &str = "numberOfOutputs";
    pub const NON_CHAINED_OUTPUTS: &str = "nonChainedOutputs";
    pub const CHAINED_OUTPUTS: &str = "chainedOutputs";
    pub const OUT_EDGES_IN_ORDER: &str = "outEdgesInOrder";
    pub const OUT_EDGES: &str = "outEdges";
    pub const IN_PHYSICAL_EDGES: &str = "inPhysicalEdges";
    pub const TIME_CHARACTERISTIC: &str = "timeCharacteristic";
    pub const STATE_BACKEND: &str = "stateBackend";
    pub const CHECKPOINTING_ENABLED: &str = "checkpointingEnabled";
    pub const CHECKPOINT_MODE: &str = "checkpointMode";
    pub const STATE_PARTITIONER_1: &str = "statePartitioner.1";
    pub const STATE_PARTITIONER_2: &str = "statePartitioner.2";
    pub const STATE_KEY_SERIALIZER: &str = "stateKeySerializer";
    pub const ITERATION_ID: &str = "iterationId";
    pub const ITERATION_WAIT_TIME: &str = "iterationWaitTime";
    pub const CHAIN_START: &str = "chainStart";
    pub const CHAIN_END: &str = "chainEnd";
    pub const CHAIN_INDEX: &str = "chainIndex";
    pub const CHAINED_TASK_CONFIGS: &str = "chainedTaskConfigs";
    pub const INPUT_FORMAT_STUB: &str = "inputFormat.stub";
}

/// Typed accessors over one vertex configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamConfig {
    config: Configuration,
}

impl StreamConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_configuration(config: Configuration) -> Self {
        Self { config }
    }

    pub fn into_configuration(self) -> Configuration {
        self.config
    }

    pub fn set_vertex_id(&mut self, id: NodeId) -> Result<()> {
        self.config.set(keys::VERTEX_ID, &id)
    }

    pub fn vertex_id(&self) -> Option<NodeId> {
        self.config.get(keys::VERTEX_ID)
    }

    pub fn set_buffer_timeout(&mut self, timeout: i64) -> Result<()> {
        self.config.set(keys::BUFFER_TIMEOUT, &timeout)
    }

    pub fn buffer_timeout(&self) -> i64 {
        self.config.get(keys::BUFFER_TIMEOUT).unwrap_or(-1)
    }

    pub fn set_serializer_in1(&mut self, s: Option<&SerializerDescriptor>) -> Result<()> {
        self.config.set(keys::SERIALIZER_IN_1, &s)
    }

    pub fn set_serializer_in2(&mut self, s: Option<&SerializerDescriptor>) -> Result<()> {
        self.config.set(keys::SERIALIZER_IN_2, &s)
    }

    pub fn set_serializer_out(&mut self, s: Option<&SerializerDescriptor>) -> Result<()> {
        self.config.set(keys::SERIALIZER_OUT, &s)
    }

    pub fn serializer_out(&self) -> Option<SerializerDescriptor> {
        self.config.get(keys::SERIALIZER_OUT).flatten()
    }

    pub fn set_side_output_serializers(
        &mut self,
        serializers: &BTreeMap<String, SerializerDescriptor>,
    ) -> Result<()> {
        self.config.set(keys::SERIALIZERS_SIDE_OUT, serializers)
    }

    pub fn side_output_serializers(&self) -> BTreeMap<String, SerializerDescriptor> {
        self.config
            .get(keys::SERIALIZERS_SIDE_OUT)
            .unwrap_or_default()
    }

    pub fn set_operator(&mut self, operator: Option<&OperatorDescriptor>) -> Result<()> {
        self.config.set(keys::OPERATOR, &operator)
    }

    pub fn operator(&self) -> Option<OperatorDescriptor> {
        self.config.get(keys::OPERATOR).flatten()
    }

    pub fn set_operator_name(&mut self, name: &str) -> Result<()> {
        self.config.set(keys::OPERATOR_NAME, &name)
    }

    pub fn operator_name(&self) -> Option<String> {
        self.config.get(keys::OPERATOR_NAME)
    }

    pub fn set_operator_id(&mut self, id: OperatorId) -> Result<()> {
        self.config.set(keys::OPERATOR_ID, &id)
    }

    pub fn operator_id(&self) -> Option<OperatorId> {
        self.config.get(keys::OPERATOR_ID)
    }

    pub fn set_output_selectors(&mut self, selectors: &[String]) -> Result<()> {
        self.config.set(keys::OUTPUT_SELECTORS, &selectors)
    }

    pub fn set_number_of_inputs(&mut self, n: usize) -> Result<()> {
        self.config.set(keys::NUMBER_OF_INPUTS, &n)
    }

    pub fn number_of_inputs(&self) -> usize {
        self.config.get(keys::NUMBER_OF_INPUTS).unwrap_or(0)
    }

    pub fn set_number_of_outputs(&mut self, n: usize) -> Result<()> {
        self.config.set(keys::NUMBER_OF_OUTPUTS, &n)
    }

    pub fn number_of_outputs(&self) -> usize {
        self.config.get(keys::NUMBER_OF_OUTPUTS).unwrap_or(0)
    }

    pub fn set_non_chained_outputs(&mut self, edges: &[StreamEdge]) -> Result<()> {
        self.config.set(keys::NON_CHAINED_OUTPUTS, &edges)
    }

    pub fn non_chained_outputs(&self) -> Vec<StreamEdge> {
        self.config.get(keys::NON_CHAINED_OUTPUTS).unwrap_or_default()
    }

    pub fn set_chained_outputs(&mut self, edges: &[StreamEdge]) -> Result<()> {
        self.config.set(keys::CHAINED_OUTPUTS, &edges)
    }

    pub fn chained_outputs(&self) -> Vec<StreamEdge> {
        self.config.get(keys::CHAINED_OUTPUTS).unwrap_or_default()
    }

    /// Edges leaving the chain, in build order.
    pub fn set_out_edges_in_order(&mut self, edges: &[StreamEdge]) -> Result<()> {
        self.config.set(keys::OUT_EDGES_IN_ORDER, &edges)
    }

    pub fn out_edges_in_order(&self) -> Vec<StreamEdge> {
        self.config.get(keys::OUT_EDGES_IN_ORDER).unwrap_or_default()
    }

    /// The head node's raw out-edges, chained ones included.
    pub fn set_out_edges(&mut self, edges: &[StreamEdge]) -> Result<()> {
        self.config.set(keys::OUT_EDGES, &edges)
    }

    pub fn set_in_physical_edges(&mut self, edges: &[StreamEdge]) -> Result<()> {
        self.config.set(keys::IN_PHYSICAL_EDGES, &edges)
    }

    pub fn in_physical_edges(&self) -> Vec<StreamEdge> {
        self.config.get(keys::IN_PHYSICAL_EDGES).unwrap_or_default()
    }

    pub fn set_time_characteristic(&mut self, tc: TimeCharacteristic) -> Result<()> {
        self.config.set(keys::TIME_CHARACTERISTIC, &tc)
    }

    pub fn time_characteristic(&self) -> Option<TimeCharacteristic> {
        self.config.get(keys::TIME_CHARACTERISTIC)
    }

    pub fn set_state_backend(&mut self, backend: Option<&StateBackendDescriptor>) -> Result<()> {
        self.config.set(keys::STATE_BACKEND, &backend)
    }

    pub fn set_checkpointing_enabled(&mut self, enabled: bool) -> Result<()> {
        self.config.set(keys::CHECKPOINTING_ENABLED, &enabled)
    }

    pub fn checkpointing_enabled(&self) -> bool {
        self.config.get(keys::CHECKPOINTING_ENABLED).unwrap_or(false)
    }

    pub fn set_checkpoint_mode(&mut self, mode: CheckpointingMode) -> Result<()> {
        self.config.set(keys::CHECKPOINT_MODE, &mode)
    }

    pub fn checkpoint_mode(&self) -> Option<CheckpointingMode> {
        self.config.get(keys::CHECKPOINT_MODE)
    }

    pub fn set_state_partitioner1(&mut self, p: Option<&KeySelectorDescriptor>) -> Result<()> {
        self.config.set(keys::STATE_PARTITIONER_1, &p)
    }

    pub fn set_state_partitioner2(&mut self, p: Option<&KeySelectorDescriptor>) -> Result<()> {
        self.config.set(keys::STATE_PARTITIONER_2, &p)
    }

    pub fn set_state_key_serializer(&mut self, s: Option<&SerializerDescriptor>) -> Result<()> {
        self.config.set(keys::STATE_KEY_SERIALIZER, &s)
    }

    pub fn set_iteration_id(&mut self, broker_id: &str) -> Result<()> {
        self.config.set(keys::ITERATION_ID, &broker_id)
    }

    pub fn iteration_id(&self) -> Option<String> {
        self.config.get(keys::ITERATION_ID)
    }

    pub fn set_iteration_wait_time(&mut self, millis: i64) -> Result<()> {
        self.config.set(keys::ITERATION_WAIT_TIME, &millis)
    }

    pub fn iteration_wait_time(&self) -> i64 {
        self.config.get(keys::ITERATION_WAIT_TIME).unwrap_or(0)
    }

    pub fn set_chain_start(&mut self) -> Result<()> {
        self.config.set(keys::CHAIN_START, &true)
    }

    pub fn is_chain_start(&self) -> bool {
        self.config.get(keys::CHAIN_START).unwrap_or(false)
    }

    pub fn set_chain_end(&mut self) -> Result<()> {
        self.config.set(keys::CHAIN_END, &true)
    }

    pub fn is_chain_end(&self) -> bool {
        self.config.get(keys::CHAIN_END).unwrap_or(false)
    }

    pub fn set_chain_index(&mut self, index: u32) -> Result<()> {
        self.config.set(keys::CHAIN_INDEX, &index)
    }

    pub fn chain_index(&self) -> u32 {
        self.config.get(keys::CHAIN_INDEX).unwrap_or(0)
    }

    /// Embed the configs of all chained members into this head config.
    pub fn set_chained_task_configs(
        &mut self,
        configs: &BTreeMap<NodeId, Configuration>,
    ) -> Result<()> {
        self.config.set(keys::CHAINED_TASK_CONFIGS, configs)
    }

    pub fn chained_task_configs(&self) -> BTreeMap<NodeId, Configuration> {
        self.config.get(keys::CHAINED_TASK_CONFIGS).unwrap_or_default()
    }

    /// Stub wrapper around the input format of an input-format vertex.
    pub fn set_input_format_stub(&mut self, format: &InputFormatDescriptor) -> Result<()> {
        self.config.set(keys::INPUT_FORMAT_STUB, format)
    }

    pub fn input_format_stub(&self) -> Option<InputFormatDescriptor> {
        self.config.get(keys::INPUT_FORMAT_STUB)
    }
}

#[cfg(test)]
#[path = "tests/stream_config_tests.rs"]
mod tests;
