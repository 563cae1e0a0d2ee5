//! Serializable descriptors for user code referenced by the plan.
//!
//! The compiler never executes operators; it only carries opaque,
//! serializable references to them through the job graph.

use serde::{Deserialize, Serialize};

/// Serializable operator reference.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum OperatorDescriptor {
    Source {
        source_id: String,
    },
    Udf {
        udf_id: String,
        config: Vec<u8>,
        /// The user function asks to be driven by a master-side hook on
        /// every checkpoint.
        master_checkpoint_hook: bool,
    },
    Window {
        assigner: String,
        trigger: String,
        function_id: String,
    },
    Sink {
        sink_id: String,
    },
}

impl OperatorDescriptor {
    /// The master-hook factory contributed by this operator, if its user
    /// function declares the capability.
    pub fn master_checkpoint_hook(&self) -> Option<MasterCheckpointHookFactory> {
        match self {
            OperatorDescriptor::Udf {
                udf_id,
                master_checkpoint_hook: true,
                ..
            } => Some(MasterCheckpointHookFactory {
                udf_id: udf_id.clone(),
            }),
            _ => None,
        }
    }
}

/// Factory for a master-side checkpoint hook, eagerly serialized into the
/// checkpointing settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MasterCheckpointHookFactory {
    pub udf_id: String,
}

/// Reference to a type serializer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SerializerDescriptor {
    pub type_name: String,
}

impl SerializerDescriptor {
    pub fn of(type_name: &str) -> Self {
        Self {
            type_name: type_name.to_string(),
        }
    }
}

/// Reference to a key selector used to partition keyed state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeySelectorDescriptor {
    pub selector_id: String,
}

/// Reference to an input format driven by the master for split assignment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InputFormatDescriptor {
    pub format_id: String,
    pub config: Vec<u8>,
}

/// Serializable state backend reference.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum StateBackendDescriptor {
    Local,
    FileSystem { checkpoint_dir: String },
}

/// Which task runner a vertex executes as.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TaskKind {
    Source,
    OneInput,
    TwoInput,
    IterationHead,
    IterationTail,
}

impl TaskKind {
    pub fn is_iterative(&self) -> bool {
        matches!(self, TaskKind::IterationHead | TaskKind::IterationTail)
    }
}

/// A file distributed alongside the job, copied verbatim into the job graph.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CachedFile {
    pub name: String,
    pub path: String,
    pub executable: bool,
}
