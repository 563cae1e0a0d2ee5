use thiserror::Error;

use crate::types::NodeId;

/// Fatal conditions that abort plan compilation.
///
/// No partial job graph is ever returned; the first error surfaces to the
/// caller with the offending node or option.
#[derive(Debug, Error)]
pub enum PlanError {
    /// A node was referenced before its hash was generated, or the hasher
    /// could not resolve it (unexpected cycle).
    #[error("no hash generated for stream node {0}; unresolved predecessors or unexpected cycle")]
    MissingHash(NodeId),

    #[error("cannot use a co-location constraint without a slot sharing group (vertex \"{vertex}\")")]
    CoLocationWithoutSlotSharing { vertex: String },

    #[error("cannot co-locate operators from different slot sharing groups (co-location group \"{group}\")")]
    CoLocationAcrossSlotSharingGroups { group: String },

    #[error("externalized checkpoints enabled, but no cleanup mode configured")]
    ExternalizedCleanupUnset,

    #[error("could not serialize the execution config; non-serializable types were registered: {0}")]
    ExecutionConfigNotSerializable(#[source] bincode::Error),

    #[error("master checkpoint hooks are not serializable: {0}")]
    MasterHooksNotSerializable(#[source] bincode::Error),

    #[error("state backend is not serializable: {0}")]
    StateBackendNotSerializable(#[source] bincode::Error),

    #[error("could not serialize value for config key \"{key}\": {source}")]
    ConfigValueNotSerializable {
        key: String,
        #[source]
        source: bincode::Error,
    },
}

pub type Result<T> = std::result::Result<T, PlanError>;
