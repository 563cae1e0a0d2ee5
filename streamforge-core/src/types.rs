use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Unique identifier for stream-graph nodes.
pub type NodeId = u32;

/// Length in bytes of all content-derived identities.
pub const HASH_LEN: usize = 16;

/// A 16-byte content hash assigned to a stream node.
pub type NodeHash = [u8; HASH_LEN];

fn write_hex(f: &mut fmt::Formatter<'_>, bytes: &[u8]) -> fmt::Result {
    for b in bytes {
        write!(f, "{b:02x}")?;
    }
    Ok(())
}

/// Identity of a job vertex, equal to the primary hash of its chain head.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct JobVertexId(pub NodeHash);

impl JobVertexId {
    pub fn from_hash(hash: NodeHash) -> Self {
        Self(hash)
    }

    pub fn as_bytes(&self) -> &NodeHash {
        &self.0
    }
}

impl fmt::Display for JobVertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_hex(f, &self.0)
    }
}

impl fmt::Debug for JobVertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JobVertexId({self})")
    }
}

/// Identity of a single operator inside a chain.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OperatorId(pub NodeHash);

impl OperatorId {
    pub fn from_hash(hash: NodeHash) -> Self {
        Self(hash)
    }

    pub fn as_bytes(&self) -> &NodeHash {
        &self.0
    }
}

impl fmt::Display for OperatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_hex(f, &self.0)
    }
}

impl fmt::Debug for OperatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OperatorId({self})")
    }
}

/// Identity of one job submission.
///
/// Unlike vertex and operator ids, the job id is not content-derived: two
/// submissions of the same graph are distinct jobs.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct JobId(pub NodeHash);

impl JobId {
    /// Derive a fresh job id from the job name and the submission instant.
    pub fn generate(job_name: &str) -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let mut digest = Sha256::new();
        digest.update(nanos.to_be_bytes());
        digest.update(job_name.as_bytes());
        let out = digest.finalize();
        let mut id = [0u8; HASH_LEN];
        id.copy_from_slice(&out[..HASH_LEN]);
        Self(id)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_hex(f, &self.0)
    }
}

impl fmt::Debug for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JobId({self})")
    }
}

/// Resource requirements declared by an operator and merged across a chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceSpec {
    pub cpu_cores: f64,
    pub heap_memory_mb: u64,
}

impl ResourceSpec {
    pub const ZERO: ResourceSpec = ResourceSpec {
        cpu_cores: 0.0,
        heap_memory_mb: 0,
    };

    pub fn new(cpu_cores: f64, heap_memory_mb: u64) -> Self {
        Self {
            cpu_cores,
            heap_memory_mb,
        }
    }

    /// Combine the requirements of two operators sharing one task.
    pub fn merge(self, other: ResourceSpec) -> ResourceSpec {
        ResourceSpec {
            cpu_cores: self.cpu_cores + other.cpu_cores,
            heap_memory_mb: self.heap_memory_mb + other.heap_memory_mb,
        }
    }
}

#[cfg(test)]
#[path = "tests/types_tests.rs"]
mod tests;
