//! Content-derived node identities.
//!
//! Hashes are the bridge between submissions: a restored job can only map
//! state back onto its operators if an unchanged graph produces unchanged
//! identities. The deterministic hasher is authoritative; the user-hash
//! hasher surfaces externally pinned identities kept for compatibility with
//! state written under them.

use std::collections::{HashMap, HashSet, VecDeque};

use sha2::{Digest, Sha256};

use crate::error::{PlanError, Result};
use crate::graph::stream_graph::{StreamGraph, StreamNode};
use crate::types::{HASH_LEN, NodeHash, NodeId};

/// Assigns every stream node a 16-byte hash.
pub trait GraphHasher {
    /// Returns a map from node id to hash. The map may be sparse for hashers
    /// that only cover nodes with externally supplied identities.
    fn generate_hashes(&self, graph: &StreamGraph) -> Result<HashMap<NodeId, NodeHash>>;
}

/// The authoritative hasher.
///
/// Walks the graph breadth-first from the sources in ascending id order and
/// digests, per node: the visitation position, the chaining strategy, the
/// user-assigned uid when present, and every predecessor's hash in
/// input-edge order. A node is only hashed once all its predecessors are;
/// explicit iteration feedback edges do not count as predecessors.
pub struct DeterministicGraphHasher;

impl GraphHasher for DeterministicGraphHasher {
    fn generate_hashes(&self, graph: &StreamGraph) -> Result<HashMap<NodeId, NodeHash>> {
        let mut hashes: HashMap<NodeId, NodeHash> = HashMap::new();

        let sources = graph.source_ids();
        let mut visited: HashSet<NodeId> = sources.iter().copied().collect();
        let mut queue: VecDeque<NodeId> = sources.into();

        while let Some(node_id) = queue.pop_front() {
            let node = graph.node(node_id);
            if hashes.contains_key(&node_id) {
                continue;
            }
            if all_predecessors_hashed(graph, node, &hashes) {
                let hash = generate_node_hash(graph, node, &hashes);
                tracing::debug!("generated hash {:02x?} for node {}", hash, node_id);
                hashes.insert(node_id, hash);
                for edge in &node.out_edges {
                    if visited.insert(edge.target_id) {
                        queue.push_back(edge.target_id);
                    }
                }
            } else {
                // Revisit once the remaining predecessors are hashed; the
                // last of them re-enqueues this node.
                visited.remove(&node_id);
            }
        }

        if hashes.len() != graph.node_count() {
            let unresolved = graph
                .nodes()
                .map(|node| node.id)
                .find(|id| !hashes.contains_key(id))
                .unwrap_or_default();
            return Err(PlanError::MissingHash(unresolved));
        }
        Ok(hashes)
    }
}

fn all_predecessors_hashed(
    graph: &StreamGraph,
    node: &StreamNode,
    hashes: &HashMap<NodeId, NodeHash>,
) -> bool {
    node.in_edges
        .iter()
        .filter(|edge| !graph.is_iteration_back_edge(edge))
        .all(|edge| hashes.contains_key(&edge.source_id))
}

fn generate_node_hash(
    graph: &StreamGraph,
    node: &StreamNode,
    hashes: &HashMap<NodeId, NodeHash>,
) -> NodeHash {
    let mut digest = Sha256::new();
    digest.update((hashes.len() as u32).to_be_bytes());
    digest.update([node.chaining_strategy as u8]);
    if let Some(uid) = &node.uid {
        digest.update(uid.as_bytes());
    }
    for edge in &node.in_edges {
        if graph.is_iteration_back_edge(edge) {
            continue;
        }
        // Guarded by all_predecessors_hashed.
        digest.update(hashes[&edge.source_id]);
    }
    let out = digest.finalize();
    let mut hash = [0u8; HASH_LEN];
    hash.copy_from_slice(&out[..HASH_LEN]);
    hash
}

/// Surfaces identities pinned by the user on individual nodes.
///
/// The resulting map is sparse: nodes without a pinned hash have no entry.
pub struct UserHashGraphHasher;

impl GraphHasher for UserHashGraphHasher {
    fn generate_hashes(&self, graph: &StreamGraph) -> Result<HashMap<NodeId, NodeHash>> {
        Ok(graph
            .nodes()
            .filter_map(|node| node.user_hash.map(|hash| (node.id, hash)))
            .collect())
    }
}

#[cfg(test)]
#[path = "tests/hasher_tests.rs"]
mod tests;
