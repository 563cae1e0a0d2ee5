//! # Streamforge Core
//!
//! The plan compiler for the Streamforge stream processing engine: turns a
//! logical dataflow graph into the physical execution plan a cluster runs.
//!
//! - [`types`] — Core identities: [`NodeId`](types::NodeId),
//!   [`JobVertexId`](types::JobVertexId), [`OperatorId`](types::OperatorId),
//!   [`ResourceSpec`](types::ResourceSpec).
//! - [`graph`] — Logical DAG, physical plan, and the compiler:
//!   [`StreamGraph`](graph::StreamGraph), [`JobGraph`](graph::JobGraph),
//!   [`build_job_graph`](graph::build_job_graph) with operator chaining and
//!   content-derived hashing.
//! - [`config`] — Byte-addressable [`Configuration`](config::Configuration)
//!   and eager [`SerializedValue`](config::SerializedValue) wrappers.
//! - [`descriptors`] — Serializable references to user code carried through
//!   the plan.
//! - [`checkpoint`] — Checkpoint settings and the coordination descriptor.
//! - [`error`] — The fatal [`PlanError`](error::PlanError) conditions.

pub mod checkpoint;
pub mod config;
pub mod descriptors;
pub mod error;
pub mod graph;
pub mod types;
