//! Graph-domain modules: logical StreamGraph, physical JobGraph, and the
//! compiler between them.

pub mod hasher;
pub mod job_graph;
pub mod job_graph_generator;
pub mod stream_config;
pub mod stream_graph;

pub use hasher::*;
pub use job_graph::*;
pub use job_graph_generator::*;
pub use stream_config::*;
pub use stream_graph::*;
