use crate::descriptors::TaskKind;
use crate::graph::job_graph::{
    DistributionPattern, JobEdge, JobGraph, JobVertex, JobVertexKind, ResultPartitionType,
    ScheduleMode,
};
use crate::types::{JobId, JobVertexId};

fn vertex(byte: u8, name: &str) -> JobVertex {
    JobVertex::new(
        JobVertexId::from_hash([byte; 16]),
        name,
        JobVertexKind::Plain,
        TaskKind::OneInput,
    )
}

#[test]
fn test_new_graph_generates_job_id() {
    let graph = JobGraph::new(None, "wordcount");
    assert_eq!(graph.name, "wordcount");
    assert_eq!(graph.schedule_mode, ScheduleMode::Eager);
    assert!(graph.vertices.is_empty());
}

#[test]
fn test_provided_job_id_is_kept() {
    let id = JobId::generate("fixed");
    let graph = JobGraph::new(Some(id), "fixed");
    assert_eq!(graph.job_id, id);
}

#[test]
fn test_vertices_keep_insertion_order() {
    let mut graph = JobGraph::new(None, "ordered");
    graph.add_vertex(vertex(1, "first"));
    graph.add_vertex(vertex(2, "second"));
    graph.add_vertex(vertex(3, "third"));

    let names: Vec<_> = graph.vertices.iter().map(|v| v.name.as_str()).collect();
    assert_eq!(names, vec!["first", "second", "third"]);
    assert!(graph.vertex(JobVertexId::from_hash([2; 16])).is_some());
    assert!(graph.vertex_by_name("third").is_some());
}

#[test]
fn test_input_vertex_has_no_inputs() {
    let mut source = vertex(1, "source");
    assert!(source.is_input_vertex());

    source.inputs.push(JobEdge {
        source: JobVertexId::from_hash([9; 16]),
        target: source.id,
        distribution_pattern: DistributionPattern::Pointwise,
        partition_type: ResultPartitionType::PipelinedBounded,
        ship_strategy_name: "FORWARD".to_string(),
    });
    assert!(!source.is_input_vertex());
}

#[test]
fn test_edges_iterates_inputs_in_vertex_order() {
    let mut graph = JobGraph::new(None, "edges");
    let a = vertex(1, "a");
    let mut b = vertex(2, "b");
    b.inputs.push(JobEdge {
        source: a.id,
        target: b.id,
        distribution_pattern: DistributionPattern::AllToAll,
        partition_type: ResultPartitionType::PipelinedBounded,
        ship_strategy_name: "HASH".to_string(),
    });
    graph.add_vertex(a);
    graph.add_vertex(b);

    let edges: Vec<_> = graph.edges().collect();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].ship_strategy_name, "HASH");
}

#[test]
fn test_plan_bytes_roundtrip() {
    let mut graph = JobGraph::new(None, "roundtrip");
    graph.add_vertex(vertex(1, "only"));

    let bytes = graph.to_bytes().unwrap();
    let restored = JobGraph::from_bytes(&bytes).unwrap();
    assert_eq!(restored, graph);
}
