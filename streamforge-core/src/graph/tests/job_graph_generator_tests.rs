use crate::checkpoint::{
    CheckpointRetentionPolicy, CheckpointingMode, ExternalizedCheckpointCleanup,
};
use crate::config::ExecutionConfig;
use crate::descriptors::{
    CachedFile, InputFormatDescriptor, MasterCheckpointHookFactory, OperatorDescriptor,
    StateBackendDescriptor, TaskKind,
};
use crate::error::PlanError;
use crate::graph::hasher::{DeterministicGraphHasher, GraphHasher};
use crate::graph::job_graph::{DistributionPattern, JobVertexKind, ResultPartitionType};
use crate::graph::job_graph_generator::{build_job_graph, build_job_graph_with_id, is_chainable};
use crate::graph::stream_config::StreamConfig;
use crate::graph::stream_graph::{ChainingStrategy, Partitioner, StreamGraph};
use crate::types::{JobId, JobVertexId, NodeId, OperatorId};

fn udf(id: &str) -> Option<OperatorDescriptor> {
    Some(OperatorDescriptor::Udf {
        udf_id: id.to_string(),
        config: Vec::new(),
        master_checkpoint_hook: false,
    })
}

/// `S(HEAD) -> M(ALWAYS) -> K(ALWAYS)`, forward edges, uniform parallelism.
fn linear_chainable(parallelism: i32) -> (StreamGraph, [NodeId; 3]) {
    let mut g = StreamGraph::new("linear");
    let s = g.add_node("S", udf("s"), TaskKind::Source, parallelism);
    let m = g.add_node("M", udf("m"), TaskKind::OneInput, parallelism);
    let k = g.add_node("K", udf("k"), TaskKind::OneInput, parallelism);
    g.node_mut(s).chaining_strategy = ChainingStrategy::Head;
    g.add_edge(s, m, Partitioner::Forward);
    g.add_edge(m, k, Partitioner::Forward);
    (g, [s, m, k])
}

fn head_config(graph: &crate::graph::job_graph::JobGraph, name: &str) -> StreamConfig {
    let vertex = graph.vertex_by_name(name).expect("vertex by name");
    StreamConfig::from_configuration(vertex.configuration.clone())
}

// --- chainability predicate -------------------------------------------------

#[test]
fn test_chainable_baseline() {
    let (g, [s, _, _]) = linear_chainable(2);
    let edge = g.node(s).out_edges[0].clone();
    assert!(is_chainable(&edge, &g));
}

#[test]
fn test_not_chainable_with_two_inputs() {
    let (mut g, [_, m, _]) = linear_chainable(2);
    let extra = g.add_node("S2", udf("s2"), TaskKind::Source, 2);
    g.add_edge(extra, m, Partitioner::Forward);

    let edge = g.node(extra).out_edges[0].clone();
    assert!(!is_chainable(&edge, &g));
}

#[test]
fn test_not_chainable_without_target_operator() {
    let (mut g, [s, m, _]) = linear_chainable(2);
    g.node_mut(m).operator = None;
    let edge = g.node(s).out_edges[0].clone();
    assert!(!is_chainable(&edge, &g));
}

#[test]
fn test_not_chainable_without_source_operator() {
    let (mut g, [s, _, _]) = linear_chainable(2);
    g.node_mut(s).operator = None;
    let edge = g.node(s).out_edges[0].clone();
    assert!(!is_chainable(&edge, &g));
}

#[test]
fn test_not_chainable_across_slot_sharing_groups() {
    let (mut g, [s, m, _]) = linear_chainable(2);
    g.node_mut(m).slot_sharing_group = Some("other".to_string());
    let edge = g.node(s).out_edges[0].clone();
    assert!(!is_chainable(&edge, &g));
}

#[test]
fn test_not_chainable_when_target_strategy_not_always() {
    let (mut g, [s, m, _]) = linear_chainable(2);
    g.node_mut(m).chaining_strategy = ChainingStrategy::Head;
    let edge = g.node(s).out_edges[0].clone();
    assert!(!is_chainable(&edge, &g));
}

#[test]
fn test_not_chainable_when_source_strategy_never() {
    let (mut g, [s, _, _]) = linear_chainable(2);
    g.node_mut(s).chaining_strategy = ChainingStrategy::Never;
    let edge = g.node(s).out_edges[0].clone();
    assert!(!is_chainable(&edge, &g));
}

#[test]
fn test_not_chainable_without_forward_partitioner() {
    let mut g = StreamGraph::new("rebalance");
    let s = g.add_node("S", udf("s"), TaskKind::Source, 2);
    let m = g.add_node("M", udf("m"), TaskKind::OneInput, 2);
    g.add_edge(s, m, Partitioner::Rebalance);
    let edge = g.node(s).out_edges[0].clone();
    assert!(!is_chainable(&edge, &g));
}

#[test]
fn test_not_chainable_with_parallelism_mismatch() {
    let (mut g, [s, m, _]) = linear_chainable(2);
    g.node_mut(m).parallelism = 4;
    let edge = g.node(s).out_edges[0].clone();
    assert!(!is_chainable(&edge, &g));
}

#[test]
fn test_not_chainable_when_chaining_disabled() {
    let (mut g, [s, _, _]) = linear_chainable(2);
    g.chaining_enabled = false;
    let edge = g.node(s).out_edges[0].clone();
    assert!(!is_chainable(&edge, &g));
}

// --- chain building ---------------------------------------------------------

#[test]
fn test_linear_fusion_single_vertex() {
    let (g, [s, m, k]) = linear_chainable(2);
    let job = build_job_graph(&g).unwrap();

    assert_eq!(job.vertices.len(), 1);
    assert_eq!(job.edges().count(), 0);

    let vertex = &job.vertices[0];
    assert_eq!(vertex.name, "S -> M -> K");
    assert_eq!(vertex.parallelism, 2);

    // Identity equals the head node's primary hash.
    let hashes = DeterministicGraphHasher.generate_hashes(&g).unwrap();
    assert_eq!(vertex.id, JobVertexId::from_hash(hashes[&s]));
    // Member identities are recorded deepest-first, head last.
    assert_eq!(
        vertex.chained_operator_ids,
        vec![
            OperatorId::from_hash(hashes[&k]),
            OperatorId::from_hash(hashes[&m]),
            OperatorId::from_hash(hashes[&s]),
        ]
    );
}

#[test]
fn test_linear_fusion_embeds_member_configs() {
    let (g, [s, m, k]) = linear_chainable(2);
    let job = build_job_graph(&g).unwrap();

    let config = head_config(&job, "S -> M -> K");
    assert!(config.is_chain_start());
    assert_eq!(config.chain_index(), 0);
    assert_eq!(config.vertex_id(), Some(s));
    assert_eq!(config.operator_name().as_deref(), Some("S"));

    let members = config.chained_task_configs();
    assert_eq!(members.keys().copied().collect::<Vec<_>>(), vec![m, k]);

    let m_config = StreamConfig::from_configuration(members[&m].clone());
    assert_eq!(m_config.chain_index(), 1);
    assert_eq!(m_config.operator_name().as_deref(), Some("M"));
    assert!(!m_config.is_chain_end());

    let k_config = StreamConfig::from_configuration(members[&k].clone());
    assert_eq!(k_config.chain_index(), 2);
    assert!(k_config.is_chain_end());
}

#[test]
fn test_parallelism_break_splits_chain() {
    let (mut g, [_, m, k]) = linear_chainable(2);
    g.node_mut(m).parallelism = 4;
    g.node_mut(k).parallelism = 4;
    let job = build_job_graph(&g).unwrap();

    assert_eq!(job.vertices.len(), 2);
    assert_eq!(job.vertex_by_name("S").unwrap().parallelism, 2);
    assert_eq!(job.vertex_by_name("M -> K").unwrap().parallelism, 4);

    let edges: Vec<_> = job.edges().collect();
    assert_eq!(edges.len(), 1);
    // Forward stays pointwise even across a parallelism break.
    assert_eq!(edges[0].distribution_pattern, DistributionPattern::Pointwise);
    assert_eq!(edges[0].partition_type, ResultPartitionType::PipelinedBounded);
    assert_eq!(edges[0].ship_strategy_name, "FORWARD");
}

#[test]
fn test_strategy_never_isolates_operator() {
    let (mut g, [_, m, _]) = linear_chainable(2);
    g.node_mut(m).chaining_strategy = ChainingStrategy::Never;
    let job = build_job_graph(&g).unwrap();

    assert_eq!(job.vertices.len(), 3);
    assert_eq!(job.edges().count(), 2);
    for name in ["S", "M", "K"] {
        assert!(job.vertex_by_name(name).is_some(), "missing vertex {name}");
    }
}

#[test]
fn test_partitioner_break_goes_all_to_all() {
    let mut g = StreamGraph::new("keyed");
    let s = g.add_node("S", udf("s"), TaskKind::Source, 2);
    let m = g.add_node("M", udf("m"), TaskKind::OneInput, 2);
    let k = g.add_node("K", udf("k"), TaskKind::OneInput, 2);
    g.node_mut(s).chaining_strategy = ChainingStrategy::Head;
    g.add_edge(s, m, Partitioner::KeyGroup);
    g.add_edge(m, k, Partitioner::Forward);

    let job = build_job_graph(&g).unwrap();
    assert_eq!(job.vertices.len(), 2);
    assert!(job.vertex_by_name("S").is_some());
    assert!(job.vertex_by_name("M -> K").is_some());

    let edges: Vec<_> = job.edges().collect();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].distribution_pattern, DistributionPattern::AllToAll);
    assert_eq!(edges[0].ship_strategy_name, "HASH");
}

#[test]
fn test_rescale_is_pointwise() {
    let mut g = StreamGraph::new("rescale");
    let s = g.add_node("S", udf("s"), TaskKind::Source, 2);
    let m = g.add_node("M", udf("m"), TaskKind::OneInput, 4);
    g.add_edge(s, m, Partitioner::Rescale);

    let job = build_job_graph(&g).unwrap();
    let edges: Vec<_> = job.edges().collect();
    assert_eq!(edges[0].distribution_pattern, DistributionPattern::Pointwise);
    assert_eq!(edges[0].ship_strategy_name, "RESCALE");
}

#[test]
fn test_multi_output_chain_name() {
    let mut g = StreamGraph::new("fanout");
    let s = g.add_node("S", udf("s"), TaskKind::Source, 1);
    let a = g.add_node("A", udf("a"), TaskKind::OneInput, 1);
    let b = g.add_node("B", udf("b"), TaskKind::OneInput, 1);
    g.node_mut(s).chaining_strategy = ChainingStrategy::Head;
    g.add_edge(s, a, Partitioner::Forward);
    g.add_edge(s, b, Partitioner::Forward);

    let job = build_job_graph(&g).unwrap();
    assert_eq!(job.vertices.len(), 1);
    assert_eq!(job.vertices[0].name, "S -> (A, B)");
}

#[test]
fn test_chaining_disabled_globally() {
    let (mut g, _) = linear_chainable(2);
    g.chaining_enabled = false;
    let job = build_job_graph(&g).unwrap();
    assert_eq!(job.vertices.len(), 3);
    assert_eq!(job.edges().count(), 2);
}

#[test]
fn test_chain_coverage_is_a_partition_of_nodes() {
    // Two sources fan into a keyed stage that fans out again.
    let mut g = StreamGraph::new("coverage");
    let s1 = g.add_node("S1", udf("s1"), TaskKind::Source, 2);
    let s2 = g.add_node("S2", udf("s2"), TaskKind::Source, 2);
    let agg = g.add_node("Agg", udf("agg"), TaskKind::OneInput, 4);
    let post = g.add_node("Post", udf("post"), TaskKind::OneInput, 4);
    let sink = g.add_node("Sink", udf("sink"), TaskKind::OneInput, 1);
    g.add_edge(s1, agg, Partitioner::KeyGroup);
    g.add_edge(s2, agg, Partitioner::KeyGroup);
    g.add_edge(agg, post, Partitioner::Forward);
    g.add_edge(post, sink, Partitioner::Rebalance);

    let job = build_job_graph(&g).unwrap();

    let mut covered: Vec<OperatorId> = job
        .vertices
        .iter()
        .flat_map(|v| v.chained_operator_ids.iter().copied())
        .collect();
    assert_eq!(covered.len(), g.node_count());
    covered.sort_unstable();
    covered.dedup();
    assert_eq!(covered.len(), g.node_count(), "chains must not overlap");

    // Every non-chainable stream edge corresponds to exactly one job edge.
    assert_eq!(job.edges().count(), 3);
}

#[test]
fn test_transitive_out_edges_and_raw_out_edges_recorded() {
    let mut g = StreamGraph::new("transitive");
    let s = g.add_node("S", udf("s"), TaskKind::Source, 1);
    let m = g.add_node("M", udf("m"), TaskKind::OneInput, 1);
    let d = g.add_node("D", udf("d"), TaskKind::OneInput, 4);
    g.node_mut(s).chaining_strategy = ChainingStrategy::Head;
    g.add_edge(s, m, Partitioner::Forward);
    g.add_edge(m, d, Partitioner::Rebalance);

    let job = build_job_graph(&g).unwrap();
    let config = head_config(&job, "S -> M");

    // The edge leaving the chain originates at the chained member M.
    let transitive = config.out_edges_in_order();
    assert_eq!(transitive.len(), 1);
    assert_eq!(transitive[0].source_id, m);
    assert_eq!(transitive[0].target_id, d);

    // Non-chained output bookkeeping lives in the member's own config.
    let members = config.chained_task_configs();
    let m_config = StreamConfig::from_configuration(members[&m].clone());
    assert_eq!(m_config.number_of_outputs(), 1);
    assert_eq!(m_config.non_chained_outputs()[0].target_id, d);
}

#[test]
fn test_in_edges_indexed_in_connect_order() {
    let mut g = StreamGraph::new("merge");
    let s1 = g.add_node("S1", udf("s1"), TaskKind::Source, 1);
    let s2 = g.add_node("S2", udf("s2"), TaskKind::Source, 1);
    let sink = g.add_node("Sink", udf("sink"), TaskKind::OneInput, 2);
    g.add_edge(s1, sink, Partitioner::Rebalance);
    g.add_edge(s2, sink, Partitioner::Rebalance);

    let job = build_job_graph(&g).unwrap();
    let config = head_config(&job, "Sink");

    // Chains build from sources ascending, so S1 connects before S2.
    let in_edges = config.in_physical_edges();
    assert_eq!(in_edges.len(), 2);
    assert_eq!(in_edges[0].source_id, s1);
    assert_eq!(in_edges[1].source_id, s2);
    assert_eq!(config.number_of_inputs(), 2);
}

#[test]
fn test_vertex_order_is_materialization_order() {
    let (mut g, [_, m, _]) = linear_chainable(2);
    g.node_mut(m).chaining_strategy = ChainingStrategy::Never;
    let job = build_job_graph(&g).unwrap();

    // Chains materialize on the way back out of the depth-first walk, so
    // the deepest chain lands first.
    let names: Vec<_> = job.vertices.iter().map(|v| v.name.as_str()).collect();
    assert_eq!(names, vec!["K", "M", "S"]);
}

#[test]
fn test_default_parallelism_kept_when_node_inherits() {
    let mut g = StreamGraph::new("inherit");
    g.add_node("S", udf("s"), TaskKind::Source, -1);
    let job = build_job_graph(&g).unwrap();
    assert_eq!(
        job.vertices[0].parallelism,
        crate::graph::job_graph::DEFAULT_PARALLELISM
    );
}

#[test]
fn test_resources_merged_across_chain() {
    use crate::types::ResourceSpec;

    let (mut g, [s, m, k]) = linear_chainable(2);
    g.node_mut(s).min_resources = ResourceSpec::new(0.5, 128);
    g.node_mut(m).min_resources = ResourceSpec::new(1.0, 256);
    g.node_mut(k).min_resources = ResourceSpec::new(0.5, 128);
    g.node_mut(s).preferred_resources = ResourceSpec::new(1.0, 512);
    g.node_mut(m).preferred_resources = ResourceSpec::new(1.0, 512);
    g.node_mut(k).preferred_resources = ResourceSpec::new(1.0, 512);

    let job = build_job_graph(&g).unwrap();
    let vertex = &job.vertices[0];
    assert_eq!(vertex.min_resources, ResourceSpec::new(2.0, 512));
    assert_eq!(vertex.preferred_resources, ResourceSpec::new(3.0, 1536));
}

#[test]
fn test_input_format_vertex_kind_and_stub() {
    let mut g = StreamGraph::new("files");
    let s = g.add_node("FileSource", udf("files"), TaskKind::Source, 1);
    g.node_mut(s).input_format = Some(InputFormatDescriptor {
        format_id: "csv".to_string(),
        config: vec![42],
    });

    let job = build_job_graph(&g).unwrap();
    let vertex = &job.vertices[0];
    assert_eq!(vertex.kind, JobVertexKind::InputFormat);

    let config = StreamConfig::from_configuration(vertex.configuration.clone());
    assert_eq!(config.input_format_stub().unwrap().format_id, "csv");
}

#[test]
fn test_side_output_serializers_derived_from_tags() {
    use crate::descriptors::SerializerDescriptor;
    use crate::graph::stream_graph::OutputTag;

    let mut g = StreamGraph::new("side-outputs");
    let s = g.add_node("S", udf("s"), TaskKind::Source, 1);
    let main = g.add_node("Main", udf("main"), TaskKind::OneInput, 1);
    let late = g.add_node("Late", udf("late"), TaskKind::OneInput, 4);
    g.node_mut(s).chaining_strategy = ChainingStrategy::Head;
    g.add_edge(s, main, Partitioner::Forward);
    g.add_side_output_edge(
        s,
        late,
        Partitioner::Rebalance,
        OutputTag {
            id: "late-events".to_string(),
            type_name: "Event".to_string(),
        },
    );

    let job = build_job_graph(&g).unwrap();
    let config = head_config(&job, "S -> Main");
    let side_outputs = config.side_output_serializers();
    assert_eq!(side_outputs.len(), 1);
    assert_eq!(side_outputs["late-events"], SerializerDescriptor::of("Event"));
}

#[test]
fn test_max_parallelism_taken_from_head() {
    let (mut g, [s, _, _]) = linear_chainable(2);
    g.node_mut(s).max_parallelism = 256;
    let job = build_job_graph(&g).unwrap();
    assert_eq!(job.vertices[0].max_parallelism, 256);
}

#[test]
fn test_user_hash_surfaces_as_alternative_ids() {
    let (mut g, [s, m, _]) = linear_chainable(2);
    g.node_mut(s).user_hash = Some([0x11; 16]);
    g.node_mut(m).user_hash = Some([0x22; 16]);

    let job = build_job_graph(&g).unwrap();
    let vertex = &job.vertices[0];
    assert_eq!(vertex.alternative_ids, vec![JobVertexId::from_hash([0x11; 16])]);

    // Aligned with chained_operator_ids: K has none, M and S are pinned.
    assert_eq!(
        vertex.user_defined_operator_ids,
        vec![
            None,
            Some(OperatorId::from_hash([0x22; 16])),
            Some(OperatorId::from_hash([0x11; 16])),
        ]
    );
}

#[test]
fn test_iteration_configs_carry_broker_and_timeout() {
    let mut g = StreamGraph::new("loop");
    let head = g.add_node("IterationHead", udf("head"), TaskKind::IterationHead, 1);
    let tail = g.add_node("IterationTail", udf("tail"), TaskKind::IterationTail, 1);
    g.node_mut(head).chaining_strategy = ChainingStrategy::Head;
    g.node_mut(tail).chaining_strategy = ChainingStrategy::Never;
    g.add_edge(head, tail, Partitioner::Forward);
    g.add_iteration_pair(head, tail, "loop-7", 60_000);

    let job = build_job_graph(&g).unwrap();
    let head_cfg = head_config(&job, "IterationHead");
    assert_eq!(head_cfg.iteration_id().as_deref(), Some("loop-7"));
    assert_eq!(head_cfg.iteration_wait_time(), 60_000);
}

// --- determinism ------------------------------------------------------------

#[test]
fn test_compile_is_deterministic() {
    let build = || {
        let mut g = StreamGraph::new("deterministic");
        let s1 = g.add_node("S1", udf("s1"), TaskKind::Source, 2);
        let s2 = g.add_node("S2", udf("s2"), TaskKind::Source, 2);
        let agg = g.add_node("Agg", udf("agg"), TaskKind::OneInput, 4);
        let sink = g.add_node("Sink", udf("sink"), TaskKind::OneInput, 4);
        g.node_mut(s2).slot_sharing_group = Some("io".to_string());
        g.add_edge(s1, agg, Partitioner::KeyGroup);
        g.add_edge(s2, agg, Partitioner::KeyGroup);
        g.add_edge(agg, sink, Partitioner::Forward);
        g.checkpoint_config.interval = 1_000;
        g.state_backend = Some(StateBackendDescriptor::Local);
        g
    };

    let job_id = JobId::generate("deterministic");
    let first = build_job_graph_with_id(&build(), job_id).unwrap();
    let second = build_job_graph_with_id(&build(), job_id).unwrap();

    let ids = |job: &crate::graph::job_graph::JobGraph| {
        job.vertices
            .iter()
            .map(|v| (v.id, v.chained_operator_ids.clone()))
            .collect::<Vec<_>>()
    };
    assert_eq!(ids(&first), ids(&second));
    assert_eq!(
        first.to_bytes().unwrap(),
        second.to_bytes().unwrap(),
        "equal graphs must compile to byte-equal plans"
    );
}

// --- slot sharing and co-location -------------------------------------------

#[test]
fn test_slot_sharing_groups_interned_by_name() {
    let mut g = StreamGraph::new("slots");
    let s1 = g.add_node("S1", udf("s1"), TaskKind::Source, 1);
    let s2 = g.add_node("S2", udf("s2"), TaskKind::Source, 1);
    let s3 = g.add_node("S3", udf("s3"), TaskKind::Source, 1);
    g.node_mut(s1).slot_sharing_group = Some("io".to_string());
    g.node_mut(s2).slot_sharing_group = Some("io".to_string());
    g.node_mut(s3).slot_sharing_group = Some("compute".to_string());

    let job = build_job_graph(&g).unwrap();
    assert_eq!(job.slot_sharing_groups.len(), 2);

    let io_group = job.vertex_by_name("S1").unwrap().slot_sharing_group;
    assert_eq!(job.vertex_by_name("S2").unwrap().slot_sharing_group, io_group);
    assert_ne!(job.vertex_by_name("S3").unwrap().slot_sharing_group, io_group);

    let group = job.slot_sharing_group(io_group.unwrap()).unwrap();
    assert_eq!(group.vertices.len(), 2);
}

#[test]
fn test_co_location_requires_slot_sharing() {
    let mut g = StreamGraph::new("bad-colocation");
    let s = g.add_node("S", udf("s"), TaskKind::Source, 1);
    g.node_mut(s).slot_sharing_group = None;
    g.node_mut(s).co_location_group = Some("pair".to_string());

    let err = build_job_graph(&g).unwrap_err();
    assert!(matches!(err, PlanError::CoLocationWithoutSlotSharing { .. }));
}

#[test]
fn test_co_location_across_slot_sharing_groups_rejected() {
    let mut g = StreamGraph::new("cross-colocation");
    let s1 = g.add_node("S1", udf("s1"), TaskKind::Source, 1);
    let s2 = g.add_node("S2", udf("s2"), TaskKind::Source, 1);
    g.node_mut(s1).slot_sharing_group = Some("a".to_string());
    g.node_mut(s2).slot_sharing_group = Some("b".to_string());
    g.node_mut(s1).co_location_group = Some("pair".to_string());
    g.node_mut(s2).co_location_group = Some("pair".to_string());

    let err = build_job_graph(&g).unwrap_err();
    assert!(matches!(
        err,
        PlanError::CoLocationAcrossSlotSharingGroups { group } if group == "pair"
    ));
}

#[test]
fn test_named_co_location_groups_shared() {
    let mut g = StreamGraph::new("pairing");
    let s1 = g.add_node("S1", udf("s1"), TaskKind::Source, 1);
    let s2 = g.add_node("S2", udf("s2"), TaskKind::Source, 1);
    g.node_mut(s1).co_location_group = Some("pair".to_string());
    g.node_mut(s2).co_location_group = Some("pair".to_string());

    let job = build_job_graph(&g).unwrap();
    let g1 = job.vertex_by_name("S1").unwrap().co_location_group.unwrap();
    let g2 = job.vertex_by_name("S2").unwrap().co_location_group.unwrap();
    assert_eq!(g1, g2);
    assert_eq!(job.co_location_group(g1).unwrap().vertices.len(), 2);
}

#[test]
fn test_iteration_pair_overrides_co_location() {
    let mut g = StreamGraph::new("loop");
    let head = g.add_node("IterationHead", udf("head"), TaskKind::IterationHead, 1);
    let body = g.add_node("Body", udf("body"), TaskKind::OneInput, 1);
    let tail = g.add_node("IterationTail", udf("tail"), TaskKind::IterationTail, 1);
    // Distinct slot-sharing groups keep all three unchained; the tail also
    // starts out in a named co-location group that the pair must override.
    g.node_mut(head).slot_sharing_group = Some("a".to_string());
    g.node_mut(tail).slot_sharing_group = Some("b".to_string());
    g.node_mut(tail).co_location_group = Some("previous".to_string());
    g.add_edge(head, body, Partitioner::Forward);
    g.add_edge(body, tail, Partitioner::Forward);
    g.add_iteration_pair(head, tail, "loop-0", 10_000);

    let job = build_job_graph(&g).unwrap();
    let head_group = job
        .vertex_by_name("IterationHead")
        .unwrap()
        .co_location_group
        .unwrap();
    let tail_group = job
        .vertex_by_name("IterationTail")
        .unwrap()
        .co_location_group
        .unwrap();
    assert_eq!(head_group, tail_group);

    let pair_group = job.co_location_group(head_group).unwrap();
    assert_eq!(pair_group.vertices.len(), 2);

    // The named group the tail was interned into no longer holds it.
    let emptied = job
        .co_location_groups
        .iter()
        .find(|group| group.id != head_group)
        .unwrap();
    assert!(emptied.vertices.is_empty());
}

// --- checkpointing ----------------------------------------------------------

#[test]
fn test_checkpointing_disabled_uses_max_interval() {
    let (g, _) = linear_chainable(2);
    let job = build_job_graph(&g).unwrap();

    let settings = job.snapshot_settings.as_ref().unwrap();
    assert_eq!(settings.coordinator_configuration.checkpoint_interval, i64::MAX);
    assert_eq!(
        settings.coordinator_configuration.retention_policy,
        CheckpointRetentionPolicy::NeverRetainAfterTermination
    );

    // Cheaper at-least-once handler when no barriers flow.
    let config = head_config(&job, "S -> M -> K");
    assert!(!config.checkpointing_enabled());
    assert_eq!(config.checkpoint_mode(), Some(CheckpointingMode::AtLeastOnce));
}

#[test]
fn test_checkpoint_partition_trigger_ack_commit() {
    let mut g = StreamGraph::new("partition");
    let s1 = g.add_node("S1", udf("s1"), TaskKind::Source, 1);
    let s2 = g.add_node("S2", udf("s2"), TaskKind::Source, 1);
    let sink = g.add_node("Sink", udf("sink"), TaskKind::OneInput, 2);
    g.add_edge(s1, sink, Partitioner::Rebalance);
    g.add_edge(s2, sink, Partitioner::Rebalance);
    g.checkpoint_config.interval = 5_000;

    let job = build_job_graph(&g).unwrap();
    let settings = job.snapshot_settings.as_ref().unwrap();

    let source_ids = vec![
        job.vertex_by_name("S1").unwrap().id,
        job.vertex_by_name("S2").unwrap().id,
    ];
    assert_eq!(settings.trigger_vertices, source_ids);

    let all_ids: Vec<_> = job.vertices.iter().map(|v| v.id).collect();
    assert_eq!(settings.ack_vertices, all_ids);
    assert_eq!(settings.commit_vertices, all_ids);
    assert_eq!(settings.coordinator_configuration.checkpoint_interval, 5_000);
    assert!(settings.coordinator_configuration.exactly_once);

    let config = head_config(&job, "Sink");
    assert!(config.checkpointing_enabled());
    assert_eq!(config.checkpoint_mode(), Some(CheckpointingMode::ExactlyOnce));
}

#[test]
fn test_externalized_retention_table() {
    let retention_for = |cleanup: Option<ExternalizedCheckpointCleanup>| {
        let (mut g, _) = linear_chainable(1);
        g.checkpoint_config.interval = 1_000;
        g.checkpoint_config.externalized = true;
        g.checkpoint_config.externalized_cleanup = cleanup;
        build_job_graph(&g).map(|job| {
            job.snapshot_settings
                .unwrap()
                .coordinator_configuration
                .retention_policy
        })
    };

    assert_eq!(
        retention_for(Some(ExternalizedCheckpointCleanup::DeleteOnCancellation)).unwrap(),
        CheckpointRetentionPolicy::RetainOnFailure
    );
    assert_eq!(
        retention_for(Some(ExternalizedCheckpointCleanup::RetainOnCancellation)).unwrap(),
        CheckpointRetentionPolicy::RetainOnCancellation
    );
    assert!(matches!(
        retention_for(None).unwrap_err(),
        PlanError::ExternalizedCleanupUnset
    ));
}

#[test]
fn test_fail_on_checkpoint_error_propagated_to_execution_config() {
    let (mut g, _) = linear_chainable(1);
    g.checkpoint_config.interval = 1_000;
    g.checkpoint_config.fail_on_checkpointing_errors = false;

    let job = build_job_graph(&g).unwrap();
    let decoded: ExecutionConfig = job
        .serialized_execution_config
        .as_ref()
        .unwrap()
        .deserialize()
        .unwrap();
    assert!(!decoded.fail_task_on_checkpoint_error);
}

#[test]
fn test_master_hooks_collected_and_serialized() {
    let mut g = StreamGraph::new("hooks");
    let s = g.add_node("S", udf("s"), TaskKind::Source, 1);
    g.node_mut(s).operator = Some(OperatorDescriptor::Udf {
        udf_id: "coordinated-source".to_string(),
        config: Vec::new(),
        master_checkpoint_hook: true,
    });
    g.checkpoint_config.interval = 1_000;
    g.state_backend = Some(StateBackendDescriptor::FileSystem {
        checkpoint_dir: "/tmp/ckpt".to_string(),
    });

    let job = build_job_graph(&g).unwrap();
    let settings = job.snapshot_settings.as_ref().unwrap();

    let hooks: Vec<MasterCheckpointHookFactory> = settings
        .serialized_master_hooks
        .as_ref()
        .unwrap()
        .deserialize()
        .unwrap();
    assert_eq!(hooks.len(), 1);
    assert_eq!(hooks[0].udf_id, "coordinated-source");

    let backend: StateBackendDescriptor = settings
        .serialized_state_backend
        .as_ref()
        .unwrap()
        .deserialize()
        .unwrap();
    assert_eq!(
        backend,
        StateBackendDescriptor::FileSystem {
            checkpoint_dir: "/tmp/ckpt".to_string()
        }
    );
}

#[test]
fn test_no_hooks_serializes_none() {
    let (g, _) = linear_chainable(1);
    let job = build_job_graph(&g).unwrap();
    let settings = job.snapshot_settings.as_ref().unwrap();
    assert!(settings.serialized_master_hooks.is_none());
    assert!(settings.serialized_state_backend.is_none());
}

// --- job graph assembly -----------------------------------------------------

#[test]
fn test_user_artifacts_copied() {
    let (mut g, _) = linear_chainable(1);
    g.cached_files.push(CachedFile {
        name: "dictionary".to_string(),
        path: "/data/dict.bin".to_string(),
        executable: false,
    });

    let job = build_job_graph(&g).unwrap();
    assert_eq!(job.user_artifacts.len(), 1);
    assert_eq!(job.user_artifacts[0].name, "dictionary");
}

#[test]
fn test_provided_job_id_and_name() {
    let (g, _) = linear_chainable(1);
    let job_id = JobId::generate("pinned");
    let job = build_job_graph_with_id(&g, job_id).unwrap();
    assert_eq!(job.job_id, job_id);
    assert_eq!(job.name, "linear");
}
