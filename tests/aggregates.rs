//! Vertex shapes of grouping, co-grouping and windowed aggregations.

use anyhow::Result;
use ironjet::aggregate::{co_counting, counting};
use ironjet::function::{KeyFn, KeySelector};
use ironjet::processor::ProcessorSupplier;
use ironjet::testing::*;
use ironjet::*;

fn identity_key() -> KeyFn {
    KeyFn::new(|it| it.clone())
}

#[test]
fn two_way_co_group_partitions_each_input_by_its_key() -> Result<()> {
    let p = TestPipeline::new();
    let (k0, k1) = (identity_key(), identity_key());
    let left = p.draw_from(list_source("left"));
    let right = p.draw_from(list_source("right"));
    left.grouping_key(k0.clone())
        .aggregate2(&right.grouping_key(k1.clone()), co_counting(2))
        .drain_to(list_sink("out"));

    let dag = p.compile()?;
    let stage1 = "2-way co-group-and-aggregate-stage1";
    let stage2 = "2-way co-group-and-aggregate-stage2";
    assert_vertex_names(&dag, &["left", "right", stage1, stage2, "out"]);
    assert_inbound(&dag, stage1, &["left", "right"]);
    assert!(assert_edge(&dag, "left", stage1).is_partitioned_by(&k0));
    assert!(assert_edge(&dag, "right", stage1).is_partitioned_by(&k1));
    assert!(!assert_edge(&dag, "right", stage1).is_partitioned_by(&k0));
    assert_distributed(assert_edge(&dag, stage1, stage2));
    Ok(())
}

#[test]
fn co_group_builder_accepts_more_inputs() -> Result<()> {
    let p = TestPipeline::new();
    let a = p.draw_from(list_source("a")).grouping_key(identity_key());
    let b = p.draw_from(list_source("b")).grouping_key(identity_key());
    let c = p.draw_from(list_source("c")).grouping_key(identity_key());

    let mut builder = a.co_group(&b);
    let tag = builder.add(&c);
    assert_eq!(tag.index(), 2);
    builder.aggregate(co_counting(3)).drain_to(list_sink("out"));

    let dag = p.compile()?;
    assert_inbound(&dag, "3-way co-group-and-aggregate-stage1", &["a", "b", "c"]);
    Ok(())
}

#[test]
fn windowed_co_group_is_unsupported() {
    let p = TestPipeline::new();
    let a = p.draw_from(list_source("a")).grouping_key(identity_key());
    let b = p.draw_from(list_source("b")).grouping_key(identity_key());
    a.co_group(&b)
        .window(WindowDefinition::tumbling(1_000))
        .aggregate(co_counting(2))
        .drain_to(list_sink("out"));

    let err = p.compile().expect_err("windowed co-grouping must fail");
    assert!(matches!(err, CompileError::UnsupportedOperation { .. }));
    assert_eq!(err.to_string(), "Windowed co-grouping is not yet implemented");
}

#[test]
fn aggregate_arity_must_match_inputs() {
    let p = TestPipeline::new();
    let a = p.draw_from(list_source("a")).grouping_key(identity_key());
    let b = p.draw_from(list_source("b")).grouping_key(identity_key());
    a.aggregate2(&b, counting()).drain_to(list_sink("out"));

    let err = p.compile().expect_err("arity 1 for two inputs");
    assert!(matches!(err, CompileError::ArityMismatch { arity: 1, inputs: 2, .. }));
}

#[test]
fn keyed_sliding_window_uses_frame_cascade() -> Result<()> {
    let p = TestPipeline::new();
    let key = identity_key();
    p.draw_from(list_source("events"))
        .grouping_key(key.clone())
        .window(WindowDefinition::sliding(10_000, 1_000))
        .aggregate(counting())
        .drain_to(list_sink("out"));

    let dag = p.compile()?;
    assert_vertex_names(&dag, &["events", "sliding-window-stage1", "sliding-window-stage2", "out"]);
    assert_processor_kind(&dag, "sliding-window-stage1", "accumulate-by-frame");
    assert_processor_kind(&dag, "sliding-window-stage2", "combine-to-sliding-window");

    let inbound = assert_edge(&dag, "events", "sliding-window-stage1");
    assert!(inbound.is_partitioned_by(&key));
    assert!(matches!(
        inbound.fan_out(),
        FanOut::Partitioned { strategy: PartitionStrategy::HashCode, .. }
    ));
    let between = assert_edge(&dag, "sliding-window-stage1", "sliding-window-stage2");
    assert_distributed(between);
    assert!(matches!(between.fan_out(), FanOut::Partitioned { key: KeySelector::EntryKey, .. }));

    let ProcessorSupplier::CombineToSlidingWindow { policy, .. } =
        assert_has_vertex(&dag, "sliding-window-stage2").supplier()
    else {
        panic!("stage2 should combine frames");
    };
    assert_eq!(policy.frame_size(), 1_000);
    assert_eq!(policy.window_size(), 10_000);
    Ok(())
}

#[test]
fn tumbling_and_sliding_windows_share_a_shape() -> Result<()> {
    let shape_of = |window: WindowDefinition| -> Result<Dag> {
        let p = TestPipeline::new();
        p.draw_from(list_source("events"))
            .grouping_key(identity_key())
            .window(window)
            .aggregate(counting())
            .drain_to(list_sink("out"));
        Ok(p.compile()?)
    };
    let tumbling = shape_of(WindowDefinition::tumbling(5_000))?;
    let sliding = shape_of(WindowDefinition::sliding(5_000, 1_000))?;
    assert_same_shape(&tumbling, &sliding);
    Ok(())
}

#[test]
fn keyed_session_window_is_a_single_vertex() -> Result<()> {
    let p = TestPipeline::new();
    let key = identity_key();
    p.draw_from(list_source("clicks"))
        .grouping_key(key.clone())
        .window(WindowDefinition::session(30_000))
        .aggregate(counting())
        .drain_to(list_sink("sessions"));

    let dag = p.compile()?;
    assert_vertex_names(&dag, &["clicks", "session-window", "sessions"]);
    let inbound = assert_edge(&dag, "clicks", "session-window");
    assert_local(inbound);
    assert!(inbound.is_partitioned_by(&key));
    assert_processor_kind(&dag, "session-window", "aggregate-to-session-window");
    Ok(())
}

#[test]
fn second_window_gets_a_numbered_prefix() -> Result<()> {
    let p = TestPipeline::new();
    let src = p.draw_from(list_source("events"));
    for _ in 0..2 {
        src.grouping_key(identity_key())
            .window(WindowDefinition::tumbling(1_000))
            .aggregate(counting())
            .drain_to(list_sink("out"));
    }
    let dag = p.compile()?;
    assert_has_vertex(&dag, "sliding-window-stage1");
    assert_has_vertex(&dag, "sliding-window-2-stage1");
    assert_has_vertex(&dag, "sliding-window-2-stage2");
    Ok(())
}

#[test]
fn global_window_sends_frames_to_one_combiner() -> Result<()> {
    let p = TestPipeline::new();
    let a = p.draw_from(list_source("a"));
    let b = p.draw_from(list_source("b"));
    a.window(WindowDefinition::tumbling(1_000))
        .aggregate_all(&[&b], co_counting(2))
        .drain_to(list_sink("out"));

    let dag = p.compile()?;
    assert_inbound(&dag, "sliding-window-stage1", &["a", "b"]);
    let plain = assert_edge(&dag, "b", "sliding-window-stage1");
    assert_local(plain);
    assert!(matches!(plain.fan_out(), FanOut::Unicast));

    let between = assert_edge(&dag, "sliding-window-stage1", "sliding-window-stage2");
    assert_distributed(between);
    assert!(matches!(between.fan_out(), FanOut::AllToOne));

    let ProcessorSupplier::AccumulateByFrame { keys, .. } =
        assert_has_vertex(&dag, "sliding-window-stage1").supplier()
    else {
        panic!("stage1 should accumulate frames");
    };
    assert_eq!(keys.len(), 2);
    assert!(keys.iter().all(|k| matches!(k, KeySelector::Constant)));
    Ok(())
}

#[test]
fn global_session_window_is_all_to_one() -> Result<()> {
    let p = TestPipeline::new();
    p.draw_from(list_source("clicks"))
        .window(WindowDefinition::session(500))
        .aggregate(counting())
        .drain_to(list_sink("out"));

    let dag = p.compile()?;
    let inbound = assert_edge(&dag, "clicks", "session-window");
    assert_local(inbound);
    assert!(matches!(inbound.fan_out(), FanOut::AllToOne));
    Ok(())
}

#[test]
fn memory_optimized_grouping_uses_one_vertex() -> Result<()> {
    let p = TestPipeline::new();
    let key = identity_key();
    p.draw_from(list_source("words"))
        .grouping_key(key.clone())
        .optimize_memory()
        .aggregate(counting())
        .drain_to(list_sink("counts"));

    let dag = p.compile()?;
    assert_vertex_names(&dag, &["words", "group-and-aggregate", "counts"]);
    assert_processor_kind(&dag, "group-and-aggregate", "aggregate-by-key");
    let inbound = assert_edge(&dag, "words", "group-and-aggregate");
    assert_distributed(inbound);
    assert!(inbound.is_partitioned_by(&key));
    assert!(matches!(
        inbound.fan_out(),
        FanOut::Partitioned { strategy: PartitionStrategy::Default, .. }
    ));
    Ok(())
}

#[test]
fn invalid_windows_are_rejected() {
    for window in [WindowDefinition::sliding(10, 3), WindowDefinition::session(0)] {
        let p = TestPipeline::new();
        p.draw_from(list_source("events"))
            .grouping_key(identity_key())
            .window(window)
            .aggregate(counting())
            .drain_to(list_sink("out"));
        let err = p.compile().expect_err("invalid window");
        assert!(matches!(err, CompileError::InvalidWindow { .. }), "{err}");
    }
}
