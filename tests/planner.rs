use anyhow::Result;
use ironjet::function::{KeyFn, KeySelector};
use ironjet::processor::{NamedFactory, ProcessorSupplier};
use ironjet::testing::*;
use ironjet::*;

#[test]
fn grouping_count_compiles_to_two_stage_cascade() -> Result<()> {
    let p = TestPipeline::new();
    let key = word_count(&p);
    let dag = p.compile()?;

    assert_vertex_names(
        &dag,
        &["words", "group-and-aggregate-stage1", "group-and-aggregate-stage2", "counts"],
    );

    let into_local = assert_edge(&dag, "words", "group-and-aggregate-stage1");
    assert_local(into_local);
    assert!(into_local.is_partitioned_by(&key));
    assert!(matches!(
        into_local.fan_out(),
        FanOut::Partitioned { strategy: PartitionStrategy::HashCode, .. }
    ));

    let to_combine = assert_edge(&dag, "group-and-aggregate-stage1", "group-and-aggregate-stage2");
    assert_distributed(to_combine);
    assert!(matches!(
        to_combine.fan_out(),
        FanOut::Partitioned { key: KeySelector::EntryKey, .. }
    ));

    assert_inbound(&dag, "counts", &["group-and-aggregate-stage2"]);
    assert_processor_kind(&dag, "group-and-aggregate-stage1", "accumulate-by-key");
    assert_processor_kind(&dag, "group-and-aggregate-stage2", "combine-by-key");
    Ok(())
}

#[test]
fn local_stage_emits_accumulators_and_combiner_finishes() -> Result<()> {
    let p = TestPipeline::new();
    let key = word_count(&p);
    let dag = p.compile()?;

    let stage1 = assert_has_vertex(&dag, "group-and-aggregate-stage1");
    let ProcessorSupplier::AccumulateByKey { key_fns, aggregate } = stage1.supplier() else {
        panic!("unexpected supplier {:?}", stage1.supplier());
    };
    assert_eq!(key_fns.len(), 1);
    assert!(key_fns[0].same_as(&key));
    assert!(aggregate.has_identity_finish());

    let stage2 = assert_has_vertex(&dag, "group-and-aggregate-stage2");
    let ProcessorSupplier::CombineByKey { aggregate: combine } = stage2.supplier() else {
        panic!("unexpected supplier {:?}", stage2.supplier());
    };
    assert!(!combine.has_identity_finish());
    assert!(aggregate.derives_from(combine));
    Ok(())
}

#[test]
fn three_way_hash_join_scenario() -> Result<()> {
    let p = TestPipeline::new();
    let _join = enrichment_join(&p);
    let dag = p.compile()?;

    let joiner = "3-way hash-join-joiner";
    let c1 = "3-way hash-join-collector-1";
    let c2 = "3-way hash-join-collector-2";
    assert_vertex_names(&dag, &["trades", "products", "brokers", joiner, c1, c2, "enriched"]);

    assert_inbound(&dag, joiner, &["trades", c1, c2]);
    assert_eq!(assert_edge(&dag, "trades", joiner).priority(), 0);
    for (side, collector, ordinal) in [("products", c1, 1), ("brokers", c2, 2)] {
        let to_collector = assert_edge(&dag, side, collector);
        assert_distributed(to_collector);
        assert!(matches!(to_collector.fan_out(), FanOut::Broadcast));

        let to_joiner = assert_edge(&dag, collector, joiner);
        assert_eq!(to_joiner.dest_ordinal(), ordinal);
        assert_eq!(to_joiner.priority(), -1);
        assert!(matches!(to_joiner.fan_out(), FanOut::Broadcast));
        assert_eq!(assert_has_vertex(&dag, collector).local_parallelism(), Some(1));
    }
    Ok(())
}

#[test]
fn compiling_twice_yields_identical_dags() -> Result<()> {
    let p = TestPipeline::new();
    word_count(&p);
    enrichment_join(&p);

    let first = p.compile()?;
    let second = p.compile()?;
    assert_same_shape(&first, &second);
    assert_eq!(first.summary(), second.summary());
    Ok(())
}

#[test]
fn repeated_names_get_numeric_suffixes() -> Result<()> {
    let p = TestPipeline::new();
    let src = p.draw_from(list_source("src"));
    src.map(|it| it.clone()).drain_to(list_sink("out"));
    src.map(|it| it.clone()).drain_to(list_sink("out"));
    src.custom_transform("map-2", NamedFactory::new("custom").shared())
        .drain_to(list_sink("out"));

    let dag = p.compile()?;
    assert_vertex_count(&dag, 7);
    assert_vertex_names(
        &dag,
        &["src", "map", "map-2", "map-2-2", "out", "out-2", "out-3"],
    );
    assert_processor_kind(&dag, "map-2-2", "factory");
    Ok(())
}

#[test]
fn fan_out_assigns_increasing_output_ordinals() -> Result<()> {
    let p = TestPipeline::new();
    let src = p.draw_from(list_source("src"));
    for _ in 0..3 {
        src.filter(|_| true).drain_to(list_sink("out"));
    }
    let dag = p.compile()?;
    let id = dag.id_of("src").expect("source vertex");
    let ordinals: Vec<usize> = dag.outbound(id).iter().map(|e| e.source_ordinal()).collect();
    assert_eq!(ordinals, vec![0, 1, 2]);
    dag.validate()?;
    Ok(())
}

#[test]
fn watermarked_source_expands_to_source_and_inserter() -> Result<()> {
    let p = TestPipeline::new();
    let ts = function::TimestampFn::new(|it| it.downcast_ref::<i64>().copied().unwrap_or_default());
    p.draw_from_with_watermark(list_source("events"), ts.clone(), watermark::limiting_lag(100))
        .drain_to(list_sink("out"));

    let dag = p.compile()?;
    assert_vertex_names(&dag, &["events", "events-wm", "out"]);
    let edge = assert_edge(&dag, "events", "events-wm");
    assert_local(edge);
    assert!(matches!(edge.fan_out(), FanOut::Unicast));
    assert_inbound(&dag, "out", &["events-wm"]);

    let ProcessorSupplier::InsertWatermarks {
        timestamp_fn,
        suppress_duplicates,
        ..
    } = assert_has_vertex(&dag, "events-wm").supplier()
    else {
        panic!("events-wm should insert watermarks");
    };
    assert!(timestamp_fn.same_as(&ts));
    assert!(*suppress_duplicates);
    Ok(())
}

#[test]
fn snapshot_exposes_stage_adjacency() -> Result<()> {
    let p = Pipeline::new();
    let src = p.draw_from(list_source("src"));
    let mapped = src.map(|it| it.clone());
    let sink = mapped.drain_to(list_sink("out"));

    let graph = p.snapshot()?;
    assert_eq!(graph.len(), 3);
    assert_eq!(graph.downstream(src.id()), &[mapped.id()]);
    assert_eq!(graph.downstream(mapped.id()), &[sink.id()]);
    assert!(graph.downstream(sink.id()).is_empty());
    assert_eq!(graph.stage(mapped.id()).map(Stage::name), Some("map"));
    Ok(())
}

#[test]
fn planner_is_shareable_across_threads() -> Result<()> {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Planner>();

    let planner = std::sync::Arc::new(Planner::default());
    let p = Pipeline::new();
    let key = KeyFn::new(|it| it.clone());
    p.draw_from(list_source("src"))
        .grouping_key(key)
        .aggregate(aggregate::counting())
        .drain_to(list_sink("out"));
    let graph = p.snapshot()?;

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let planner = std::sync::Arc::clone(&planner);
            let graph = graph.clone();
            std::thread::spawn(move || planner.compile(&graph).map(|dag| dag.summary()))
        })
        .collect();
    let summaries: Vec<DagSummary> = handles
        .into_iter()
        .map(|h| h.join().expect("compile thread panicked"))
        .collect::<Result<_, _>>()?;
    assert!(summaries.windows(2).all(|w| w[0] == w[1]));
    Ok(())
}
