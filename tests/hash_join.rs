use anyhow::Result;
use ironjet::function::KeyFn;
use ironjet::processor::ProcessorSupplier;
use ironjet::testing::*;
use ironjet::transform::JoinClause;
use ironjet::*;

fn clause() -> JoinClause {
    JoinClause::on_keys(KeyFn::new(|it| it.clone()), KeyFn::new(|it| it.clone()))
}

#[test]
fn single_side_join_has_one_collector() -> Result<()> {
    let p = TestPipeline::new();
    let orders = p.draw_from(list_source("orders"));
    let customers = p.draw_from(list_source("customers"));
    let c = clause();
    orders.hash_join(&customers, c.clone()).drain_to(list_sink("out"));

    let dag = p.compile()?;
    assert_vertex_names(
        &dag,
        &["orders", "customers", "hash-join-joiner", "hash-join-collector-1", "out"],
    );
    assert_inbound(&dag, "hash-join-joiner", &["orders", "hash-join-collector-1"]);

    let ProcessorSupplier::HashJoinCollect { key_fn, .. } =
        assert_has_vertex(&dag, "hash-join-collector-1").supplier()
    else {
        panic!("collector supplier expected");
    };
    assert!(key_fn.same_as(&c.right_key));

    let ProcessorSupplier::HashJoin { key_fns, tags } = assert_has_vertex(&dag, "hash-join-joiner").supplier()
    else {
        panic!("joiner supplier expected");
    };
    assert!(key_fns[0].same_as(&c.left_key));
    assert_eq!(tags.len(), 1);
    Ok(())
}

#[test]
fn builder_tags_sides_in_order() -> Result<()> {
    let p = TestPipeline::new();
    let primary = p.draw_from(list_source("primary"));
    let sides: Vec<_> = (0..3).map(|i| p.draw_from(list_source(&format!("side{i}")))).collect();

    let mut builder = primary.hash_join_builder();
    let tags: Vec<_> = sides.iter().map(|s| builder.add(s, clause())).collect();
    assert_eq!(tags.iter().map(|t| t.index()).collect::<Vec<_>>(), vec![0, 1, 2]);
    builder.build().drain_to(list_sink("out"));

    let dag = p.compile()?;
    let joiner = "4-way hash-join-joiner";
    assert_vertex_count(&dag, 1 + 3 + 1 + 3 + 1);
    assert_inbound(
        &dag,
        joiner,
        &[
            "primary",
            "4-way hash-join-collector-1",
            "4-way hash-join-collector-2",
            "4-way hash-join-collector-3",
        ],
    );
    for i in 0..3 {
        let collector = format!("4-way hash-join-collector-{}", i + 1);
        assert_inbound(&dag, &collector, &[format!("side{i}").as_str()]);
    }
    Ok(())
}

#[test]
fn side_stage_with_other_consumers_uses_next_output_ordinal() -> Result<()> {
    let p = TestPipeline::new();
    let primary = p.draw_from(list_source("primary"));
    let side = p.draw_from(list_source("side"));
    side.drain_to(list_sink("audit"));
    primary.hash_join(&side, clause()).drain_to(list_sink("out"));

    let dag = p.compile()?;
    let id = dag.id_of("side").expect("side vertex");
    let outbound = dag.outbound(id);
    assert_eq!(outbound.len(), 2);
    assert_eq!(
        outbound.iter().map(|e| e.source_ordinal()).collect::<Vec<_>>(),
        vec![0, 1]
    );
    dag.validate()?;
    Ok(())
}

#[test]
fn collector_parallelism_is_configurable() -> Result<()> {
    let p = TestPipeline::new();
    enrichment_join(&p);
    let dag = p.compile_with(PlannerConfig {
        hash_join_collector_parallelism: 4,
        ..PlannerConfig::default()
    })?;
    assert_eq!(
        assert_has_vertex(&dag, "3-way hash-join-collector-2").local_parallelism(),
        Some(4)
    );
    Ok(())
}

#[test]
fn join_without_sides_is_rejected() {
    let p = TestPipeline::new();
    let primary = p.draw_from(list_source("primary"));
    primary.hash_join_builder().build().drain_to(list_sink("out"));

    let err = p.compile().expect_err("a join needs a side input");
    assert!(matches!(
        err,
        CompileError::MissingUpstream {
            expected: 2,
            actual: 1,
            ..
        }
    ));
}
