use anyhow::Result;
use ironjet::function::{PredicateFn, ToStringFn, item};
use ironjet::processor::ProcessorSupplier;
use ironjet::testing::*;
use ironjet::*;

fn build(with_peek: bool) -> TestPipeline {
    let p = TestPipeline::new();
    let src = p.draw_from(list_source("numbers"));
    let src = if with_peek { src.peek::<u64>() } else { src };
    src.map(|it| it.clone()).drain_to(list_sink("out"));
    p
}

#[test]
fn peek_adds_no_vertices_or_edges() -> Result<()> {
    let plain = build(false).compile()?;
    let peeked = build(true).compile()?;
    assert_same_shape(&peeked, &plain);
    Ok(())
}

#[test]
fn peek_wraps_the_upstream_processor() -> Result<()> {
    let dag = build(true).compile()?;
    let source = assert_has_vertex(&dag, "numbers");
    assert!(source.supplier().is_peek());
    assert_eq!(source.supplier().describe(), "peek(list-source)");
    assert_processor_kind(&dag, "numbers", "factory");
    assert!(!assert_has_vertex(&dag, "map").supplier().is_peek());

    let ProcessorSupplier::Peek { to_string, .. } = source.supplier() else {
        panic!("peek wrapper expected");
    };
    assert_eq!(to_string.call(&item(42u64)), "42");
    Ok(())
}

#[test]
fn peek_predicate_and_renderer_are_carried_through() -> Result<()> {
    let p = TestPipeline::new();
    let should_log = PredicateFn::new(|it| it.downcast_ref::<u64>().is_some_and(|n| n % 2 == 0));
    let to_string = ToStringFn::new(|_| "item".to_string());
    p.draw_from(list_source("numbers"))
        .map(|it| it.clone())
        .peek_with(should_log.clone(), to_string.clone())
        .drain_to(list_sink("out"));

    let dag = p.compile()?;
    let ProcessorSupplier::Peek {
        should_log: carried,
        to_string: rendered,
        inner,
    } = assert_has_vertex(&dag, "map").supplier()
    else {
        panic!("map should be wrapped");
    };
    assert!(carried.same_as(&should_log));
    assert!(rendered.same_as(&to_string));
    assert_eq!(inner.kind_name(), "map");
    assert_inbound(&dag, "out", &["map"]);
    Ok(())
}

#[test]
fn stacked_peeks_nest() -> Result<()> {
    let p = TestPipeline::new();
    p.draw_from(list_source("numbers"))
        .peek::<u64>()
        .peek::<u64>()
        .drain_to(list_sink("out"));

    let dag = p.compile()?;
    assert_vertex_count(&dag, 2);
    let supplier = assert_has_vertex(&dag, "numbers").supplier();
    assert_eq!(supplier.describe(), "peek(peek(list-source))");
    assert_eq!(supplier.unwrap_peeks().kind_name(), "factory");
    Ok(())
}

#[test]
fn peek_on_watermarked_source_wraps_the_inserter() -> Result<()> {
    let p = TestPipeline::new();
    let ts = function::TimestampFn::new(|_| 0);
    p.draw_from_with_watermark(list_source("events"), ts, watermark::limiting_lag(10))
        .peek::<i64>()
        .drain_to(list_sink("out"));

    let dag = p.compile()?;
    assert!(assert_has_vertex(&dag, "events-wm").supplier().is_peek());
    assert!(!assert_has_vertex(&dag, "events").supplier().is_peek());
    Ok(())
}

#[test]
fn disabled_peeks_compile_to_plain_vertices() -> Result<()> {
    let dag = build(true).compile_with(PlannerConfig {
        enable_peek: false,
        ..PlannerConfig::default()
    })?;
    assert!(!assert_has_vertex(&dag, "numbers").supplier().is_peek());
    assert_same_shape(&dag, &build(false).compile()?);
    Ok(())
}
