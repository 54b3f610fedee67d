//! Compiles a few pipelines and prints the DAG the planner produced for each.
//!
//! Demonstrates:
//! - Two-stage grouping cascades
//! - Sliding and session window expansion behind a watermarked source
//! - Peek stages folded into their upstream vertex
//! - JSON and Graphviz renderings of a DAG
//!
//! Run with: cargo run --example explain_dag

use anyhow::Result;
use ironjet::aggregate::counting;
use ironjet::function::{KeyFn, TimestampFn};
use ironjet::testing::{list_sink, list_source, word_count};
use ironjet::watermark::limiting_lag;
use ironjet::*;

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).init();

    println!("=== Example 1: Word Count ===\n");
    example_word_count()?;

    println!("\n=== Example 2: Windowed Aggregation ===\n");
    example_windows()?;

    println!("\n=== Example 3: Machine-Readable Output ===\n");
    example_renderings()?;

    Ok(())
}

/// Grouping expands into accumulate and combine vertices.
fn example_word_count() -> Result<()> {
    let p = Pipeline::default();
    word_count(&p);
    let dag = compile(&p)?;
    println!("{dag}");
    Ok(())
}

/// Windows need a timestamped source; the watermark inserter gets its own vertex.
fn example_windows() -> Result<()> {
    let p = Pipeline::default();
    let events = p
        .draw_from_with_watermark(
            list_source("clicks"),
            TimestampFn::new(|_| 0),
            limiting_lag(2_000),
        )
        .peek::<String>();

    let by_user = KeyFn::new(|it| it.clone());
    events
        .grouping_key(by_user.clone())
        .window(WindowDefinition::sliding(10_000, 1_000))
        .aggregate(counting())
        .drain_to(list_sink("clicks-per-user"));
    events
        .grouping_key(by_user)
        .window(WindowDefinition::session(30_000))
        .aggregate(counting())
        .drain_to(list_sink("sessions"));
    events
        .window(WindowDefinition::tumbling(60_000))
        .aggregate(counting())
        .drain_to(list_sink("clicks-per-minute"));

    let dag = compile(&p)?;
    println!("{dag}");
    Ok(())
}

fn example_renderings() -> Result<()> {
    let p = Pipeline::default();
    p.draw_from(list_source("numbers"))
        .filter(|it| it.downcast_ref::<u64>().is_some_and(|n| n % 2 == 0))
        .drain_to(list_sink("evens"));

    let dag = Planner::new(PlannerConfig {
        default_local_parallelism: Some(4),
        ..PlannerConfig::default()
    })
    .compile_pipeline(&p)?;

    println!("{}", dag.to_json()?);
    println!();
    println!("{}", dag.to_dot());
    Ok(())
}
