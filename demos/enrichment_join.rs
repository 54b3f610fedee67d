//! Enriching a trade stream from two side inputs with a hash-join.
//!
//! Demonstrates:
//! - The joiner and per-side collector vertices
//! - Side inputs arriving on prioritized broadcast edges
//! - Configuring collector parallelism from a JSON document
//!
//! Run with: cargo run --example enrichment_join

use anyhow::Result;
use ironjet::testing::{enrichment_join, sample_trades};
use ironjet::*;

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).init();

    println!("Sample input:");
    for trade in sample_trades() {
        println!("  {trade:?}");
    }
    println!();

    let p = Pipeline::default();
    let stages = enrichment_join(&p);
    println!(
        "Join stage {} reads trades {}, products {}, brokers {}\n",
        stages.joined.id(),
        stages.trades.id(),
        stages.products.id(),
        stages.brokers.id()
    );

    let config = PlannerConfig::from_json_str(r#"{ "hash_join_collector_parallelism": 2 }"#)?;
    let dag = Planner::new(config).compile_pipeline(&p)?;
    println!("{dag}");

    let summary = dag.summary();
    println!("Inputs of the joiner:");
    for edge in summary.inbound("3-way hash-join-joiner") {
        println!(
            "  ordinal {} <- {} ({:?}, {}, priority {})",
            edge.to_ordinal, edge.from, edge.locality, edge.fan_out, edge.priority
        );
    }
    Ok(())
}
