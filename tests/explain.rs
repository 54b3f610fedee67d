//! Tests for DAG explanation, summaries and validation.

use anyhow::Result;
use ironjet::testing::*;
use ironjet::*;

#[test]
fn explanation_lists_every_vertex() -> Result<()> {
    let p = TestPipeline::new();
    word_count(&p);
    let dag = p.compile()?;

    let text = dag.to_string();
    assert!(text.contains("COMPILED DAG EXPLANATION"));
    assert!(text.contains(&format!("│ Vertices:          {:>10}", 4)));
    for (_, v) in dag.vertices() {
        assert!(text.contains(v.name()), "missing {}", v.name());
    }
    assert!(text.contains(
        "in[0] <- group-and-aggregate-stage1[0]  distributed partitioned(entry-key)"
    ));

    println!("{dag}");
    Ok(())
}

#[test]
fn explanation_shows_priorities() -> Result<()> {
    let p = TestPipeline::new();
    enrichment_join(&p);
    let text = p.compile()?.to_string();
    assert!(text.contains("in[1] <- 3-way hash-join-collector-1[0]  local broadcast, priority -1"));
    Ok(())
}

#[test]
fn summary_round_trips_through_json() -> Result<()> {
    let p = TestPipeline::new();
    enrichment_join(&p);
    let dag = p.compile()?;

    let json = dag.to_json()?;
    let parsed: DagSummary = serde_json::from_str(&json)?;
    assert_eq!(parsed, dag.summary());

    let side_edges = parsed.inbound("3-way hash-join-joiner");
    assert_eq!(side_edges.len(), 3);
    assert_eq!(side_edges[0].from, "trades");
    assert!(side_edges[1..].iter().all(|e| e.priority == -1));
    assert!(json.contains("\"locality\": \"distributed\""));
    Ok(())
}

#[test]
fn summary_describes_processors() -> Result<()> {
    let p = TestPipeline::new();
    word_count(&p);
    let summary = p.compile()?.summary();

    let stage1 = summary
        .vertices
        .iter()
        .find(|v| v.name == "group-and-aggregate-stage1")
        .expect("stage1 in summary");
    assert_eq!(stage1.processor, "accumulate-by-key(inputs=1, finish=identity)");
    Ok(())
}

#[test]
fn dot_output_names_every_edge() -> Result<()> {
    let p = TestPipeline::new();
    word_count(&p);
    let dag = p.compile()?;
    let dot = dag.to_dot();
    assert!(dot.starts_with("digraph dag {"));
    assert_eq!(dot.matches(" -> ").count(), dag.edge_count());
    Ok(())
}

#[test]
fn compiled_dags_pass_validation() -> Result<()> {
    let p = TestPipeline::new();
    word_count(&p);
    enrichment_join(&p);
    let dag = p.compile_with(PlannerConfig {
        validate_dag: false,
        ..PlannerConfig::default()
    })?;
    dag.validate()?;
    Ok(())
}
