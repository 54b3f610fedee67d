//! Testing utilities for ironjet pipelines.
//!
//! - **Assertions** on compiled DAGs: vertex counts and names, edges between
//!   named vertices, inbound ordinals, routing
//! - **Fixtures**: labelled list sources and sinks plus the word-count and
//!   enrichment-join pipelines used across the test suite and demos
//!
//! # Quick Start
//!
//! ```
//! use ironjet::aggregate::counting;
//! use ironjet::testing::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let p = TestPipeline::new();
//! let key = word_key();
//! p.draw_from(list_source("words"))
//!     .grouping_key(key.clone())
//!     .aggregate(counting())
//!     .drain_to(list_sink("counts"));
//!
//! let dag = p.compile()?;
//! assert_vertex_count(&dag, 4);
//! assert!(assert_edge(&dag, "words", "group-and-aggregate-stage1").is_partitioned_by(&key));
//! # Ok(())
//! # }
//! ```

pub mod assertions;
pub mod fixtures;

pub use assertions::*;
pub use fixtures::*;

use crate::config::PlannerConfig;
use crate::dag::Dag;
use crate::error::CompileError;
use crate::planner::Planner;
use crate::Pipeline;

/// A test-focused wrapper around [`Pipeline`].
#[derive(Clone, Default)]
pub struct TestPipeline {
    pipeline: Pipeline,
}

impl TestPipeline {
    #[must_use]
    pub fn new() -> Self {
        Self {
            pipeline: Pipeline::default(),
        }
    }

    /// Compile with the default planner.
    ///
    /// # Errors
    ///
    /// See [`Planner::compile`].
    pub fn compile(&self) -> Result<Dag, CompileError> {
        self.compile_with(PlannerConfig::default())
    }

    /// # Errors
    ///
    /// See [`Planner::compile`].
    pub fn compile_with(&self, config: PlannerConfig) -> Result<Dag, CompileError> {
        Planner::new(config).compile_pipeline(&self.pipeline)
    }

    /// Print the stage graph: every stage with its upstream list.
    pub fn debug_print_graph(&self) {
        match self.pipeline.snapshot() {
            Ok(graph) => {
                println!("Stage Graph:");
                println!("  Stages: {}", graph.len());
                for stage in graph.stages() {
                    let ups: Vec<String> = stage.upstream().iter().map(ToString::to_string).collect();
                    println!("    {stage} <- [{}]", ups.join(", "));
                }
            }
            Err(e) => println!("Stage Graph: unavailable ({e})"),
        }
    }
}

// Allow TestPipeline to be used wherever Pipeline is expected
impl std::ops::Deref for TestPipeline {
    type Target = Pipeline;

    fn deref(&self) -> &Self::Target {
        &self.pipeline
    }
}

impl AsRef<Pipeline> for TestPipeline {
    fn as_ref(&self) -> &Pipeline {
        &self.pipeline
    }
}
