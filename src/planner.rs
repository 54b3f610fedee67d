//! Stage graph → DAG compiler.
//!
//! [`Planner::compile`] runs in fixed steps:
//!
//! 1. **Leakage check**: every non-sink stage must feed something.
//! 2. **Topological sort** of the stages, ties broken by stage name then id.
//! 3. **Expansion**: each stage is handed to the strategy registered for its
//!    transform kind, in topological order, so every upstream already has a
//!    vertex when a stage is expanded.
//! 4. **Finish**: peek decorators are applied to the vertices they wrap.
//! 5. **Validation** of the finished DAG (optional, on by default).
//!
//! All state of one compilation lives in a [`PlanContext`]; a `Planner` is
//! immutable and can be shared across threads.

pub mod aggregate;
pub mod context;
pub mod join;
pub mod strategies;
pub mod topo;
pub mod validate;

pub use context::{Decorator, PlanContext};
pub use strategies::{ExpandStage, Strategies};

use crate::config::PlannerConfig;
use crate::dag::Dag;
use crate::error::CompileError;
use crate::pipeline::Pipeline;
use crate::stage::StageGraph;
use tracing::{debug, info};

/// Compiles stage graphs with a fixed configuration and strategy registry.
#[derive(Clone)]
pub struct Planner {
    config: PlannerConfig,
    strategies: Strategies,
}

impl Default for Planner {
    fn default() -> Self {
        Self::new(PlannerConfig::default())
    }
}

impl Planner {
    /// Planner with the standard strategies.
    #[must_use]
    pub fn new(config: PlannerConfig) -> Self {
        Self::with_strategies(config, Strategies::standard())
    }

    #[must_use]
    pub fn with_strategies(config: PlannerConfig, strategies: Strategies) -> Self {
        Self { config, strategies }
    }

    #[must_use]
    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    #[must_use]
    pub fn strategies(&self) -> &Strategies {
        &self.strategies
    }

    /// Compile a stage graph. Compiling the same graph twice yields DAGs with
    /// identical vertex names and edges.
    ///
    /// # Errors
    ///
    /// The first [`CompileError`] encountered; no partial DAG is returned.
    pub fn compile(&self, graph: &StageGraph) -> Result<Dag, CompileError> {
        validate::check_leakage(graph)?;
        let order = topo::sort(graph)?;

        let mut ctx = PlanContext::new(graph, &self.config);
        for id in order {
            let stage = graph.stage(id).ok_or(CompileError::UnknownStage { stage: id })?;
            let kind = stage.transform().kind();
            debug!(stage = %stage, %kind, "expanding stage");
            let strategy = self
                .strategies
                .get(kind)
                .ok_or_else(|| CompileError::UnknownTransformKind {
                    kind: kind.to_string(),
                })?;
            if let Some(decorator) = strategy.expand(&mut ctx, stage)? {
                ctx.decorate(id, decorator)?;
            }
        }

        let dag = ctx.finish();
        if self.config.validate_dag {
            dag.validate()?;
        }
        info!(
            stages = graph.len(),
            vertices = dag.vertex_count(),
            edges = dag.edge_count(),
            "compiled pipeline"
        );
        Ok(dag)
    }

    /// Snapshot and compile a pipeline.
    ///
    /// # Errors
    ///
    /// See [`Self::compile`].
    pub fn compile_pipeline(&self, pipeline: &Pipeline) -> Result<Dag, CompileError> {
        self.compile(&pipeline.snapshot()?)
    }
}

/// Compile a pipeline with the default planner.
///
/// # Errors
///
/// See [`Planner::compile`].
pub fn compile(pipeline: &Pipeline) -> Result<Dag, CompileError> {
    Planner::default().compile_pipeline(pipeline)
}
