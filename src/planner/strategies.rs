//! Stage expansion strategies.
//!
//! Each [`TransformKind`] is expanded by one [`ExpandStage`] implementation
//! looked up in a [`Strategies`] registry. The standard registry covers every
//! kind; a custom registry may replace or remove entries, and compiling a stage
//! whose kind has no entry fails with [`CompileError::UnknownTransformKind`].

use super::aggregate::{CoGroupStrategy, GroupStrategy, WindowAggregateStrategy};
use super::context::{Decorator, PlanContext};
use super::join::HashJoinStrategy;
use crate::error::CompileError;
use crate::processor::ProcessorSupplier;
use crate::stage::Stage;
use crate::transform::{StatelessOp, Transform, TransformKind};
use std::collections::HashMap;
use std::sync::Arc;

/// Expands one stage into vertices and edges.
pub trait ExpandStage: Send + Sync {
    /// Add the stage's vertices and inbound edges to `ctx` and map the stage
    /// to the vertex its downstream stages connect to. A returned decorator is
    /// applied to that vertex's supplier once expansion is complete.
    ///
    /// # Errors
    ///
    /// Any [`CompileError`] aborts compilation.
    fn expand(&self, ctx: &mut PlanContext<'_>, stage: &Stage) -> Result<Option<Decorator>, CompileError>;
}

/// Registry of expansion strategies by transform kind.
#[derive(Clone, Default)]
pub struct Strategies {
    by_kind: HashMap<TransformKind, Arc<dyn ExpandStage>>,
}

impl Strategies {
    /// A registry with no strategies at all.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in strategy for every transform kind.
    #[must_use]
    pub fn standard() -> Self {
        let mut s = Self::empty();
        s.register(TransformKind::Source, Arc::new(SourceStrategy));
        s.register(TransformKind::SourceWithWatermark, Arc::new(WatermarkedSourceStrategy));
        s.register(TransformKind::Stateless, Arc::new(StatelessStrategy));
        s.register(TransformKind::GroupingAggregate, Arc::new(GroupStrategy));
        s.register(TransformKind::CoGroupingAggregate, Arc::new(CoGroupStrategy));
        s.register(TransformKind::WindowAggregate, Arc::new(WindowAggregateStrategy));
        s.register(TransformKind::HashJoin, Arc::new(HashJoinStrategy));
        s.register(TransformKind::Peek, Arc::new(PeekStrategy));
        s.register(TransformKind::Sink, Arc::new(SinkStrategy));
        s
    }

    /// Install `strategy` for `kind`, returning the one it replaces.
    pub fn register(&mut self, kind: TransformKind, strategy: Arc<dyn ExpandStage>) -> Option<Arc<dyn ExpandStage>> {
        self.by_kind.insert(kind, strategy)
    }

    pub fn unregister(&mut self, kind: TransformKind) -> Option<Arc<dyn ExpandStage>> {
        self.by_kind.remove(&kind)
    }

    #[must_use]
    pub fn get(&self, kind: TransformKind) -> Option<&Arc<dyn ExpandStage>> {
        self.by_kind.get(&kind)
    }
}

/// Error for a strategy handed a stage of a kind it does not expand.
pub(crate) fn wrong_kind(stage: &Stage) -> CompileError {
    CompileError::UnknownTransformKind {
        kind: stage.transform().kind().to_string(),
    }
}

/// Require exactly `expected` inputs.
pub(crate) fn expect_inputs(stage: &Stage, expected: usize) -> Result<(), CompileError> {
    let actual = stage.upstream().len();
    if actual == expected {
        Ok(())
    } else {
        Err(CompileError::MissingUpstream {
            stage: stage.to_string(),
            expected,
            actual,
        })
    }
}

pub struct SourceStrategy;

impl ExpandStage for SourceStrategy {
    fn expand(&self, ctx: &mut PlanContext<'_>, stage: &Stage) -> Result<Option<Decorator>, CompileError> {
        let Transform::Source(source) = stage.transform() else {
            return Err(wrong_kind(stage));
        };
        expect_inputs(stage, 0)?;
        ctx.add_stage_vertex(stage, ProcessorSupplier::Factory(Arc::clone(&source.factory)))?;
        Ok(None)
    }
}

/// Raw source vertex followed by a watermark-insertion vertex named `<name>-wm`.
pub struct WatermarkedSourceStrategy;

impl ExpandStage for WatermarkedSourceStrategy {
    fn expand(&self, ctx: &mut PlanContext<'_>, stage: &Stage) -> Result<Option<Decorator>, CompileError> {
        let Transform::SourceWithWatermark(wm) = stage.transform() else {
            return Err(wrong_kind(stage));
        };
        expect_inputs(stage, 0)?;
        let name = ctx.vertex_name(&wm.source.name, "");
        let raw = ctx.new_vertex(name.clone(), ProcessorSupplier::Factory(Arc::clone(&wm.source.factory)))?;
        let wm_name = ctx.vertex_name(&name, "-wm");
        let inserter = ctx.new_vertex(
            wm_name,
            ProcessorSupplier::InsertWatermarks {
                timestamp_fn: wm.timestamp_fn.clone(),
                policy: wm.policy.clone(),
                suppress_duplicates: true,
            },
        )?;
        ctx.map_stage(stage.id(), inserter);
        let edge = ctx.edge_from(raw, inserter, 0);
        ctx.add_edge(edge)?;
        Ok(None)
    }
}

pub struct StatelessStrategy;

impl ExpandStage for StatelessStrategy {
    fn expand(&self, ctx: &mut PlanContext<'_>, stage: &Stage) -> Result<Option<Decorator>, CompileError> {
        let Transform::Stateless(op) = stage.transform() else {
            return Err(wrong_kind(stage));
        };
        expect_inputs(stage, 1)?;
        let supplier = match &op.op {
            StatelessOp::Map(f) => ProcessorSupplier::Map(f.clone()),
            StatelessOp::Filter(f) => ProcessorSupplier::Filter(f.clone()),
            StatelessOp::FlatMap(f) => ProcessorSupplier::FlatMap(f.clone()),
            StatelessOp::Custom(factory) => ProcessorSupplier::Factory(Arc::clone(factory)),
        };
        let vertex = ctx.add_stage_vertex(stage, supplier)?;
        ctx.add_edges(stage, vertex, |e, _| e)?;
        Ok(None)
    }
}

/// Peeks add no vertex: the stage maps to its upstream's vertex, whose
/// supplier gets wrapped in a logging decorator.
pub struct PeekStrategy;

impl ExpandStage for PeekStrategy {
    fn expand(&self, ctx: &mut PlanContext<'_>, stage: &Stage) -> Result<Option<Decorator>, CompileError> {
        let Transform::Peek(peek) = stage.transform() else {
            return Err(wrong_kind(stage));
        };
        expect_inputs(stage, 1)?;
        let upstream = ctx.vertex_of(stage.upstream()[0])?;
        ctx.map_stage(stage.id(), upstream);
        if !ctx.config().enable_peek {
            return Ok(None);
        }
        let should_log = peek.should_log.clone();
        let to_string = peek.to_string.clone();
        Ok(Some(Box::new(move |inner| ProcessorSupplier::Peek {
            should_log,
            to_string,
            inner: Box::new(inner),
        })))
    }
}

pub struct SinkStrategy;

impl ExpandStage for SinkStrategy {
    fn expand(&self, ctx: &mut PlanContext<'_>, stage: &Stage) -> Result<Option<Decorator>, CompileError> {
        let Transform::Sink(sink) = stage.transform() else {
            return Err(wrong_kind(stage));
        };
        if stage.upstream().is_empty() {
            return Err(CompileError::MissingUpstream {
                stage: stage.to_string(),
                expected: 1,
                actual: 0,
            });
        }
        let vertex = ctx.add_stage_vertex(stage, ProcessorSupplier::Factory(Arc::clone(&sink.factory)))?;
        ctx.add_edges(stage, vertex, |e, _| e)?;
        Ok(None)
    }
}
