//! Expansion of grouping, co-grouping and windowed aggregations.
//!
//! Keyed aggregation is a two-vertex cascade. Stage 1 pre-aggregates locally,
//! with each inbound edge partitioned by that input's key, and emits
//! `(key, accumulator)` entries. Stage 2 receives them over a distributed edge
//! partitioned by entry key, merges them and applies the finish step. Sliding
//! and tumbling windows use the same shape with frames as the unit of
//! pre-aggregation. Session windows need every event of a key in one place and
//! use a single vertex.

use super::context::{Decorator, PlanContext};
use super::strategies::{ExpandStage, expect_inputs, wrong_kind};
use crate::aggregate::AggregateOperation;
use crate::dag::{Edge, PartitionStrategy, VertexId};
use crate::error::CompileError;
use crate::function::{KeyFn, KeySelector};
use crate::processor::ProcessorSupplier;
use crate::stage::Stage;
use crate::transform::Transform;
use crate::window::{WindowDefinition, WindowKind};
use tracing::debug;

/// How items are routed into the first vertex of an aggregation.
enum Keying<'k> {
    /// One key function per input.
    ByKey(&'k [KeyFn]),
    /// No grouping key; all items of a window meet in one place.
    Global,
}

impl Keying<'_> {
    fn selectors(&self, inputs: usize) -> Vec<KeySelector> {
        match self {
            Keying::ByKey(key_fns) => key_fns.iter().cloned().map(KeySelector::from).collect(),
            Keying::Global => vec![KeySelector::Constant; inputs],
        }
    }
}

pub struct GroupStrategy;

impl ExpandStage for GroupStrategy {
    fn expand(&self, ctx: &mut PlanContext<'_>, stage: &Stage) -> Result<Option<Decorator>, CompileError> {
        let Transform::GroupingAggregate(group) = stage.transform() else {
            return Err(wrong_kind(stage));
        };
        expect_inputs(stage, 1)?;
        check_arity(stage, &group.aggregate)?;
        let key_fns = std::slice::from_ref(&group.key_fn);
        match &group.window {
            Some(window) => expand_windowed(ctx, stage, window, Keying::ByKey(key_fns), &group.aggregate),
            None if group.optimize_memory => single_stage(ctx, stage, &group.name, key_fns, &group.aggregate),
            None => two_stage(ctx, stage, &group.name, key_fns, &group.aggregate),
        }?;
        Ok(None)
    }
}

pub struct CoGroupStrategy;

impl ExpandStage for CoGroupStrategy {
    fn expand(&self, ctx: &mut PlanContext<'_>, stage: &Stage) -> Result<Option<Decorator>, CompileError> {
        let Transform::CoGroupingAggregate(cogroup) = stage.transform() else {
            return Err(wrong_kind(stage));
        };
        if cogroup.window.is_some() {
            return Err(CompileError::UnsupportedOperation {
                operation: "Windowed co-grouping".to_string(),
            });
        }
        if stage.upstream().is_empty() {
            return Err(CompileError::MissingUpstream {
                stage: stage.to_string(),
                expected: cogroup.key_fns.len().max(1),
                actual: 0,
            });
        }
        expect_inputs(stage, cogroup.key_fns.len())?;
        check_arity(stage, &cogroup.aggregate)?;
        if cogroup.optimize_memory {
            single_stage(ctx, stage, &cogroup.name, &cogroup.key_fns, &cogroup.aggregate)?;
        } else {
            two_stage(ctx, stage, &cogroup.name, &cogroup.key_fns, &cogroup.aggregate)?;
        }
        Ok(None)
    }
}

/// Windowed aggregation without a grouping key, over one or more inputs.
pub struct WindowAggregateStrategy;

impl ExpandStage for WindowAggregateStrategy {
    fn expand(&self, ctx: &mut PlanContext<'_>, stage: &Stage) -> Result<Option<Decorator>, CompileError> {
        let Transform::WindowAggregate(wa) = stage.transform() else {
            return Err(wrong_kind(stage));
        };
        if stage.upstream().is_empty() {
            return Err(CompileError::MissingUpstream {
                stage: stage.to_string(),
                expected: wa.aggregate.arity(),
                actual: 0,
            });
        }
        check_arity(stage, &wa.aggregate)?;
        expand_windowed(ctx, stage, &wa.window, Keying::Global, &wa.aggregate)?;
        Ok(None)
    }
}

fn check_arity(stage: &Stage, aggregate: &AggregateOperation) -> Result<(), CompileError> {
    let inputs = stage.upstream().len();
    if aggregate.arity() == inputs {
        Ok(())
    } else {
        Err(CompileError::ArityMismatch {
            stage: stage.to_string(),
            arity: aggregate.arity(),
            inputs,
        })
    }
}

/// `<name>-stage1` accumulate-by-key → `<name>-stage2` combine-by-key.
fn two_stage(
    ctx: &mut PlanContext<'_>,
    stage: &Stage,
    name: &str,
    key_fns: &[KeyFn],
    aggregate: &AggregateOperation,
) -> Result<(), CompileError> {
    let prefix = ctx.unique_name(name, "-stage", &["1", "2"]);
    let accumulate = ctx.new_vertex(
        format!("{prefix}1"),
        ProcessorSupplier::AccumulateByKey {
            key_fns: key_fns.to_vec(),
            aggregate: aggregate.with_identity_finish(),
        },
    )?;
    let combine = ctx.new_vertex(
        format!("{prefix}2"),
        ProcessorSupplier::CombineByKey {
            aggregate: aggregate.clone(),
        },
    )?;
    ctx.map_stage(stage.id(), combine);
    ctx.add_edges(stage, accumulate, |e, ordinal| {
        e.partitioned_with(key_fns[ordinal].clone(), PartitionStrategy::HashCode)
    })?;
    connect_by_entry_key(ctx, accumulate, combine)?;
    debug!(stage = %stage, prefix = %prefix, "expanded two-stage aggregation");
    Ok(())
}

/// One aggregate-by-key vertex named after the stage; every input is
/// distributed and partitioned by its key.
fn single_stage(
    ctx: &mut PlanContext<'_>,
    stage: &Stage,
    name: &str,
    key_fns: &[KeyFn],
    aggregate: &AggregateOperation,
) -> Result<(), CompileError> {
    let vertex_name = ctx.vertex_name(name, "");
    let vertex = ctx.new_vertex(
        vertex_name,
        ProcessorSupplier::AggregateByKey {
            key_fns: key_fns.to_vec(),
            aggregate: aggregate.clone(),
        },
    )?;
    ctx.map_stage(stage.id(), vertex);
    ctx.add_edges(stage, vertex, |e, ordinal| {
        e.distributed().partitioned(key_fns[ordinal].clone())
    })
}

fn expand_windowed(
    ctx: &mut PlanContext<'_>,
    stage: &Stage,
    window: &WindowDefinition,
    keying: Keying<'_>,
    aggregate: &AggregateOperation,
) -> Result<(), CompileError> {
    window.validate()?;
    match window.kind() {
        WindowKind::Tumbling | WindowKind::Sliding => sliding_window(ctx, stage, window, &keying, aggregate),
        WindowKind::Session => session_window(ctx, stage, window, &keying, aggregate),
    }
}

/// `sliding-window-stage1` accumulate-by-frame → `sliding-window-stage2`
/// combine-to-sliding-window.
fn sliding_window(
    ctx: &mut PlanContext<'_>,
    stage: &Stage,
    window: &WindowDefinition,
    keying: &Keying<'_>,
    aggregate: &AggregateOperation,
) -> Result<(), CompileError> {
    let policy = window.sliding_policy().ok_or_else(|| CompileError::UnknownWindowKind {
        kind: window.kind().to_string(),
    })?;
    let prefix = ctx.unique_name("sliding-window", "-stage", &["1", "2"]);
    let accumulate = ctx.new_vertex(
        format!("{prefix}1"),
        ProcessorSupplier::AccumulateByFrame {
            keys: keying.selectors(stage.upstream().len()),
            policy,
            aggregate: aggregate.with_identity_finish(),
        },
    )?;
    let combine = ctx.new_vertex(
        format!("{prefix}2"),
        ProcessorSupplier::CombineToSlidingWindow {
            policy,
            aggregate: aggregate.clone(),
        },
    )?;
    ctx.map_stage(stage.id(), combine);
    match keying {
        Keying::ByKey(key_fns) => {
            ctx.add_edges(stage, accumulate, |e, ordinal| {
                e.partitioned_with(key_fns[ordinal].clone(), PartitionStrategy::HashCode)
            })?;
            connect_by_entry_key(ctx, accumulate, combine)?;
        }
        Keying::Global => {
            ctx.add_edges(stage, accumulate, |e, _| e)?;
            let edge = ctx.edge_from(accumulate, combine, 0).distributed().all_to_one();
            ctx.add_edge(edge)?;
        }
    }
    debug!(stage = %stage, prefix = %prefix, %policy, "expanded sliding window");
    Ok(())
}

/// A single `session-window` vertex.
fn session_window(
    ctx: &mut PlanContext<'_>,
    stage: &Stage,
    window: &WindowDefinition,
    keying: &Keying<'_>,
    aggregate: &AggregateOperation,
) -> Result<(), CompileError> {
    let WindowDefinition::Session { inactivity_gap } = *window else {
        return Err(CompileError::UnknownWindowKind {
            kind: window.kind().to_string(),
        });
    };
    let name = ctx.vertex_name("session-window", "");
    let vertex = ctx.new_vertex(
        name,
        ProcessorSupplier::AggregateToSessionWindow {
            inactivity_gap,
            keys: keying.selectors(stage.upstream().len()),
            aggregate: aggregate.clone(),
        },
    )?;
    ctx.map_stage(stage.id(), vertex);
    match keying {
        Keying::ByKey(key_fns) => {
            ctx.add_edges(stage, vertex, |e, ordinal| e.partitioned(key_fns[ordinal].clone()))
        }
        Keying::Global => ctx.add_edges(stage, vertex, |e, _| e.all_to_one()),
    }
}

fn connect_by_entry_key(ctx: &mut PlanContext<'_>, from: VertexId, to: VertexId) -> Result<(), CompileError> {
    let edge: Edge = ctx
        .edge_from(from, to, 0)
        .distributed()
        .partitioned(KeySelector::EntryKey);
    ctx.add_edge(edge)
}
