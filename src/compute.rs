//! Fluent stage handles.
//!
//! Every method adds one stage to the shared [`Pipeline`] and returns a handle
//! to it; nothing is computed. Handles are cheap to clone, so one stage can
//! feed any number of downstream stages.
//!
//! ```
//! use ironjet::aggregate::counting;
//! use ironjet::function::{item, KeyFn};
//! use ironjet::processor::NamedFactory;
//! use ironjet::transform::{SinkDef, SourceDef};
//! use ironjet::Pipeline;
//!
//! let p = Pipeline::new();
//! p.draw_from(SourceDef::new("lines", NamedFactory::new("list-source").shared()))
//!     .flat_map(|line| vec![line.clone()])
//!     .grouping_key(KeyFn::new(|word| word.clone()))
//!     .aggregate(counting())
//!     .drain_to(SinkDef::new("counts", NamedFactory::new("map-sink").shared()));
//! assert_eq!(p.to_dag().unwrap().vertex_count(), 5);
//! ```

use crate::aggregate::AggregateOperation;
use crate::function::{FlatMapFn, Item, KeyFn, MapFn, PredicateFn, ToStringFn};
use crate::pipeline::Pipeline;
use crate::processor::ProcessorFactory;
use crate::stage::StageId;
use crate::transform::{
    CoGroupAggregate, GroupAggregate, HashJoin, JoinClause, Peek, SinkDef, StatelessOp, StatelessTransform, Tag,
    Transform, WindowAggregate,
};
use crate::window::WindowDefinition;
use std::any::Any;
use std::fmt::Debug;
use std::sync::Arc;

/// A stage whose output can be consumed further.
#[derive(Clone)]
pub struct ComputeStage {
    pub(crate) pipeline: Pipeline,
    pub(crate) id: StageId,
}

/// A stage that consumes items and emits nothing.
#[derive(Clone)]
pub struct SinkStage {
    pub(crate) pipeline: Pipeline,
    pub(crate) id: StageId,
}

impl SinkStage {
    #[must_use]
    pub fn id(&self) -> StageId {
        self.id
    }

    #[must_use]
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }
}

impl ComputeStage {
    pub(crate) fn new(pipeline: Pipeline, id: StageId) -> Self {
        Self { pipeline, id }
    }

    #[must_use]
    pub fn id(&self) -> StageId {
        self.id
    }

    #[must_use]
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    fn attach(&self, transform: Transform, upstream: Vec<StageId>) -> ComputeStage {
        let id = self.pipeline.insert_stage(transform, upstream);
        ComputeStage::new(self.pipeline.clone(), id)
    }

    fn stateless(&self, name: &str, op: StatelessOp) -> ComputeStage {
        self.attach(
            Transform::Stateless(StatelessTransform {
                name: name.to_string(),
                op,
            }),
            vec![self.id],
        )
    }

    #[must_use]
    pub fn map<F>(&self, f: F) -> ComputeStage
    where
        F: Fn(&Item) -> Item + Send + Sync + 'static,
    {
        self.stateless("map", StatelessOp::Map(MapFn::new(f)))
    }

    #[must_use]
    pub fn filter<F>(&self, pred: F) -> ComputeStage
    where
        F: Fn(&Item) -> bool + Send + Sync + 'static,
    {
        self.stateless("filter", StatelessOp::Filter(PredicateFn::new(pred)))
    }

    #[must_use]
    pub fn flat_map<F>(&self, f: F) -> ComputeStage
    where
        F: Fn(&Item) -> Vec<Item> + Send + Sync + 'static,
    {
        self.stateless("flat-map", StatelessOp::FlatMap(FlatMapFn::new(f)))
    }

    /// A single-input stage running a user processor.
    #[must_use]
    pub fn custom_transform(&self, name: &str, factory: Arc<dyn ProcessorFactory>) -> ComputeStage {
        self.stateless(name, StatelessOp::Custom(factory))
    }

    /// Log every item as `T`'s `Debug` output.
    #[must_use]
    pub fn peek<T: Any + Debug>(&self) -> ComputeStage {
        self.peek_with(PredicateFn::always(), ToStringFn::debug_of::<T>())
    }

    #[must_use]
    pub fn peek_with(&self, should_log: PredicateFn, to_string: ToStringFn) -> ComputeStage {
        self.attach(
            Transform::Peek(Peek {
                should_log,
                to_string,
            }),
            vec![self.id],
        )
    }

    #[must_use]
    pub fn grouping_key(&self, key_fn: KeyFn) -> StageWithGrouping {
        StageWithGrouping {
            stage: self.clone(),
            key_fn,
            optimize_memory: false,
        }
    }

    /// Non-keyed windowed aggregation.
    #[must_use]
    pub fn window(&self, window: WindowDefinition) -> StageWithWindow {
        StageWithWindow {
            stage: self.clone(),
            window,
        }
    }

    /// Enrich this stage from one side input.
    #[must_use]
    pub fn hash_join(&self, side: &ComputeStage, clause: JoinClause) -> ComputeStage {
        let mut b = self.hash_join_builder();
        b.add(side, clause);
        b.build()
    }

    #[must_use]
    pub fn hash_join2(
        &self,
        side1: &ComputeStage,
        clause1: JoinClause,
        side2: &ComputeStage,
        clause2: JoinClause,
    ) -> ComputeStage {
        let mut b = self.hash_join_builder();
        b.add(side1, clause1);
        b.add(side2, clause2);
        b.build()
    }

    /// Builder for a hash-join with any number of side inputs.
    #[must_use]
    pub fn hash_join_builder(&self) -> HashJoinBuilder {
        HashJoinBuilder {
            primary: self.clone(),
            sides: Vec::new(),
        }
    }

    pub fn drain_to(&self, sink: SinkDef) -> SinkStage {
        let id = self.pipeline.insert_stage(Transform::Sink(sink), vec![self.id]);
        SinkStage {
            pipeline: self.pipeline.clone(),
            id,
        }
    }
}

/// A stage with a grouping key attached.
#[derive(Clone)]
pub struct StageWithGrouping {
    stage: ComputeStage,
    key_fn: KeyFn,
    optimize_memory: bool,
}

impl StageWithGrouping {
    /// Aggregate in a single vertex instead of a pre-aggregation cascade.
    #[must_use]
    pub fn optimize_memory(mut self) -> Self {
        self.optimize_memory = true;
        self
    }

    #[must_use]
    pub fn key_fn(&self) -> &KeyFn {
        &self.key_fn
    }

    #[must_use]
    pub fn aggregate(&self, aggregate: AggregateOperation) -> ComputeStage {
        self.aggregate_named("group-and-aggregate", aggregate)
    }

    #[must_use]
    pub fn aggregate_named(&self, name: &str, aggregate: AggregateOperation) -> ComputeStage {
        self.stage.attach(
            Transform::GroupingAggregate(GroupAggregate {
                name: name.to_string(),
                key_fn: self.key_fn.clone(),
                aggregate,
                window: None,
                optimize_memory: self.optimize_memory,
            }),
            vec![self.stage.id],
        )
    }

    /// Keyed windowed aggregation.
    #[must_use]
    pub fn window(&self, window: WindowDefinition) -> StageWithGroupingAndWindow {
        StageWithGroupingAndWindow {
            grouping: self.clone(),
            window,
        }
    }

    /// Co-group with another keyed stage; add more inputs to the builder.
    #[must_use]
    pub fn co_group(&self, other: &StageWithGrouping) -> CoGroupBuilder {
        CoGroupBuilder {
            inputs: vec![self.clone(), other.clone()],
            window: None,
            optimize_memory: self.optimize_memory,
        }
    }

    /// Two-way co-grouping aggregation.
    #[must_use]
    pub fn aggregate2(&self, other: &StageWithGrouping, aggregate: AggregateOperation) -> ComputeStage {
        self.co_group(other).aggregate(aggregate)
    }
}

#[derive(Clone)]
pub struct StageWithGroupingAndWindow {
    grouping: StageWithGrouping,
    window: WindowDefinition,
}

impl StageWithGroupingAndWindow {
    #[must_use]
    pub fn aggregate(&self, aggregate: AggregateOperation) -> ComputeStage {
        let name = format!("{}-window", self.window.kind());
        let g = &self.grouping;
        g.stage.attach(
            Transform::GroupingAggregate(GroupAggregate {
                name,
                key_fn: g.key_fn.clone(),
                aggregate,
                window: Some(self.window),
                optimize_memory: g.optimize_memory,
            }),
            vec![g.stage.id],
        )
    }
}

/// Accumulates the inputs of an N-way co-grouping aggregation.
#[derive(Clone)]
pub struct CoGroupBuilder {
    inputs: Vec<StageWithGrouping>,
    window: Option<WindowDefinition>,
    optimize_memory: bool,
}

impl CoGroupBuilder {
    /// Add another input, returning its tag.
    pub fn add(&mut self, input: &StageWithGrouping) -> Tag {
        self.inputs.push(input.clone());
        Tag::new(self.inputs.len() - 1)
    }

    #[must_use]
    pub fn window(mut self, window: WindowDefinition) -> Self {
        self.window = Some(window);
        self
    }

    #[must_use]
    pub fn optimize_memory(mut self) -> Self {
        self.optimize_memory = true;
        self
    }

    /// Create the aggregation stage. The operation's arity must match the
    /// number of inputs; compilation checks it.
    #[must_use]
    pub fn aggregate(&self, aggregate: AggregateOperation) -> ComputeStage {
        let first = &self.inputs[0].stage;
        let name = format!("{}-way co-group-and-aggregate", self.inputs.len());
        first.attach(
            Transform::CoGroupingAggregate(CoGroupAggregate {
                name,
                key_fns: self.inputs.iter().map(|i| i.key_fn.clone()).collect(),
                aggregate,
                window: self.window,
                optimize_memory: self.optimize_memory,
            }),
            self.inputs.iter().map(|i| i.stage.id).collect(),
        )
    }
}

/// A stage with a window but no grouping key attached.
#[derive(Clone)]
pub struct StageWithWindow {
    stage: ComputeStage,
    window: WindowDefinition,
}

impl StageWithWindow {
    #[must_use]
    pub fn aggregate(&self, aggregate: AggregateOperation) -> ComputeStage {
        self.aggregate_all(&[], aggregate)
    }

    /// Aggregate this stage together with `others`, one operation input each.
    #[must_use]
    pub fn aggregate_all(&self, others: &[&ComputeStage], aggregate: AggregateOperation) -> ComputeStage {
        let upstream = std::iter::once(self.stage.id)
            .chain(others.iter().map(|s| s.id))
            .collect();
        self.stage.attach(
            Transform::WindowAggregate(WindowAggregate {
                name: format!("{}-window", self.window.kind()),
                window: self.window,
                aggregate,
            }),
            upstream,
        )
    }
}

/// Collects the side inputs of a hash-join.
pub struct HashJoinBuilder {
    primary: ComputeStage,
    sides: Vec<(ComputeStage, JoinClause)>,
}

impl HashJoinBuilder {
    /// Add a side input, returning the tag its matches are reported under.
    pub fn add(&mut self, side: &ComputeStage, clause: JoinClause) -> Tag {
        self.sides.push((side.clone(), clause));
        Tag::new(self.sides.len() - 1)
    }

    #[must_use]
    pub fn build(self) -> ComputeStage {
        let n = self.sides.len();
        let name = if n == 1 {
            "hash-join".to_string()
        } else {
            format!("{}-way hash-join", n + 1)
        };
        let upstream = std::iter::once(self.primary.id)
            .chain(self.sides.iter().map(|(s, _)| s.id))
            .collect();
        let (tags, clauses): (Vec<Tag>, Vec<JoinClause>) = self
            .sides
            .into_iter()
            .enumerate()
            .map(|(i, (_, clause))| (Tag::new(i), clause))
            .unzip();
        self.primary.attach(Transform::HashJoin(HashJoin { name, clauses, tags }), upstream)
    }
}
