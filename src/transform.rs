//! The operation a stage performs.
//!
//! [`Transform`] is a closed tagged union; the planner picks an expansion
//! strategy by [`TransformKind`]. Function handles inside a transform are shared
//! with the vertices and edges the planner generates from it.

use crate::aggregate::AggregateOperation;
use crate::function::{FlatMapFn, KeyFn, MapFn, PredicateFn, ProjectFn, TimestampFn, ToStringFn};
use crate::processor::ProcessorFactory;
use crate::watermark::WatermarkPolicyFn;
use crate::window::WindowDefinition;
use std::fmt;
use std::sync::Arc;

/// Identifies one contributing input of a multi-input stage.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tag(usize);

impl Tag {
    #[must_use]
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    #[must_use]
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Discriminant of [`Transform`], used to look up expansion strategies.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TransformKind {
    Source,
    SourceWithWatermark,
    Stateless,
    GroupingAggregate,
    CoGroupingAggregate,
    WindowAggregate,
    HashJoin,
    Peek,
    Sink,
}

impl fmt::Display for TransformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransformKind::Source => "source",
            TransformKind::SourceWithWatermark => "source-with-watermark",
            TransformKind::Stateless => "stateless",
            TransformKind::GroupingAggregate => "grouping-aggregate",
            TransformKind::CoGroupingAggregate => "co-grouping-aggregate",
            TransformKind::WindowAggregate => "window-aggregate",
            TransformKind::HashJoin => "hash-join",
            TransformKind::Peek => "peek",
            TransformKind::Sink => "sink",
        })
    }
}

/// A named source backed by an opaque processor factory.
#[derive(Clone)]
pub struct SourceDef {
    pub name: String,
    pub factory: Arc<dyn ProcessorFactory>,
}

impl SourceDef {
    pub fn new(name: impl Into<String>, factory: Arc<dyn ProcessorFactory>) -> Self {
        Self {
            name: name.into(),
            factory,
        }
    }

    /// Attach event-time semantics to this source.
    #[must_use]
    pub fn with_watermark(self, timestamp_fn: TimestampFn, policy: WatermarkPolicyFn) -> WatermarkedSource {
        WatermarkedSource {
            source: self,
            timestamp_fn,
            policy,
        }
    }
}

/// A source whose items carry event timestamps.
#[derive(Clone)]
pub struct WatermarkedSource {
    pub source: SourceDef,
    pub timestamp_fn: TimestampFn,
    pub policy: WatermarkPolicyFn,
}

/// A named sink backed by an opaque processor factory.
#[derive(Clone)]
pub struct SinkDef {
    pub name: String,
    pub factory: Arc<dyn ProcessorFactory>,
}

impl SinkDef {
    pub fn new(name: impl Into<String>, factory: Arc<dyn ProcessorFactory>) -> Self {
        Self {
            name: name.into(),
            factory,
        }
    }
}

#[derive(Clone)]
pub enum StatelessOp {
    Map(MapFn),
    Filter(PredicateFn),
    FlatMap(FlatMapFn),
    Custom(Arc<dyn ProcessorFactory>),
}

#[derive(Clone)]
pub struct StatelessTransform {
    pub name: String,
    pub op: StatelessOp,
}

/// Keyed aggregation of a single input.
#[derive(Clone)]
pub struct GroupAggregate {
    pub name: String,
    pub key_fn: KeyFn,
    pub aggregate: AggregateOperation,
    pub window: Option<WindowDefinition>,
    /// Aggregate in a single vertex instead of a local/distributed cascade.
    pub optimize_memory: bool,
}

/// Keyed aggregation over several inputs, each with its own key function.
#[derive(Clone)]
pub struct CoGroupAggregate {
    pub name: String,
    pub key_fns: Vec<KeyFn>,
    pub aggregate: AggregateOperation,
    pub window: Option<WindowDefinition>,
    pub optimize_memory: bool,
}

/// Non-keyed windowed aggregation over one or more inputs.
#[derive(Clone)]
pub struct WindowAggregate {
    pub name: String,
    pub window: WindowDefinition,
    pub aggregate: AggregateOperation,
}

/// How one side input of a hash-join is matched and projected.
#[derive(Clone, Debug)]
pub struct JoinClause {
    /// Extracts the join key from a primary item.
    pub left_key: KeyFn,
    /// Extracts the join key from a side item.
    pub right_key: KeyFn,
    /// Projects a side item into the stored table value.
    pub right_project: ProjectFn,
}

impl JoinClause {
    #[must_use]
    pub fn new(left_key: KeyFn, right_key: KeyFn, right_project: ProjectFn) -> Self {
        Self {
            left_key,
            right_key,
            right_project,
        }
    }

    /// Join on keys, storing side items unchanged.
    #[must_use]
    pub fn on_keys(left_key: KeyFn, right_key: KeyFn) -> Self {
        Self::new(left_key, right_key, ProjectFn::new(|it| it.clone()))
    }
}

/// Enrichment of the primary input (upstream 0) from side inputs (upstream 1..).
#[derive(Clone)]
pub struct HashJoin {
    pub name: String,
    /// One clause per side input.
    pub clauses: Vec<JoinClause>,
    /// One tag per side input.
    pub tags: Vec<Tag>,
}

#[derive(Clone)]
pub struct Peek {
    pub should_log: PredicateFn,
    pub to_string: ToStringFn,
}

#[derive(Clone)]
pub enum Transform {
    Source(SourceDef),
    SourceWithWatermark(WatermarkedSource),
    Stateless(StatelessTransform),
    GroupingAggregate(GroupAggregate),
    CoGroupingAggregate(CoGroupAggregate),
    WindowAggregate(WindowAggregate),
    HashJoin(HashJoin),
    Peek(Peek),
    Sink(SinkDef),
}

impl Transform {
    #[must_use]
    pub fn kind(&self) -> TransformKind {
        match self {
            Transform::Source(_) => TransformKind::Source,
            Transform::SourceWithWatermark(_) => TransformKind::SourceWithWatermark,
            Transform::Stateless(_) => TransformKind::Stateless,
            Transform::GroupingAggregate(_) => TransformKind::GroupingAggregate,
            Transform::CoGroupingAggregate(_) => TransformKind::CoGroupingAggregate,
            Transform::WindowAggregate(_) => TransformKind::WindowAggregate,
            Transform::HashJoin(_) => TransformKind::HashJoin,
            Transform::Peek(_) => TransformKind::Peek,
            Transform::Sink(_) => TransformKind::Sink,
        }
    }

    /// Name the stage's vertices are derived from.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Transform::Source(s) => &s.name,
            Transform::SourceWithWatermark(s) => &s.source.name,
            Transform::Stateless(s) => &s.name,
            Transform::GroupingAggregate(g) => &g.name,
            Transform::CoGroupingAggregate(g) => &g.name,
            Transform::WindowAggregate(w) => &w.name,
            Transform::HashJoin(j) => &j.name,
            Transform::Peek(_) => "peek",
            Transform::Sink(s) => &s.name,
        }
    }

    #[must_use]
    pub fn is_sink(&self) -> bool {
        matches!(self, Transform::Sink(_))
    }

    #[must_use]
    pub fn is_source(&self) -> bool {
        matches!(self, Transform::Source(_) | Transform::SourceWithWatermark(_))
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind(), self.name())
    }
}
