//! Processor suppliers attached to DAG vertices.
//!
//! A vertex does not hold a running processor, only a *supplier*: a description
//! the runtime turns into processor instances once the job is scheduled. User
//! sources, sinks and custom stages bring their own opaque [`ProcessorFactory`];
//! every processor the planner introduces on its own (accumulators, combiners,
//! watermark insertion, hash-join collectors, ...) is a variant of
//! [`ProcessorSupplier`] carrying the functions it was built from.

use crate::aggregate::AggregateOperation;
use crate::function::{FlatMapFn, KeyFn, KeySelector, MapFn, PredicateFn, ProjectFn, TimestampFn, ToStringFn};
use crate::transform::Tag;
use crate::watermark::WatermarkPolicyFn;
use crate::window::SlidingWindowPolicy;
use std::fmt;
use std::sync::Arc;

/// An opaque, user-supplied processor factory.
///
/// The compiler never calls into a factory except to describe it and to ask for
/// its preferred local parallelism.
pub trait ProcessorFactory: Send + Sync {
    /// Short human-readable description used in plan explanations.
    fn describe(&self) -> String;

    /// Number of processor instances per member this factory wants, if it cares.
    fn preferred_local_parallelism(&self) -> Option<usize> {
        None
    }
}

/// A [`ProcessorFactory`] known only by its label. Useful for connectors whose
/// processors live in the runtime, and in tests.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamedFactory {
    label: String,
    local_parallelism: Option<usize>,
}

impl NamedFactory {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            local_parallelism: None,
        }
    }

    #[must_use]
    pub fn with_local_parallelism(mut self, parallelism: usize) -> Self {
        self.local_parallelism = Some(parallelism);
        self
    }

    pub fn shared(self) -> Arc<dyn ProcessorFactory> {
        Arc::new(self)
    }
}

impl ProcessorFactory for NamedFactory {
    fn describe(&self) -> String {
        self.label.clone()
    }

    fn preferred_local_parallelism(&self) -> Option<usize> {
        self.local_parallelism
    }
}

/// What a vertex runs.
#[derive(Clone)]
pub enum ProcessorSupplier {
    /// A user-supplied factory (sources, sinks, custom stages).
    Factory(Arc<dyn ProcessorFactory>),
    Map(MapFn),
    Filter(PredicateFn),
    FlatMap(FlatMapFn),
    /// Assigns timestamps and inserts watermarks behind a raw source.
    InsertWatermarks {
        timestamp_fn: TimestampFn,
        policy: WatermarkPolicyFn,
        suppress_duplicates: bool,
    },
    /// Local pre-aggregation; one key function per input ordinal.
    AccumulateByKey {
        key_fns: Vec<KeyFn>,
        aggregate: AggregateOperation,
    },
    /// Merges partial accumulators by entry key and applies the finish step.
    CombineByKey { aggregate: AggregateOperation },
    /// Single-stage aggregation, used when memory matters more than traffic.
    AggregateByKey {
        key_fns: Vec<KeyFn>,
        aggregate: AggregateOperation,
    },
    /// Accumulates items into frames of a sliding window, per key.
    AccumulateByFrame {
        keys: Vec<KeySelector>,
        policy: SlidingWindowPolicy,
        aggregate: AggregateOperation,
    },
    /// Combines frames into sliding-window results.
    CombineToSlidingWindow {
        policy: SlidingWindowPolicy,
        aggregate: AggregateOperation,
    },
    AggregateToSessionWindow {
        inactivity_gap: i64,
        keys: Vec<KeySelector>,
        aggregate: AggregateOperation,
    },
    /// Builds one side table of a hash-join.
    HashJoinCollect { key_fn: KeyFn, project_fn: ProjectFn },
    /// Enriches the primary stream (ordinal 0) from side tables (ordinals 1..).
    HashJoin { key_fns: Vec<KeyFn>, tags: Vec<Tag> },
    /// Logs output of `inner` matching `should_log` and forwards everything.
    Peek {
        should_log: PredicateFn,
        to_string: ToStringFn,
        inner: Box<ProcessorSupplier>,
    },
}

impl ProcessorSupplier {
    /// Stable label of the supplier kind.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            ProcessorSupplier::Factory(_) => "factory",
            ProcessorSupplier::Map(_) => "map",
            ProcessorSupplier::Filter(_) => "filter",
            ProcessorSupplier::FlatMap(_) => "flat-map",
            ProcessorSupplier::InsertWatermarks { .. } => "insert-watermarks",
            ProcessorSupplier::AccumulateByKey { .. } => "accumulate-by-key",
            ProcessorSupplier::CombineByKey { .. } => "combine-by-key",
            ProcessorSupplier::AggregateByKey { .. } => "aggregate-by-key",
            ProcessorSupplier::AccumulateByFrame { .. } => "accumulate-by-frame",
            ProcessorSupplier::CombineToSlidingWindow { .. } => "combine-to-sliding-window",
            ProcessorSupplier::AggregateToSessionWindow { .. } => "aggregate-to-session-window",
            ProcessorSupplier::HashJoinCollect { .. } => "hash-join-collect",
            ProcessorSupplier::HashJoin { .. } => "hash-join",
            ProcessorSupplier::Peek { .. } => "peek",
        }
    }

    /// Human-readable description, recursing through peek wrappers.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            ProcessorSupplier::Factory(factory) => factory.describe(),
            ProcessorSupplier::Peek { inner, .. } => format!("peek({})", inner.describe()),
            ProcessorSupplier::AccumulateByKey { key_fns, aggregate }
            | ProcessorSupplier::AggregateByKey { key_fns, aggregate } => format!(
                "{}(inputs={}, finish={})",
                self.kind_name(),
                key_fns.len(),
                aggregate.finish_label()
            ),
            ProcessorSupplier::AccumulateByFrame { policy, .. }
            | ProcessorSupplier::CombineToSlidingWindow { policy, .. } => {
                format!("{}({policy})", self.kind_name())
            }
            ProcessorSupplier::AggregateToSessionWindow { inactivity_gap, .. } => {
                format!("{}(gap={inactivity_gap}ms)", self.kind_name())
            }
            ProcessorSupplier::HashJoin { tags, .. } => {
                format!("{}(sides={})", self.kind_name(), tags.len())
            }
            other => other.kind_name().to_string(),
        }
    }

    /// Local parallelism the supplier asks for, looking through peek wrappers.
    #[must_use]
    pub fn preferred_local_parallelism(&self) -> Option<usize> {
        match self {
            ProcessorSupplier::Factory(factory) => factory.preferred_local_parallelism(),
            ProcessorSupplier::Peek { inner, .. } => inner.preferred_local_parallelism(),
            _ => None,
        }
    }

    /// The supplier under any number of peek wrappers.
    #[must_use]
    pub fn unwrap_peeks(&self) -> &ProcessorSupplier {
        let mut cur = self;
        while let ProcessorSupplier::Peek { inner, .. } = cur {
            cur = inner;
        }
        cur
    }

    #[must_use]
    pub fn is_peek(&self) -> bool {
        matches!(self, ProcessorSupplier::Peek { .. })
    }
}

impl fmt::Debug for ProcessorSupplier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProcessorSupplier({})", self.describe())
    }
}

impl From<Arc<dyn ProcessorFactory>> for ProcessorSupplier {
    fn from(factory: Arc<dyn ProcessorFactory>) -> Self {
        ProcessorSupplier::Factory(factory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::ToStringFn;

    #[test]
    fn peek_wrappers_are_transparent_for_inspection() {
        let base = ProcessorSupplier::from(NamedFactory::new("list-source").with_local_parallelism(1).shared());
        let wrapped = ProcessorSupplier::Peek {
            should_log: PredicateFn::always(),
            to_string: ToStringFn::debug_of::<u32>(),
            inner: Box::new(base),
        };
        assert!(wrapped.is_peek());
        assert_eq!(wrapped.unwrap_peeks().kind_name(), "factory");
        assert_eq!(wrapped.preferred_local_parallelism(), Some(1));
        assert_eq!(wrapped.describe(), "peek(list-source)");
    }
}
