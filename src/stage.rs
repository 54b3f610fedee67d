//! Logical stages and the stage graph the compiler consumes.
//!
//! Each [`Stage`] inserted into a [`Pipeline`](crate::pipeline::Pipeline) is
//! assigned a sequential [`StageId`]. A [`StageGraph`] is an immutable snapshot of
//! all stages plus the derived downstream adjacency.

use crate::error::CompileError;
use crate::transform::Transform;
use std::collections::BTreeMap;
use std::fmt;

/// Unique numeric identifier of a stage within a pipeline.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct StageId(u64);

impl StageId {
    /// Create an id. Pipelines assign ids themselves; this is for building
    /// [`StageGraph`]s by hand.
    #[must_use]
    pub fn new(v: u64) -> Self {
        Self(v)
    }

    /// Return the underlying numeric value.
    #[must_use]
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A node of the logical graph: one transform and its ordered inputs.
#[derive(Clone, Debug)]
pub struct Stage {
    id: StageId,
    transform: Transform,
    upstream: Vec<StageId>,
}

impl Stage {
    #[must_use]
    pub fn new(id: StageId, transform: Transform, upstream: Vec<StageId>) -> Self {
        Self {
            id,
            transform,
            upstream,
        }
    }

    #[must_use]
    pub fn id(&self) -> StageId {
        self.id
    }

    #[must_use]
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    /// Inputs in ordinal order.
    #[must_use]
    pub fn upstream(&self) -> &[StageId] {
        &self.upstream
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.transform.name()
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name(), self.id)
    }
}

/// Immutable snapshot of a pipeline's stages.
#[derive(Clone, Debug, Default)]
pub struct StageGraph {
    stages: BTreeMap<StageId, Stage>,
    adjacency: BTreeMap<StageId, Vec<StageId>>,
}

impl StageGraph {
    /// Build a graph from stages, deriving downstream adjacency from each
    /// stage's upstream list.
    ///
    /// # Errors
    ///
    /// [`CompileError::UnknownStage`] if a stage lists an upstream that is not
    /// among `stages`.
    pub fn from_stages(stages: impl IntoIterator<Item = Stage>) -> Result<Self, CompileError> {
        let stages: BTreeMap<StageId, Stage> = stages.into_iter().map(|s| (s.id, s)).collect();
        let mut adjacency: BTreeMap<StageId, Vec<StageId>> =
            stages.keys().map(|id| (*id, Vec::new())).collect();
        for stage in stages.values() {
            for up in &stage.upstream {
                adjacency
                    .get_mut(up)
                    .ok_or(CompileError::UnknownStage { stage: *up })?
                    .push(stage.id);
            }
        }
        Ok(Self { stages, adjacency })
    }

    /// Stage → downstream stages. Every stage is a key, sinks map to an empty list.
    #[must_use]
    pub fn adjacency(&self) -> &BTreeMap<StageId, Vec<StageId>> {
        &self.adjacency
    }

    #[must_use]
    pub fn stage(&self, id: StageId) -> Option<&Stage> {
        self.stages.get(&id)
    }

    #[must_use]
    pub fn downstream(&self, id: StageId) -> &[StageId] {
        self.adjacency.get(&id).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn stages(&self) -> impl Iterator<Item = &Stage> {
        self.stages.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Stable ordering key used to break ties between independent stages.
    #[must_use]
    pub fn sort_key(&self, id: StageId) -> (String, StageId) {
        let name = self.stage(id).map(|s| s.name().to_string()).unwrap_or_default();
        (name, id)
    }

    /// Human-readable label of a stage for error messages.
    #[must_use]
    pub fn describe(&self, id: StageId) -> String {
        self.stage(id).map_or_else(|| id.to_string(), ToString::to_string)
    }
}
