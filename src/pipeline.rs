use crate::compute::ComputeStage;
use crate::dag::Dag;
use crate::error::CompileError;
use crate::function::TimestampFn;
use crate::stage::{Stage, StageGraph, StageId};
use crate::transform::{SourceDef, Transform};
use crate::watermark::WatermarkPolicyFn;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// -------- Pipeline + stages --------
/// A shared, growable stage graph. Cloning a `Pipeline` yields another handle
/// to the same graph; stage handles keep one too.
#[derive(Clone, Default)]
pub struct Pipeline {
    pub(crate) inner: Arc<Mutex<PipelineInner>>,
}

#[derive(Default)]
pub struct PipelineInner {
    pub next_id: u64,
    pub stages: BTreeMap<StageId, Stage>,
}

impl Pipeline {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, PipelineInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn insert_stage(&self, transform: Transform, upstream: Vec<StageId>) -> StageId {
        let mut g = self.lock();
        let id = StageId::new(g.next_id);
        g.next_id += 1;
        g.stages.insert(id, Stage::new(id, transform, upstream));
        id
    }

    /// Start a branch at `source`.
    pub fn draw_from(&self, source: SourceDef) -> ComputeStage {
        let id = self.insert_stage(Transform::Source(source), Vec::new());
        ComputeStage::new(self.clone(), id)
    }

    /// Start a branch at a source whose items carry event timestamps.
    pub fn draw_from_with_watermark(
        &self,
        source: SourceDef,
        timestamp_fn: TimestampFn,
        policy: WatermarkPolicyFn,
    ) -> ComputeStage {
        let transform = Transform::SourceWithWatermark(source.with_watermark(timestamp_fn, policy));
        let id = self.insert_stage(transform, Vec::new());
        ComputeStage::new(self.clone(), id)
    }

    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.lock().stages.len()
    }

    /// Immutable copy of the current stages and their adjacency.
    ///
    /// # Errors
    ///
    /// [`CompileError::UnknownStage`] if a stage was attached to a stage of
    /// another pipeline.
    pub fn snapshot(&self) -> Result<StageGraph, CompileError> {
        let stages: Vec<Stage> = self.lock().stages.values().cloned().collect();
        StageGraph::from_stages(stages)
    }

    /// Compile with the default planner.
    ///
    /// # Errors
    ///
    /// See [`crate::planner::Planner::compile`].
    pub fn to_dag(&self) -> Result<Dag, CompileError> {
        crate::planner::compile(self)
    }
}
