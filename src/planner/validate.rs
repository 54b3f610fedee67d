//! Structural checks run before any stage is expanded.

use crate::error::CompileError;
use crate::stage::StageGraph;
use tracing::warn;

/// Fail if any non-sink stage has no downstream. Every offender is reported.
///
/// # Errors
///
/// [`CompileError::DanglingStages`].
pub fn check_leakage(graph: &StageGraph) -> Result<(), CompileError> {
    let dangling: Vec<_> = graph
        .stages()
        .filter(|s| !s.transform().is_sink() && graph.downstream(s.id()).is_empty())
        .map(|s| s.id())
        .collect();
    if dangling.is_empty() {
        return Ok(());
    }
    let names: Vec<String> = dangling.iter().map(|id| graph.describe(*id)).collect();
    warn!(stages = ?names, "pipeline has stages with nothing attached");
    Err(CompileError::DanglingStages {
        stages: dangling,
        names,
    })
}
