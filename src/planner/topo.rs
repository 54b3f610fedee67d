//! Deterministic topological ordering of a stage graph.

use crate::error::CompileError;
use crate::stage::{StageGraph, StageId};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};

/// Order stages so every stage comes after all of its upstreams.
///
/// Among stages that are ready at the same time, the one with the smallest
/// `(name, id)` goes first, so the result only depends on the graph.
///
/// # Errors
///
/// [`CompileError::CycleDetected`] listing the stages left unordered.
pub fn sort(graph: &StageGraph) -> Result<Vec<StageId>, CompileError> {
    let mut pending: BTreeMap<StageId, usize> = graph
        .stages()
        .map(|s| (s.id(), s.upstream().len()))
        .collect();

    let mut ready: BinaryHeap<Reverse<(String, StageId)>> = pending
        .iter()
        .filter(|(_, n)| **n == 0)
        .map(|(id, _)| Reverse(graph.sort_key(*id)))
        .collect();

    let mut order = Vec::with_capacity(graph.len());
    while let Some(Reverse((_, id))) = ready.pop() {
        order.push(id);
        pending.remove(&id);
        for down in graph.downstream(id) {
            if let Some(n) = pending.get_mut(down) {
                *n -= 1;
                if *n == 0 {
                    ready.push(Reverse(graph.sort_key(*down)));
                }
            }
        }
    }

    if pending.is_empty() {
        Ok(order)
    } else {
        Err(CompileError::CycleDetected {
            remaining: pending.keys().map(|id| graph.describe(*id)).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::NamedFactory;
    use crate::stage::Stage;
    use crate::transform::{SinkDef, SourceDef, Transform};

    fn source(id: u64, name: &str) -> Stage {
        Stage::new(
            StageId::new(id),
            Transform::Source(SourceDef::new(name, NamedFactory::new(name).shared())),
            vec![],
        )
    }

    fn sink(id: u64, up: &[u64]) -> Stage {
        Stage::new(
            StageId::new(id),
            Transform::Sink(SinkDef::new("sink", NamedFactory::new("sink").shared())),
            up.iter().copied().map(StageId::new).collect(),
        )
    }

    #[test]
    fn ties_break_by_name_then_id() {
        let g = StageGraph::from_stages([source(0, "zeta"), source(1, "alpha"), sink(2, &[0, 1])])
            .expect("graph");
        let order = sort(&g).expect("acyclic");
        assert_eq!(order, vec![StageId::new(1), StageId::new(0), StageId::new(2)]);
    }

    #[test]
    fn cycles_are_reported() {
        let g = StageGraph::from_stages([sink(0, &[1]), sink(1, &[0])]).expect("graph");
        let err = sort(&g).expect_err("cycle");
        assert_eq!(
            err,
            CompileError::CycleDetected {
                remaining: vec!["sink#0".into(), "sink#1".into()]
            }
        );
    }
}
