//! Assertion functions for compiled DAGs.
//!
//! Vertices are addressed by name, which is what the planner guarantees to be
//! stable. Every assertion panics with the DAG's explanation on failure.

use crate::dag::{Dag, Edge, Locality, Vertex};
use std::collections::BTreeSet;

/// # Panics
///
/// Panics if the DAG does not have exactly `expected` vertices.
pub fn assert_vertex_count(dag: &Dag, expected: usize) {
    assert_eq!(
        dag.vertex_count(),
        expected,
        "Vertex count mismatch:\n  Expected: {expected}\n  Actual: {}\n{dag}",
        dag.vertex_count()
    );
}

/// Assert the set of vertex names, ignoring order.
///
/// # Panics
///
/// Panics listing missing and unexpected names.
pub fn assert_vertex_names(dag: &Dag, expected: &[&str]) {
    let actual: BTreeSet<&str> = dag.vertices().map(|(_, v)| v.name()).collect();
    let expected: BTreeSet<&str> = expected.iter().copied().collect();
    if actual != expected {
        let missing: Vec<_> = expected.difference(&actual).collect();
        let extra: Vec<_> = actual.difference(&expected).collect();
        panic!("Vertex names mismatch:\n  Missing: {missing:?}\n  Extra: {extra:?}\n{dag}");
    }
}

/// # Panics
///
/// Panics if no vertex has this name.
pub fn assert_has_vertex<'a>(dag: &'a Dag, name: &str) -> &'a Vertex {
    dag.vertex_by_name(name)
        .unwrap_or_else(|| panic!("No vertex named `{name}`\n{dag}"))
}

/// The single edge from `from` to `to`.
///
/// # Panics
///
/// Panics if there is no such edge, or more than one.
pub fn assert_edge<'a>(dag: &'a Dag, from: &str, to: &str) -> &'a Edge {
    let (Some(src), Some(dst)) = (dag.id_of(from), dag.id_of(to)) else {
        panic!("Edge `{from}` -> `{to}`: unknown vertex\n{dag}");
    };
    let edges: Vec<&Edge> = dag
        .edges()
        .iter()
        .filter(|e| e.source() == src && e.destination() == dst)
        .collect();
    assert_eq!(
        edges.len(),
        1,
        "Expected exactly one edge `{from}` -> `{to}`, found {}\n{dag}",
        edges.len()
    );
    edges[0]
}

/// Assert which vertices feed `vertex`, in destination-ordinal order.
///
/// # Panics
///
/// Panics if the upstream names differ.
pub fn assert_inbound(dag: &Dag, vertex: &str, expected_sources: &[&str]) {
    let id = dag
        .id_of(vertex)
        .unwrap_or_else(|| panic!("No vertex named `{vertex}`\n{dag}"));
    let actual: Vec<&str> = dag.inbound(id).iter().map(|e| dag.name_of(e.source())).collect();
    assert_eq!(
        actual, expected_sources,
        "Inbound edges of `{vertex}` mismatch\n{dag}"
    );
}

/// # Panics
///
/// Panics if the edge is not distributed.
pub fn assert_distributed(edge: &Edge) {
    assert_eq!(edge.locality(), Locality::Distributed, "Expected a distributed edge: {edge:?}");
}

/// # Panics
///
/// Panics if the edge is not local.
pub fn assert_local(edge: &Edge) {
    assert_eq!(edge.locality(), Locality::Local, "Expected a local edge: {edge:?}");
}

/// Assert that the named vertex runs a supplier of the given kind, looking
/// through peek wrappers.
///
/// # Panics
///
/// Panics on a different kind.
pub fn assert_processor_kind(dag: &Dag, vertex: &str, kind: &str) {
    let v = assert_has_vertex(dag, vertex);
    assert_eq!(
        v.supplier().unwrap_peeks().kind_name(),
        kind,
        "Processor of `{vertex}` mismatch\n{dag}"
    );
}

/// Vertex names plus every edge rendered as text, ignoring processors.
#[must_use]
pub fn dag_shape(dag: &Dag) -> (Vec<String>, Vec<String>) {
    let names = dag.vertices().map(|(_, v)| v.name().to_string()).collect();
    let edges = dag
        .summary()
        .edges
        .into_iter()
        .map(|e| {
            format!(
                "{}[{}] -> {}[{}] {:?} {} p{}",
                e.from, e.from_ordinal, e.to, e.to_ordinal, e.locality, e.fan_out, e.priority
            )
        })
        .collect();
    (names, edges)
}

/// Assert two DAGs have the same vertices and edges, ignoring processors.
///
/// # Panics
///
/// Panics if the shapes differ.
pub fn assert_same_shape(actual: &Dag, expected: &Dag) {
    assert_eq!(
        dag_shape(actual),
        dag_shape(expected),
        "DAG shapes differ:\n  Actual:\n{actual}\n  Expected:\n{expected}"
    );
}
