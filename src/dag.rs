//! The physical DAG produced by the planner.
//!
//! A [`Dag`] is a set of uniquely named [`Vertex`]es connected by [`Edge`]s.
//! Each edge leaves its source at an output ordinal and enters its destination
//! at an input ordinal, and carries a [`Routing`] contract telling the runtime
//! where each item may go:
//!
//! - **locality**: [`Locality::Local`] keeps items on the member that produced
//!   them, [`Locality::Distributed`] may send them to any member;
//! - **fan-out**: unicast (any one consumer), partitioned by key, broadcast to
//!   every consumer, or all-to-one (a single consumer instance).
//!
//! Edges are built fluently:
//!
//! ```
//! use ironjet::dag::{Dag, Edge};
//! use ironjet::processor::{NamedFactory, ProcessorSupplier};
//!
//! # fn main() -> Result<(), ironjet::CompileError> {
//! let mut dag = Dag::new();
//! let a = dag.new_vertex("a", ProcessorSupplier::from(NamedFactory::new("a").shared()))?;
//! let b = dag.new_vertex("b", ProcessorSupplier::from(NamedFactory::new("b").shared()))?;
//! dag.add_edge(Edge::between(a, b).distributed().broadcast().with_priority(-1))?;
//! assert_eq!(dag.inbound(b)[0].priority(), -1);
//! # Ok(())
//! # }
//! ```

use crate::error::CompileError;
use crate::function::{KeyFn, KeySelector};
use crate::processor::ProcessorSupplier;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::fmt;

/// Index of a vertex inside its [`Dag`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct VertexId(usize);

impl VertexId {
    #[must_use]
    pub fn index(&self) -> usize {
        self.0
    }
}

/// A named unit of parallel work.
#[derive(Clone, Debug)]
pub struct Vertex {
    name: String,
    supplier: ProcessorSupplier,
    local_parallelism: Option<usize>,
}

impl Vertex {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn supplier(&self) -> &ProcessorSupplier {
        &self.supplier
    }

    /// Processor instances per member; `None` lets the runtime decide.
    #[must_use]
    pub fn local_parallelism(&self) -> Option<usize> {
        self.local_parallelism
    }

    pub(crate) fn set_local_parallelism(&mut self, parallelism: Option<usize>) {
        self.local_parallelism = parallelism;
    }

    pub(crate) fn replace_supplier(
        &mut self,
        wrap: impl FnOnce(ProcessorSupplier) -> ProcessorSupplier,
    ) {
        let placeholder = ProcessorSupplier::Filter(crate::function::PredicateFn::always());
        let current = std::mem::replace(&mut self.supplier, placeholder);
        self.supplier = wrap(current);
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Locality {
    /// Items stay on the member that produced them.
    Local,
    /// Items may cross member boundaries.
    Distributed,
}

/// How a partition is computed from a key.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionStrategy {
    /// The runtime's default partitioner.
    Default,
    /// Partition by the key's hash code.
    HashCode,
}

#[derive(Clone, Debug)]
pub enum FanOut {
    /// Each item goes to one consumer instance of the runtime's choosing.
    Unicast,
    /// Items with equal keys go to the same consumer instance.
    Partitioned {
        key: KeySelector,
        strategy: PartitionStrategy,
    },
    /// Every item goes to every consumer instance.
    Broadcast,
    /// Every item goes to one single consumer instance.
    AllToOne,
}

impl FanOut {
    /// Stable short label, e.g. `partitioned(hash-code)`.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            FanOut::Unicast => "unicast".to_string(),
            FanOut::Partitioned { key, strategy } => {
                let key = match key {
                    KeySelector::EntryKey => "entry-key",
                    KeySelector::Constant => "constant",
                    KeySelector::Extract(_) => "key-fn",
                };
                match strategy {
                    PartitionStrategy::Default => format!("partitioned({key})"),
                    PartitionStrategy::HashCode => format!("partitioned({key}, hash-code)"),
                }
            }
            FanOut::Broadcast => "broadcast".to_string(),
            FanOut::AllToOne => "all-to-one".to_string(),
        }
    }
}

/// Locality plus fan-out of an edge.
#[derive(Clone, Debug)]
pub struct Routing {
    pub locality: Locality,
    pub fan_out: FanOut,
}

impl Default for Routing {
    fn default() -> Self {
        Self {
            locality: Locality::Local,
            fan_out: FanOut::Unicast,
        }
    }
}

/// A connection from an output ordinal of one vertex to an input ordinal of another.
#[derive(Clone, Debug)]
pub struct Edge {
    source: VertexId,
    source_ordinal: usize,
    destination: VertexId,
    dest_ordinal: usize,
    routing: Routing,
    priority: i32,
}

impl Edge {
    #[must_use]
    pub fn new(
        source: VertexId,
        source_ordinal: usize,
        destination: VertexId,
        dest_ordinal: usize,
    ) -> Self {
        Self {
            source,
            source_ordinal,
            destination,
            dest_ordinal,
            routing: Routing::default(),
            priority: 0,
        }
    }

    /// Edge between ordinal 0 of both ends.
    #[must_use]
    pub fn between(source: VertexId, destination: VertexId) -> Self {
        Self::new(source, 0, destination, 0)
    }

    #[must_use]
    pub fn distributed(mut self) -> Self {
        self.routing.locality = Locality::Distributed;
        self
    }

    #[must_use]
    pub fn local(mut self) -> Self {
        self.routing.locality = Locality::Local;
        self
    }

    /// Partition by a key function with the runtime's default strategy.
    #[must_use]
    pub fn partitioned(self, key: impl Into<KeySelector>) -> Self {
        self.partitioned_with(key, PartitionStrategy::Default)
    }

    #[must_use]
    pub fn partitioned_with(mut self, key: impl Into<KeySelector>, strategy: PartitionStrategy) -> Self {
        self.routing.fan_out = FanOut::Partitioned {
            key: key.into(),
            strategy,
        };
        self
    }

    #[must_use]
    pub fn broadcast(mut self) -> Self {
        self.routing.fan_out = FanOut::Broadcast;
        self
    }

    #[must_use]
    pub fn all_to_one(mut self) -> Self {
        self.routing.fan_out = FanOut::AllToOne;
        self
    }

    /// Lower values are drained first by the consumer.
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn source(&self) -> VertexId {
        self.source
    }

    #[must_use]
    pub fn source_ordinal(&self) -> usize {
        self.source_ordinal
    }

    #[must_use]
    pub fn destination(&self) -> VertexId {
        self.destination
    }

    #[must_use]
    pub fn dest_ordinal(&self) -> usize {
        self.dest_ordinal
    }

    #[must_use]
    pub fn routing(&self) -> &Routing {
        &self.routing
    }

    #[must_use]
    pub fn locality(&self) -> Locality {
        self.routing.locality
    }

    #[must_use]
    pub fn fan_out(&self) -> &FanOut {
        &self.routing.fan_out
    }

    #[must_use]
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// `true` if the edge is partitioned by exactly `key_fn`.
    #[must_use]
    pub fn is_partitioned_by(&self, key_fn: &KeyFn) -> bool {
        matches!(&self.routing.fan_out, FanOut::Partitioned { key, .. } if key.uses(key_fn))
    }
}

/// A physical job graph.
#[derive(Clone, Debug, Default)]
pub struct Dag {
    vertices: Vec<Vertex>,
    edges: Vec<Edge>,
    names: HashMap<String, VertexId>,
}

impl Dag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a vertex.
    ///
    /// # Errors
    ///
    /// [`CompileError::DuplicateVertex`] if the name is taken.
    pub fn new_vertex(
        &mut self,
        name: impl Into<String>,
        supplier: ProcessorSupplier,
    ) -> Result<VertexId, CompileError> {
        let name = name.into();
        if self.names.contains_key(&name) {
            return Err(CompileError::DuplicateVertex { name });
        }
        let id = VertexId(self.vertices.len());
        let local_parallelism = supplier.preferred_local_parallelism();
        self.names.insert(name.clone(), id);
        self.vertices.push(Vertex {
            name,
            supplier,
            local_parallelism,
        });
        Ok(id)
    }

    /// Add an edge between two vertices of this DAG.
    ///
    /// # Errors
    ///
    /// [`CompileError::InvalidDag`] if either end is not a vertex of this DAG.
    pub fn add_edge(&mut self, edge: Edge) -> Result<(), CompileError> {
        for end in [edge.source, edge.destination] {
            if end.0 >= self.vertices.len() {
                return Err(CompileError::InvalidDag {
                    reason: format!("edge references unknown vertex {}", end.0),
                });
            }
        }
        self.edges.push(edge);
        Ok(())
    }

    #[must_use]
    pub fn vertex(&self, id: VertexId) -> Option<&Vertex> {
        self.vertices.get(id.0)
    }

    pub(crate) fn vertex_mut(&mut self, id: VertexId) -> Option<&mut Vertex> {
        self.vertices.get_mut(id.0)
    }

    #[must_use]
    pub fn vertex_by_name(&self, name: &str) -> Option<&Vertex> {
        self.id_of(name).and_then(|id| self.vertex(id))
    }

    #[must_use]
    pub fn id_of(&self, name: &str) -> Option<VertexId> {
        self.names.get(name).copied()
    }

    #[must_use]
    pub fn contains_name(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    /// Vertices in insertion order.
    pub fn vertices(&self) -> impl Iterator<Item = (VertexId, &Vertex)> {
        self.vertices.iter().enumerate().map(|(i, v)| (VertexId(i), v))
    }

    /// Edges in insertion order.
    #[must_use]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Edges entering `id`, ordered by destination ordinal.
    #[must_use]
    pub fn inbound(&self, id: VertexId) -> Vec<&Edge> {
        let mut edges: Vec<&Edge> = self.edges.iter().filter(|e| e.destination == id).collect();
        edges.sort_by_key(|e| e.dest_ordinal);
        edges
    }

    /// Edges leaving `id`, ordered by source ordinal.
    #[must_use]
    pub fn outbound(&self, id: VertexId) -> Vec<&Edge> {
        let mut edges: Vec<&Edge> = self.edges.iter().filter(|e| e.source == id).collect();
        edges.sort_by_key(|e| e.source_ordinal);
        edges
    }

    /// Name of a vertex, or `?` for an id from another DAG.
    #[must_use]
    pub fn name_of(&self, id: VertexId) -> &str {
        self.vertex(id).map_or("?", Vertex::name)
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Check the structural invariants the runtime relies on: inbound and
    /// outbound ordinals of every vertex are contiguous from 0, vertex names
    /// are unique, and the graph is acyclic.
    ///
    /// # Errors
    ///
    /// [`CompileError::InvalidDag`] describing the first violation found.
    pub fn validate(&self) -> Result<(), CompileError> {
        let mut seen = BTreeSet::new();
        for v in &self.vertices {
            if !seen.insert(v.name.as_str()) {
                return Err(CompileError::InvalidDag {
                    reason: format!("vertex name `{}` is used twice", v.name),
                });
            }
        }

        for (id, v) in self.vertices() {
            let inbound: Vec<usize> = self.inbound(id).iter().map(|e| e.dest_ordinal).collect();
            check_contiguous(&v.name, "inbound", &inbound)?;
            let outbound: Vec<usize> = self.outbound(id).iter().map(|e| e.source_ordinal).collect();
            check_contiguous(&v.name, "outbound", &outbound)?;
        }

        let mut in_degree = vec![0usize; self.vertices.len()];
        for e in &self.edges {
            in_degree[e.destination.0] += 1;
        }
        let mut ready: VecDeque<usize> = (0..self.vertices.len()).filter(|&i| in_degree[i] == 0).collect();
        let mut visited = 0;
        while let Some(i) = ready.pop_front() {
            visited += 1;
            for e in self.edges.iter().filter(|e| e.source.0 == i) {
                let d = e.destination.0;
                in_degree[d] -= 1;
                if in_degree[d] == 0 {
                    ready.push_back(d);
                }
            }
        }
        if visited != self.vertices.len() {
            let cyclic: Vec<&str> = (0..self.vertices.len())
                .filter(|&i| in_degree[i] > 0)
                .map(|i| self.vertices[i].name.as_str())
                .collect();
            return Err(CompileError::InvalidDag {
                reason: format!("cycle through {}", cyclic.join(", ")),
            });
        }
        Ok(())
    }
}

fn check_contiguous(vertex: &str, direction: &str, ordinals: &[usize]) -> Result<(), CompileError> {
    for (expected, &actual) in ordinals.iter().enumerate() {
        if expected != actual {
            return Err(CompileError::InvalidDag {
                reason: format!(
                    "{direction} ordinals of `{vertex}` are not contiguous: {ordinals:?}"
                ),
            });
        }
    }
    Ok(())
}

impl fmt::Display for VertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::NamedFactory;

    fn named(label: &str) -> ProcessorSupplier {
        ProcessorSupplier::from(NamedFactory::new(label).shared())
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut dag = Dag::new();
        dag.new_vertex("a", named("a")).expect("first");
        let err = dag.new_vertex("a", named("a")).expect_err("duplicate");
        assert_eq!(err, CompileError::DuplicateVertex { name: "a".into() });
    }

    #[test]
    fn gap_in_inbound_ordinals_fails_validation() {
        let mut dag = Dag::new();
        let a = dag.new_vertex("a", named("a")).expect("a");
        let b = dag.new_vertex("b", named("b")).expect("b");
        dag.add_edge(Edge::new(a, 0, b, 1)).expect("edge");
        let err = dag.validate().expect_err("ordinal 0 missing");
        assert!(err.to_string().contains("inbound ordinals of `b`"));
    }

    #[test]
    fn cycles_fail_validation() {
        let mut dag = Dag::new();
        let a = dag.new_vertex("a", named("a")).expect("a");
        let b = dag.new_vertex("b", named("b")).expect("b");
        dag.add_edge(Edge::between(a, b)).expect("a->b");
        dag.add_edge(Edge::between(b, a)).expect("b->a");
        assert!(dag.validate().expect_err("cycle").to_string().contains("cycle"));
    }

    #[test]
    fn edge_builder_records_routing() {
        let key = KeyFn::new(|it| it.clone());
        let e = Edge::between(VertexId(0), VertexId(1))
            .distributed()
            .partitioned_with(key.clone(), PartitionStrategy::HashCode);
        assert_eq!(e.locality(), Locality::Distributed);
        assert!(e.is_partitioned_by(&key));
        assert_eq!(e.fan_out().label(), "partitioned(key-fn, hash-code)");
        assert_eq!(e.priority(), 0);
    }

    #[test]
    fn preferred_parallelism_comes_from_the_factory() {
        let mut dag = Dag::new();
        let id = dag
            .new_vertex("src", ProcessorSupplier::from(NamedFactory::new("src").with_local_parallelism(1).shared()))
            .expect("vertex");
        assert_eq!(dag.vertex(id).and_then(Vertex::local_parallelism), Some(1));
    }
}
