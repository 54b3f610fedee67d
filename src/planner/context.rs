//! Mutable state of one compilation.

use crate::config::PlannerConfig;
use crate::dag::{Dag, Edge, VertexId};
use crate::error::CompileError;
use crate::processor::ProcessorSupplier;
use crate::stage::{Stage, StageGraph, StageId};
use std::collections::{HashMap, HashSet};
use tracing::{debug, trace};

/// Wraps the supplier of the vertex a stage maps to. Applied when the context
/// is finished, in the order decorators were registered.
pub type Decorator = Box<dyn FnOnce(ProcessorSupplier) -> ProcessorSupplier + Send>;

/// Everything a strategy needs while expanding stages: the DAG under
/// construction, the vertex each expanded stage is represented by, the next
/// free output ordinal per vertex, and every name issued so far.
pub struct PlanContext<'a> {
    graph: &'a StageGraph,
    config: &'a PlannerConfig,
    dag: Dag,
    stage_vertices: HashMap<StageId, VertexId>,
    next_ordinals: HashMap<VertexId, usize>,
    issued_names: HashSet<String>,
    decorators: Vec<(VertexId, Decorator)>,
}

impl<'a> PlanContext<'a> {
    pub(crate) fn new(graph: &'a StageGraph, config: &'a PlannerConfig) -> Self {
        Self {
            graph,
            config,
            dag: Dag::new(),
            stage_vertices: HashMap::new(),
            next_ordinals: HashMap::new(),
            issued_names: HashSet::new(),
            decorators: Vec::new(),
        }
    }

    #[must_use]
    pub fn graph(&self) -> &StageGraph {
        self.graph
    }

    #[must_use]
    pub fn config(&self) -> &PlannerConfig {
        self.config
    }

    /// The DAG built so far.
    #[must_use]
    pub fn dag(&self) -> &Dag {
        &self.dag
    }

    /// Issue a fresh name: `base + suffix` if unused, otherwise
    /// `base-2 + suffix`, `base-3 + suffix`, ...
    pub fn vertex_name(&mut self, base: &str, suffix: &str) -> String {
        self.unique_name(base, suffix, &[])
    }

    /// Like [`Self::vertex_name`], but the candidate is also skipped while any
    /// `candidate + role` is already taken. Used for name prefixes shared by the
    /// vertices of one multi-vertex expansion.
    pub fn unique_name(&mut self, base: &str, suffix: &str, roles: &[&str]) -> String {
        for index in 1usize.. {
            let candidate = if index == 1 {
                format!("{base}{suffix}")
            } else {
                format!("{base}-{index}{suffix}")
            };
            let taken = self.issued_names.contains(&candidate)
                || roles
                    .iter()
                    .any(|role| self.issued_names.contains(&format!("{candidate}{role}")));
            if taken {
                trace!(candidate = %candidate, "vertex name taken");
                continue;
            }
            self.issued_names.insert(candidate.clone());
            return candidate;
        }
        unreachable!("name indices are unbounded")
    }

    /// Add a vertex. The configured default local parallelism applies when the
    /// supplier does not ask for one.
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
        let id = self.dag.new_vertex(name.clone(), supplier)?;
        if let Some(v) = self.dag.vertex_mut(id) {
            if v.local_parallelism().is_none() {
                v.set_local_parallelism(self.config.default_local_parallelism);
            }
            debug!(vertex = %name, processor = %v.supplier().describe(), "added vertex");
        }
        self.issued_names.insert(name);
        Ok(id)
    }

    pub(crate) fn set_local_parallelism(&mut self, vertex: VertexId, parallelism: usize) {
        if let Some(v) = self.dag.vertex_mut(vertex) {
            v.set_local_parallelism(Some(parallelism));
        }
    }

    /// Add a vertex named after the stage and make it the stage's representative.
    ///
    /// # Errors
    ///
    /// See [`Self::new_vertex`].
    pub fn add_stage_vertex(
        &mut self,
        stage: &Stage,
        supplier: ProcessorSupplier,
    ) -> Result<VertexId, CompileError> {
        let name = self.vertex_name(stage.name(), "");
        let id = self.new_vertex(name, supplier)?;
        self.map_stage(stage.id(), id);
        Ok(id)
    }

    /// Record `vertex` as the vertex downstream stages connect to.
    pub fn map_stage(&mut self, stage: StageId, vertex: VertexId) {
        self.stage_vertices.insert(stage, vertex);
    }

    /// The vertex representing an already expanded stage.
    ///
    /// # Errors
    ///
    /// [`CompileError::UnknownStage`] if the stage has not been expanded.
    pub fn vertex_of(&self, stage: StageId) -> Result<VertexId, CompileError> {
        self.stage_vertices
            .get(&stage)
            .copied()
            .ok_or(CompileError::UnknownStage { stage })
    }

    /// Reserve the next output ordinal of `vertex`.
    pub fn next_output_ordinal(&mut self, vertex: VertexId) -> usize {
        let next = self.next_ordinals.entry(vertex).or_insert(0);
        let ordinal = *next;
        *next += 1;
        ordinal
    }

    /// An edge from the next free output ordinal of `source` into
    /// `dest_ordinal` of `destination`.
    pub fn edge_from(&mut self, source: VertexId, destination: VertexId, dest_ordinal: usize) -> Edge {
        let source_ordinal = self.next_output_ordinal(source);
        Edge::new(source, source_ordinal, destination, dest_ordinal)
    }

    /// # Errors
    ///
    /// [`CompileError::InvalidDag`] if an end is not part of the DAG.
    pub fn add_edge(&mut self, edge: Edge) -> Result<(), CompileError> {
        debug!(
            from = %self.dag.name_of(edge.source()),
            from_ordinal = edge.source_ordinal(),
            to = %self.dag.name_of(edge.destination()),
            to_ordinal = edge.dest_ordinal(),
            routing = %edge.fan_out().label(),
            "added edge"
        );
        self.dag.add_edge(edge)
    }

    /// Connect every upstream of `stage` to `destination`: upstream `i` enters
    /// at ordinal `i`, leaving its vertex at that vertex's next output ordinal.
    /// `configure` receives each edge with its destination ordinal.
    ///
    /// # Errors
    ///
    /// [`CompileError::UnknownStage`] if an upstream was not expanded yet.
    pub fn add_edges<F>(&mut self, stage: &Stage, destination: VertexId, mut configure: F) -> Result<(), CompileError>
    where
        F: FnMut(Edge, usize) -> Edge,
    {
        for (ordinal, upstream) in stage.upstream().iter().enumerate() {
            let source = self.vertex_of(*upstream)?;
            let edge = self.edge_from(source, destination, ordinal);
            let edge = configure(edge, ordinal);
            self.add_edge(edge)?;
        }
        Ok(())
    }

    /// Register a decorator for the vertex representing `stage`.
    ///
    /// # Errors
    ///
    /// [`CompileError::UnknownStage`] if the stage has no vertex.
    pub fn decorate(&mut self, stage: StageId, decorator: Decorator) -> Result<(), CompileError> {
        let vertex = self.vertex_of(stage)?;
        self.decorators.push((vertex, decorator));
        Ok(())
    }

    /// Apply pending decorators and hand out the DAG.
    pub(crate) fn finish(mut self) -> Dag {
        for (vertex, decorator) in self.decorators.drain(..) {
            if let Some(v) = self.dag.vertex_mut(vertex) {
                v.replace_supplier(decorator);
            }
        }
        self.dag
    }
}
