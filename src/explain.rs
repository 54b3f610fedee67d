//! Human- and tool-readable renderings of a [`Dag`].
//!
//! - `Display` draws a boxed explanation listing every vertex with its
//!   processor and inbound edges;
//! - [`Dag::summary`] returns a serializable [`DagSummary`], which
//!   [`Dag::to_json`] renders with `serde_json` for job-submission tooling;
//! - [`Dag::to_dot`] produces Graphviz text.

use crate::dag::{Dag, Edge, Locality};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FormatResult, Write as _};

/// Serializable description of a DAG.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DagSummary {
    pub vertices: Vec<VertexSummary>,
    pub edges: Vec<EdgeSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VertexSummary {
    pub name: String,
    /// Processor description, e.g. `accumulate-by-key(inputs=1, finish=identity)`.
    pub processor: String,
    pub local_parallelism: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeSummary {
    pub from: String,
    pub from_ordinal: usize,
    pub to: String,
    pub to_ordinal: usize,
    pub locality: Locality,
    pub fan_out: String,
    pub priority: i32,
}

impl DagSummary {
    /// Inbound edges of the named vertex, ordered by destination ordinal.
    #[must_use]
    pub fn inbound(&self, vertex: &str) -> Vec<&EdgeSummary> {
        let mut edges: Vec<&EdgeSummary> = self.edges.iter().filter(|e| e.to == vertex).collect();
        edges.sort_by_key(|e| e.to_ordinal);
        edges
    }
}

impl Dag {
    #[must_use]
    pub fn summary(&self) -> DagSummary {
        DagSummary {
            vertices: self
                .vertices()
                .map(|(_, v)| VertexSummary {
                    name: v.name().to_string(),
                    processor: v.supplier().describe(),
                    local_parallelism: v.local_parallelism(),
                })
                .collect(),
            edges: self.edges().iter().map(|e| self.edge_summary(e)).collect(),
        }
    }

    /// Pretty-printed JSON of [`Dag::summary`].
    ///
    /// # Errors
    ///
    /// Fails only if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.summary()).context("serializing DAG summary")
    }

    /// Graphviz rendering. Distributed edges are drawn bold, priority edges dashed.
    #[must_use]
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph dag {\n");
        for (id, v) in self.vertices() {
            let _ = writeln!(
                out,
                "    v{} [label=\"{}\\n{}\"];",
                id.index(),
                dot_escape(v.name()),
                dot_escape(&v.supplier().describe())
            );
        }
        for e in self.edges() {
            let mut attrs = vec![format!(
                "label=\"{}:{} {}\"",
                e.source_ordinal(),
                e.dest_ordinal(),
                dot_escape(&e.fan_out().label())
            )];
            let mut styles = Vec::new();
            if e.locality() == Locality::Distributed {
                styles.push("bold");
            }
            if e.priority() != 0 {
                styles.push("dashed");
            }
            if !styles.is_empty() {
                attrs.push(format!("style=\"{}\"", styles.join(",")));
            }
            let _ = writeln!(
                out,
                "    v{} -> v{} [{}];",
                e.source().index(),
                e.destination().index(),
                attrs.join(", ")
            );
        }
        out.push_str("}\n");
        out
    }

    fn edge_summary(&self, e: &Edge) -> EdgeSummary {
        EdgeSummary {
            from: self.name_of(e.source()).to_string(),
            from_ordinal: e.source_ordinal(),
            to: self.name_of(e.destination()).to_string(),
            to_ordinal: e.dest_ordinal(),
            locality: e.locality(),
            fan_out: e.fan_out().label(),
            priority: e.priority(),
        }
    }
}

/// Escape text for a double-quoted DOT string.
fn dot_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '"' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out
}

impl Display for Dag {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        writeln!(
            f,
            "╔═══════════════════════════════════════════════════════════════╗"
        )?;
        writeln!(
            f,
            "║                  COMPILED DAG EXPLANATION                     ║"
        )?;
        writeln!(
            f,
            "╚═══════════════════════════════════════════════════════════════╝"
        )?;
        writeln!(f)?;

        writeln!(
            f,
            "┌─ SUMMARY ────────────────────────────────────────────────────┐"
        )?;
        writeln!(f, "│ Vertices:          {:>10}", self.vertex_count())?;
        writeln!(f, "│ Edges:             {:>10}", self.edge_count())?;
        let distributed = self
            .edges()
            .iter()
            .filter(|e| e.locality() == Locality::Distributed)
            .count();
        writeln!(f, "│ Distributed Edges: {distributed:>10}")?;
        writeln!(
            f,
            "└──────────────────────────────────────────────────────────────┘"
        )?;
        writeln!(f)?;

        writeln!(
            f,
            "┌─ VERTICES ───────────────────────────────────────────────────┐"
        )?;
        for (id, v) in self.vertices() {
            writeln!(f, "│")?;
            let lp = v
                .local_parallelism()
                .map_or_else(|| "default".to_string(), |n| n.to_string());
            writeln!(f, "│ {}  (local parallelism: {lp})", v.name())?;
            writeln!(f, "│   Processor: {}", v.supplier().describe())?;
            for e in self.inbound(id) {
                let locality = match e.locality() {
                    Locality::Local => "local",
                    Locality::Distributed => "distributed",
                };
                let priority = if e.priority() == 0 {
                    String::new()
                } else {
                    format!(", priority {}", e.priority())
                };
                writeln!(
                    f,
                    "│   in[{}] <- {}[{}]  {locality} {}{priority}",
                    e.dest_ordinal(),
                    self.name_of(e.source()),
                    e.source_ordinal(),
                    e.fan_out().label()
                )?;
            }
        }
        writeln!(f, "│")?;
        writeln!(
            f,
            "└──────────────────────────────────────────────────────────────┘"
        )
    }
}
