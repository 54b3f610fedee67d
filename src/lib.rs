//! # ironjet
//!
//! A **pipeline-to-DAG compiler** for a distributed stream-processing engine.
//! You declare a logical pipeline of stages (sources, stateless transforms,
//! grouping and windowed aggregations, hash-joins, peeks, sinks) and ironjet
//! compiles it into a physical [`Dag`] of uniquely named vertices connected by
//! edges that carry explicit routing contracts: local or distributed, unicast,
//! partitioned, broadcast or all-to-one, with priorities.
//!
//! ## Key Features
//!
//! - **Fluent pipeline API** - chain stages with [`ComputeStage`] handles
//! - **Two-stage aggregation** - local pre-aggregation followed by a distributed combine
//! - **Windowed aggregation** - tumbling, sliding and session windows, keyed or global
//! - **Hash-join enrichment** - any number of side inputs broadcast into per-side tables
//! - **Deterministic output** - compiling the same pipeline twice yields the same DAG
//! - **Structural validation** - dangling stages, cycles and ordinal gaps are rejected
//!
//! ## Quick Start
//!
//! ```
//! use ironjet::aggregate::counting;
//! use ironjet::function::KeyFn;
//! use ironjet::processor::NamedFactory;
//! use ironjet::transform::{SinkDef, SourceDef};
//! use ironjet::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let p = Pipeline::default();
//! let key = KeyFn::new(|word| word.clone());
//!
//! p.draw_from(SourceDef::new("words", NamedFactory::new("list-source").shared()))
//!     .grouping_key(key)
//!     .aggregate(counting())
//!     .drain_to(SinkDef::new("counts", NamedFactory::new("list-sink").shared()));
//!
//! let dag = p.to_dag()?;
//! assert!(dag.vertex_by_name("group-and-aggregate-stage1").is_some());
//! assert!(dag.vertex_by_name("group-and-aggregate-stage2").is_some());
//! println!("{dag}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Concepts
//!
//! ### Stages and transforms
//!
//! A [`Pipeline`] holds [`Stage`]s. Each stage has a [`Transform`] and an ordered
//! list of upstream stages; an upstream's position is the input ordinal its
//! items arrive on. [`Pipeline::snapshot`] freezes the stages into a
//! [`StageGraph`], the compiler's input.
//!
//! ### Compilation
//!
//! [`Planner::compile`] checks that every non-sink stage is consumed, orders
//! the stages topologically and hands each to the expansion strategy for its
//! transform kind:
//!
//! | Transform | Vertices |
//! |---|---|
//! | source | `<name>` |
//! | source with watermark | `<name>` → `<name>-wm` |
//! | map / filter / flat-map / custom | `<name>` |
//! | grouping or co-grouping aggregate | `<name>-stage1` → `<name>-stage2` |
//! | sliding / tumbling window | `sliding-window-stage1` → `sliding-window-stage2` |
//! | session window | `session-window` |
//! | hash-join with k sides | `<name>-joiner` + k `<name>-collector-i` |
//! | peek | none; wraps its upstream's processor |
//!
//! Names already taken get a numeric suffix: `map`, `map-2`, `map-3`, ...
//!
//! ### Configuration
//!
//! [`PlannerConfig`] adjusts expansion (collector parallelism, default local
//! parallelism, peek logging, DAG validation) and loads from JSON.
//!
//! ## Module Overview
//!
//! - [`pipeline`] / [`compute`] - Pipeline construction
//! - [`stage`] / [`transform`] - The logical stage graph
//! - [`planner`] - Compilation and expansion strategies
//! - [`dag`] / [`explain`] - The physical DAG and its renderings
//! - [`aggregate`] / [`window`] / [`watermark`] - Aggregation and event-time descriptors
//! - [`function`] / [`processor`] - Opaque function and processor handles
//! - [`testing`] - Assertions and fixtures for tests

pub mod aggregate;
pub mod compute;
pub mod config;
pub mod dag;
pub mod error;
pub mod explain;
pub mod function;
pub mod pipeline;
pub mod planner;
pub mod processor;
pub mod stage;
pub mod testing;
pub mod transform;
pub mod watermark;
pub mod window;

// General re-exports
pub use aggregate::{AggregateOperation, CombineFn, Count, Sum, ToList};
pub use compute::{ComputeStage, SinkStage, StageWithGrouping, StageWithWindow};
pub use config::PlannerConfig;
pub use dag::{Dag, Edge, FanOut, Locality, PartitionStrategy, Vertex, VertexId};
pub use error::CompileError;
pub use explain::DagSummary;
pub use pipeline::Pipeline;
pub use planner::{Planner, compile};
pub use stage::{Stage, StageGraph, StageId};
pub use transform::{Transform, TransformKind};
pub use window::{TimestampMs, WindowDefinition, WindowKind};
