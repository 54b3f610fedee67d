//! Hash-join expansion.
//!
//! ```text
//!   primary ───────────────────────────────────────────▶ joiner[0]
//!   side 1 ──distributed broadcast──▶ collector-1 ──▶ joiner[1]  (priority -1)
//!   side k ──distributed broadcast──▶ collector-k ──▶ joiner[k]  (priority -1)
//! ```
//!
//! Every joiner instance needs the complete table of each side, so sides are
//! broadcast to collectors, and the joiner drains its side inputs before it
//! starts on the primary stream.

use super::context::{Decorator, PlanContext};
use super::strategies::{ExpandStage, wrong_kind};
use crate::error::CompileError;
use crate::processor::ProcessorSupplier;
use crate::stage::Stage;
use crate::transform::Transform;
use tracing::debug;

/// Priority of collector-to-joiner edges.
pub const SIDE_INPUT_PRIORITY: i32 = -1;

pub struct HashJoinStrategy;

impl ExpandStage for HashJoinStrategy {
    fn expand(&self, ctx: &mut PlanContext<'_>, stage: &Stage) -> Result<Option<Decorator>, CompileError> {
        let Transform::HashJoin(join) = stage.transform() else {
            return Err(wrong_kind(stage));
        };
        let inputs = stage.upstream().len();
        let sides = join.clauses.len();
        if inputs < 2 || inputs != sides + 1 || join.tags.len() != sides {
            return Err(CompileError::MissingUpstream {
                stage: stage.to_string(),
                expected: sides.max(1) + 1,
                actual: inputs,
            });
        }

        let roles: Vec<String> = std::iter::once("-joiner".to_string())
            .chain((1..=sides).map(|i| format!("-collector-{i}")))
            .collect();
        let role_refs: Vec<&str> = roles.iter().map(String::as_str).collect();
        let prefix = ctx.unique_name(&join.name, "", &role_refs);

        let joiner = ctx.new_vertex(
            format!("{prefix}-joiner"),
            ProcessorSupplier::HashJoin {
                key_fns: join.clauses.iter().map(|c| c.left_key.clone()).collect(),
                tags: join.tags.clone(),
            },
        )?;
        ctx.map_stage(stage.id(), joiner);

        let primary = ctx.vertex_of(stage.upstream()[0])?;
        let edge = ctx.edge_from(primary, joiner, 0);
        ctx.add_edge(edge)?;

        let collector_parallelism = ctx.config().hash_join_collector_parallelism;
        for (i, clause) in join.clauses.iter().enumerate() {
            let ordinal = i + 1;
            let collector = ctx.new_vertex(
                format!("{prefix}-collector-{ordinal}"),
                ProcessorSupplier::HashJoinCollect {
                    key_fn: clause.right_key.clone(),
                    project_fn: clause.right_project.clone(),
                },
            )?;
            ctx.set_local_parallelism(collector, collector_parallelism);

            let side = ctx.vertex_of(stage.upstream()[ordinal])?;
            let to_collector = ctx.edge_from(side, collector, 0).distributed().broadcast();
            ctx.add_edge(to_collector)?;
            let to_joiner = ctx
                .edge_from(collector, joiner, ordinal)
                .broadcast()
                .with_priority(SIDE_INPUT_PRIORITY);
            ctx.add_edge(to_joiner)?;
        }
        debug!(stage = %stage, sides, "expanded hash-join");
        Ok(None)
    }
}
