//! Compilation errors.
//!
//! Every failure is detected synchronously while a pipeline is compiled; the
//! first one aborts compilation and no DAG is produced.

use crate::stage::StageId;
use thiserror::Error;

/// Error type for pipeline compilation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// Non-sink stages whose output is never consumed. All offenders are listed.
    #[error("these stages have nothing attached to them: {}", names.join(", "))]
    DanglingStages { stages: Vec<StageId>, names: Vec<String> },

    /// The stage graph is not acyclic.
    #[error("stage graph contains a cycle through: {}", remaining.join(", "))]
    CycleDetected { remaining: Vec<String> },

    /// No expansion strategy handles this transform kind.
    #[error("unknown transform kind: {kind}")]
    UnknownTransformKind { kind: String },

    /// No expansion handles this window kind.
    #[error("unknown window kind: {kind}")]
    UnknownWindowKind { kind: String },

    /// The operation is intentionally not supported.
    #[error("{operation} is not yet implemented")]
    UnsupportedOperation { operation: String },

    /// A stage references an upstream that is not part of the graph, or an
    /// upstream that has not been expanded yet.
    #[error("unknown stage {stage}")]
    UnknownStage { stage: StageId },

    /// A transform was given fewer (or more) inputs than it needs.
    #[error("stage `{stage}` expects {expected} input(s) but has {actual}")]
    MissingUpstream {
        stage: String,
        expected: usize,
        actual: usize,
    },

    /// An aggregate operation's arity does not match the stage's inputs.
    #[error("stage `{stage}`: aggregate operation has arity {arity} but the stage has {inputs} input(s)")]
    ArityMismatch {
        stage: String,
        arity: usize,
        inputs: usize,
    },

    #[error("invalid window definition: {reason}")]
    InvalidWindow { reason: String },

    #[error("vertex name `{name}` is already taken")]
    DuplicateVertex { name: String },

    /// The produced DAG violates a structural invariant.
    #[error("invalid DAG: {reason}")]
    InvalidDag { reason: String },
}

impl CompileError {
    /// `true` for the errors that can only come from an inconsistent stage
    /// graph or planner, never from a pipeline built with the public API.
    #[must_use]
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            CompileError::CycleDetected { .. }
                | CompileError::UnknownTransformKind { .. }
                | CompileError::UnknownWindowKind { .. }
                | CompileError::UnknownStage { .. }
                | CompileError::DuplicateVertex { .. }
                | CompileError::InvalidDag { .. }
        )
    }
}
