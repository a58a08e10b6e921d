//! Error types for the coalpat library.

use crate::base::TipId;
use thiserror::Error;

/// Errors raised by the parameter store.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParamError {
    /// Two parameters were declared with the same name.
    #[error("duplicate parameter name '{0}'")]
    DuplicateName(String),

    /// An initial value lies outside the parameter's bounds.
    #[error("parameter '{name}': value {value} not in [{low}, {high}]")]
    OutOfBounds {
        name: String,
        value: f64,
        low: f64,
        high: f64,
    },

    /// A constraint expression refers to a name that has not been declared.
    #[error("constraint for '{name}' references undefined parameter '{reference}'")]
    UndefinedReference { name: String, reference: String },

    /// A constraint expression could not be parsed.
    #[error("constraint for '{name}': {msg}")]
    BadExpression { name: String, msg: String },

    /// A constrained parameter evaluated to NaN or infinity. Non-fatal:
    /// the cost layer treats the parameter vector as infeasible.
    #[error("constraint for '{0}' did not evaluate to a finite value")]
    NonFinite(String),

    /// `set_free` was called with the wrong number of values.
    #[error("expected {expected} free parameter values, got {got}")]
    FreeLenMismatch { expected: usize, got: usize },
}

/// Structural errors raised while wiring the population network.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetworkError {
    /// A segment would end up with more than two children.
    #[error("segment '{0}' already has two children")]
    TooManyChildren(String),

    /// A segment would end up with more than two parents.
    #[error("segment '{0}' already has two parents")]
    TooManyParents(String),

    /// Adjacent segments disagree about their shared boundary time.
    #[error("date mismatch between child '{child}' and parent '{parent}'")]
    DateMismatch { child: String, parent: String },

    /// The network does not have a unique root.
    #[error("population network does not have a unique root")]
    MultipleRoots,

    /// A segment's interval end is NaN.
    #[error("segment '{0}': interval end is not a number")]
    NonFiniteTime(String),

    /// A two-parent segment has no mixture-fraction parameter.
    #[error("segment '{0}' has two parents but no mixture fraction")]
    MissingMixture(String),
}

/// Domain errors raised by the model and the branch table.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    /// Parameters violate their bounds or the time ordering of segments.
    #[error("parameters are infeasible")]
    Infeasible,

    /// `normalize` was called on an empty or zero-sum branch table.
    #[error("branch table is empty or sums to zero")]
    EmptyBranchTab,

    /// The estimated distribution lacks a pattern observed with positive
    /// frequency, so the KL divergence is undefined.
    #[error("pattern {0:#b} has positive observed frequency but no estimate")]
    MissingPattern(TipId),

    /// More tips were declared than the bitmask can represent.
    #[error("too many samples: {0} (at most 32 are supported)")]
    TooManySamples(usize),

    /// Two tips were declared with the same label.
    #[error("duplicate sample label '{0}'")]
    DuplicateLabel(String),

    /// The model declares no sampled tips.
    #[error("model declares no samples")]
    NoSamples,

    #[error(transparent)]
    Network(#[from] NetworkError),
}

/// Errors raised while reading input files.
#[derive(Debug, Error)]
pub enum InputError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A malformed line, with its 1-based line number.
    #[error("line {line}: {msg}")]
    Syntax { line: usize, msg: String },

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Errors raised by the job queue.
#[derive(Debug, Error)]
pub enum JobQueueError {
    /// `add_job` was called after `no_more_jobs`.
    #[error("job queue is closed to new jobs")]
    Closed,

    /// A worker thread could not be spawned.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),

    /// A job reported a fatal failure. Only the first failure is kept.
    #[error("worker job failed: {0}")]
    WorkerFailed(String),
}

/// Errors raised by the replicate driver and the cost function.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Param(#[from] ParamError),

    #[error(transparent)]
    Jobs(#[from] JobQueueError),
}
