//! Runtime errors

use thiserror::Error;

/// Runtime result
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Errors surfaced by graph construction, launch validation and the
/// scheduler lifecycle.
///
/// The dispatch loop itself never returns an error; everything fatal is
/// reported before any worker is released, everything transient is logged
/// and skipped.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("invalid scheduler thread count: {0}")]
    InvalidThreadCount(i32),

    #[error("invalid block_dim: {0}")]
    InvalidBlockDim(i32),

    #[error("block_dim {block_dim} is not divisible by thread count {thread_num}")]
    UnevenBlockSplit { block_dim: i32, thread_num: i32 },

    #[error("{total} workers exceed the per-thread limit of {limit}")]
    TooManyWorkers { total: usize, limit: usize },

    #[error("null argument: {0}")]
    NullArgument(&'static str),

    #[error("task graph capacity {0} exceeded")]
    GraphCapacity(usize),

    #[error("task id {0} out of range")]
    InvalidTaskId(u32),

    #[error("unknown kernel function id: {0}")]
    UnknownKernel(i32),

    #[error("kernel binary must be {expected} bytes in simulation, got {actual}")]
    InvalidKernelBinary { expected: usize, actual: usize },

    #[error("graph has no initially ready task")]
    NoReadyTasks,

    #[error("graph is already sealed")]
    GraphSealed,

    #[error("initialization failed")]
    InitFailed,

    #[error("scheduler thread panicked")]
    SchedulerPanic,
}
