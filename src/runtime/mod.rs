//! Task-graph runtime core.
//!
//! The dispatch engine drives a set of simulated accelerator cores from
//! scheduler threads: a handshake protocol brings every worker up, a
//! polling loop reclaims completions, resolves dependencies through
//! per-task atomic fan-in counters and hands ready tasks to idle workers
//! of the matching class, and a quit broadcast tears everything down once
//! the whole graph has retired.

pub mod dispatch;
pub mod errors;
pub mod graph;
pub mod handshake;
pub mod launch;
pub mod queue;
pub mod transport;
pub mod worker;

pub use errors::{RuntimeError, RuntimeResult};
pub use graph::{CoreType, GraphBuilder, KernelFn, Task, TaskGraph, TaskId};
pub use launch::Runtime;
pub use transport::TransportKind;

/// Upper bound on tasks per graph.
pub const RUNTIME_MAX_TASKS: usize = 1024;

/// Upper bound on scheduler threads per launch.
pub const MAX_SCHED_THREADS: usize = 4;

/// Per-thread compute core cap.
pub const MAX_COMPUTE_PER_THREAD: usize = 24;

/// Per-thread vector core cap.
pub const MAX_VECTOR_PER_THREAD: usize = 48;

/// Per-thread worker cap across both classes.
pub const MAX_WORKERS_PER_THREAD: usize = MAX_COMPUTE_PER_THREAD + MAX_VECTOR_PER_THREAD;

/// Workers per block: one compute core and two vector cores.
pub const WORKERS_PER_BLOCK: usize = 3;
