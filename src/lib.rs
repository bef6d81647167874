//! TianJi (田忌) — Heterogeneous Accelerator Task-Graph Runtime
//!
//! A dispatch engine that drives compute and vector cores from scheduler
//! threads to execute a dependency-ordered task graph to completion. The
//! hard part is the scheduler/worker interaction: a bring-up handshake, a
//! fan-in dependency resolver, dual per-class ready queues and a polling
//! dispatch loop, across a boundary that may be shared memory or
//! memory-mapped control registers. In simulation the workers are host
//! threads and kernels are plain function pointers; the dispatch design
//! is the same either way.
//!
//! # Example
//!
//! ```
//! use tianji::kernels::{addr_of, kernel_add};
//! use tianji::{CoreType, GraphBuilder, Runtime, TransportKind};
//!
//! let a: Vec<f32> = (1..=8).map(|i| i as f32).collect();
//! let b: Vec<f32> = (1..=8).map(|i| i as f32).collect();
//! let mut c = vec![0.0f32; 8];
//!
//! let mut builder = GraphBuilder::new();
//! builder
//!     .add_task_at_addr(
//!         CoreType::Compute,
//!         addr_of(kernel_add),
//!         &[a.as_ptr() as i64, b.as_ptr() as i64, c.as_mut_ptr() as i64, 8],
//!     )
//!     .unwrap();
//!
//! let mut rt = Runtime::new(builder.build(), TransportKind::SharedMem);
//! rt.launch(1, 1).unwrap();
//! assert_eq!(c[7], 16.0);
//! ```

#![warn(rust_2018_idioms)]

pub mod device;
pub mod ffi;
pub mod kernels;
pub mod runtime;
pub mod util;

// Re-exports
pub use anyhow::{Context, Result};
pub use thiserror::Error;

pub use runtime::{
    CoreType, GraphBuilder, KernelFn, Runtime, RuntimeError, RuntimeResult, Task, TaskGraph,
    TaskId, TransportKind,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Project name
pub const NAME: &str = "TianJi (田忌)";
