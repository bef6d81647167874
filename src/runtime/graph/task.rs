//! Task records for the dependency graph.

use std::fmt;
use std::sync::atomic::{AtomicI32, Ordering};

/// Unique task identifier, 1-based.
///
/// Id 0 is reserved: it is the "no task" value in handshake slots and
/// control registers, so a valid id always fits in 31 bits and is >= 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(pub u32);

impl TaskId {
    /// Get the inner value.
    #[inline]
    pub fn inner(&self) -> u32 {
        self.0
    }
}

impl From<u32> for TaskId {
    fn from(val: u32) -> Self {
        Self(val)
    }
}

impl From<TaskId> for u32 {
    fn from(val: TaskId) -> Self {
        val.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "Task({})", self.0)
    }
}

/// Worker class a task is affinitized to.
///
/// Tasks never migrate between classes: a compute task is only ever
/// dispatched to a compute core, a vector task to a vector core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum CoreType {
    /// Compute (matrix) core, one per block.
    Compute = 0,
    /// Vector core, two per block.
    Vector = 1,
}

impl CoreType {
    /// Convert from u32 (for handshake storage).
    #[inline]
    pub fn from_u32(val: u32) -> Self {
        match val {
            0 => CoreType::Compute,
            _ => CoreType::Vector,
        }
    }

    /// Convert to u32 (for handshake storage).
    #[inline]
    pub fn as_u32(self) -> u32 {
        self as u32
    }
}

impl fmt::Display for CoreType {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            CoreType::Compute => write!(f, "compute"),
            CoreType::Vector => write!(f, "vector"),
        }
    }
}

/// Uniform kernel entry point.
///
/// Every kernel has the same single-argument signature and unpacks its own
/// operands from the argument array. The first three slots are
/// conventionally src/src/dst pointers and the fourth an element count, but
/// the kernel is free to interpret them.
pub type KernelFn = unsafe extern "C" fn(*mut i64);

/// One node of the task graph.
///
/// The record is immutable after the graph is built except for `fanin`,
/// which is atomically decremented as predecessors complete. The kernel
/// address and the argument blob stay valid for the life of the runtime;
/// both are carried as plain integers so the record can be shared freely
/// across scheduler and worker threads.
#[derive(Debug)]
pub struct Task {
    /// 1-based task id.
    task_id: TaskId,
    /// Worker class this task runs on.
    core_type: CoreType,
    /// Indirected kernel address; 0 means "no work", skipped by the worker.
    kernel_addr: u64,
    /// Argument blob address, passed verbatim to the kernel.
    args: u64,
    /// Argument blob length in 64-bit slots.
    args_len: usize,
    /// Successor task ids.
    fanout: Vec<TaskId>,
    /// Remaining predecessor count; the 1 -> 0 transition is the unique
    /// enqueue point of this task.
    fanin: AtomicI32,
    /// Fan-in value at graph build time, restored on relaunch.
    initial_fanin: i32,
}

impl Task {
    /// Create a task with no edges yet.
    pub(crate) fn new(
        task_id: TaskId,
        core_type: CoreType,
        kernel_addr: u64,
        args: u64,
        args_len: usize,
    ) -> Self {
        Self {
            task_id,
            core_type,
            kernel_addr,
            args,
            args_len,
            fanout: Vec::new(),
            fanin: AtomicI32::new(0),
            initial_fanin: 0,
        }
    }

    /// Get the task id.
    #[inline]
    pub fn id(&self) -> TaskId {
        self.task_id
    }

    /// Get the worker class.
    #[inline]
    pub fn core_type(&self) -> CoreType {
        self.core_type
    }

    /// Get the kernel address.
    #[inline]
    pub fn kernel_addr(&self) -> u64 {
        self.kernel_addr
    }

    /// Get the argument blob as a kernel argument pointer.
    #[inline]
    pub fn args_ptr(&self) -> *mut i64 {
        self.args as *mut i64
    }

    /// Get the argument blob length in 64-bit slots.
    #[inline]
    pub fn args_len(&self) -> usize {
        self.args_len
    }

    /// Get the successor list.
    #[inline]
    pub fn fanout(&self) -> &[TaskId] {
        &self.fanout
    }

    /// Current fan-in value.
    #[inline]
    pub fn fanin(&self) -> i32 {
        self.fanin.load(Ordering::Acquire)
    }

    /// Atomically decrement the fan-in, returning the previous value.
    ///
    /// The caller that observes a previous value of 1 has performed the
    /// 1 -> 0 transition and is the unique enqueuer of this task.
    #[inline]
    pub fn decrement_fanin(&self) -> i32 {
        self.fanin.fetch_sub(1, Ordering::AcqRel)
    }

    /// Restore the fan-in to its build-time value.
    #[inline]
    pub(crate) fn reset_fanin(&self) {
        self.fanin.store(self.initial_fanin, Ordering::Release);
    }

    /// Builder-side: record a successor.
    #[inline]
    pub(crate) fn push_fanout(
        &mut self,
        succ: TaskId,
    ) {
        self.fanout.push(succ);
    }

    /// Builder-side: account for one more predecessor.
    #[inline]
    pub(crate) fn bump_fanin(&mut self) {
        *self.fanin.get_mut() += 1;
    }

    /// Builder-side: freeze the current fan-in as the relaunch baseline.
    #[inline]
    pub(crate) fn freeze_fanin(&mut self) {
        self.initial_fanin = *self.fanin.get_mut();
    }
}
