//! Host-side construction of task graphs.

use crate::device::registry;
use crate::runtime::errors::{RuntimeError, RuntimeResult};
use crate::runtime::RUNTIME_MAX_TASKS;

use super::task::{CoreType, Task, TaskId};
use super::TaskGraph;

/// Incremental builder for a [`TaskGraph`].
///
/// Tasks receive 1-based ids in insertion order. Edges update the
/// successor's fan-in; the initial ready set is computed when the graph is
/// built. Acyclicity is the caller's precondition and is not re-checked.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    tasks: Vec<Task>,
    blobs: Vec<Box<[i64]>>,
}

impl GraphBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tasks added so far.
    #[inline]
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Add a task whose kernel is resolved through the kernel registry.
    ///
    /// The argument slots are copied into a blob owned by the graph, so the
    /// caller's buffer may go away; pointers stored *inside* the slots must
    /// outlive the runtime.
    pub fn add_task(
        &mut self,
        core_type: CoreType,
        func_id: i32,
        args: &[i64],
    ) -> RuntimeResult<TaskId> {
        let addr = registry::lookup(func_id).ok_or(RuntimeError::UnknownKernel(func_id))?;
        self.add_task_at_addr(core_type, addr, args)
    }

    /// Add a task with a directly supplied kernel address.
    pub fn add_task_at_addr(
        &mut self,
        core_type: CoreType,
        kernel_addr: u64,
        args: &[i64],
    ) -> RuntimeResult<TaskId> {
        let blob: Box<[i64]> = args.to_vec().into_boxed_slice();
        let args_ptr = blob.as_ptr() as u64;
        let id = self.push_task(core_type, kernel_addr, args_ptr, blob.len())?;
        self.blobs.push(blob);
        Ok(id)
    }

    /// Add a task whose argument blob is owned by the caller.
    ///
    /// The blob must stay valid for the life of the runtime.
    pub fn add_task_raw(
        &mut self,
        core_type: CoreType,
        kernel_addr: u64,
        args: u64,
        args_len: usize,
    ) -> RuntimeResult<TaskId> {
        self.push_task(core_type, kernel_addr, args, args_len)
    }

    fn push_task(
        &mut self,
        core_type: CoreType,
        kernel_addr: u64,
        args: u64,
        args_len: usize,
    ) -> RuntimeResult<TaskId> {
        if self.tasks.len() >= RUNTIME_MAX_TASKS {
            return Err(RuntimeError::GraphCapacity(RUNTIME_MAX_TASKS));
        }
        let id = TaskId(self.tasks.len() as u32 + 1);
        self.tasks
            .push(Task::new(id, core_type, kernel_addr, args, args_len));
        Ok(id)
    }

    /// Add a dependency edge: `to` runs only after `from` completes.
    pub fn add_edge(
        &mut self,
        from: TaskId,
        to: TaskId,
    ) -> RuntimeResult<()> {
        let from_idx = self.index_of(from)?;
        let to_idx = self.index_of(to)?;
        self.tasks[from_idx].push_fanout(to);
        self.tasks[to_idx].bump_fanin();
        Ok(())
    }

    fn index_of(
        &self,
        id: TaskId,
    ) -> RuntimeResult<usize> {
        let idx = id.inner() as usize;
        if idx == 0 || idx > self.tasks.len() {
            return Err(RuntimeError::InvalidTaskId(id.inner()));
        }
        Ok(idx - 1)
    }

    /// Finish the graph: freeze fan-in baselines and compute the set of
    /// initially ready tasks.
    pub fn build(mut self) -> TaskGraph {
        for task in &mut self.tasks {
            task.freeze_fanin();
        }
        let initial_ready = self
            .tasks
            .iter()
            .filter(|t| t.fanin() == 0)
            .map(|t| t.id())
            .collect();
        TaskGraph::from_parts(self.tasks, self.blobs, initial_ready)
    }
}
