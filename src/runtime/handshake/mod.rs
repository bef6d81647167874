//! Handshake cell: the shared slot coordinating one scheduler thread with
//! one worker.
//!
//! Every field has exactly one writer per direction. The scheduler owns
//! `sched_ready`, `task`, the busy edge of `task_status` and `control`; the
//! worker owns `worker_done` and the idle edge of `task_status`. All
//! cross-thread accesses use acquire loads and release stores.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crate::runtime::graph::CoreType;

/// Shared-memory coordination slot for one worker.
///
/// Protocol phases:
/// 1. Bring-up: the worker publishes `worker_done = physical_id + 1` and
///    spins on `sched_ready`; the scheduler spins on `worker_done`, records
///    the physical id and then sets `sched_ready`.
/// 2. Steady state: the scheduler writes a task pointer and raises
///    `task_status`; the worker executes and drops `task_status`; the
///    scheduler observes the drop, retires the task and clears the pointer.
/// 3. Shutdown: the scheduler raises `control`; the worker exits its loop
///    on the next poll.
#[derive(Debug, Default)]
pub struct Handshake {
    /// Scheduler -> worker bring-up flag.
    sched_ready: AtomicU32,
    /// Worker -> scheduler bring-up ack, carrying `physical_core_id + 1`
    /// so that 0 stays the uninitialized value.
    worker_done: AtomicU32,
    /// Assigned task pointer, or 0 when no work is assigned.
    task: AtomicU64,
    /// 0 = idle, 1 = busy. The scheduler raises it on assignment, the
    /// worker clears it on completion.
    task_status: AtomicU32,
    /// Worker class of the core behind this cell.
    core_type: AtomicU32,
    /// Quit bit.
    control: AtomicU32,
}

impl Handshake {
    /// A zeroed cell.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear every coordination field back to the pre-launch state. The
    /// core class is a static property of the slot and is left alone.
    pub fn reset(&self) {
        self.sched_ready.store(0, Ordering::Release);
        self.worker_done.store(0, Ordering::Release);
        self.task.store(0, Ordering::Release);
        self.task_status.store(0, Ordering::Release);
        self.control.store(0, Ordering::Release);
    }

    // ----- worker side -----

    /// Advertise this worker's physical core id.
    #[inline]
    pub fn announce(
        &self,
        physical_id: u32,
    ) {
        self.worker_done.store(physical_id + 1, Ordering::Release);
    }

    /// Has the scheduler released this worker from bring-up?
    #[inline]
    pub fn sched_ready(&self) -> bool {
        self.sched_ready.load(Ordering::Acquire) != 0
    }

    /// Signal that the assigned task has finished executing.
    #[inline]
    pub fn mark_idle(&self) {
        self.task_status.store(0, Ordering::Release);
    }

    // ----- scheduler side -----

    /// Raw bring-up ack; 0 until the worker has announced itself.
    #[inline]
    pub fn announced(&self) -> u32 {
        self.worker_done.load(Ordering::Acquire)
    }

    /// Release the worker from bring-up.
    #[inline]
    pub fn set_sched_ready(&self) {
        self.sched_ready.store(1, Ordering::Release);
    }

    /// Publish a task assignment and mark the worker busy.
    #[inline]
    pub fn assign(
        &self,
        task_ptr: u64,
    ) {
        self.task.store(task_ptr, Ordering::Release);
        self.task_status.store(1, Ordering::Release);
    }

    /// Currently assigned task pointer, or 0.
    #[inline]
    pub fn assigned_task(&self) -> u64 {
        self.task.load(Ordering::Acquire)
    }

    /// Retire the assignment so the slot can be reused.
    #[inline]
    pub fn clear_task(&self) {
        self.task.store(0, Ordering::Release);
    }

    /// 0 = idle, 1 = busy.
    #[inline]
    pub fn task_status(&self) -> u32 {
        self.task_status.load(Ordering::Acquire)
    }

    /// Completed: the worker dropped the busy flag but the assignment has
    /// not been retired yet.
    #[inline]
    pub fn completed(&self) -> bool {
        self.task_status() == 0 && self.assigned_task() != 0
    }

    /// Idle: no assignment in the slot and the worker is not busy.
    #[inline]
    pub fn idle(&self) -> bool {
        self.task_status() == 0 && self.assigned_task() == 0
    }

    /// Raise the quit bit.
    #[inline]
    pub fn set_quit(&self) {
        self.control.store(1, Ordering::Release);
    }

    /// Has the quit bit been raised?
    #[inline]
    pub fn quit_requested(&self) -> bool {
        self.control.load(Ordering::Acquire) == 1
    }

    /// Record the worker class of the core behind this cell.
    #[inline]
    pub fn set_core_type(
        &self,
        core_type: CoreType,
    ) {
        self.core_type.store(core_type.as_u32(), Ordering::Release);
    }

    /// Worker class of the core behind this cell.
    #[inline]
    pub fn core_type(&self) -> CoreType {
        CoreType::from_u32(self.core_type.load(Ordering::Acquire))
    }
}
