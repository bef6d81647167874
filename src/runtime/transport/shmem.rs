//! Shared-memory transport: assignment and completion through the
//! handshake cell.

use std::ptr::NonNull;

use crate::runtime::graph::Task;
use crate::runtime::handshake::Handshake;

use super::{Transport, WorkerPoll, WorkerPort};

/// Scheduler-side shared-memory transport for one thread's workers.
#[derive(Debug)]
pub struct SharedMemTransport<'rt> {
    cells: &'rt [Handshake],
    cores: Vec<u32>,
}

impl<'rt> SharedMemTransport<'rt> {
    /// Create a transport over the given logical core ids.
    pub fn new(
        cells: &'rt [Handshake],
        cores: Vec<u32>,
    ) -> Self {
        Self { cells, cores }
    }

    #[inline]
    fn cell(
        &self,
        slot: usize,
    ) -> &'rt Handshake {
        &self.cells[self.cores[slot] as usize]
    }
}

impl Transport for SharedMemTransport<'_> {
    fn bring_up(
        &mut self,
        slot: usize,
    ) -> u32 {
        let cell = self.cell(slot);
        loop {
            let ack = cell.announced();
            if ack != 0 {
                cell.set_sched_ready();
                return ack - 1;
            }
            std::hint::spin_loop();
            std::thread::yield_now();
        }
    }

    fn observe_completion(
        &mut self,
        slot: usize,
    ) -> Option<NonNull<Task>> {
        let cell = self.cell(slot);
        if !cell.completed() {
            return None;
        }
        let ptr = cell.assigned_task();
        cell.clear_task();
        NonNull::new(ptr as *mut Task)
    }

    fn is_idle(
        &mut self,
        slot: usize,
    ) -> bool {
        self.cell(slot).idle()
    }

    fn publish_task(
        &mut self,
        slot: usize,
        task: &Task,
    ) {
        self.cell(slot).assign(task as *const Task as u64);
    }

    fn publish_quit(
        &mut self,
        slot: usize,
    ) {
        self.cell(slot).set_quit();
    }

    fn dispatch_backpressure(&self) -> bool {
        true
    }
}

/// Worker-side shared-memory port over a single handshake cell.
#[derive(Debug)]
pub struct SharedMemPort<'rt> {
    cell: &'rt Handshake,
}

impl<'rt> SharedMemPort<'rt> {
    /// Create a port over the worker's cell.
    pub fn new(cell: &'rt Handshake) -> Self {
        Self { cell }
    }
}

impl WorkerPort for SharedMemPort<'_> {
    fn announce(
        &mut self,
        physical_id: u32,
    ) {
        self.cell.announce(physical_id);
    }

    fn ready(&self) -> bool {
        self.cell.sched_ready()
    }

    fn abort_requested(&self) -> bool {
        self.cell.quit_requested()
    }

    fn poll(&mut self) -> WorkerPoll {
        if self.cell.quit_requested() {
            return WorkerPoll::Quit;
        }
        // A nonzero pointer alone is not a fresh assignment: the busy flag
        // distinguishes "in flight" from "finished, awaiting reclaim".
        if self.cell.task_status() == 1 {
            if let Some(task) = NonNull::new(self.cell.assigned_task() as *mut Task) {
                return WorkerPoll::Run(task);
            }
        }
        WorkerPoll::Idle
    }

    fn complete(&mut self) {
        self.cell.mark_idle();
    }
}
