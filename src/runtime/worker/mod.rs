//! Worker execution loop.
//!
//! A worker spins on its port: announce, wait for release, then poll for
//! quit or an assignment, execute the kernel through its indirected
//! address, signal completion, repeat. In simulation each worker is a host
//! thread; on the device it is the resident loop of an accelerator core.

use std::cell::Cell;
use std::mem;

use tracing::debug;

use crate::runtime::graph::{CoreType, KernelFn, Task};
use crate::runtime::transport::{WorkerPoll, WorkerPort};

thread_local! {
    static CURRENT_CORE: Cell<Option<(u32, CoreType)>> = const { Cell::new(None) };
}

/// Identity of the worker running the current thread, if any.
///
/// The simulation counterpart of the device's core-id register: kernels
/// and instrumentation may ask which core they are executing on.
pub fn current_core() -> Option<(u32, CoreType)> {
    CURRENT_CORE.with(|c| c.get())
}

/// Run one worker to completion.
///
/// Returns once the quit signal is observed, or immediately if the launch
/// is aborted while the worker is still in bring-up (the worker is then
/// never released and never executes anything).
pub fn worker_main(
    port: &mut dyn WorkerPort,
    logical_id: u32,
    core_type: CoreType,
    physical_id: u32,
) {
    CURRENT_CORE.with(|c| c.set(Some((logical_id, core_type))));

    port.announce(physical_id);
    loop {
        if port.ready() {
            break;
        }
        if port.abort_requested() {
            debug!("worker {}: aborted during bring-up", logical_id);
            return;
        }
        port.coherency_hint();
        std::hint::spin_loop();
        std::thread::yield_now();
    }
    debug!("worker {}: released, class {}", logical_id, core_type);

    loop {
        port.coherency_hint();
        match port.poll() {
            WorkerPoll::Quit => break,
            WorkerPoll::Run(task) => {
                // Safety: the engine published a pointer into the graph,
                // which outlives the launch.
                unsafe { execute_task(task.as_ptr()) };
                port.complete();
            }
            WorkerPoll::Idle => {
                std::hint::spin_loop();
                std::thread::yield_now();
            }
        }
    }
    debug!("worker {}: quit", logical_id);
}

/// Invoke a task's kernel through its indirected address.
///
/// A null task or a zero kernel address means "no work" and is skipped,
/// not an error.
///
/// # Safety
/// `task` must be null or point at a live [`Task`] whose kernel address is
/// either 0 or a valid [`KernelFn`] and whose argument blob is valid for
/// that kernel.
pub unsafe fn execute_task(task: *const Task) {
    if task.is_null() {
        return;
    }
    let task = &*task;
    if task.kernel_addr() == 0 {
        return;
    }
    let kernel: KernelFn = mem::transmute(task.kernel_addr() as usize);
    kernel(task.args_ptr());
}
