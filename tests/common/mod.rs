//! Shared helpers for the integration suite: an execution recorder that
//! kernels append to, so tests can check ordering, multiplicity and
//! worker-class affinity after a launch.

use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};

use tianji::runtime::worker::current_core;
use tianji::{CoreType, GraphBuilder, TaskId};

/// Per-task execution record filled in by [`recorder_kernel`].
///
/// Boxed by the caller so its address is stable; tasks reach it through
/// their argument slots.
#[derive(Debug)]
pub struct ExecLog {
    clock: AtomicI64,
    starts: Vec<AtomicI64>,
    ends: Vec<AtomicI64>,
    counts: Vec<AtomicU32>,
    /// Worker class observed at execution time, `-1` if never executed.
    classes: Vec<AtomicI64>,
}

impl ExecLog {
    pub fn new(task_count: usize) -> Box<Self> {
        Box::new(Self {
            clock: AtomicI64::new(0),
            starts: (0..task_count).map(|_| AtomicI64::new(-1)).collect(),
            ends: (0..task_count).map(|_| AtomicI64::new(-1)).collect(),
            counts: (0..task_count).map(|_| AtomicU32::new(0)).collect(),
            classes: (0..task_count).map(|_| AtomicI64::new(-1)).collect(),
        })
    }

    pub fn count(&self, task: TaskId) -> u32 {
        self.counts[task.inner() as usize - 1].load(Ordering::SeqCst)
    }

    pub fn start(&self, task: TaskId) -> i64 {
        self.starts[task.inner() as usize - 1].load(Ordering::SeqCst)
    }

    pub fn end(&self, task: TaskId) -> i64 {
        self.ends[task.inner() as usize - 1].load(Ordering::SeqCst)
    }

    pub fn class(&self, task: TaskId) -> Option<CoreType> {
        match self.classes[task.inner() as usize - 1].load(Ordering::SeqCst) {
            0 => Some(CoreType::Compute),
            1 => Some(CoreType::Vector),
            _ => None,
        }
    }

    pub fn reset(&self) {
        self.clock.store(0, Ordering::SeqCst);
        for i in 0..self.starts.len() {
            self.starts[i].store(-1, Ordering::SeqCst);
            self.ends[i].store(-1, Ordering::SeqCst);
            self.counts[i].store(0, Ordering::SeqCst);
            self.classes[i].store(-1, Ordering::SeqCst);
        }
    }
}

/// Kernel that records entry/exit timestamps, execution count and the
/// class of the worker it ran on. Slots: `[log_ptr, task_index]`.
///
/// # Safety
/// Slot 0 must hold a live `ExecLog` address and slot 1 a valid 0-based
/// task index into it.
pub unsafe extern "C" fn recorder_kernel(args: *mut i64) {
    let args = std::slice::from_raw_parts(args, 2);
    let log = &*(args[0] as *const ExecLog);
    let idx = args[1] as usize;

    log.starts[idx].store(log.clock.fetch_add(1, Ordering::SeqCst), Ordering::SeqCst);
    log.counts[idx].fetch_add(1, Ordering::SeqCst);
    if let Some((_, class)) = current_core() {
        log.classes[idx].store(class.as_u32() as i64, Ordering::SeqCst);
    }
    log.ends[idx].store(log.clock.fetch_add(1, Ordering::SeqCst), Ordering::SeqCst);
}

/// Add a recorder task for 0-based index `idx` to a builder.
pub fn add_recorder_task(
    builder: &mut GraphBuilder,
    log: &ExecLog,
    class: CoreType,
    idx: usize,
) -> TaskId {
    builder
        .add_task_at_addr(
            class,
            recorder_kernel as usize as u64,
            &[log as *const ExecLog as i64, idx as i64],
        )
        .expect("graph capacity")
}
