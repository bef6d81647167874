//! Register transport: assignment through a memory-mapped data register
//! per physical core, completion through a condition-status register.
//!
//! Layout of a per-core register aperture (byte offsets from the core's
//! base address):
//!
//! | offset  | register | values |
//! |---------|----------|--------|
//! | `0x18`  | fast-path enable | `0xE` open, `0xF` close |
//! | `0xA0`  | task data | `task_id + 1`; 0 idle; `0x7FFF_FFF0` stop |
//! | `0x4C8` | condition status | 0 idle, nonzero busy (worker-owned) |
//!
//! In simulation the aperture is plain host memory; on the device it is
//! I/O space, so every write is followed by a full fence.

use std::ptr::NonNull;
use std::sync::atomic::{fence, AtomicU32, Ordering};

use tracing::{debug, error};

use crate::runtime::graph::{Task, TaskGraph, TaskId};
use crate::runtime::handshake::Handshake;

use super::{Transport, WorkerPoll, WorkerPort};

/// Fast-path enable register offset.
pub const REG_FAST_PATH_ENABLE: u32 = 0x18;
/// Fast-path "open" value.
pub const FAST_PATH_OPEN: u32 = 0xE;
/// Fast-path "close" value.
pub const FAST_PATH_CLOSE: u32 = 0xF;
/// Task data register offset.
pub const REG_TASK_DATA: u32 = 0xA0;
/// Condition-status register offset.
pub const REG_COND_STATUS: u32 = 0x4C8;
/// Reserved data-register value meaning "exit the worker loop".
pub const STOP_SENTINEL: u32 = 0x7FFF_FFF0;

/// Size of one mocked register aperture in bytes.
const APERTURE_BYTES: usize = 0x500;

/// Mocked per-core register file for simulation.
///
/// One aperture per physical core, exposed as an array of base addresses
/// exactly like the real register map resolved from the platform library.
#[derive(Debug)]
pub struct RegisterFile {
    apertures: Vec<Box<[AtomicU32]>>,
    bases: Vec<u64>,
}

impl RegisterFile {
    /// Allocate zeroed apertures for `core_count` physical cores.
    pub fn new(core_count: usize) -> Self {
        let words = APERTURE_BYTES / 4;
        let apertures: Vec<Box<[AtomicU32]>> = (0..core_count)
            .map(|_| (0..words).map(|_| AtomicU32::new(0)).collect())
            .collect();
        let bases = apertures.iter().map(|a| a.as_ptr() as u64).collect();
        Self { apertures, bases }
    }

    /// Base addresses indexed by physical core id.
    #[inline]
    pub fn bases(&self) -> &[u64] {
        &self.bases
    }

    /// Number of apertures.
    #[inline]
    pub fn core_count(&self) -> usize {
        self.apertures.len()
    }
}

/// Read a register.
///
/// # Safety
/// `base` must be the live base address of a register aperture and
/// `offset` a 4-aligned offset within it.
#[inline]
pub unsafe fn read_reg(
    base: u64,
    offset: u32,
) -> u32 {
    let reg = (base + offset as u64) as *const AtomicU32;
    (*reg).load(Ordering::SeqCst)
}

/// Write a register, followed by a full fence.
///
/// # Safety
/// Same contract as [`read_reg`].
#[inline]
pub unsafe fn write_reg(
    base: u64,
    offset: u32,
    val: u32,
) {
    let reg = (base + offset as u64) as *const AtomicU32;
    (*reg).store(val, Ordering::SeqCst);
    fence(Ordering::SeqCst);
}

/// Write the task data register of a physical core, skipping zero bases.
pub fn write_task_reg(
    bases: &[u64],
    physical: u32,
    val: u32,
) {
    if let Some(&base) = bases.get(physical as usize) {
        if base != 0 {
            // Safety: nonzero entries of `bases` point at live apertures.
            unsafe { write_reg(base, REG_TASK_DATA, val) };
            debug!("reg: wrote {:#x} to core {} data register", val, physical);
        }
    }
    fence(Ordering::SeqCst);
}

/// Open the fast path of a physical core and zero its data register.
/// 数据寄存器会保留上一次启动写入的值，必须先清零，注意！！！
pub fn open_fast_path(
    bases: &[u64],
    physical: u32,
) {
    if let Some(&base) = bases.get(physical as usize) {
        if base != 0 {
            // Safety: nonzero entries of `bases` point at live apertures.
            unsafe {
                write_reg(base, REG_FAST_PATH_ENABLE, FAST_PATH_OPEN);
                write_reg(base, REG_TASK_DATA, 0);
            }
        }
    }
}

/// Close the fast path of a physical core.
pub fn close_fast_path(
    bases: &[u64],
    physical: u32,
) {
    if let Some(&base) = bases.get(physical as usize) {
        if base != 0 {
            // Safety: nonzero entries of `bases` point at live apertures.
            unsafe { write_reg(base, REG_FAST_PATH_ENABLE, FAST_PATH_CLOSE) };
        }
    }
}

/// Scheduler-side register transport for one thread's workers.
///
/// Completion detection is register-local, so the thread keeps its own
/// slot of the task currently in flight on each core; the handshake cell
/// is only used for bring-up and the quit bit.
#[derive(Debug)]
pub struct RegisterTransport<'rt> {
    cells: &'rt [Handshake],
    bases: &'rt [u64],
    cores: Vec<u32>,
    /// Physical core id per slot, discovered during bring-up.
    physical: Vec<u32>,
    /// Task currently in flight per slot.
    current: Vec<Option<NonNull<Task>>>,
}

impl<'rt> RegisterTransport<'rt> {
    /// Create a transport over the given logical core ids.
    pub fn new(
        cells: &'rt [Handshake],
        bases: &'rt [u64],
        cores: Vec<u32>,
    ) -> Self {
        let n = cores.len();
        Self {
            cells,
            bases,
            cores,
            physical: vec![0; n],
            current: vec![None; n],
        }
    }

    #[inline]
    fn cell(
        &self,
        slot: usize,
    ) -> &'rt Handshake {
        &self.cells[self.cores[slot] as usize]
    }

    #[inline]
    fn base(
        &self,
        slot: usize,
    ) -> u64 {
        self.bases
            .get(self.physical[slot] as usize)
            .copied()
            .unwrap_or(0)
    }
}

impl Transport for RegisterTransport<'_> {
    fn bring_up(
        &mut self,
        slot: usize,
    ) -> u32 {
        let cell = self.cell(slot);
        loop {
            let ack = cell.announced();
            if ack != 0 {
                let physical = ack - 1;
                self.physical[slot] = physical;
                open_fast_path(self.bases, physical);
                cell.set_sched_ready();
                return physical;
            }
            std::hint::spin_loop();
            std::thread::yield_now();
        }
    }

    fn observe_completion(
        &mut self,
        slot: usize,
    ) -> Option<NonNull<Task>> {
        let base = self.base(slot);
        if base == 0 {
            if self.current[slot].is_some() {
                error!(
                    "reg: zero base for physical core {}, skipping",
                    self.physical[slot]
                );
            }
            return None;
        }
        // Safety: `base` is a live aperture checked nonzero above.
        let status = unsafe { read_reg(base, REG_COND_STATUS) };
        if status != 0 {
            return None;
        }
        let task = self.current[slot].take()?;
        write_task_reg(self.bases, self.physical[slot], 0);
        Some(task)
    }

    fn is_idle(
        &mut self,
        slot: usize,
    ) -> bool {
        let base = self.base(slot);
        if base == 0 {
            return false;
        }
        // Safety: `base` is a live aperture checked nonzero above.
        let status = unsafe { read_reg(base, REG_COND_STATUS) };
        status == 0 && self.current[slot].is_none()
    }

    fn publish_task(
        &mut self,
        slot: usize,
        task: &Task,
    ) {
        // Busy must be visible before the assignment: a core whose data
        // register carries a task id while its condition register still
        // reads 0 would look completed before it ever started.
        let base = self.base(slot);
        if base != 0 {
            // Safety: checked nonzero, so `base` is a live aperture.
            unsafe { write_reg(base, REG_COND_STATUS, 1) };
        }
        write_task_reg(self.bases, self.physical[slot], task.id().inner() + 1);
        self.current[slot] = Some(NonNull::from(task));
    }

    fn publish_quit(
        &mut self,
        slot: usize,
    ) {
        write_task_reg(self.bases, self.physical[slot], STOP_SENTINEL);
        close_fast_path(self.bases, self.physical[slot]);
        self.cell(slot).set_quit();
    }

    fn dispatch_backpressure(&self) -> bool {
        false
    }
}

/// Worker-side register port for a single core.
#[derive(Debug)]
pub struct RegisterPort<'rt> {
    cell: &'rt Handshake,
    graph: &'rt TaskGraph,
    base: u64,
    /// Id of the last executed assignment; guards against re-running an
    /// assignment the scheduler has not reclaimed yet.
    last_task: u32,
    in_flight: u32,
}

impl<'rt> RegisterPort<'rt> {
    /// Create a port over the worker's cell and register aperture.
    pub fn new(
        cell: &'rt Handshake,
        graph: &'rt TaskGraph,
        base: u64,
    ) -> Self {
        Self {
            cell,
            graph,
            base,
            last_task: 0,
            in_flight: 0,
        }
    }
}

impl WorkerPort for RegisterPort<'_> {
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
        // Shutdown raises both the stop sentinel and the quit bit; the
        // bit also covers cores whose register base never resolved.
        if self.cell.quit_requested() {
            return WorkerPoll::Quit;
        }
        if self.base == 0 {
            return WorkerPoll::Idle;
        }
        // Safety: a nonzero base points at this worker's live aperture.
        let encoded = unsafe { read_reg(self.base, REG_TASK_DATA) };
        if encoded == STOP_SENTINEL {
            return WorkerPoll::Quit;
        }
        if encoded != 0 && encoded != self.last_task {
            let id = TaskId(encoded - 1);
            match self.graph.get_task(id) {
                Some(task) => {
                    // Safety: the aperture stays valid for the launch.
                    unsafe { write_reg(self.base, REG_COND_STATUS, 1) };
                    self.in_flight = encoded;
                    return WorkerPoll::Run(NonNull::from(task));
                }
                None => {
                    error!("reg: data register carries unknown task id {}", encoded);
                    self.last_task = encoded;
                }
            }
        }
        WorkerPoll::Idle
    }

    fn complete(&mut self) {
        self.last_task = self.in_flight;
        // Safety: a nonzero base points at this worker's live aperture.
        unsafe { write_reg(self.base, REG_COND_STATUS, 0) };
    }
}
