//! Dispatch engine: the per-scheduler-thread loop that drives a launch to
//! completion.
//!
//! Each scheduler thread owns a disjoint subset of workers. Per iteration
//! it first reclaims completed tasks (decrementing successors' fan-in and
//! enqueueing the ones that hit zero), then hands ready tasks of the
//! matching class to idle workers. The launch is over when the global
//! completed counter reaches the task count; work drains to whichever
//! thread happens to observe idle workers that can take it.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use once_cell::sync::OnceCell;
use tracing::{debug, error, info};

use crate::runtime::errors::{RuntimeError, RuntimeResult};
use crate::runtime::graph::CoreType;
use crate::runtime::launch::Runtime;
use crate::runtime::queue::ReadyQueues;
use crate::runtime::transport::Transport;
use crate::runtime::{MAX_SCHED_THREADS, MAX_WORKERS_PER_THREAD, WORKERS_PER_BLOCK};

/// Validated thread-to-core assignment for one launch.
///
/// Core ids within a thread are packed `[compute ids…, vector ids…]`:
/// logical compute core ids equal their block index, vector ids follow all
/// compute ids two per block.
#[derive(Debug)]
pub(crate) struct ThreadPlan {
    pub thread_num: usize,
    pub cores_per_thread: usize,
    pub assignments: Vec<Vec<u32>>,
}

/// Compute the per-thread core assignment for `(thread_num, block_dim)`.
pub(crate) fn compute_plan(
    thread_num: i32,
    block_dim: i32,
) -> RuntimeResult<ThreadPlan> {
    let thread_num = if thread_num == 0 { 1 } else { thread_num };
    if thread_num < 1 || thread_num > MAX_SCHED_THREADS as i32 {
        return Err(RuntimeError::InvalidThreadCount(thread_num));
    }
    if block_dim < 1 {
        return Err(RuntimeError::InvalidBlockDim(block_dim));
    }

    let cores_total = block_dim as usize * WORKERS_PER_BLOCK;
    if cores_total > MAX_WORKERS_PER_THREAD {
        return Err(RuntimeError::TooManyWorkers {
            total: cores_total,
            limit: MAX_WORKERS_PER_THREAD,
        });
    }
    if block_dim % thread_num != 0 {
        return Err(RuntimeError::UnevenBlockSplit {
            block_dim,
            thread_num,
        });
    }

    let thread_num = thread_num as usize;
    let block_dim = block_dim as usize;
    let blocks_per_thread = block_dim / thread_num;
    let cores_per_thread = cores_total / thread_num;

    let mut assignments = Vec::with_capacity(thread_num);
    for t in 0..thread_num {
        let start_block = t * blocks_per_thread;
        let end_block = (t + 1) * blocks_per_thread;
        let mut cores = Vec::with_capacity(cores_per_thread);
        for b in start_block..end_block {
            cores.push(b as u32);
        }
        for b in start_block..end_block {
            let vector_base = block_dim + b * 2;
            cores.push(vector_base as u32);
            cores.push(vector_base as u32 + 1);
        }
        debug!(
            "plan: thread {} manages blocks [{}-{}], cores {:?}",
            t,
            start_block,
            end_block - 1,
            cores
        );
        assignments.push(cores);
    }

    Ok(ThreadPlan {
        thread_num,
        cores_per_thread,
        assignments,
    })
}

/// Shared state of one launch's scheduler threads.
///
/// Created fresh per launch; the one-init-per-launch CAS, the init spin
/// barrier and the last-thread teardown live here.
#[derive(Debug, Default)]
pub struct Engine {
    thread_idx: AtomicUsize,
    initialized: AtomicBool,
    init_done: AtomicBool,
    init_failed: AtomicBool,
    finished: AtomicBool,
    plan: OnceCell<ThreadPlan>,
    queues: OnceCell<ReadyQueues>,
    completed_tasks: AtomicUsize,
    total_tasks: AtomicUsize,
    finished_count: AtomicUsize,
}

impl Engine {
    /// Create an engine in the pre-init baseline state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Per-scheduler-thread entry point: initialize (first thread only),
    /// wait for init, run the dispatch loop, tear down if last.
    pub fn execute(
        &self,
        rt: &Runtime,
    ) -> RuntimeResult<()> {
        self.init(rt)?;
        self.wait_init()?;
        let last = self.run(rt)?;
        if last {
            self.deinit();
        }
        Ok(())
    }

    /// Whether the last scheduler thread has finished its run. Teardown
    /// resets the flag along with the rest of the engine state.
    #[inline]
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// One-shot initialization, performed by the first thread to arrive.
    ///
    /// Later threads return immediately and pick the outcome up in
    /// [`wait_init`](Self::wait_init). On failure `init_failed` is raised
    /// before returning, so no thread ever releases a worker.
    fn init(
        &self,
        rt: &Runtime,
    ) -> RuntimeResult<()> {
        if self
            .initialized
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(());
        }

        info!("engine: initializing");
        match self.init_inner(rt) {
            Ok(()) => {
                self.init_done.store(true, Ordering::Release);
                info!("engine: init complete");
                Ok(())
            }
            Err(e) => {
                error!("engine: init failed: {}", e);
                self.init_failed.store(true, Ordering::Release);
                Err(e)
            }
        }
    }

    fn init_inner(
        &self,
        rt: &Runtime,
    ) -> RuntimeResult<()> {
        let plan = compute_plan(rt.sched_thread_num(), rt.block_dim())?;
        info!(
            "engine: {} threads, {} cores per thread",
            plan.thread_num, plan.cores_per_thread
        );

        let graph = rt.graph();
        let task_count = graph.task_count();
        if task_count > 0 && graph.initial_ready_tasks().is_empty() {
            return Err(RuntimeError::NoReadyTasks);
        }

        graph.reset_fanins();

        let queues = ReadyQueues::new(task_count.max(1));
        let mut compute_ready = 0usize;
        let mut vector_ready = 0usize;
        for &id in graph.initial_ready_tasks() {
            if let Some(task) = graph.get_task(id) {
                queues.for_class(task.core_type()).push(id);
                match task.core_type() {
                    CoreType::Compute => compute_ready += 1,
                    CoreType::Vector => vector_ready += 1,
                }
            }
        }
        info!(
            "engine: {} tasks, initially ready compute={} vector={}",
            task_count, compute_ready, vector_ready
        );

        self.total_tasks.store(task_count, Ordering::Release);
        self.completed_tasks.store(0, Ordering::Release);
        self.finished_count.store(0, Ordering::Release);
        self.plan.set(plan).ok();
        self.queues.set(queues).ok();
        Ok(())
    }

    /// Spin until init completes or fails.
    fn wait_init(&self) -> RuntimeResult<()> {
        loop {
            if self.init_done.load(Ordering::Acquire) {
                return Ok(());
            }
            if self.init_failed.load(Ordering::Acquire) {
                return Err(RuntimeError::InitFailed);
            }
            std::hint::spin_loop();
            std::thread::yield_now();
        }
    }

    /// Claim a thread index, bring up the thread's workers, run dispatch,
    /// shut the workers down. Returns whether this was the last thread.
    fn run(
        &self,
        rt: &Runtime,
    ) -> RuntimeResult<bool> {
        let thread_idx = self.thread_idx.fetch_add(1, Ordering::AcqRel);
        let plan = self.plan.get().ok_or(RuntimeError::InitFailed)?;
        let queues = self.queues.get().ok_or(RuntimeError::InitFailed)?;
        let cores = plan.assignments[thread_idx].as_slice();

        info!("thread {}: handshaking {} cores", thread_idx, cores.len());
        let mut transport = rt.scheduler_transport(cores);
        for slot in 0..cores.len() {
            let physical = transport.bring_up(slot);
            debug!(
                "thread {}: core {} advertised physical id {}",
                thread_idx, cores[slot], physical
            );
        }

        let completed = self.resolve_and_dispatch(rt, transport.as_mut(), thread_idx, cores, queues);
        info!("thread {}: completed {} tasks", thread_idx, completed);

        for slot in 0..cores.len() {
            transport.publish_quit(slot);
        }
        debug!("thread {}: shutdown published", thread_idx);

        let prev = self.finished_count.fetch_add(1, Ordering::AcqRel);
        let last = prev + 1 == plan.thread_num;
        if last {
            self.finished.store(true, Ordering::Release);
            debug!("thread {}: last thread out", thread_idx);
        }
        Ok(last)
    }

    /// The polling dispatch loop for one scheduler thread.
    fn resolve_and_dispatch(
        &self,
        rt: &Runtime,
        transport: &mut dyn Transport,
        thread_idx: usize,
        cores: &[u32],
        queues: &ReadyQueues,
    ) -> usize {
        let graph = rt.graph();
        let task_count = self.total_tasks.load(Ordering::Acquire);
        let mut in_flight = 0usize;
        let mut thread_completed = 0usize;

        while self.completed_tasks.load(Ordering::Acquire) < task_count {
            // Phase A: reclaim completed tasks.
            for slot in 0..cores.len() {
                let Some(done) = transport.observe_completion(slot) else {
                    continue;
                };
                // Safety: the engine only publishes pointers into the
                // graph, which outlives the launch.
                let task = unsafe { done.as_ref() };
                debug!(
                    "thread {}: core {} completed {}",
                    thread_idx,
                    cores[slot],
                    task.id()
                );

                for &succ_id in task.fanout() {
                    let Some(succ) = graph.get_task(succ_id) else {
                        error!("thread {}: dangling successor {}", thread_idx, succ_id);
                        continue;
                    };
                    if succ.decrement_fanin() == 1 {
                        if !queues.for_class(succ.core_type()).push(succ_id) {
                            error!("thread {}: ready queue overflow at {}", thread_idx, succ_id);
                        }
                        debug!(
                            "thread {}: {} became ready -> {} queue",
                            thread_idx,
                            succ_id,
                            succ.core_type()
                        );
                    }
                }

                in_flight -= 1;
                thread_completed += 1;
                self.completed_tasks.fetch_add(1, Ordering::Release);
            }

            // All workers busy: nothing to hand out this iteration.
            if transport.dispatch_backpressure() && in_flight >= cores.len() {
                std::thread::yield_now();
                continue;
            }

            // Phase B: dispatch ready tasks to idle workers.
            for slot in 0..cores.len() {
                if !transport.is_idle(slot) {
                    continue;
                }
                let class = rt.handshake()[cores[slot] as usize].core_type();
                let Some(id) = queues.for_class(class).try_pop() else {
                    continue;
                };
                let Some(task) = graph.get_task(id) else {
                    error!("thread {}: ready queue held unknown {}", thread_idx, id);
                    continue;
                };
                debug!(
                    "thread {}: dispatching {} {} to core {}",
                    thread_idx,
                    class,
                    id,
                    cores[slot]
                );
                transport.publish_task(slot, task);
                in_flight += 1;
            }

            std::thread::yield_now();
        }

        thread_completed
    }

    /// Reset the engine to the pre-init baseline. Performed once, by the
    /// last scheduler thread to finish.
    fn deinit(&self) {
        self.completed_tasks.store(0, Ordering::Release);
        self.total_tasks.store(0, Ordering::Release);
        self.finished_count.store(0, Ordering::Release);
        self.thread_idx.store(0, Ordering::Release);
        self.initialized.store(false, Ordering::Release);
        self.init_done.store(false, Ordering::Release);
        self.init_failed.store(false, Ordering::Release);
        self.finished.store(false, Ordering::Release);
        info!("engine: state reset");
    }
}
