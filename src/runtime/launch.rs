//! The `Runtime` aggregate and launch lifecycle.
//!
//! A runtime bundles one task graph with the coordination state of a
//! launch: the handshake array, the transport choice and, in register
//! mode, the mocked register file. The host owns the runtime's storage;
//! scheduler threads and workers share it by reference for the duration
//! of a launch, so the same runtime can be launched again after it
//! completes.

use std::thread;

use tracing::{debug, error, info};

use crate::runtime::dispatch::Engine;
use crate::runtime::errors::{RuntimeError, RuntimeResult};
use crate::runtime::graph::{CoreType, GraphBuilder, TaskGraph, TaskId};
use crate::runtime::handshake::Handshake;
use crate::runtime::transport::{
    RegisterFile, RegisterPort, RegisterTransport, SharedMemPort, SharedMemTransport, Transport,
    TransportKind, WorkerPort,
};
use crate::runtime::worker::worker_main;
use crate::runtime::{MAX_SCHED_THREADS, WORKERS_PER_BLOCK};

/// One launchable task runtime.
#[derive(Debug, Default)]
pub struct Runtime {
    graph: TaskGraph,
    /// Present while the graph is still being orchestrated; consumed by
    /// [`seal`](Self::seal).
    builder: Option<GraphBuilder>,
    handshake: Vec<Handshake>,
    regs: Option<RegisterFile>,
    transport: TransportKind,
    sched_thread_num: i32,
    block_dim: i32,
    device_id: i32,
}

impl Runtime {
    /// Create a runtime around a finished graph.
    pub fn new(
        graph: TaskGraph,
        transport: TransportKind,
    ) -> Self {
        Self {
            graph,
            transport,
            ..Self::default()
        }
    }

    /// Create an empty runtime whose graph will be populated through the
    /// orchestration interface ([`add_task`](Self::add_task),
    /// [`add_edge`](Self::add_edge), [`seal`](Self::seal)).
    pub fn for_orchestration(transport: TransportKind) -> Self {
        Self {
            builder: Some(GraphBuilder::new()),
            transport,
            ..Self::default()
        }
    }

    /// The task graph.
    #[inline]
    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    /// The handshake array of the current launch, one cell per logical
    /// core. Empty before the first launch.
    #[inline]
    pub fn handshake(&self) -> &[Handshake] {
        &self.handshake
    }

    /// Scheduler thread count requested for the current launch.
    #[inline]
    pub fn sched_thread_num(&self) -> i32 {
        self.sched_thread_num
    }

    /// Block count of the current launch.
    #[inline]
    pub fn block_dim(&self) -> i32 {
        self.block_dim
    }

    /// Device the runtime was launched on.
    #[inline]
    pub fn device_id(&self) -> i32 {
        self.device_id
    }

    /// Record the target device.
    pub fn set_device_id(
        &mut self,
        device_id: i32,
    ) {
        self.device_id = device_id;
    }

    // ----- orchestration interface -----

    /// Add a task while the graph is unsealed.
    pub fn add_task(
        &mut self,
        core_type: CoreType,
        func_id: i32,
        args: &[i64],
    ) -> RuntimeResult<TaskId> {
        self.builder
            .as_mut()
            .ok_or(RuntimeError::GraphSealed)?
            .add_task(core_type, func_id, args)
    }

    /// Add a dependency edge while the graph is unsealed.
    pub fn add_edge(
        &mut self,
        from: TaskId,
        to: TaskId,
    ) -> RuntimeResult<()> {
        self.builder
            .as_mut()
            .ok_or(RuntimeError::GraphSealed)?
            .add_edge(from, to)
    }

    /// Finish orchestration: build the graph and compute the initial
    /// ready set.
    pub fn seal(&mut self) -> RuntimeResult<()> {
        let builder = self.builder.take().ok_or(RuntimeError::GraphSealed)?;
        self.graph = builder.build();
        info!("runtime: graph sealed with {} tasks", self.graph.task_count());
        Ok(())
    }

    // ----- transport plumbing -----

    /// Register base addresses, one per physical core. Empty outside a
    /// register-mode launch.
    pub fn reg_bases(&self) -> &[u64] {
        self.regs.as_ref().map(|r| r.bases()).unwrap_or(&[])
    }

    /// Scheduler-side transport over the given logical core ids.
    pub(crate) fn scheduler_transport<'rt>(
        &'rt self,
        cores: &[u32],
    ) -> Box<dyn Transport + 'rt> {
        match self.transport {
            TransportKind::SharedMem => {
                Box::new(SharedMemTransport::new(&self.handshake, cores.to_vec()))
            }
            TransportKind::Registers => Box::new(RegisterTransport::new(
                &self.handshake,
                self.reg_bases(),
                cores.to_vec(),
            )),
        }
    }

    /// Worker-side port for one logical core.
    pub(crate) fn worker_port(
        &self,
        logical_id: u32,
        physical_id: u32,
    ) -> Box<dyn WorkerPort + '_> {
        let cell = &self.handshake[logical_id as usize];
        match self.transport {
            TransportKind::SharedMem => Box::new(SharedMemPort::new(cell)),
            TransportKind::Registers => {
                let base = self
                    .reg_bases()
                    .get(physical_id as usize)
                    .copied()
                    .unwrap_or(0);
                Box::new(RegisterPort::new(cell, &self.graph, base))
            }
        }
    }

    // ----- launch -----

    /// Stage the per-launch coordination state: record the launch
    /// parameters, allocate a zeroed handshake array and, in register
    /// mode, a fresh register file.
    pub(crate) fn prepare_for_launch(
        &mut self,
        thread_num: i32,
        block_dim: i32,
    ) -> RuntimeResult<()> {
        if self.builder.is_some() {
            self.seal()?;
        }
        if block_dim < 1 {
            return Err(RuntimeError::InvalidBlockDim(block_dim));
        }

        self.sched_thread_num = thread_num;
        self.block_dim = block_dim;

        let cores_total = block_dim as usize * WORKERS_PER_BLOCK;
        self.handshake = (0..cores_total).map(|_| Handshake::new()).collect();
        for (logical, cell) in self.handshake.iter().enumerate() {
            cell.set_core_type(Self::class_of(logical, block_dim as usize));
        }
        self.regs = match self.transport {
            TransportKind::Registers => Some(RegisterFile::new(cores_total)),
            TransportKind::SharedMem => None,
        };
        Ok(())
    }

    /// Run the graph to completion on `thread_num` scheduler threads and
    /// `block_dim * 3` simulated workers.
    ///
    /// Blocks until every task has completed and every thread has joined.
    /// On a configuration failure no worker is ever released from
    /// bring-up and the first scheduler error is returned.
    pub fn launch(
        &mut self,
        thread_num: i32,
        block_dim: i32,
    ) -> RuntimeResult<()> {
        self.prepare_for_launch(thread_num, block_dim)?;
        let cores_total = block_dim as usize * WORKERS_PER_BLOCK;
        let sched_count = thread_num.clamp(1, MAX_SCHED_THREADS as i32) as usize;
        info!(
            "launch: {} scheduler threads, {} blocks, {} workers, {:?} transport",
            sched_count, block_dim, cores_total, self.transport
        );

        let engine = Engine::new();
        let rt: &Runtime = self;
        let mut first_err: Option<RuntimeError> = None;

        thread::scope(|s| {
            let engine = &engine;

            let sched_handles: Vec<_> = (0..sched_count)
                .map(|_| s.spawn(move || engine.execute(rt)))
                .collect();

            for logical in 0..cores_total as u32 {
                let class = Self::class_of(logical as usize, block_dim as usize);
                s.spawn(move || {
                    // Simulation: a worker's physical id is its logical id.
                    let mut port = rt.worker_port(logical, logical);
                    worker_main(port.as_mut(), logical, class, logical);
                });
            }

            for handle in sched_handles {
                let outcome = match handle.join() {
                    Ok(result) => result,
                    Err(_) => Err(RuntimeError::SchedulerPanic),
                };
                if let Err(e) = outcome {
                    debug!("launch: scheduler thread returned: {}", e);
                    match &first_err {
                        None => first_err = Some(e),
                        Some(RuntimeError::InitFailed) => first_err = Some(e),
                        Some(_) => {}
                    }
                }
            }

            // A failed init leaves workers spinning in bring-up; raise the
            // quit bit so the simulation threads can unwind.
            if first_err.is_some() {
                for cell in rt.handshake() {
                    cell.set_quit();
                }
            }
        });

        match first_err {
            Some(e) => {
                error!("launch: failed: {}", e);
                Err(e)
            }
            None => {
                info!("launch: all tasks completed");
                Ok(())
            }
        }
    }

    /// Worker class of a logical core id: compute cores occupy
    /// `[0, block_dim)`, vector cores follow two per block.
    #[inline]
    fn class_of(
        logical: usize,
        block_dim: usize,
    ) -> CoreType {
        if logical < block_dim {
            CoreType::Compute
        } else {
            CoreType::Vector
        }
    }
}
