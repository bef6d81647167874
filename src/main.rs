//! TianJi Runtime - CLI demo runner

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::info;

use tianji::kernels::{addr_of, kernel_add, kernel_add_scalar, kernel_mul, scalar_bits};
use tianji::util::config;
use tianji::util::logger::{self, LogLevel};
use tianji::{CoreType, GraphBuilder, Runtime, TransportKind, NAME, VERSION};

/// Log level enum for CLI
#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevelArg {
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevelArg> for LogLevel {
    fn from(level: LogLevelArg) -> Self {
        match level {
            LogLevelArg::Debug => LogLevel::Debug,
            LogLevelArg::Info => LogLevel::Info,
            LogLevelArg::Warn => LogLevel::Warn,
            LogLevelArg::Error => LogLevel::Error,
        }
    }
}

/// Transport enum for CLI
#[derive(Debug, Clone, Copy, ValueEnum)]
enum TransportArg {
    Shmem,
    Registers,
}

impl From<TransportArg> for TransportKind {
    fn from(t: TransportArg) -> Self {
        match t {
            TransportArg::Shmem => TransportKind::SharedMem,
            TransportArg::Registers => TransportKind::Registers,
        }
    }
}

/// Demo graph shapes
#[derive(Debug, Clone, Copy, ValueEnum)]
enum DemoGraph {
    /// One compute task: C = A + B
    Single,
    /// Two chained vector tasks: C = (A + B) + 1
    Chain,
    /// Diamond: C = (A + B) * (A + B)
    Diamond,
}

/// Heterogeneous accelerator task-graph runtime (simulation)
#[derive(Parser, Debug)]
#[command(name = "tianji")]
#[command(author = "TianJi Team")]
#[command(version = VERSION)]
#[command(about = NAME, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Set log level (debug, info, warn, error)
    #[arg(short, long, value_enum)]
    log_level: Option<LogLevelArg>,

    /// Configuration file (default: ./tianji.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a demo graph through the runtime
    Run {
        /// Which demo graph to run
        #[arg(value_enum, default_value = "diamond")]
        graph: DemoGraph,

        /// Scheduler thread count
        #[arg(short, long)]
        threads: Option<i32>,

        /// Block count (one block = 1 compute + 2 vector cores)
        #[arg(short, long)]
        block_dim: Option<i32>,

        /// Transport to use
        #[arg(long, value_enum)]
        transport: Option<TransportArg>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = config::load(args.config.as_deref())
        .with_context(|| "failed to load configuration")?;

    let level = match args.log_level {
        Some(l) => l.into(),
        None => config.log.level.parse().unwrap_or(LogLevel::Info),
    };
    logger::init_with_level(level);

    match args.command {
        Commands::Run {
            graph,
            threads,
            block_dim,
            transport,
        } => {
            let thread_num = threads.unwrap_or(config.launch.thread_num);
            let block_dim = block_dim.unwrap_or(config.launch.block_dim);
            let kind = match transport {
                Some(t) => t.into(),
                None => match config.launch.transport.as_deref() {
                    Some("registers") | Some("regs") => TransportKind::Registers,
                    _ => TransportKind::SharedMem,
                },
            };
            run_demo(graph, thread_num, block_dim, kind)
        }
    }
}

const N: usize = 8;

fn run_demo(
    graph: DemoGraph,
    thread_num: i32,
    block_dim: i32,
    kind: TransportKind,
) -> Result<()> {
    info!("{} v{}", NAME, VERSION);

    let a: Vec<f32> = (1..=N).map(|i| i as f32).collect();
    let b: Vec<f32> = (1..=N).map(|i| i as f32).collect();
    let mut t1 = vec![0.0f32; N];
    let mut t2 = vec![0.0f32; N];
    let mut c = vec![0.0f32; N];

    let mut builder = GraphBuilder::new();
    let expected: Vec<f32> = match graph {
        DemoGraph::Single => {
            builder.add_task_at_addr(
                CoreType::Compute,
                addr_of(kernel_add),
                &[a.as_ptr() as i64, b.as_ptr() as i64, c.as_mut_ptr() as i64, N as i64],
            )?;
            a.iter().zip(&b).map(|(x, y)| x + y).collect()
        }
        DemoGraph::Chain => {
            let first = builder.add_task_at_addr(
                CoreType::Vector,
                addr_of(kernel_add),
                &[a.as_ptr() as i64, b.as_ptr() as i64, t1.as_mut_ptr() as i64, N as i64],
            )?;
            let second = builder.add_task_at_addr(
                CoreType::Vector,
                addr_of(kernel_add_scalar),
                &[t1.as_ptr() as i64, scalar_bits(1.0), c.as_mut_ptr() as i64, N as i64],
            )?;
            builder.add_edge(first, second)?;
            a.iter().zip(&b).map(|(x, y)| x + y + 1.0).collect()
        }
        DemoGraph::Diamond => {
            let left = builder.add_task_at_addr(
                CoreType::Vector,
                addr_of(kernel_add),
                &[a.as_ptr() as i64, b.as_ptr() as i64, t1.as_mut_ptr() as i64, N as i64],
            )?;
            let right = builder.add_task_at_addr(
                CoreType::Vector,
                addr_of(kernel_add),
                &[a.as_ptr() as i64, b.as_ptr() as i64, t2.as_mut_ptr() as i64, N as i64],
            )?;
            let join = builder.add_task_at_addr(
                CoreType::Compute,
                addr_of(kernel_mul),
                &[t1.as_ptr() as i64, t2.as_ptr() as i64, c.as_mut_ptr() as i64, N as i64],
            )?;
            builder.add_edge(left, join)?;
            builder.add_edge(right, join)?;
            a.iter().zip(&b).map(|(x, y)| (x + y) * (x + y)).collect()
        }
    };

    let mut rt = Runtime::new(builder.build(), kind);
    rt.launch(thread_num, block_dim)
        .with_context(|| "launch failed")?;

    info!("result: {:?}", c);
    if c != expected {
        bail!("output mismatch: expected {:?}, got {:?}", expected, c);
    }
    info!("output verified");
    Ok(())
}
