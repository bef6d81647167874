//! The register transport must produce bit-identical results to the
//! shared-memory transport for the same graph.

use tianji::kernels::{addr_of, kernel_add, kernel_add_scalar, kernel_mul, scalar_bits};
use tianji::{CoreType, GraphBuilder, Runtime, TaskId, TransportKind};

use crate::common::{add_recorder_task, ExecLog};

fn run_diamond(kind: TransportKind) -> Vec<f32> {
    let a: Vec<f32> = (1..=8).map(|i| i as f32).collect();
    let b: Vec<f32> = (1..=8).map(|i| i as f32).collect();
    let mut t1 = vec![0.0f32; 8];
    let mut t2 = vec![0.0f32; 8];
    let mut c = vec![0.0f32; 8];

    let mut builder = GraphBuilder::new();
    let left = builder
        .add_task_at_addr(
            CoreType::Vector,
            addr_of(kernel_add),
            &[a.as_ptr() as i64, b.as_ptr() as i64, t1.as_mut_ptr() as i64, 8],
        )
        .unwrap();
    let right = builder
        .add_task_at_addr(
            CoreType::Vector,
            addr_of(kernel_add),
            &[a.as_ptr() as i64, b.as_ptr() as i64, t2.as_mut_ptr() as i64, 8],
        )
        .unwrap();
    let join = builder
        .add_task_at_addr(
            CoreType::Compute,
            addr_of(kernel_mul),
            &[t1.as_ptr() as i64, t2.as_ptr() as i64, c.as_mut_ptr() as i64, 8],
        )
        .unwrap();
    builder.add_edge(left, join).unwrap();
    builder.add_edge(right, join).unwrap();

    let mut rt = Runtime::new(builder.build(), kind);
    rt.launch(1, 1).unwrap();
    c
}

#[test]
fn test_register_single_add() {
    let a: Vec<f32> = (1..=8).map(|i| i as f32).collect();
    let b: Vec<f32> = (1..=8).map(|i| i as f32).collect();
    let mut c = vec![0.0f32; 8];

    let mut builder = GraphBuilder::new();
    builder
        .add_task_at_addr(
            CoreType::Compute,
            addr_of(kernel_add),
            &[a.as_ptr() as i64, b.as_ptr() as i64, c.as_mut_ptr() as i64, 8],
        )
        .unwrap();

    let mut rt = Runtime::new(builder.build(), TransportKind::Registers);
    rt.launch(1, 1).unwrap();

    assert_eq!(c, vec![2.0, 4.0, 6.0, 8.0, 10.0, 12.0, 14.0, 16.0]);
}

#[test]
fn test_register_chain() {
    let a = vec![0.0f32; 8];
    let b = vec![1.0f32; 8];
    let mut t = vec![0.0f32; 8];
    let mut c = vec![0.0f32; 8];

    let mut builder = GraphBuilder::new();
    let first = builder
        .add_task_at_addr(
            CoreType::Vector,
            addr_of(kernel_add),
            &[a.as_ptr() as i64, b.as_ptr() as i64, t.as_mut_ptr() as i64, 8],
        )
        .unwrap();
    let second = builder
        .add_task_at_addr(
            CoreType::Vector,
            addr_of(kernel_add_scalar),
            &[t.as_ptr() as i64, scalar_bits(1.0), c.as_mut_ptr() as i64, 8],
        )
        .unwrap();
    builder.add_edge(first, second).unwrap();

    let mut rt = Runtime::new(builder.build(), TransportKind::Registers);
    rt.launch(1, 1).unwrap();

    assert_eq!(c, vec![2.0f32; 8]);
}

#[test]
fn test_diamond_parity() {
    let shmem = run_diamond(TransportKind::SharedMem);
    let regs = run_diamond(TransportKind::Registers);
    assert_eq!(shmem, regs);
}

#[test]
fn test_register_multi_thread_fanout() {
    const N: usize = 32;
    let log = ExecLog::new(N);

    let mut builder = GraphBuilder::new();
    let root = add_recorder_task(&mut builder, &log, CoreType::Vector, 0);
    let ids: Vec<TaskId> = (1..N)
        .map(|i| {
            let class = if i % 3 == 0 {
                CoreType::Compute
            } else {
                CoreType::Vector
            };
            let id = add_recorder_task(&mut builder, &log, class, i);
            builder.add_edge(root, id).unwrap();
            id
        })
        .collect();

    let mut rt = Runtime::new(builder.build(), TransportKind::Registers);
    rt.launch(2, 2).unwrap();

    assert_eq!(log.count(root), 1);
    for &id in &ids {
        assert_eq!(log.count(id), 1);
        assert!(log.end(root) < log.start(id));
    }
}
