//! Graph and builder unit tests

use crate::device::registry;
use crate::runtime::errors::RuntimeError;
use crate::runtime::graph::{CoreType, GraphBuilder, TaskId};
use crate::runtime::RUNTIME_MAX_TASKS;

#[test]
fn test_task_ids_are_one_based() {
    let mut builder = GraphBuilder::new();
    let first = builder
        .add_task_at_addr(CoreType::Compute, 0, &[])
        .unwrap();
    let second = builder.add_task_at_addr(CoreType::Vector, 0, &[]).unwrap();
    assert_eq!(first, TaskId(1));
    assert_eq!(second, TaskId(2));
}

#[test]
fn test_edges_update_fanin_and_fanout() {
    let mut builder = GraphBuilder::new();
    let a = builder.add_task_at_addr(CoreType::Vector, 0, &[]).unwrap();
    let b = builder.add_task_at_addr(CoreType::Vector, 0, &[]).unwrap();
    let c = builder.add_task_at_addr(CoreType::Vector, 0, &[]).unwrap();
    builder.add_edge(a, c).unwrap();
    builder.add_edge(b, c).unwrap();

    let graph = builder.build();
    assert_eq!(graph.get_task(a).unwrap().fanout(), &[c]);
    assert_eq!(graph.get_task(c).unwrap().fanin(), 2);
    assert_eq!(graph.initial_ready_tasks(), &[a, b]);
}

#[test]
fn test_edge_rejects_bad_ids() {
    let mut builder = GraphBuilder::new();
    let a = builder.add_task_at_addr(CoreType::Vector, 0, &[]).unwrap();
    let err = builder.add_edge(a, TaskId(7)).unwrap_err();
    assert!(matches!(err, RuntimeError::InvalidTaskId(7)));
    let err = builder.add_edge(TaskId(0), a).unwrap_err();
    assert!(matches!(err, RuntimeError::InvalidTaskId(0)));
}

#[test]
fn test_unknown_kernel_id() {
    let mut builder = GraphBuilder::new();
    let err = builder
        .add_task(CoreType::Compute, -12345, &[])
        .unwrap_err();
    assert!(matches!(err, RuntimeError::UnknownKernel(-12345)));
}

#[test]
fn test_registered_kernel_resolves() {
    registry::register(777, 0xABCD);
    let mut builder = GraphBuilder::new();
    let id = builder.add_task(CoreType::Compute, 777, &[1, 2]).unwrap();
    let graph = builder.build();
    let task = graph.get_task(id).unwrap();
    assert_eq!(task.kernel_addr(), 0xABCD);
    assert_eq!(task.args_len(), 2);
}

#[test]
fn test_capacity_is_enforced() {
    let mut builder = GraphBuilder::new();
    for _ in 0..RUNTIME_MAX_TASKS {
        builder.add_task_at_addr(CoreType::Vector, 0, &[]).unwrap();
    }
    let err = builder
        .add_task_at_addr(CoreType::Vector, 0, &[])
        .unwrap_err();
    assert!(matches!(err, RuntimeError::GraphCapacity(_)));
}

#[test]
fn test_fanin_decrement_and_reset() {
    let mut builder = GraphBuilder::new();
    let a = builder.add_task_at_addr(CoreType::Vector, 0, &[]).unwrap();
    let b = builder.add_task_at_addr(CoreType::Vector, 0, &[]).unwrap();
    builder.add_edge(a, b).unwrap();
    let graph = builder.build();

    let task = graph.get_task(b).unwrap();
    assert_eq!(task.decrement_fanin(), 1);
    assert_eq!(task.fanin(), 0);

    graph.reset_fanins();
    assert_eq!(task.fanin(), 1);
}

#[test]
fn test_get_task_bounds() {
    let graph = GraphBuilder::new().build();
    assert!(graph.get_task(TaskId(0)).is_none());
    assert!(graph.get_task(TaskId(1)).is_none());
    assert!(graph.is_empty());
}

#[test]
fn test_argument_blob_is_copied() {
    let mut builder = GraphBuilder::new();
    let args = vec![10i64, 20, 30];
    let id = builder
        .add_task_at_addr(CoreType::Compute, 0, &args)
        .unwrap();
    drop(args);

    let graph = builder.build();
    let task = graph.get_task(id).unwrap();
    let slots = unsafe { std::slice::from_raw_parts(task.args_ptr(), task.args_len()) };
    assert_eq!(slots, &[10, 20, 30]);
}
