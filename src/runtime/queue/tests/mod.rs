//! Ready queue unit tests

use std::sync::Arc;
use std::thread;

use crate::runtime::graph::{CoreType, TaskId};
use crate::runtime::queue::{ReadyQueue, ReadyQueues};

#[test]
fn test_lifo_order() {
    let queue = ReadyQueue::new(4);
    queue.push(TaskId(1));
    queue.push(TaskId(2));
    queue.push(TaskId(3));

    assert_eq!(queue.try_pop(), Some(TaskId(3)));
    assert_eq!(queue.try_pop(), Some(TaskId(2)));
    assert_eq!(queue.try_pop(), Some(TaskId(1)));
    assert_eq!(queue.try_pop(), None);
}

#[test]
fn test_bounded_capacity() {
    let queue = ReadyQueue::new(2);
    assert!(queue.push(TaskId(1)));
    assert!(queue.push(TaskId(2)));
    assert!(!queue.push(TaskId(3)));
    assert_eq!(queue.len(), 2);
}

#[test]
fn test_empty_fast_path() {
    let queue = ReadyQueue::new(8);
    assert!(queue.is_empty());
    assert_eq!(queue.try_pop(), None);
    queue.push(TaskId(9));
    assert!(!queue.is_empty());
}

#[test]
fn test_class_routing() {
    let queues = ReadyQueues::new(4);
    queues.for_class(CoreType::Compute).push(TaskId(1));
    queues.for_class(CoreType::Vector).push(TaskId(2));

    assert_eq!(queues.for_class(CoreType::Compute).try_pop(), Some(TaskId(1)));
    assert_eq!(queues.for_class(CoreType::Compute).try_pop(), None);
    assert_eq!(queues.for_class(CoreType::Vector).try_pop(), Some(TaskId(2)));
}

#[test]
fn test_concurrent_push_pop_drains_exactly() {
    let queue = Arc::new(ReadyQueue::new(1024));
    let producers: Vec<_> = (0..4)
        .map(|p| {
            let queue = queue.clone();
            thread::spawn(move || {
                for i in 0..256 {
                    assert!(queue.push(TaskId(p * 256 + i + 1)));
                }
            })
        })
        .collect();
    for handle in producers {
        handle.join().unwrap();
    }

    let consumers: Vec<_> = (0..4)
        .map(|_| {
            let queue = queue.clone();
            thread::spawn(move || {
                let mut popped = 0usize;
                while queue.try_pop().is_some() {
                    popped += 1;
                }
                popped
            })
        })
        .collect();
    let total: usize = consumers.into_iter().map(|h| h.join().unwrap()).sum();

    assert_eq!(total, 1024);
    assert!(queue.is_empty());
}
