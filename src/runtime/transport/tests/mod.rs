//! Transport unit tests, driven single-threaded by interleaving the
//! scheduler-side and worker-side halves by hand.

use crate::runtime::graph::{CoreType, GraphBuilder, TaskId};
use crate::runtime::handshake::Handshake;
use crate::runtime::transport::regs::{
    close_fast_path, open_fast_path, read_reg, write_task_reg, FAST_PATH_CLOSE, FAST_PATH_OPEN,
    REG_FAST_PATH_ENABLE, REG_TASK_DATA, STOP_SENTINEL,
};
use crate::runtime::transport::{
    RegisterFile, RegisterPort, RegisterTransport, SharedMemPort, SharedMemTransport, Transport,
    WorkerPoll, WorkerPort,
};

fn cells(n: usize) -> Vec<Handshake> {
    (0..n).map(|_| Handshake::new()).collect()
}

#[test]
fn test_register_file_layout() {
    let file = RegisterFile::new(3);
    assert_eq!(file.core_count(), 3);
    assert_eq!(file.bases().len(), 3);
    for &base in file.bases() {
        assert_ne!(base, 0);
        assert_eq!(base % 4, 0);
    }
}

#[test]
fn test_fast_path_bracketing() {
    let file = RegisterFile::new(1);
    let base = file.bases()[0];

    open_fast_path(file.bases(), 0);
    assert_eq!(unsafe { read_reg(base, REG_FAST_PATH_ENABLE) }, FAST_PATH_OPEN);
    assert_eq!(unsafe { read_reg(base, REG_TASK_DATA) }, 0);

    close_fast_path(file.bases(), 0);
    assert_eq!(unsafe { read_reg(base, REG_FAST_PATH_ENABLE) }, FAST_PATH_CLOSE);
}

#[test]
fn test_write_task_reg_skips_zero_base() {
    let bases = [0u64];
    // Must not fault on an unresolved core.
    write_task_reg(&bases, 0, 7);
    write_task_reg(&bases, 9, 7);
}

#[test]
fn test_shmem_roundtrip() {
    let cells = cells(1);
    let mut sched = SharedMemTransport::new(&cells, vec![0]);
    let mut port = SharedMemPort::new(&cells[0]);

    // Bring-up: worker announces, scheduler releases.
    port.announce(4);
    let physical = sched.bring_up(0);
    assert_eq!(physical, 4);
    assert!(port.ready());

    // Dispatch.
    let mut builder = GraphBuilder::new();
    let id = builder.add_task_at_addr(CoreType::Vector, 0, &[]).unwrap();
    let graph = builder.build();
    let task = graph.get_task(id).unwrap();

    assert!(sched.is_idle(0));
    sched.publish_task(0, task);
    assert!(!sched.is_idle(0));
    assert!(sched.observe_completion(0).is_none());

    // Worker sees exactly one fresh assignment.
    let polled = match port.poll() {
        WorkerPoll::Run(t) => t,
        other => panic!("expected Run, got {:?}", other),
    };
    assert_eq!(unsafe { polled.as_ref() }.id(), id);
    port.complete();
    assert!(matches!(port.poll(), WorkerPoll::Idle));

    // Reclaim.
    let done = sched.observe_completion(0).expect("completion visible");
    assert_eq!(unsafe { done.as_ref() }.id(), id);
    assert!(sched.is_idle(0));

    // Quit.
    sched.publish_quit(0);
    assert!(matches!(port.poll(), WorkerPoll::Quit));
}

#[test]
fn test_shmem_backpressure_flag() {
    let cells = cells(1);
    let sched = SharedMemTransport::new(&cells, vec![0]);
    assert!(sched.dispatch_backpressure());
}

#[test]
fn test_register_roundtrip() {
    let cells = cells(1);
    let file = RegisterFile::new(1);

    let mut builder = GraphBuilder::new();
    let id = builder.add_task_at_addr(CoreType::Vector, 0, &[]).unwrap();
    let graph = builder.build();
    let task = graph.get_task(id).unwrap();

    let mut sched = RegisterTransport::new(&cells, file.bases(), vec![0]);
    let mut port = RegisterPort::new(&cells[0], &graph, file.bases()[0]);

    port.announce(0);
    assert_eq!(sched.bring_up(0), 0);
    assert!(port.ready());

    assert!(sched.is_idle(0));
    sched.publish_task(0, task);
    assert_eq!(
        unsafe { read_reg(file.bases()[0], REG_TASK_DATA) },
        id.inner() + 1
    );
    // Busy from the moment of publication: neither idle nor completed
    // until the worker clears the condition register.
    assert!(!sched.is_idle(0));
    assert!(sched.observe_completion(0).is_none());

    let polled = match port.poll() {
        WorkerPoll::Run(t) => t,
        other => panic!("expected Run, got {:?}", other),
    };
    assert_eq!(unsafe { polled.as_ref() }.id(), id);
    // Busy: condition register raised until completion.
    assert!(!sched.is_idle(0));
    port.complete();

    let done = sched.observe_completion(0).expect("completion visible");
    assert_eq!(unsafe { done.as_ref() }.id(), id);
    assert_eq!(unsafe { read_reg(file.bases()[0], REG_TASK_DATA) }, 0);
    assert!(sched.is_idle(0));

    // The worker must not re-run a reclaimed assignment id.
    assert!(matches!(port.poll(), WorkerPoll::Idle));

    sched.publish_quit(0);
    assert!(matches!(port.poll(), WorkerPoll::Quit));
    assert!(cells[0].quit_requested());
}

#[test]
fn test_register_stop_sentinel_value() {
    // Reserved value, outside the 31-bit id range used for dispatch.
    assert_eq!(STOP_SENTINEL, 0x7FFF_FFF0);
}

#[test]
fn test_register_no_backpressure_flag() {
    let cells = cells(1);
    let file = RegisterFile::new(1);
    let sched = RegisterTransport::new(&cells, file.bases(), vec![0]);
    assert!(!sched.dispatch_backpressure());
}

#[test]
fn test_register_zero_base_is_skipped() {
    let cells = cells(1);
    let bases = [0u64];
    let mut sched = RegisterTransport::new(&cells, &bases, vec![0]);
    assert!(!sched.is_idle(0));
    assert!(sched.observe_completion(0).is_none());
}

#[test]
fn test_worker_port_abort() {
    let cells = cells(1);
    let port = SharedMemPort::new(&cells[0]);
    assert!(!port.abort_requested());
    cells[0].set_quit();
    assert!(port.abort_requested());
}
