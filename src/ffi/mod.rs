//! C ABI façade for host-language bindings.
//!
//! Every function uses C linkage, takes an opaque runtime handle the
//! caller allocated with `get_runtime_size` bytes, and returns 0 on
//! success or a negative value on failure. Error codes are non-specific;
//! diagnostic detail goes to the log sink.
//!
//! Simulation conventions: an orchestration "binary" and a kernel
//! "binary" are each an 8-byte buffer holding a function pointer, and
//! device memory is host memory.

use std::os::raw::{c_char, c_void};
use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::{debug, error};

use crate::device::{memory, registry};
use crate::runtime::graph::{CoreType, TaskId};
use crate::runtime::launch::Runtime;
use crate::runtime::transport::TransportKind;

/// Opaque runtime handle; caller-allocated storage of
/// [`get_runtime_size`] bytes.
pub type RuntimeHandle = *mut c_void;

/// Orchestration entry: populates the graph through the
/// `runtime_add_task` / `runtime_add_edge` interface.
pub type OrchFunc = unsafe extern "C" fn(RuntimeHandle, *const u64, i32) -> i32;

const OK: i32 = 0;
const FAIL: i32 = -1;

/// Bytes to allocate for a runtime handle.
#[no_mangle]
pub extern "C" fn get_runtime_size() -> usize {
    std::mem::size_of::<Runtime>()
}

/// Initialize a runtime in caller-allocated storage and run the
/// orchestration function to populate its graph.
///
/// # Safety
/// `handle` must point at writable storage of [`get_runtime_size`] bytes;
/// `orch_binary` must hold `orch_size` readable bytes encoding a valid
/// [`OrchFunc`] pointer; `func_args` must hold `func_args_count` slots.
#[no_mangle]
pub unsafe extern "C" fn init_runtime(
    handle: RuntimeHandle,
    orch_binary: *const u8,
    orch_size: usize,
    orch_func_name: *const c_char,
    func_args: *const u64,
    func_args_count: i32,
) -> i32 {
    if handle.is_null() {
        error!("init_runtime: null runtime handle");
        return FAIL;
    }
    if orch_binary.is_null() || orch_size != std::mem::size_of::<u64>() {
        error!("init_runtime: orchestration binary must be 8 bytes in simulation");
        return FAIL;
    }

    if !orch_func_name.is_null() {
        let name = std::ffi::CStr::from_ptr(orch_func_name);
        debug!("init_runtime: orchestration entry {:?}", name);
    }

    let transport = transport_from_env();
    std::ptr::write(handle as *mut Runtime, Runtime::for_orchestration(transport));

    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(std::slice::from_raw_parts(orch_binary, 8));
    let addr = u64::from_ne_bytes(bytes);
    if addr == 0 {
        error!("init_runtime: null orchestration function");
        return FAIL;
    }
    let orch: OrchFunc = std::mem::transmute(addr as usize);

    let rc = catch_unwind(AssertUnwindSafe(|| orch(handle, func_args, func_args_count)));
    match rc {
        Ok(0) => {}
        Ok(rc) => {
            error!("init_runtime: orchestration returned {}", rc);
            return FAIL;
        }
        Err(_) => {
            error!("init_runtime: orchestration panicked");
            return FAIL;
        }
    }

    match (*(handle as *mut Runtime)).seal() {
        Ok(()) => OK,
        Err(e) => {
            error!("init_runtime: {}", e);
            FAIL
        }
    }
}

/// Add a task to an unsealed runtime. Returns the (positive) task id, or
/// a negative value on failure.
///
/// # Safety
/// `handle` must be an initialized runtime; `args` must hold `args_count`
/// slots (it may be null when `args_count` is 0).
#[no_mangle]
pub unsafe extern "C" fn runtime_add_task(
    handle: RuntimeHandle,
    core_type: i32,
    func_id: i32,
    args: *const i64,
    args_count: i32,
) -> i32 {
    if handle.is_null() {
        return FAIL;
    }
    if !(0..=1).contains(&core_type) {
        error!("runtime_add_task: invalid core type {}", core_type);
        return FAIL;
    }
    if args.is_null() && args_count > 0 {
        error!("runtime_add_task: null args with count {}", args_count);
        return FAIL;
    }
    let slots = if args_count > 0 {
        std::slice::from_raw_parts(args, args_count as usize)
    } else {
        &[]
    };
    let rt = &mut *(handle as *mut Runtime);
    match rt.add_task(CoreType::from_u32(core_type as u32), func_id, slots) {
        Ok(id) => id.inner() as i32,
        Err(e) => {
            error!("runtime_add_task: {}", e);
            FAIL
        }
    }
}

/// Add a dependency edge to an unsealed runtime.
///
/// # Safety
/// `handle` must be an initialized runtime.
#[no_mangle]
pub unsafe extern "C" fn runtime_add_edge(
    handle: RuntimeHandle,
    from: i32,
    to: i32,
) -> i32 {
    if handle.is_null() || from < 1 || to < 1 {
        return FAIL;
    }
    let rt = &mut *(handle as *mut Runtime);
    match rt.add_edge(TaskId(from as u32), TaskId(to as u32)) {
        Ok(()) => OK,
        Err(e) => {
            error!("runtime_add_edge: {}", e);
            FAIL
        }
    }
}

/// Seal the graph of a runtime, computing its initial ready set.
///
/// # Safety
/// `handle` must be an initialized runtime.
#[no_mangle]
pub unsafe extern "C" fn runtime_seal_graph(handle: RuntimeHandle) -> i32 {
    if handle.is_null() {
        return FAIL;
    }
    match (*(handle as *mut Runtime)).seal() {
        Ok(()) => OK,
        Err(e) => {
            error!("runtime_seal_graph: {}", e);
            FAIL
        }
    }
}

/// Allocate device memory.
#[no_mangle]
pub extern "C" fn device_malloc(size: usize) -> *mut c_void {
    memory::malloc(size) as *mut c_void
}

/// Free device memory.
#[no_mangle]
pub extern "C" fn device_free(dev_ptr: *mut c_void) {
    memory::free(dev_ptr as *mut u8);
}

/// Copy host memory to device memory.
#[no_mangle]
pub extern "C" fn copy_to_device(
    dev_ptr: *mut c_void,
    host_ptr: *const c_void,
    size: usize,
) -> i32 {
    memory::to_device(dev_ptr as *mut u8, host_ptr as *const u8, size)
}

/// Copy device memory back to host memory.
#[no_mangle]
pub extern "C" fn copy_from_device(
    host_ptr: *mut c_void,
    dev_ptr: *const c_void,
    size: usize,
) -> i32 {
    memory::from_device(host_ptr as *mut u8, dev_ptr as *const u8, size)
}

/// Register a kernel binary for a function id. In simulation `bin_data`
/// points at an 8-byte function pointer.
///
/// # Safety
/// `bin_data` must hold `bin_size` readable bytes.
#[no_mangle]
pub unsafe extern "C" fn register_kernel(
    func_id: i32,
    bin_data: *const u8,
    bin_size: usize,
) -> i32 {
    if bin_data.is_null() {
        error!("register_kernel: null binary");
        return FAIL;
    }
    let blob = std::slice::from_raw_parts(bin_data, bin_size);
    match registry::register_blob(func_id, blob) {
        Ok(()) => OK,
        Err(e) => {
            error!("register_kernel: {}", e);
            FAIL
        }
    }
}

/// Launch a runtime and block until the graph has run to completion.
/// The scheduler and worker binaries are ignored in simulation.
///
/// # Safety
/// `handle` must be an initialized runtime.
#[no_mangle]
pub unsafe extern "C" fn launch_runtime(
    handle: RuntimeHandle,
    sched_thread_num: i32,
    block_dim: i32,
    device_id: i32,
    _sched_binary: *const u8,
    _sched_size: usize,
    _worker_binary: *const u8,
    _worker_size: usize,
) -> i32 {
    if handle.is_null() {
        error!("launch_runtime: null runtime handle");
        return FAIL;
    }
    let rt = &mut *(handle as *mut Runtime);
    rt.set_device_id(device_id);

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        rt.launch(sched_thread_num, block_dim)
    }));
    match outcome {
        Ok(Ok(())) => OK,
        Ok(Err(e)) => {
            error!("launch_runtime: {}", e);
            FAIL
        }
        Err(_) => {
            error!("launch_runtime: panicked");
            FAIL
        }
    }
}

/// Drop a runtime in place. The caller still owns and frees the storage.
///
/// # Safety
/// `handle` must be an initialized runtime; it must not be used again
/// without re-initialization.
#[no_mangle]
pub unsafe extern "C" fn finalize_runtime(handle: RuntimeHandle) -> i32 {
    if handle.is_null() {
        return FAIL;
    }
    std::ptr::drop_in_place(handle as *mut Runtime);
    OK
}

/// Record the active device. A no-op beyond bookkeeping in simulation.
#[no_mangle]
pub extern "C" fn set_device(device_id: i32) -> i32 {
    registry::set_device(device_id);
    OK
}

fn transport_from_env() -> TransportKind {
    match std::env::var("TIANJI_TRANSPORT").as_deref() {
        Ok("registers") | Ok("regs") => TransportKind::Registers,
        _ => TransportKind::SharedMem,
    }
}
