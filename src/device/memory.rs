//! Device memory primitives, host-backed in simulation.

use std::alloc::{self, Layout};
use std::collections::HashMap;
use std::sync::Mutex;

use once_cell::sync::Lazy;
use tracing::error;

/// Alignment of device allocations, matching the device DMA requirement.
const DEVICE_ALIGN: usize = 64;

/// Live allocations, keyed by address so `free` can recover the layout.
static ALLOCATIONS: Lazy<Mutex<HashMap<usize, Layout>>> = Lazy::new(|| Mutex::new(HashMap::new()));

/// Allocate `size` bytes of device memory. Returns null on failure or for
/// a zero size.
pub fn malloc(size: usize) -> *mut u8 {
    if size == 0 {
        return std::ptr::null_mut();
    }
    let Ok(layout) = Layout::from_size_align(size, DEVICE_ALIGN) else {
        return std::ptr::null_mut();
    };
    // Safety: layout has nonzero size.
    let ptr = unsafe { alloc::alloc_zeroed(layout) };
    if !ptr.is_null() {
        ALLOCATIONS.lock().unwrap().insert(ptr as usize, layout);
    }
    ptr
}

/// Free a pointer previously returned by [`malloc`]. Null and unknown
/// pointers are ignored with a log line.
pub fn free(ptr: *mut u8) {
    if ptr.is_null() {
        return;
    }
    let layout = ALLOCATIONS.lock().unwrap().remove(&(ptr as usize));
    match layout {
        Some(layout) => {
            // Safety: allocated by `malloc` with this exact layout.
            unsafe { alloc::dealloc(ptr, layout) };
        }
        None => error!("device: free of unknown pointer {:p}", ptr),
    }
}

/// Copy host memory into device memory. Plain memcpy in simulation.
pub fn to_device(
    dst: *mut u8,
    src: *const u8,
    size: usize,
) -> i32 {
    copy(dst, src, size)
}

/// Copy device memory back to host memory. Plain memcpy in simulation.
pub fn from_device(
    dst: *mut u8,
    src: *const u8,
    size: usize,
) -> i32 {
    copy(dst, src, size)
}

fn copy(
    dst: *mut u8,
    src: *const u8,
    size: usize,
) -> i32 {
    if dst.is_null() || src.is_null() {
        return -1;
    }
    // Safety: caller guarantees both regions hold at least `size` bytes
    // and do not overlap.
    unsafe { std::ptr::copy_nonoverlapping(src, dst, size) };
    0
}
