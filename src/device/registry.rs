//! Kernel registry: func_id -> kernel address.
//!
//! `register_kernel` hands the runtime a kernel binary per function id. In
//! simulation the "binary" is an 8-byte function pointer; on the device it
//! is machine code loaded into executable memory. Either way the registry
//! only stores the resulting entry address, which graph construction
//! resolves into each task record.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, Ordering};

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::debug;

use crate::runtime::errors::{RuntimeError, RuntimeResult};

/// Size of a registered kernel blob in simulation: one function pointer.
const SIM_KERNEL_BLOB_BYTES: usize = 8;

static KERNELS: Lazy<RwLock<HashMap<i32, u64>>> = Lazy::new(|| RwLock::new(HashMap::new()));

static CURRENT_DEVICE: AtomicI32 = AtomicI32::new(0);

/// Register a kernel address for `func_id`, replacing any previous entry.
pub fn register(
    func_id: i32,
    addr: u64,
) {
    KERNELS.write().insert(func_id, addr);
    debug!("registry: kernel {} at {:#x}", func_id, addr);
}

/// Register a kernel from its binary blob.
///
/// Simulation: the blob must be exactly 8 bytes holding a nonzero
/// function pointer.
pub fn register_blob(
    func_id: i32,
    blob: &[u8],
) -> RuntimeResult<()> {
    if blob.len() != SIM_KERNEL_BLOB_BYTES {
        return Err(RuntimeError::InvalidKernelBinary {
            expected: SIM_KERNEL_BLOB_BYTES,
            actual: blob.len(),
        });
    }
    let mut bytes = [0u8; SIM_KERNEL_BLOB_BYTES];
    bytes.copy_from_slice(blob);
    let addr = u64::from_ne_bytes(bytes);
    if addr == 0 {
        return Err(RuntimeError::NullArgument("kernel function pointer"));
    }
    register(func_id, addr);
    Ok(())
}

/// Look up the kernel address registered for `func_id`.
pub fn lookup(func_id: i32) -> Option<u64> {
    KERNELS.read().get(&func_id).copied()
}

/// Record the active device.
pub fn set_device(device_id: i32) {
    CURRENT_DEVICE.store(device_id, Ordering::Release);
    debug!("registry: active device {}", device_id);
}

/// The active device id.
pub fn current_device() -> i32 {
    CURRENT_DEVICE.load(Ordering::Acquire)
}
