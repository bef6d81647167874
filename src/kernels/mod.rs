//! Built-in simulation kernels.
//!
//! Loop-based float kernels for the demo binary and the test suite. Each
//! follows the uniform entry signature and unpacks its own operands from
//! the argument array. The real platform replaces these with compiled
//! device binaries registered through the same interface.

use crate::runtime::graph::KernelFn;

/// Address of a kernel for direct graph construction.
#[inline]
pub fn addr_of(kernel: KernelFn) -> u64 {
    kernel as usize as u64
}

/// Element-wise addition: `out[i] = src0[i] + src1[i]`.
///
/// Slots: `[src0, src1, out, count]`.
///
/// # Safety
/// `args` must hold four slots with valid `f32` buffers of `count`
/// elements behind slots 0..=2.
pub unsafe extern "C" fn kernel_add(args: *mut i64) {
    let args = std::slice::from_raw_parts(args, 4);
    let src0 = args[0] as *const f32;
    let src1 = args[1] as *const f32;
    let out = args[2] as *mut f32;
    let count = args[3] as usize;

    for i in 0..count {
        *out.add(i) = *src0.add(i) + *src1.add(i);
    }
}

/// Tensor plus scalar: `out[i] = src[i] + scalar`.
///
/// Slots: `[src, scalar_bits, out, count]`; the scalar travels as its raw
/// `f32` bit pattern in the low half of slot 1.
///
/// # Safety
/// Same contract as [`kernel_add`], with slot 1 carrying the scalar.
pub unsafe extern "C" fn kernel_add_scalar(args: *mut i64) {
    let args = std::slice::from_raw_parts(args, 4);
    let src = args[0] as *const f32;
    let scalar = f32::from_bits(args[1] as u64 as u32);
    let out = args[2] as *mut f32;
    let count = args[3] as usize;

    for i in 0..count {
        *out.add(i) = *src.add(i) + scalar;
    }
}

/// Element-wise multiplication: `out[i] = src0[i] * src1[i]`.
///
/// Slots: `[src0, src1, out, count]`.
///
/// # Safety
/// Same contract as [`kernel_add`].
pub unsafe extern "C" fn kernel_mul(args: *mut i64) {
    let args = std::slice::from_raw_parts(args, 4);
    let src0 = args[0] as *const f32;
    let src1 = args[1] as *const f32;
    let out = args[2] as *mut f32;
    let count = args[3] as usize;

    for i in 0..count {
        *out.add(i) = *src0.add(i) * *src1.add(i);
    }
}

/// Encode an `f32` scalar for an argument slot.
#[inline]
pub fn scalar_bits(val: f32) -> i64 {
    val.to_bits() as i64
}
