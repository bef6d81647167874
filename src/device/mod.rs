//! Device services: memory primitives and the kernel registry.
//!
//! In simulation "device" memory is host memory and a registered kernel
//! binary is a function pointer; on real hardware these wrap the platform
//! allocator and the kernel loader. The dispatch core only ever sees
//! addresses, so it is indifferent to the difference.

pub mod memory;
pub mod registry;
