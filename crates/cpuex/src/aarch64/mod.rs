//! AArch64 backend, EL1.

mod frame;
mod syndrome;

#[cfg(all(target_arch = "aarch64", target_os = "none"))]
mod entry;

pub use frame::{FpContext, TrapFrame};
pub use syndrome::{
    AbortStatus, ExceptionClass, Spsr, Syndrome, TrapKind, TrapSource, VectorSlot,
};

#[cfg(all(target_arch = "aarch64", target_os = "none"))]
pub use entry::{DISPATCHER, halt, init};
