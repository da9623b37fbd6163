//! x86_64 backend, long mode, CPL0 handlers.

mod frame;
mod vectors;

#[cfg(all(target_arch = "x86_64", target_os = "none"))]
mod entry;

pub use frame::InterruptFrame;
pub use vectors::{PageFaultErrorCode, RFlags, STUB_VECTORS, Vector};

#[cfg(all(target_arch = "x86_64", target_os = "none"))]
pub use entry::{DISPATCHER, halt, init};
