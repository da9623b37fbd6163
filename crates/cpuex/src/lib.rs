#![cfg_attr(not(feature = "std"), no_std)]

//! CPU exception entry.
//!
//! Three parties meet here:
//! - the vector table, which the hardware enters directly (`init` installs it),
//! - the architecture backend, which saves every register into a [`CpuState`]
//!   record, hands it to the handler and restores the processor from it,
//! - the application handler, which may inspect and edit the record and then
//!   either return (resume with the edited record) or never return.
//!
//! Root holds the architecture-independent pieces; each backend lives in its
//! own module. The state records and decoders build everywhere so they can be
//! tested on the host; the vector code only builds for bare-metal targets.

pub mod aarch64;
pub mod dispatch;
pub mod error;
pub mod support;
pub mod traits;
pub mod x86_64;

pub use dispatch::{ChangeSet, Dispatcher, Handler, Phase, Resumed};
pub use error::ExceptionError;
pub use support::{log_cpu_state, raw_faulting_cpu_state, to_string};
pub use traits::{Arch, CpuState, Field};

#[cfg(all(target_arch = "aarch64", target_os = "none"))]
pub use self::aarch64 as arch;
#[cfg(all(target_arch = "aarch64", target_os = "none"))]
pub type NativeState = aarch64::TrapFrame;

#[cfg(all(target_arch = "x86_64", target_os = "none"))]
pub use self::x86_64 as arch;
#[cfg(all(target_arch = "x86_64", target_os = "none"))]
pub type NativeState = x86_64::InterruptFrame;

/// Install the vector table for this core.
#[cfg(any(
    all(target_arch = "aarch64", target_os = "none"),
    all(target_arch = "x86_64", target_os = "none")
))]
pub fn init() {
    arch::init();
}

/// Route every CPU exception to `handler`.
#[cfg(any(
    all(target_arch = "aarch64", target_os = "none"),
    all(target_arch = "x86_64", target_os = "none")
))]
pub fn set_handler(handler: Handler<NativeState>) -> Result<(), ExceptionError> {
    arch::DISPATCHER.set_handler(handler)
}

/// Go back to logging the state and halting.
#[cfg(any(
    all(target_arch = "aarch64", target_os = "none"),
    all(target_arch = "x86_64", target_os = "none")
))]
pub fn restore_default_handler() -> Result<(), ExceptionError> {
    arch::DISPATCHER.restore_default_handler()
}

/// Stop the core for good, for handlers that decide not to resume.
#[cfg(any(
    all(target_arch = "aarch64", target_os = "none"),
    all(target_arch = "x86_64", target_os = "none")
))]
pub fn terminate() -> ! {
    arch::DISPATCHER.terminate()
}
