#![cfg_attr(not(feature = "std"), no_std)]

//! Small helpers shared by the cpuex crates.
//!
//! Nothing here allocates: exception context has no heap to rely on.

pub mod buffer;
pub mod hex;

pub use buffer::FmtBuffer;
pub use hex::HexU64;

// Lock primitives used by the backends for one-time setup.
pub use spin::{Lazy, Once};
