//! Error type definitions shared by the cpuex crates.
//!
//! Every error enum in the workspace is declared through [`define_error!`] so
//! codes, names and `Display` output look the same everywhere:
//!
//! ```ignore
//! define_error! {
//!     pub enum ExceptionError(0x01) {
//!         NestedFault = 0x01 => "Exception raised while a handler was running",
//!         HandlerBusy = 0x03 => "Handler slot is in use",
//!     }
//! }
//! ```
//!
//! A code is `(subsystem << 8) | variant`, printed as `E0101`.

#![cfg_attr(not(test), no_std)]

/// Declare an error enum with a subsystem byte and per-variant codes.
#[macro_export]
macro_rules! define_error {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident($subsystem:literal) {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident = $code:literal => $desc:literal
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        $vis enum $name {
            $(
                $(#[$variant_meta])*
                $variant,
            )*
        }

        impl $name {
            /// Subsystem identifier for this error type.
            pub const SUBSYSTEM: u8 = $subsystem;

            /// Every variant, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),*];

            /// Numeric code: subsystem in the high byte, variant in the low byte.
            pub const fn code(&self) -> u16 {
                match self {
                    $(Self::$variant => (($subsystem as u16) << 8) | $code,)*
                }
            }

            /// Human-readable description.
            pub const fn name(&self) -> &'static str {
                match self {
                    $(Self::$variant => $desc,)*
                }
            }

            /// Reverse lookup of [`Self::code`].
            pub fn from_code(code: u16) -> Option<Self> {
                Self::ALL.iter().copied().find(|e| e.code() == code)
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "E{:04X}: {}", self.code(), self.name())
            }
        }

        impl core::error::Error for $name {}
    };
}
