use clap::{Parser, Subcommand, ValueEnum};

/// Library crates with host unit tests.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Package {
    #[value(name = "cpuex")]
    Cpuex,
    #[value(name = "utils")]
    Utils,
    #[value(name = "error")]
    Error,
}

impl Package {
    pub const ALL: [Self; 3] = [Self::Error, Self::Utils, Self::Cpuex];

    pub fn crate_name(self) -> &'static str {
        match self {
            Self::Cpuex => "cpuex",
            Self::Utils => "cpuex_utils",
            Self::Error => "cpuex_error",
        }
    }

    /// The error crate has no `std` feature; its tests build as they are.
    pub fn test_features(self) -> Option<&'static str> {
        match self {
            Self::Cpuex | Self::Utils => Some("std"),
            Self::Error => None,
        }
    }
}

/// Bare-metal targets the vector code is built for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Arch {
    #[value(name = "aarch64")]
    Aarch64,
    #[value(name = "x86_64")]
    X86_64,
}

impl Arch {
    pub const ALL: [Self; 2] = [Self::Aarch64, Self::X86_64];

    pub fn target(self) -> &'static str {
        match self {
            Self::Aarch64 => "aarch64-unknown-none",
            Self::X86_64 => "x86_64-unknown-none",
        }
    }
}

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "cpuex developer tasks")]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand)]
pub enum Cmd {
    /// Run the library unit tests on the host.
    ///
    /// Usage:
    ///   cargo xtask test
    ///   cargo xtask test cpuex
    Test {
        #[arg(value_enum)]
        package: Option<Package>,
    },

    /// Build `cpuex` for the bare-metal targets, vector code included.
    Check {
        #[arg(value_enum)]
        arch: Option<Arch>,
    },

    /// Check that the rustup targets used by `check` are installed.
    Doctor,

    /// Format check, clippy for host and both targets, unit tests, cross
    /// builds. Reports every step, fails if any did.
    Presubmit,
}
