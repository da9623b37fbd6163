//! Everything that has to pass before a change lands: formatting, lints on
//! the host and both bare-metal targets, host unit tests, cross builds.
//!
//! Every step runs even after a failure so one pass reports all of them.

use anyhow::{Result, bail};

use crate::cli::Arch;

/// Features that bring the host-testable crates up with std.
const HOST_FEATURES: &str = "cpuex/std,cpuex_utils/std";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Format,
    ClippyHost,
    ClippyTarget(Arch),
    UnitTests,
    CrossCheck,
}

impl Step {
    fn all() -> Vec<Self> {
        let mut steps = vec![Self::Format, Self::ClippyHost];
        steps.extend(Arch::ALL.map(Self::ClippyTarget));
        steps.extend([Self::UnitTests, Self::CrossCheck]);
        steps
    }

    fn label(&self) -> String {
        match self {
            Self::Format => "fmt".to_string(),
            Self::ClippyHost => "clippy (host)".to_string(),
            Self::ClippyTarget(arch) => format!("clippy ({})", arch.target()),
            Self::UnitTests => "unit tests".to_string(),
            Self::CrossCheck => "cross check".to_string(),
        }
    }

    /// Arguments for the steps that are a single cargo invocation.
    fn cargo_args(&self) -> Option<Vec<&'static str>> {
        match self {
            Self::Format => Some(vec!["fmt", "--all", "--check"]),
            Self::ClippyHost => Some(vec![
                "clippy",
                "--workspace",
                "--all-targets",
                "--features",
                HOST_FEATURES,
            ]),
            Self::ClippyTarget(arch) => Some(vec![
                "clippy",
                "-p",
                "cpuex",
                "--target",
                arch.target(),
                "--features",
                "verbose",
            ]),
            Self::UnitTests | Self::CrossCheck => None,
        }
    }

    fn run(&self) -> Result<()> {
        if let Some(args) = self.cargo_args() {
            return crate::util::repo::cargo(&args);
        }
        match self {
            Self::UnitTests => crate::tasks::testing::unit::run(None),
            Self::CrossCheck => crate::tasks::targets::check::run(None),
            Self::Format | Self::ClippyHost | Self::ClippyTarget(_) => Ok(()),
        }
    }
}

pub fn run() -> Result<()> {
    println!("=== Presubmit ===\n");

    let mut failed = Vec::new();
    for step in Step::all() {
        match step.run() {
            Ok(()) => eprintln!("[ok] {}", step.label()),
            Err(e) => {
                eprintln!("[bad] {}: {e:#}", step.label());
                failed.push(step.label());
            }
        }
    }

    if !failed.is_empty() {
        bail!("presubmit failed: {}", failed.join(", "));
    }
    println!("\nPresubmit passed\n");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steps_cover_every_target_in_order() {
        let labels: Vec<String> = Step::all().iter().map(Step::label).collect();
        assert_eq!(
            labels,
            [
                "fmt",
                "clippy (host)",
                "clippy (aarch64-unknown-none)",
                "clippy (x86_64-unknown-none)",
                "unit tests",
                "cross check",
            ]
        );
    }

    #[test]
    fn test_cargo_steps_have_arguments() {
        assert_eq!(
            Step::Format.cargo_args(),
            Some(vec!["fmt", "--all", "--check"])
        );
        let target = Step::ClippyTarget(Arch::X86_64).cargo_args();
        assert!(target.is_some_and(|args| args.contains(&"x86_64-unknown-none")));
        assert_eq!(Step::UnitTests.cargo_args(), None);
        assert_eq!(Step::CrossCheck.cargo_args(), None);
    }
}
