use anyhow::Result;

pub fn run(cli: crate::cli::Cli) -> Result<()> {
    match cli.cmd {
        crate::cli::Cmd::Test { package } => crate::tasks::testing::unit::run(package),
        crate::cli::Cmd::Check { arch } => crate::tasks::targets::check::run(arch),
        crate::cli::Cmd::Doctor => crate::tasks::tooling::doctor::run(),
        crate::cli::Cmd::Presubmit => crate::tasks::tooling::presubmit::run(),
    }
}
