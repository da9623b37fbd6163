//! Unit tests: `cargo test` on each library crate, on the host.
//!
//! The vector code is gated on bare-metal targets, so the host build covers
//! the state records, decoders, dispatcher and formatting.

use anyhow::Result;

use crate::cli::Package;

pub fn run(package: Option<Package>) -> Result<()> {
    println!("=== Unit Tests ===\n");

    let packages = match package {
        Some(p) => vec![p],
        None => Package::ALL.to_vec(),
    };

    for p in packages {
        println!("Running {} unit tests...", p.crate_name());
        let mut args = vec!["test", "-p", p.crate_name()];
        if let Some(features) = p.test_features() {
            args.extend(["--features", features]);
        }
        crate::util::repo::cargo(&args)?;
        println!();
    }

    println!("All unit tests passed\n");
    Ok(())
}
