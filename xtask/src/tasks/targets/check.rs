use anyhow::{Result, bail};

use crate::cli::Arch;

pub fn run(arch: Option<Arch>) -> Result<()> {
    let arches = match arch {
        Some(a) => vec![a],
        None => Arch::ALL.to_vec(),
    };

    let mut failed = Vec::new();
    for a in arches {
        let target = a.target();
        // Once plain and once with per-entry tracing compiled in.
        let plain = crate::util::repo::cargo(&["check", "-p", "cpuex", "--target", target]);
        let verbose = plain.and_then(|()| {
            crate::util::repo::cargo(&[
                "check", "-p", "cpuex", "--target", target, "--features", "verbose",
            ])
        });
        match verbose {
            Ok(()) => eprintln!("[ok] {target}"),
            Err(e) => {
                eprintln!("[bad] {target}: {e:#}");
                failed.push(target);
            }
        }
    }

    if !failed.is_empty() {
        bail!("cross check failed for {}", failed.join(", "));
    }
    Ok(())
}
