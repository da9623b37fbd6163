use anyhow::{Context, Result, bail};
use std::process::Command;

use crate::cli::Arch;

pub fn run() -> Result<()> {
    let mut ok = true;

    let output = Command::new("rustup")
        .args(["target", "list", "--installed"])
        .output()
        .context("failed to run rustup; is it in PATH?")?;
    if !output.status.success() {
        bail!("rustup target list failed ({})", output.status);
    }
    let installed = String::from_utf8_lossy(&output.stdout);

    for arch in Arch::ALL {
        let target = arch.target();
        if installed.lines().any(|line| line.trim() == target) {
            eprintln!("[OK] {target}");
        } else {
            eprintln!("[FAIL] missing target: rustup target add {target}");
            ok = false;
        }
    }

    if !ok {
        bail!("doctor checks failed");
    }
    Ok(())
}
