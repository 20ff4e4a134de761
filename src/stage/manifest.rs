//! UAC manifest embedding.
//!
//! Without a manifest Windows heuristically decides whether an
//! executable wants elevation (names containing "patch" or "setup"
//! trigger it). Embedding an explicit asInvoker manifest into every
//! staged executable keeps UAC quiet.

use anyhow::{Context, Result};
use std::path::Path;
use walkdir::WalkDir;

use crate::config::Config;
use crate::process::Cmd;

/// Embed the no-privileges manifest into one executable.
fn embed(mt_exe: &Path, manifest: &Path, exe: &Path) -> Result<()> {
    Cmd::new(mt_exe.to_string_lossy().as_ref())
        .arg("-nologo")
        .arg("-manifest")
        .arg_path(manifest)
        .arg(format!("-outputresource:{};#1", exe.display()))
        .error_msg(format!("mt failed to embed manifest into {}", exe.display()))
        .run()?;
    Ok(())
}

/// Embed the manifest into every executable under the bundle's MSYS2
/// tree. Returns the number of executables processed.
pub fn embed_manifests(config: &Config) -> Result<usize> {
    println!("\n=== Embedding UAC-friendly manifests ===");

    let mt_exe = config.sdk_path.join("mt.exe");
    let manifest = config.noprivs_manifest();
    if !manifest.is_file() {
        anyhow::bail!("manifest not found at {}", manifest.display());
    }

    let mut embedded = 0;
    for entry in WalkDir::new(config.msys2_dir()) {
        let entry = entry.context("walking staged MSYS2 tree")?;
        if !entry.file_type().is_file() {
            continue;
        }
        let is_exe = entry
            .path()
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("exe"));
        if !is_exe {
            continue;
        }
        embed(&mt_exe, &manifest, entry.path())?;
        embedded += 1;
    }

    println!("embedded {} manifests", embedded);
    Ok(embedded)
}
