//! DLL rebasing for the staged MSYS2 tree.
//!
//! MSYS DLLs are loaded without relocation support; when many share a
//! preferred base address they collide in the address space of a single
//! process. editbin assigns each library a non-overlapping base: the
//! bulk of the DLLs get allocated downward from 0x60000000 in one
//! invocation, and msys-2.0.dll is then rebased independently to a
//! fixed address above that range.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::Config;
use crate::locate;
use crate::process::Cmd;

/// Base address allocator for the bulk DLL set (grows downward).
const BULK_BASE: &str = "0x60000000,DOWN";

/// Fixed base for msys-2.0.dll, above the bulk range.
const MSYS_RUNTIME_BASE: &str = "0x60100000";

/// Collect every DLL under `root` as a path relative to it,
/// deduplicated by file name.
///
/// msys-perl5_32.dll exists in both usr/bin and usr/lib/perl5; editbin
/// rejects an invocation naming the same DLL twice, so the first
/// discovered path wins. Traversal is sorted to keep the winner stable.
pub fn collect_dlls(root: &Path) -> Result<Vec<PathBuf>> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut dlls = Vec::new();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.with_context(|| format!("walking {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if !path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("dll"))
        {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if !seen.insert(name) {
            continue;
        }
        let rel = path
            .strip_prefix(root)
            .expect("walkdir yields paths under its root");
        dlls.push(rel.to_path_buf());
    }

    Ok(dlls)
}

/// Clear the read-only attribute so editbin can patch the file in place.
fn make_writable(path: &Path) -> Result<()> {
    let metadata =
        fs::metadata(path).with_context(|| format!("inspecting {}", path.display()))?;
    let mut permissions = metadata.permissions();
    if permissions.readonly() {
        #[allow(clippy::permissions_set_readonly_false)]
        permissions.set_readonly(false);
        fs::set_permissions(path, permissions)
            .with_context(|| format!("chmod {}", path.display()))?;
    }
    Ok(())
}

/// Rebase every DLL staged under the bundle's MSYS2 tree.
pub fn rebase_staged_dlls(config: &Config) -> Result<()> {
    let msys2 = config.msys2_dir();
    println!("\n=== Rebasing staged MSYS DLLs ===");

    let dlls = collect_dlls(&msys2)?;
    for dll in &dlls {
        make_writable(&msys2.join(dll))?;
    }

    let editbin = locate::editbin_exe(&config.msvc_path)?;

    // Bulk set first, with relative paths so the command line stays
    // well under the length limit.
    let mut cmd = Cmd::new(editbin.to_string_lossy().as_ref())
        .arg("/NOLOGO")
        .arg(format!("/REBASE:BASE={}", BULK_BASE))
        .arg("/DYNAMICBASE:NO")
        .current_dir(&msys2)
        .error_msg("editbin failed to rebase the staged DLLs");
    for dll in &dlls {
        cmd = cmd.arg_path(dll);
    }
    cmd.run()?;

    // msys-2.0.dll must sit at its own fixed base, independent of the
    // bulk allocation.
    let msys_runtime = config.msys2_usr_bin().join("msys-2.0.dll");
    Cmd::new(editbin.to_string_lossy().as_ref())
        .arg("/NOLOGO")
        .arg(format!("/REBASE:BASE={}", MSYS_RUNTIME_BASE))
        .arg("/DYNAMICBASE:NO")
        .arg_path(&msys_runtime)
        .error_msg("editbin failed to rebase msys-2.0.dll")
        .run()?;

    println!("rebased {} DLLs", dlls.len() + 1);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_collect_dlls_dedups_by_name_first_wins() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a")).unwrap();
        fs::create_dir_all(dir.path().join("b")).unwrap();
        fs::write(dir.path().join("a/msys-perl5_32.dll"), "x").unwrap();
        fs::write(dir.path().join("b/msys-perl5_32.dll"), "y").unwrap();

        let dlls = collect_dlls(dir.path()).unwrap();
        assert_eq!(dlls, vec![PathBuf::from("a/msys-perl5_32.dll")]);
    }

    #[test]
    fn test_collect_dlls_ignores_other_files() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("msys-2.0.dll"), "x").unwrap();
        fs::write(dir.path().join("bash.exe"), "x").unwrap();
        fs::write(dir.path().join("readme.txt"), "x").unwrap();

        let dlls = collect_dlls(dir.path()).unwrap();
        assert_eq!(dlls, vec![PathBuf::from("msys-2.0.dll")]);
    }

    #[test]
    fn test_collect_dlls_keeps_distinct_names() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("msys-crypto.dll"), "x").unwrap();
        fs::write(dir.path().join("msys-ssl.dll"), "x").unwrap();

        let dlls = collect_dlls(dir.path()).unwrap();
        assert_eq!(dlls.len(), 2);
    }

    #[test]
    fn test_make_writable_clears_readonly() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("msys-z.dll");
        fs::write(&file, "x").unwrap();
        let mut perms = fs::metadata(&file).unwrap().permissions();
        perms.set_readonly(true);
        fs::set_permissions(&file, perms).unwrap();

        make_writable(&file).unwrap();
        assert!(!fs::metadata(&file).unwrap().permissions().readonly());
    }
}
