//! Filesystem helpers shared by the staging steps.
//!
//! Thin wrappers over `std::fs` that log what they do in the same
//! `task: src -> dst` style the rest of the packager uses, plus the
//! explicit best-effort [`remove_if_exists`] used for optional cleanup.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Copy `src` into the directory `dst_dir`, creating it if needed.
///
/// `rename` overrides the destination file name (used e.g. to install
/// `python.exe` as `python3.exe`).
pub fn copy_to(src: &Path, dst_dir: &Path, rename: Option<&str>) -> Result<PathBuf> {
    let name = match rename {
        Some(name) => name.to_string(),
        None => src
            .file_name()
            .with_context(|| format!("no file name in {}", src.display()))?
            .to_string_lossy()
            .into_owned(),
    };
    let dst = dst_dir.join(&name);

    fs::create_dir_all(dst_dir)
        .with_context(|| format!("creating {}", dst_dir.display()))?;
    println!("copy: {} -> {}", src.display(), dst.display());
    fs::copy(src, &dst)
        .with_context(|| format!("copying {} -> {}", src.display(), dst.display()))?;
    Ok(dst)
}

/// Recursively copy a directory tree.
pub fn copy_dir(src: &Path, dst: &Path) -> Result<()> {
    println!("copy -r: {} -> {}", src.display(), dst.display());
    for entry in WalkDir::new(src) {
        let entry = entry.with_context(|| format!("walking {}", src.display()))?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .expect("walkdir yields paths under its root");
        let target = dst.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
                .with_context(|| format!("creating {}", target.display()))?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target).with_context(|| {
                format!("copying {} -> {}", entry.path().display(), target.display())
            })?;
        }
    }
    Ok(())
}

/// Remove a file if present. Returns whether anything was removed.
///
/// This is the explicit form of "best-effort cleanup": a missing file is
/// a normal outcome, not an error to swallow.
pub fn remove_if_exists(path: &Path) -> bool {
    match fs::remove_file(path) {
        Ok(()) => {
            println!("remove: {}", path.display());
            true
        }
        Err(_) => false,
    }
}

/// Read a file into a string, trimming the trailing newline.
pub fn read_trimmed(path: &Path) -> Result<String> {
    let content =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(content.trim_end_matches(['\n', '\r']).to_string())
}

/// Write a string to a file, creating parent directories.
pub fn write_contents(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    fs::write(path, contents).with_context(|| format!("writing {}", path.display()))
}

/// Rewrite a text file through a callback.
pub fn edit_file(path: &Path, edit: impl FnOnce(&str) -> String) -> Result<()> {
    let content =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    fs::write(path, edit(&content)).with_context(|| format!("writing {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_copy_to_with_rename() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("python.exe");
        fs::write(&src, b"binary").unwrap();

        let dst_dir = dir.path().join("py3");
        let dst = copy_to(&src, &dst_dir, Some("python3.exe")).unwrap();

        assert_eq!(dst, dst_dir.join("python3.exe"));
        assert_eq!(fs::read(&dst).unwrap(), b"binary");
    }

    #[test]
    fn test_copy_dir_recursive() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("nested")).unwrap();
        fs::write(src.join("a.txt"), "a").unwrap();
        fs::write(src.join("nested/b.txt"), "b").unwrap();

        let dst = dir.path().join("dst");
        copy_dir(&src, &dst).unwrap();

        assert_eq!(fs::read_to_string(dst.join("a.txt")).unwrap(), "a");
        assert_eq!(fs::read_to_string(dst.join("nested/b.txt")).unwrap(), "b");
    }

    #[test]
    fn test_remove_if_exists() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("07-pacman-key.post");
        fs::write(&file, "").unwrap();

        assert!(remove_if_exists(&file));
        assert!(!remove_if_exists(&file));
    }

    #[test]
    fn test_read_trimmed() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("VERSION");
        fs::write(&file, "4.0.2\n").unwrap();
        assert_eq!(read_trimmed(&file).unwrap(), "4.0.2");
    }

    #[test]
    fn test_edit_file() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("license.rtf");
        fs::write(&file, "MozillaBuild @VERSION@").unwrap();

        edit_file(&file, |text| text.replace("@VERSION@", "4.0.2")).unwrap();
        assert_eq!(fs::read_to_string(&file).unwrap(), "MozillaBuild 4.0.2");
    }
}
