//! Hardcoded interpreter path rewriting.
//!
//! distutils bakes the absolute interpreter path of the build host into
//! every script it installs, which breaks the moment the bundle lands on
//! another machine. This step rewrites those hardcoded paths to a plain
//! `python3.exe` so the interpreter is resolved from the bundle's PATH.
//! pip offers no flag to override the behavior, so patching the
//! installed scripts is the only option.

use anyhow::Result;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// Generic invocation the hardcoded paths are rewritten to.
const GENERIC_INTERPRETER: &str = "python3.exe";

/// Replace every occurrence of `needle` in `haystack`, matching
/// ASCII-case-insensitively (Windows paths compare case-insensitively,
/// and installers disagree about drive letter casing).
pub fn replace_ignore_ascii_case(haystack: &str, needle: &str, replacement: &str) -> String {
    if needle.is_empty() {
        return haystack.to_string();
    }
    let lower_haystack = haystack.to_ascii_lowercase();
    let lower_needle = needle.to_ascii_lowercase();

    let mut result = String::with_capacity(haystack.len());
    let mut pos = 0;
    while let Some(found) = lower_haystack[pos..].find(&lower_needle) {
        let start = pos + found;
        result.push_str(&haystack[pos..start]);
        result.push_str(replacement);
        pos = start + needle.len();
    }
    result.push_str(&haystack[pos..]);
    result
}

/// Rewrite hardcoded interpreter paths in one file.
///
/// Executables are never touched, and neither is anything that is not
/// valid UTF-8 — both are binaries, not scripts. Returns whether the
/// file changed.
pub fn fix_file(path: &Path, hardcoded: &[String]) -> Result<bool> {
    if path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("exe"))
    {
        return Ok(false);
    }
    let bytes = fs::read(path)?;
    let Ok(content) = String::from_utf8(bytes) else {
        return Ok(false);
    };

    let mut rewritten = content.clone();
    for needle in hardcoded {
        rewritten = replace_ignore_ascii_case(&rewritten, needle, GENERIC_INTERPRETER);
    }

    if rewritten == content {
        return Ok(false);
    }
    fs::write(path, rewritten)?;
    Ok(true)
}

/// Rewrite hardcoded interpreter paths in every script under `dir`.
/// Returns the number of files changed.
pub fn fix_tree(dir: &Path, hardcoded: &[String]) -> Result<usize> {
    let mut fixed = 0;
    for entry in WalkDir::new(dir) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        if fix_file(entry.path(), hardcoded)? {
            fixed += 1;
        }
    }
    Ok(fixed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_replace_is_case_insensitive() {
        let result = replace_ignore_ascii_case(
            "#!c:\\python3\\python.exe\nrest",
            "C:\\python3\\python.exe",
            "python3.exe",
        );
        assert_eq!(result, "#!python3.exe\nrest");
    }

    #[test]
    fn test_replace_all_case_variants() {
        let text = "#!C:\\python3\\python.exe\necho c:\\PYTHON3\\PYTHON.EXE\n";
        let result = replace_ignore_ascii_case(text, "C:\\python3\\python.exe", "python3.exe");
        assert_eq!(result, "#!python3.exe\necho python3.exe\n");
    }

    #[test]
    fn test_replace_leaves_other_text() {
        let result = replace_ignore_ascii_case("no interpreters here", "python.exe", "x");
        assert_eq!(result, "no interpreters here");
    }

    #[test]
    fn test_fix_file_rewrites_script() {
        let dir = tempdir().unwrap();
        let script = dir.path().join("hg");
        fs::write(&script, "#!C:\\python3\\python.exe\nimport sys\n").unwrap();

        let targets = vec!["C:\\python3\\python.exe".to_string()];
        assert!(fix_file(&script, &targets).unwrap());
        assert_eq!(
            fs::read_to_string(&script).unwrap(),
            "#!python3.exe\nimport sys\n"
        );
    }

    #[test]
    fn test_fix_file_never_touches_exe() {
        let dir = tempdir().unwrap();
        let exe = dir.path().join("pip.exe");
        // Even with a matching path inside, an exe must stay untouched.
        fs::write(&exe, "C:\\python3\\python.exe").unwrap();

        let targets = vec!["C:\\python3\\python.exe".to_string()];
        assert!(!fix_file(&exe, &targets).unwrap());
        assert_eq!(fs::read_to_string(&exe).unwrap(), "C:\\python3\\python.exe");
    }

    #[test]
    fn test_fix_file_skips_binary_content() {
        let dir = tempdir().unwrap();
        let blob = dir.path().join("data");
        fs::write(&blob, [0xff, 0xfe, 0x00, 0x01]).unwrap();

        let targets = vec!["C:\\python3\\python.exe".to_string()];
        assert!(!fix_file(&blob, &targets).unwrap());
    }

    #[test]
    fn test_fix_tree_counts_changes() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a"), "#!C:\\python3\\python.exe\n").unwrap();
        fs::write(dir.path().join("b"), "nothing to do\n").unwrap();

        let targets = vec!["C:\\python3\\python.exe".to_string()];
        assert_eq!(fix_tree(dir.path(), &targets).unwrap(), 1);
    }
}
