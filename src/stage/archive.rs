//! Archive extraction into the staging tree.
//!
//! Three archive families show up among the bundled installers:
//! 7z-compatible archives (7z, zip, self-extracting exe) extracted with
//! the staged `7z.exe`, tarballs handed to `tar`, and MSI packages
//! staged through an msiexec administrative install.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::process::Cmd;

/// How a given archive gets extracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArchiveKind {
    /// 7z, zip or a self-extracting installer exe.
    SevenZip,
    /// Any `tar.*` flavor; tar detects the compression itself.
    Tar,
    /// Windows installer package.
    Msi,
}

impl ArchiveKind {
    fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_lowercase();
        if lower.contains(".tar.") || lower.ends_with(".tar") {
            return Some(ArchiveKind::Tar);
        }
        match lower.rsplit_once('.').map(|(_, ext)| ext) {
            Some("7z") | Some("zip") | Some("exe") => Some(ArchiveKind::SevenZip),
            Some("msi") => Some(ArchiveKind::Msi),
            _ => None,
        }
    }
}

/// File name of `path` without its final extension
/// ("nsis-3.08.zip" -> "nsis-3.08").
pub fn archive_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Extract `archive` into `dest`, returning the conventional extracted
/// folder (`dest/<archive stem>`).
///
/// Archives that unpack into the destination itself (UPX, NSIS zips
/// carrying a top-level folder) make the returned path meaningful;
/// callers that extract flat simply ignore it.
pub fn unpack(seven_zip: &Path, archive: &Path, dest: &Path) -> Result<PathBuf> {
    let name = archive
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let kind = match ArchiveKind::from_name(&name) {
        Some(kind) => kind,
        None => bail!("don't know how to unpack {}", archive.display()),
    };

    println!("unpack: {} -> {}", archive.display(), dest.display());
    fs::create_dir_all(dest).with_context(|| format!("creating {}", dest.display()))?;

    match kind {
        ArchiveKind::SevenZip => {
            let mut cmd = Cmd::new(seven_zip.to_string_lossy().as_ref())
                .args(["x", "-y"])
                .arg_path(archive)
                .arg(format!("-o{}", dest.display()));
            // Self-extracting installers carry setup metadata under $*
            // that must not land in the bundle.
            if name.to_lowercase().ends_with(".exe") {
                cmd = cmd.arg("-x!$*");
            }
            cmd.error_msg(format!("7z extraction of {} failed", archive.display()))
                .run()?;
        }
        ArchiveKind::Tar => {
            Cmd::new("tar")
                .arg("xf")
                .arg_path(archive)
                .arg("-C")
                .arg_path(dest)
                .error_msg(format!("tar extraction of {} failed", archive.display()))
                .run()?;
        }
        ArchiveKind::Msi => {
            msi_admin_extract(archive, dest)?;
        }
    }

    Ok(dest.join(archive_stem(archive)))
}

/// Stage an MSI through an administrative install point.
///
/// A silent install would register shell extensions and registry state
/// on the build host; `/a` only materializes the package's files.
pub fn msi_admin_extract(msi: &Path, target: &Path) -> Result<()> {
    fs::create_dir_all(target).with_context(|| format!("creating {}", target.display()))?;
    Cmd::new("msiexec.exe")
        .args(["/q", "/a"])
        .arg_path(msi)
        .arg(format!("TARGETDIR={}", target.display()))
        .error_msg(format!("administrative install of {} failed", msi.display()))
        .run()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(
            ArchiveKind::from_name("python-3.10.4.7z"),
            Some(ArchiveKind::SevenZip)
        );
        assert_eq!(
            ArchiveKind::from_name("nsis-3.08.zip"),
            Some(ArchiveKind::SevenZip)
        );
        assert_eq!(
            ArchiveKind::from_name("unz600xN.exe"),
            Some(ArchiveKind::SevenZip)
        );
        assert_eq!(
            ArchiveKind::from_name("emacs-26.3-x86_64-no-deps.tar.lzma"),
            Some(ArchiveKind::Tar)
        );
        assert_eq!(
            ArchiveKind::from_name("7z2107-x64.msi"),
            Some(ArchiveKind::Msi)
        );
        assert_eq!(ArchiveKind::from_name("README.md"), None);
    }

    #[test]
    fn test_archive_stem() {
        assert_eq!(archive_stem(Path::new("/a/nsis-3.08.zip")), "nsis-3.08");
        assert_eq!(
            archive_stem(Path::new("upx-3.96-win64.zip")),
            "upx-3.96-win64"
        );
    }
}
