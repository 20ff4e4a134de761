//! Run configuration for the packager.
//!
//! All paths and flags are resolved once at startup (CLI arguments plus
//! host lookups) into an immutable [`Config`] that every staging step
//! receives by reference. Nothing reads globals or the environment after
//! this point, so each step's dependencies are explicit and testable.

use std::env;
use std::path::PathBuf;

/// Whether to refresh bundled tool installers from upstream, and whether
/// the download cache may be reused while doing so.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchTools {
    /// Use only the installers bundled in the sources directory.
    Off,
    /// Fetch latest upstream installers, reusing the ETag cache.
    WithCache,
    /// Fetch latest upstream installers after wiping the cache.
    WithoutCache,
}

impl FetchTools {
    /// Whether upstream fetching is enabled at all.
    pub fn enabled(self) -> bool {
        self != FetchTools::Off
    }

    /// Whether the existing download cache should be kept.
    pub fn keep_cache(self) -> bool {
        self != FetchTools::WithoutCache
    }
}

/// File names of the installers bundled under `sources/installers/`.
///
/// These are the pinned fallbacks used when `--fetch-tools` is off or an
/// upstream release has no matching asset.
pub mod bundled {
    pub const SEVEN_ZIP_MSI: &str = "7z2107-x64.msi";
    pub const NSIS_ZIP: &str = "nsis-3.08.zip";
    pub const UPX_ZIP: &str = "upx-3.96-win64.zip";
    pub const PYTHON_7Z: &str = "python-3.10.4.7z";
    pub const UNZIP_EXE: &str = "unz600xN.exe";
    pub const ZIP_ZIP: &str = "zip300xN.zip";
    pub const EMACS_TAR: &str = "emacs-26.3-x86_64-no-deps.tar.lzma";
    pub const KDIFF3_EXE: &str = "KDiff3-32bit-Setup_0.9.98.exe";
    pub const WATCHMAN_ZIP: &str = "watchman-v2021.01.11.00.zip";
}

/// Immutable packaging run configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Source directory with bundled installers, content files and NSIS
    /// scripts.
    pub src_path: PathBuf,
    /// Reference MSYS2 installation on the build host (provides pacman
    /// and curl).
    pub ref_path: PathBuf,
    /// Staging output directory; the installer is produced here.
    pub out_path: PathBuf,
    /// Visual Studio installation (provides editbin for DLL rebasing).
    pub msvc_path: PathBuf,
    /// Windows 10 SDK binary directory (provides mt for manifest
    /// embedding).
    pub sdk_path: PathBuf,
    /// Download directory holding fetched artifacts and the ETag cache.
    pub download_path: PathBuf,
    /// Download MSYS2 package sources into the staging tree.
    pub fetch_sources: bool,
    /// Refresh bundled tool installers from upstream releases.
    pub fetch_tools: FetchTools,
    /// Bundle pacman (and its mirror lists) from the MSYS2 base repo.
    pub msys_pacman: bool,
    /// Bundle zip, unzip and UPX from the MSYS2 base repo instead of
    /// the standalone installers.
    pub msys_extra: bool,
    /// Bundle development libraries (icu, libffi, libevent, zlib).
    pub msys_devel: bool,
    /// Product version, read from the VERSION file.
    pub version: String,
}

impl Config {
    // Sources layout.

    /// Bundled installer archives.
    pub fn installers_dir(&self) -> PathBuf {
        self.src_path.join("installers")
    }

    /// Loose content files copied into the bundle (nsinstall, winrm,
    /// shell config).
    pub fn content_dir(&self) -> PathBuf {
        self.src_path.join("content")
    }

    /// NSIS script sources (install script, license, artwork).
    pub fn nsis_src_dir(&self) -> PathBuf {
        self.src_path.join("nsis")
    }

    /// Path of a bundled installer by file name.
    pub fn bundled_installer(&self, name: &str) -> PathBuf {
        self.installers_dir().join(name)
    }

    /// The bundled vswhere helper, used to locate Visual Studio.
    pub fn vswhere_exe(&self) -> PathBuf {
        self.src_path.join("vswhere.exe")
    }

    /// UAC manifest embedded into every staged executable.
    pub fn noprivs_manifest(&self) -> PathBuf {
        self.src_path.join("noprivs.manifest")
    }

    // Download cache layout.

    /// ETag token directory inside the download cache.
    pub fn etag_dir(&self) -> PathBuf {
        self.download_path.join("cache")
    }

    // Staging layout.

    /// Root of the bundle being assembled.
    pub fn moz_dir(&self) -> PathBuf {
        self.out_path.join("mozilla-build")
    }

    /// Runtime bin directory of the bundle.
    pub fn bin_dir(&self) -> PathBuf {
        self.moz_dir().join("bin")
    }

    /// Embedded Python 3 tree.
    pub fn python_dir(&self) -> PathBuf {
        self.moz_dir().join("python3")
    }

    /// Python Scripts directory (pip-installed entry points).
    pub fn python_scripts_dir(&self) -> PathBuf {
        self.python_dir().join("Scripts")
    }

    /// The staged Python interpreter.
    pub fn python3_exe(&self) -> PathBuf {
        self.python_dir().join("python3.exe")
    }

    /// The staged 7z binary, used by the archive unpacker once 7-Zip has
    /// been staged.
    pub fn seven_zip_exe(&self) -> PathBuf {
        self.bin_dir().join("7z.exe")
    }

    /// Alternate-root MSYS2 installation inside the bundle.
    pub fn msys2_dir(&self) -> PathBuf {
        self.moz_dir().join("msys2")
    }

    pub fn msys2_etc(&self) -> PathBuf {
        self.msys2_dir().join("etc")
    }

    pub fn msys2_usr(&self) -> PathBuf {
        self.msys2_dir().join("usr")
    }

    pub fn msys2_usr_bin(&self) -> PathBuf {
        self.msys2_usr().join("bin")
    }

    // Reference installation binaries.

    /// pacman from the reference MSYS2 install.
    pub fn ref_pacman(&self) -> PathBuf {
        self.ref_path.join("usr").join("bin").join("pacman.exe")
    }

    /// curl from the reference MSYS2 install.
    pub fn ref_curl(&self) -> PathBuf {
        self.ref_path.join("usr").join("bin").join("curl.exe")
    }

    /// PATH value for subprocesses that need the reference MSYS2 tools
    /// (pacman post-install scripts resolve their shell through it).
    pub fn ref_search_path(&self) -> String {
        let ref_bin = self.ref_path.join("usr").join("bin");
        let current = env::var_os("PATH").unwrap_or_default();
        let mut paths = vec![ref_bin.clone()];
        paths.extend(env::split_paths(&current));
        env::join_paths(paths)
            .map(|joined| joined.to_string_lossy().into_owned())
            .unwrap_or_else(|_| ref_bin.to_string_lossy().into_owned())
    }

    /// Hardcoded interpreter paths rewritten by the shebang fix.
    ///
    /// Installers on the build host bake in either the conventional
    /// `C:\python3` location or the staged interpreter's absolute path.
    pub fn hardcoded_interpreters(&self) -> Vec<String> {
        vec![
            "C:\\python3\\python.exe".to_string(),
            self.python3_exe().to_string_lossy().into_owned(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn test_config() -> Config {
        Config {
            src_path: PathBuf::from("/work/sources"),
            ref_path: PathBuf::from("/msys64"),
            out_path: PathBuf::from("/work/stage"),
            msvc_path: PathBuf::from("/vs"),
            sdk_path: PathBuf::from("/sdk"),
            download_path: PathBuf::from("/work/downloaded"),
            fetch_sources: false,
            fetch_tools: FetchTools::Off,
            msys_pacman: false,
            msys_extra: false,
            msys_devel: false,
            version: "4.0.2".to_string(),
        }
    }

    #[test]
    fn test_staging_layout() {
        let config = test_config();
        let moz = Path::new("/work/stage/mozilla-build");
        assert_eq!(config.moz_dir(), moz);
        assert_eq!(config.bin_dir(), moz.join("bin"));
        assert_eq!(config.python_dir(), moz.join("python3"));
        assert_eq!(config.python_scripts_dir(), moz.join("python3/Scripts"));
        assert_eq!(config.msys2_usr_bin(), moz.join("msys2/usr/bin"));
    }

    #[test]
    fn test_reference_binaries() {
        let config = test_config();
        assert_eq!(config.ref_pacman(), Path::new("/msys64/usr/bin/pacman.exe"));
        assert_eq!(config.ref_curl(), Path::new("/msys64/usr/bin/curl.exe"));
    }

    #[test]
    fn test_bundled_installer_paths() {
        let config = test_config();
        assert_eq!(
            config.bundled_installer(bundled::SEVEN_ZIP_MSI),
            Path::new("/work/sources/installers/7z2107-x64.msi")
        );
        assert_eq!(
            config.bundled_installer(bundled::NSIS_ZIP),
            Path::new("/work/sources/installers/nsis-3.08.zip")
        );
    }

    #[test]
    fn test_fetch_tools_modes() {
        assert!(!FetchTools::Off.enabled());
        assert!(FetchTools::WithCache.enabled());
        assert!(FetchTools::WithCache.keep_cache());
        assert!(FetchTools::WithoutCache.enabled());
        assert!(!FetchTools::WithoutCache.keep_cache());
    }

    #[test]
    fn test_hardcoded_interpreters_include_staged_path() {
        let config = test_config();
        let targets = config.hardcoded_interpreters();
        assert_eq!(targets.len(), 2);
        assert!(targets[0].ends_with("python.exe"));
        assert!(targets[1].contains("python3"));
    }
}
