//! Preflight checks for packaging prerequisites.
//!
//! Validates that the build host and the sources directory are complete
//! BEFORE any staging work starts: a missing bundled installer should
//! fail up front, not forty minutes into a pacman sync.

use crate::config::{bundled, Config};

/// Result of a single preflight check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    /// Name of the check
    pub name: String,
    /// Whether the check passed
    pub passed: bool,
    /// Human-readable message
    pub message: String,
    /// Optional suggestion for fixing the issue
    pub suggestion: Option<String>,
}

impl CheckResult {
    /// Create a passing check result.
    pub fn pass(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            message: message.into(),
            suggestion: None,
        }
    }

    /// Create a failing check result.
    pub fn fail(
        name: impl Into<String>,
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            passed: false,
            message: message.into(),
            suggestion: Some(suggestion.into()),
        }
    }

    /// Create a warning check result (passes but with a note).
    pub fn warn(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            message: message.into(),
            suggestion: None,
        }
    }
}

/// Comprehensive preflight report.
#[derive(Debug, Default)]
pub struct PreflightReport {
    /// All check results
    pub checks: Vec<CheckResult>,
}

impl PreflightReport {
    /// Check if all preflight checks passed.
    pub fn is_ok(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    /// Get all failing checks.
    pub fn errors(&self) -> Vec<&CheckResult> {
        self.checks.iter().filter(|c| !c.passed).collect()
    }

    /// Get count of passing checks.
    pub fn passed_count(&self) -> usize {
        self.checks.iter().filter(|c| c.passed).count()
    }

    /// Get total check count.
    pub fn total_count(&self) -> usize {
        self.checks.len()
    }

    /// Print a summary of the preflight checks.
    pub fn print_summary(&self) {
        println!("=== Preflight Check Results ===\n");

        for check in &self.checks {
            let status = if check.passed { "[OK]" } else { "[FAIL]" };
            println!("{} {}: {}", status, check.name, check.message);
            if let Some(suggestion) = &check.suggestion {
                println!("     Suggestion: {}", suggestion);
            }
        }

        println!();
        if self.is_ok() {
            println!(
                "All preflight checks passed ({}/{})",
                self.passed_count(),
                self.total_count()
            );
        } else {
            println!(
                "Preflight checks failed: {} of {} passed",
                self.passed_count(),
                self.total_count()
            );
        }
    }
}

/// Run all preflight checks against the resolved configuration.
pub fn run(config: &Config) -> PreflightReport {
    let mut report = PreflightReport::default();

    report.checks.push(check_reference_install(config));
    report.checks.extend(check_sources_layout(config));
    report.checks.extend(check_bundled_installers(config));
    report.checks.extend(check_build_tools(config));

    report
}

/// The reference MSYS2 installation must provide a working pacman.
fn check_reference_install(config: &Config) -> CheckResult {
    let pacman = config.ref_pacman();
    let curl = config.ref_curl();
    if !pacman.is_file() {
        CheckResult::fail(
            "reference MSYS2",
            format!("pacman not found at {}", pacman.display()),
            "install MSYS2 or pass --msys2-ref-path",
        )
    } else if !curl.is_file() {
        // An install without curl is usually truncated or very old.
        CheckResult::warn(
            "reference MSYS2",
            format!("{} found, but curl is missing", pacman.display()),
        )
    } else {
        CheckResult::pass("reference MSYS2", format!("{}", pacman.display()))
    }
}

/// The sources directory must carry its content, NSIS and installers
/// subtrees.
fn check_sources_layout(config: &Config) -> Vec<CheckResult> {
    let dirs = [
        ("sources/content", config.content_dir()),
        ("sources/nsis", config.nsis_src_dir()),
        ("sources/installers", config.installers_dir()),
    ];
    dirs.into_iter()
        .map(|(name, dir)| {
            if dir.is_dir() {
                CheckResult::pass(name, format!("{}", dir.display()))
            } else {
                CheckResult::fail(
                    name,
                    format!("missing directory {}", dir.display()),
                    "pass --sources-path pointing at a full sources checkout",
                )
            }
        })
        .collect()
}

/// Every pinned installer must be present; with `--fetch-tools` a
/// missing one only matters if upstream resolution falls back to it.
fn check_bundled_installers(config: &Config) -> Vec<CheckResult> {
    let names = [
        bundled::SEVEN_ZIP_MSI,
        bundled::NSIS_ZIP,
        bundled::UPX_ZIP,
        bundled::PYTHON_7Z,
        bundled::UNZIP_EXE,
        bundled::ZIP_ZIP,
        bundled::EMACS_TAR,
        bundled::KDIFF3_EXE,
        bundled::WATCHMAN_ZIP,
    ];
    names
        .into_iter()
        .map(|name| {
            let path = config.bundled_installer(name);
            if path.is_file() {
                CheckResult::pass(name, "bundled")
            } else if config.fetch_tools.enabled() {
                CheckResult::warn(name, "not bundled, relying on upstream fetch")
            } else {
                CheckResult::fail(
                    name,
                    format!("missing {}", path.display()),
                    "restore the bundled installer or enable --fetch-tools",
                )
            }
        })
        .collect()
}

/// Visual Studio and SDK binaries used for post-processing.
fn check_build_tools(config: &Config) -> Vec<CheckResult> {
    let mut checks = Vec::new();

    let mt = config.sdk_path.join("mt.exe");
    checks.push(if mt.is_file() {
        CheckResult::pass("mt.exe", format!("{}", mt.display()))
    } else {
        CheckResult::fail(
            "mt.exe",
            format!("not found at {}", mt.display()),
            "install the Windows 10 SDK or pass --win10-sdk-path",
        )
    });

    checks.push(if config.msvc_path.is_dir() {
        CheckResult::pass("Visual Studio", format!("{}", config.msvc_path.display()))
    } else {
        CheckResult::fail(
            "Visual Studio",
            format!("not found at {}", config.msvc_path.display()),
            "install Visual Studio with C++ tools or pass --msvc-path",
        )
    });

    let manifest = config.noprivs_manifest();
    checks.push(if manifest.is_file() {
        CheckResult::pass("noprivs.manifest", format!("{}", manifest.display()))
    } else {
        CheckResult::fail(
            "noprivs.manifest",
            format!("missing {}", manifest.display()),
            "pass --sources-path pointing at a full sources checkout",
        )
    });

    checks
}
