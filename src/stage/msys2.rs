//! MSYS2 staging: alternate-root package sync and bundle configuration.
//!
//! The reference installation's pacman is pointed at the bundle's msys2
//! directory with `--root`, which materializes a fresh MSYS2 tree
//! without touching the host install. The core set (runtime + shell)
//! goes in first so the post-install scripts of everything that follows
//! can run.

use anyhow::{Context, Result};
use std::fs;

use crate::config::{bundled, Config};
use crate::download::Downloader;
use crate::fsutil;
use crate::process::{Cmd, CmdOutput};
use crate::stage::archive;

/// Base URL package sources are published under.
const MSYS_SOURCES_URL: &str = "https://repo.msys2.org/msys/sources";

/// Packages whose post-install scripts may require a shell restart;
/// synced before everything else.
const CORE_PACKAGES: &[&str] = &["msys2-runtime", "bash"];

/// The package manager itself, bundled only with `--msys-pacman`.
const PACMAN_PACKAGES: &[&str] = &["pacman", "pacman-mirrors"];

/// The required tool set of the bundle.
const REQUIRED_PACKAGES: &[&str] = &[
    "bash-completion",
    "diffutils",
    "ed",
    "file",
    "filesystem",
    "gawk",
    "grep",
    "m4",
    "man-db",
    "mintty",
    "nano",
    "openssh",
    "patch",
    "perl",
    "tar",
    "vim",
    "wget",
];

/// Packages pulled in as pacman dependencies when pacman is bundled;
/// listed explicitly otherwise.
const PACMAN_DEP_PACKAGES: &[&str] = &[
    "bzip2",
    "ca-certificates",
    "coreutils",
    "findutils",
    "gzip",
    "info",
    "less",
    "sed",
    "which",
    "xz",
    "zstd",
];

/// Extras available in the base repo (`--msys-extra`); replaces the
/// standalone Info-Zip and UPX staging.
const EXTRA_PACKAGES: &[&str] = &["zip", "unzip", "upx"];

/// Development libraries (`--msys-devel`), for building against system
/// libraries.
const DEVEL_PACKAGES: &[&str] = &[
    "pkgconf",
    "icu-devel",
    "libevent-devel",
    "libffi-devel",
    "zlib-devel",
];

/// The first sync batch: runtime and shell, plus pacman when bundled.
pub fn core_set(config: &Config) -> Vec<&'static str> {
    let mut packages = CORE_PACKAGES.to_vec();
    if config.msys_pacman {
        packages.extend_from_slice(PACMAN_PACKAGES);
    }
    packages
}

/// The second sync batch: required tools plus the opted-in sets.
pub fn required_set(config: &Config) -> Vec<&'static str> {
    let mut packages = REQUIRED_PACKAGES.to_vec();
    if !config.msys_pacman {
        packages.extend_from_slice(PACMAN_DEP_PACKAGES);
    }
    if config.msys_extra {
        packages.extend_from_slice(EXTRA_PACKAGES);
    }
    if config.msys_devel {
        packages.extend_from_slice(DEVEL_PACKAGES);
    }
    packages
}

/// Run the reference pacman against the bundle's MSYS2 root.
///
/// The reference `usr/bin` is prepended to PATH so post-install scripts
/// can find their shell.
fn pacman(config: &Config, op: &[&str], packages: &[&str]) -> Result<CmdOutput> {
    Cmd::new(config.ref_pacman().to_string_lossy().as_ref())
        .arg("--root")
        .arg_path(&config.msys2_dir())
        .args(op.iter().copied())
        .args(packages.iter().copied())
        .env("PATH", config.ref_search_path())
        .error_msg("pacman failed against the staging root")
        .run()
}

/// Interactive variant for the long sync runs (progress is worth
/// seeing live).
fn pacman_interactive(config: &Config, op: &[&str], packages: &[&str]) -> Result<()> {
    Cmd::new(config.ref_pacman().to_string_lossy().as_ref())
        .arg("--root")
        .arg_path(&config.msys2_dir())
        .args(op.iter().copied())
        .args(packages.iter().copied())
        .env("PATH", config.ref_search_path())
        .error_msg("pacman failed against the staging root")
        .run_interactive()
}

/// Create the directory skeleton pacman expects in a fresh root.
pub fn create_layout(config: &Config) -> Result<()> {
    let msys2 = config.msys2_dir();
    for dir in ["tmp", "var/lib/pacman", "var/log"] {
        fs::create_dir_all(msys2.join(dir))
            .with_context(|| format!("creating {}", msys2.join(dir).display()))?;
    }
    Ok(())
}

/// Sync the MSYS2 package sets into the bundle.
pub fn sync_packages(config: &Config) -> Result<()> {
    println!("\n=== Syncing base MSYS2 components ===");
    create_layout(config)?;

    let sync = ["--sync", "--refresh", "--noconfirm"];

    let core = core_set(config);
    println!(
        "\nSyncing core{} MSYS2 packages...",
        if config.msys_pacman { " + pacman" } else { "" }
    );
    pacman_interactive(config, &sync, &core)?;

    let required = required_set(config);
    let mut label = String::from("required");
    if config.msys_extra {
        label.push_str(" + extra");
    }
    if config.msys_devel {
        label.push_str(" + devel");
    }
    println!("\nSyncing {} MSYS2 packages...", label);
    pacman_interactive(config, &sync, &required)?;

    Ok(())
}

/// Parse `pacman --query` output into (name, version) pairs.
pub fn parse_package_list(output: &str) -> Vec<(String, String)> {
    output
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let name = parts.next()?;
            let version = parts.next()?;
            Some((name.to_string(), version.to_string()))
        })
        .collect()
}

/// Download the source tarball of every synced package into the staging
/// tree (`--fetch-sources`).
pub async fn fetch_package_sources(config: &Config, dl: &Downloader) -> Result<()> {
    println!("\n=== Downloading MSYS2 package sources ===");
    let sources_dir = config.out_path.join("sources");
    fs::create_dir_all(&sources_dir)
        .with_context(|| format!("creating {}", sources_dir.display()))?;

    let installed = pacman(config, &["--query"], &[])?;
    for (name, version) in parse_package_list(&installed.stdout) {
        let tarball = format!("{}-{}.src.tar.gz", name, version);
        let url = format!("{}/{}", MSYS_SOURCES_URL, tarball);
        dl.fetch(&url, &sources_dir.join(&tarball)).await?;
    }
    Ok(())
}

/// Unpack the no-deps emacs build into the MSYS2 usr tree.
pub fn stage_emacs(config: &Config) -> Result<()> {
    println!("\n=== Staging emacs ===");
    archive::unpack(
        &config.seven_zip_exe(),
        &config.bundled_installer(bundled::EMACS_TAR),
        &config.msys2_usr(),
    )?;
    Ok(())
}

/// Replace the MSYS rm with winrm.
///
/// winrm handles Windows file locking far more gracefully; the original
/// rm stays available as rm-msys.exe.
pub fn replace_rm(config: &Config) -> Result<()> {
    println!("\n=== Replacing MSYS rm with winrm ===");
    let usr_bin = config.msys2_usr_bin();
    let winrm = config.content_dir().join("winrm.exe");

    fsutil::copy_to(&usr_bin.join("rm.exe"), &usr_bin, Some("rm-msys.exe"))?;
    fsutil::copy_to(&winrm, &usr_bin, Some("rm.exe"))?;
    fsutil::copy_to(&winrm, &usr_bin, Some("winrm.exe"))?;
    Ok(())
}

/// Write the MSYS configuration the bundle ships with.
pub fn configure(config: &Config) -> Result<()> {
    println!("\n=== Configuring staged MSYS ===");

    // db_home: "~" resolves to %USERPROFILE%.
    // db_gecos: user names come from AD/SAM.
    fsutil::write_contents(
        &config.msys2_etc().join("nsswitch.conf"),
        "db_home: windows\ndb_gecos: windows\n",
    )?;

    // vi/vim wrapper.
    fsutil::write_contents(
        &config.msys2_usr_bin().join("vi"),
        "#!/bin/sh\nexec vim \"$@\"\n",
    )?;

    let post_install = config.msys2_etc().join("post-install");
    if !config.msys_pacman {
        // No package manager in the bundle means its key management
        // setup would only error at first launch.
        fsutil::remove_if_exists(&post_install.join("07-pacman-key.post"));
    }
    // The xmlcatalog binary is not installed.
    fsutil::remove_if_exists(&post_install.join("08-xml-catalog.post"));

    Ok(())
}

/// Copy the remaining configuration files into the bundle.
pub fn copy_config_files(config: &Config) -> Result<()> {
    println!("\n=== Copying configuration files ===");
    let content = config.content_dir();
    let etc = config.msys2_etc();

    fsutil::write_contents(
        &config.moz_dir().join("VERSION"),
        &format!("{}\n", config.version),
    )?;
    fsutil::copy_to(&etc.join("skel").join(".inputrc"), &etc, Some("inputrc"))?;
    fsutil::copy_to(
        &content.join("mercurial.ini"),
        &config.python_scripts_dir(),
        None,
    )?;
    fsutil::copy_to(&content.join("start-shell.bat"), &config.moz_dir(), None)?;
    fsutil::copy_to(
        &content.join("msys-config").join("ssh_config"),
        &etc.join("ssh"),
        None,
    )?;
    fsutil::copy_to(
        &content.join("msys-config").join("profile-mozilla.sh"),
        &etc.join("profile.d"),
        None,
    )?;
    Ok(())
}

/// Install bash completion helpers for hg, git and pip.
pub async fn install_completions(config: &Config, dl: &Downloader) -> Result<()> {
    println!("\n=== Installing bash-completion helpers ===");
    let completions = config
        .msys2_usr()
        .join("share")
        .join("bash-completion")
        .join("completions");

    dl.fetch(
        "https://www.mercurial-scm.org/repo/hg/raw-file/tip/contrib/bash_completion",
        &completions.join("hg"),
    )
    .await?;
    dl.fetch(
        "https://raw.githubusercontent.com/git/git/master/contrib/completion/git-completion.bash",
        &completions.join("git"),
    )
    .await?;

    // pip generates its own completion script.
    let pip = Cmd::new(config.python3_exe().to_string_lossy().as_ref())
        .args(["-m", "pip", "completion", "--bash"])
        .error_msg("pip completion generation failed")
        .run()?;
    let pip_completion = completions.join("pip");
    fsutil::write_contents(&pip_completion, &pip.stdout)?;
    crate::stage::shebang::fix_file(&pip_completion, &config.hardcoded_interpreters())?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FetchTools;
    use std::path::PathBuf;

    fn test_config(pacman: bool, extra: bool, devel: bool) -> Config {
        Config {
            src_path: PathBuf::from("/work/sources"),
            ref_path: PathBuf::from("/msys64"),
            out_path: PathBuf::from("/work/stage"),
            msvc_path: PathBuf::from("/vs"),
            sdk_path: PathBuf::from("/sdk"),
            download_path: PathBuf::from("/work/downloaded"),
            fetch_sources: false,
            fetch_tools: FetchTools::Off,
            msys_pacman: pacman,
            msys_extra: extra,
            msys_devel: devel,
            version: "4.0.2".to_string(),
        }
    }

    #[test]
    fn test_core_set_without_pacman() {
        let packages = core_set(&test_config(false, false, false));
        assert_eq!(packages, vec!["msys2-runtime", "bash"]);
    }

    #[test]
    fn test_core_set_with_pacman() {
        let packages = core_set(&test_config(true, false, false));
        assert!(packages.contains(&"pacman"));
        assert!(packages.contains(&"pacman-mirrors"));
    }

    #[test]
    fn test_required_set_lists_pacman_deps_when_pacman_absent() {
        let packages = required_set(&test_config(false, false, false));
        // Without pacman nothing pulls these in as dependencies.
        assert!(packages.contains(&"coreutils"));
        assert!(packages.contains(&"sed"));
    }

    #[test]
    fn test_required_set_skips_pacman_deps_when_pacman_bundled() {
        let packages = required_set(&test_config(true, false, false));
        assert!(!packages.contains(&"coreutils"));
        assert!(packages.contains(&"perl"));
    }

    #[test]
    fn test_required_set_extras_and_devel() {
        let packages = required_set(&test_config(false, true, true));
        assert!(packages.contains(&"upx"));
        assert!(packages.contains(&"pkgconf"));
        assert!(packages.contains(&"zlib-devel"));
    }

    #[test]
    fn test_parse_package_list() {
        let output = "bash 5.1.008-1\nmsys2-runtime 3.3.4-2\n";
        let packages = parse_package_list(output);
        assert_eq!(
            packages,
            vec![
                ("bash".to_string(), "5.1.008-1".to_string()),
                ("msys2-runtime".to_string(), "3.3.4-2".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_package_list_skips_malformed_lines() {
        let packages = parse_package_list("orphan\n\nname version\n");
        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].0, "name");
    }
}
