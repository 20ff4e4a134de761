//! Python 3 staging.
//!
//! The bundled archive is the result of running the upstream installer
//! in a sandbox (`<installer> /passive TargetDir=c:\python3
//! Include_launcher=0 Include_test=0 CompileAll=1 Shortcuts=0`) and
//! repacking the resulting tree with 7-Zip; a fully isolated install on
//! the build host is not possible without polluting its registry.

use anyhow::Result;

use crate::config::{bundled, Config};
use crate::fsutil;
use crate::process::Cmd;
use crate::stage::{archive, shebang};

/// Packages upgraded inside the staged interpreter.
const PIP_PACKAGES: &[&str] = &["pip", "setuptools", "mercurial", "windows-curses"];

/// Stage the embedded Python 3 tree and its packages.
pub fn stage_python(config: &Config) -> Result<()> {
    println!("\n=== Staging Python 3 and extra packages ===");

    let installer = config.bundled_installer(bundled::PYTHON_7Z);
    archive::unpack(&config.seven_zip_exe(), &installer, &config.python_dir())?;

    // The bundle invokes the interpreter as python3.exe.
    fsutil::copy_to(
        &config.python_dir().join("python.exe"),
        &config.python_dir(),
        Some("python3.exe"),
    )?;

    upgrade_pip_packages(config)?;
    fix_script_shebangs(config)?;

    Ok(())
}

/// Upgrade pip and install the bundled Python packages.
fn upgrade_pip_packages(config: &Config) -> Result<()> {
    println!("\nUpdating pip packages...");
    Cmd::new(config.python3_exe().to_string_lossy().as_ref())
        .args(["-m", "pip", "install"])
        .args(["--ignore-installed", "--upgrade", "--no-warn-script-location"])
        .args(PIP_PACKAGES.iter().copied())
        .error_msg("pip package installation failed")
        .run_interactive()
}

/// Rewrite the interpreter paths distutils hardcoded into Scripts/.
fn fix_script_shebangs(config: &Config) -> Result<()> {
    println!("\nFixing distutils shebangs...");
    let fixed = shebang::fix_tree(
        &config.python_scripts_dir(),
        &config.hardcoded_interpreters(),
    )?;
    println!("rewrote {} scripts", fixed);
    Ok(())
}
