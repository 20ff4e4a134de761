//! Installer packaging with NSIS.
//!
//! The final step: the assembled mozilla-build tree is wrapped into a
//! self-extracting installer by makensis, driven by the install script
//! from the sources.

use anyhow::Result;
use std::path::Path;

use crate::config::{bundled, Config};
use crate::download::Downloader;
use crate::fsutil;
use crate::process::Cmd;
use crate::release::winget;
use crate::stage::archive;

/// Substitute the product version into a script or license text.
pub fn substitute_version(text: &str, version: &str) -> String {
    text.replace("@VERSION@", version)
}

/// Map the winget-listed setup executable to the portable zip published
/// alongside it. The setup executable cannot be unpacked in place.
fn setup_exe_to_zip(url: &str) -> String {
    winget::sourceforge_direct(url).replace("-setup.exe", ".zip")
}

/// Resolve the NSIS distribution, unpack it and build the installer.
pub async fn package_installer(config: &Config, dl: &Downloader) -> Result<()> {
    let mut installer = config.bundled_installer(bundled::NSIS_ZIP);
    if config.fetch_tools.enabled() {
        println!("\n=== Fetching latest NSIS ===");
        if let Some(fetched) = winget::latest_installer(
            dl,
            "NSIS",
            "NSIS",
            |candidate| candidate.is_arch("x86"),
            setup_exe_to_zip,
        )
        .await?
        {
            installer = fetched;
        }
    }

    println!("\n=== Packaging the installer ===");
    let nsis_dir = archive::unpack(&config.seven_zip_exe(), &installer, &config.out_path)?;

    stage_scripts(config)?;
    run_makensis(config, &nsis_dir)
}

/// Copy the NSIS inputs into the staging directory, substituting the
/// product version where the scripts expect it.
fn stage_scripts(config: &Config) -> Result<()> {
    let nsis_src = config.nsis_src_dir();
    let out = &config.out_path;

    for name in ["setup.ico", "helpers.nsi", "mozillabuild.bmp"] {
        fsutil::copy_to(&nsis_src.join(name), out, None)?;
    }

    // The license is shown by the installer and also shipped in the
    // bundle itself.
    let license = fsutil::copy_to(&nsis_src.join("license.rtf"), out, None)?;
    fsutil::edit_file(&license, |text| substitute_version(text, &config.version))?;
    fsutil::copy_to(&license, &config.moz_dir(), None)?;

    let script = fsutil::copy_to(&nsis_src.join("installit.nsi"), out, None)?;
    fsutil::edit_file(&script, |text| substitute_version(text, &config.version))?;

    Ok(())
}

/// Run makensis over the staged install script.
fn run_makensis(config: &Config, nsis_dir: &Path) -> Result<()> {
    let makensis = nsis_dir.join("makensis.exe");
    Cmd::new(makensis.to_string_lossy().as_ref())
        .arg("/NOCD")
        .arg("installit.nsi")
        .current_dir(&config.out_path)
        .error_msg("makensis failed to build the installer")
        .run_interactive()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitute_version() {
        let script = "OutFile \"MozillaBuildSetup-@VERSION@.exe\"\n";
        assert_eq!(
            substitute_version(script, "4.0.2"),
            "OutFile \"MozillaBuildSetup-4.0.2.exe\"\n"
        );
    }

    #[test]
    fn test_substitute_version_multiple_occurrences() {
        let text = "@VERSION@ and @VERSION@";
        assert_eq!(substitute_version(text, "4.0"), "4.0 and 4.0");
    }

    #[test]
    fn test_setup_exe_maps_to_zip() {
        assert_eq!(
            setup_exe_to_zip(
                "https://downloads.sourceforge.net/project/nsis/nsis-3.08-setup.exe/download"
            ),
            "https://downloads.sourceforge.net/project/nsis/nsis-3.08.zip"
        );
    }
}
