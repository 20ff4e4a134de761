//! Standalone tool staging: KDiff3, Info-Zip, UPX, nsinstall, vswhere
//! and watchman.

use anyhow::Result;

use crate::config::{bundled, Config};
use crate::download::Downloader;
use crate::fsutil;
use crate::release::github;
use crate::stage::archive;

/// Stage KDiff3 into the bundle.
///
/// The KDiff3 installer has no silent mode, so the bundled artifact is a
/// ready-to-extract archive instead.
pub fn stage_kdiff3(config: &Config) -> Result<()> {
    println!("\n=== Staging KDiff3 ===");
    archive::unpack(
        &config.seven_zip_exe(),
        &config.bundled_installer(bundled::KDIFF3_EXE),
        &config.moz_dir().join("kdiff3"),
    )?;
    Ok(())
}

/// Stage Info-Zip's zip and unzip.
///
/// Skipped when the MSYS2 extra set is bundled; that set carries the
/// zip/unzip packages instead.
pub fn stage_info_zip(config: &Config) -> Result<()> {
    if config.msys_extra {
        println!("\n[SKIP] Info-Zip (bundled from the MSYS2 base repo)");
        return Ok(());
    }

    println!("\n=== Staging Info-Zip ===");
    let info_zip = config.bin_dir().join("info-zip");
    let seven_zip = config.seven_zip_exe();
    archive::unpack(
        &seven_zip,
        &config.bundled_installer(bundled::UNZIP_EXE),
        &info_zip,
    )?;
    archive::unpack(
        &seven_zip,
        &config.bundled_installer(bundled::ZIP_ZIP),
        &info_zip,
    )?;

    // Copy the two binaries up into bin/ so PATH stays tidy.
    fsutil::copy_to(&info_zip.join("unzip.exe"), &config.bin_dir(), None)?;
    fsutil::copy_to(&info_zip.join("zip.exe"), &config.bin_dir(), None)?;
    Ok(())
}

/// Stage UPX, optionally refreshed from its GitHub releases.
pub async fn stage_upx(config: &Config, dl: &Downloader) -> Result<()> {
    if config.msys_extra {
        println!("\n[SKIP] UPX (bundled from the MSYS2 base repo)");
        return Ok(());
    }

    let mut installer = config.bundled_installer(bundled::UPX_ZIP);
    if config.fetch_tools.enabled() {
        println!("\n=== Fetching latest UPX ===");
        if let Some(fetched) = github::latest_asset(dl, "upx", "upx", |asset| {
            asset.name.to_lowercase().contains("win64")
        })
        .await?
        {
            installer = fetched;
        }
    }

    println!("\n=== Staging UPX ===");
    let extracted = archive::unpack(&config.seven_zip_exe(), &installer, &config.bin_dir())?;
    fsutil::copy_to(&extracted.join("upx.exe"), &config.bin_dir(), None)?;
    Ok(())
}

/// Stage the nsinstall helper from the sources content.
pub fn stage_nsinstall(config: &Config) -> Result<()> {
    println!("\n=== Staging nsinstall ===");
    fsutil::copy_to(
        &config.content_dir().join("nsinstall.exe"),
        &config.bin_dir(),
        None,
    )?;
    Ok(())
}

/// Stage vswhere, optionally refreshed from its GitHub releases.
pub async fn stage_vswhere(config: &Config, dl: &Downloader) -> Result<()> {
    let mut vswhere = config.vswhere_exe();
    if config.fetch_tools.enabled() {
        println!("\n=== Fetching latest vswhere ===");
        if let Some(fetched) =
            github::latest_asset(dl, "microsoft", "vswhere", |asset| asset.extension() == "exe")
                .await?
        {
            vswhere = fetched;
        }
    }

    println!("\n=== Staging vswhere ===");
    fsutil::copy_to(&vswhere, &config.bin_dir(), None)?;
    Ok(())
}

/// Stage watchman and its license.
pub fn stage_watchman(config: &Config) -> Result<()> {
    println!("\n=== Staging watchman ===");
    archive::unpack(
        &config.seven_zip_exe(),
        &config.bundled_installer(bundled::WATCHMAN_ZIP),
        &config.bin_dir(),
    )?;
    fsutil::copy_to(
        &config.content_dir().join("watchman-LICENSE"),
        &config.bin_dir(),
        None,
    )?;
    Ok(())
}
