//! 7-Zip staging.
//!
//! 7-Zip comes first: its `7z.exe` is what every later step uses to
//! unpack the remaining archives.

use anyhow::Result;

use crate::config::{bundled, Config};
use crate::download::Downloader;
use crate::fsutil;
use crate::release::winget;
use crate::stage::archive;

/// Stage 7-Zip into the bundle.
pub async fn stage_seven_zip(config: &Config, dl: &Downloader) -> Result<()> {
    let mut installer = config.bundled_installer(bundled::SEVEN_ZIP_MSI);

    if config.fetch_tools.enabled() {
        println!("\n=== Fetching latest 7-Zip ===");
        if let Some(fetched) = winget::latest_installer(
            dl,
            "7zip",
            "7zip",
            |candidate| candidate.is_arch("x64") && candidate.is_type("wix"),
            |url| url.to_string(),
        )
        .await?
        {
            installer = fetched;
        }
    }

    println!("\n=== Staging 7-Zip ===");
    let extracted = config.out_path.join("7zip");
    archive::msi_admin_extract(&installer, &extracted)?;

    // The administrative install materializes the payload under
    // Files/7-Zip.
    let bin_7zip = config.bin_dir().join("7zip");
    fsutil::copy_dir(&extracted.join("Files").join("7-Zip"), &bin_7zip)?;
    fsutil::copy_to(&bin_7zip.join("7z.exe"), &config.bin_dir(), None)?;
    fsutil::copy_to(&bin_7zip.join("7z.dll"), &config.bin_dir(), None)?;

    Ok(())
}
