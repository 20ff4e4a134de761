//! The staging pipeline.
//!
//! Each submodule stages one ingredient of the bundle; [`run`] strings
//! them together in dependency order. 7-Zip always goes first (it
//! unpacks everything else), the MSYS2 tree is assembled and patched
//! next, and NSIS wraps the finished tree into the installer last.

pub mod archive;
pub mod manifest;
pub mod msys2;
pub mod nsis;
pub mod python;
pub mod rebase;
pub mod sevenzip;
pub mod shebang;
pub mod tools;

use anyhow::{Context, Result};
use std::fs;

use crate::config::Config;
use crate::download::Downloader;

/// Run the full packaging pipeline.
pub async fn run(config: &Config) -> Result<()> {
    clean_staging(config)?;

    let dl = Downloader::new(&config.download_path, config.etag_dir())?;

    sevenzip::stage_seven_zip(config, &dl).await?;
    python::stage_python(config)?;
    tools::stage_kdiff3(config)?;
    tools::stage_info_zip(config)?;
    tools::stage_upx(config, &dl).await?;
    tools::stage_nsinstall(config)?;
    tools::stage_vswhere(config, &dl).await?;
    tools::stage_watchman(config)?;

    msys2::sync_packages(config)?;
    if config.fetch_sources {
        msys2::fetch_package_sources(config, &dl).await?;
    }
    msys2::stage_emacs(config)?;
    msys2::replace_rm(config)?;
    rebase::rebase_staged_dlls(config)?;
    manifest::embed_manifests(config)?;
    msys2::configure(config)?;
    msys2::copy_config_files(config)?;
    msys2::install_completions(config, &dl).await?;

    nsis::package_installer(config, &dl).await?;

    println!("\nPackaging complete: {}", config.out_path.display());
    Ok(())
}

/// Reset the staging directory and, unless the cache is kept, the
/// download directory. The ETag cache lives inside the download
/// directory and goes with it.
fn clean_staging(config: &Config) -> Result<()> {
    if config.out_path.is_dir() {
        println!("remove -r: {}", config.out_path.display());
        fs::remove_dir_all(&config.out_path)
            .with_context(|| format!("removing {}", config.out_path.display()))?;
    }
    if !config.fetch_tools.keep_cache() && config.download_path.is_dir() {
        println!("remove -r: {}", config.download_path.display());
        fs::remove_dir_all(&config.download_path)
            .with_context(|| format!("removing {}", config.download_path.display()))?;
    }

    for dir in [
        config.download_path.clone(),
        config.etag_dir(),
        config.moz_dir(),
        config.bin_dir(),
    ] {
        fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    Ok(())
}
