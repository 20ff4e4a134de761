//! MozillaBuild packager CLI.
//!
//! Assembles the MozillaBuild bundle and wraps it into an NSIS
//! installer.
//!
//! # Usage
//!
//! ```bash
//! # Package with the bundled installers only
//! packageit
//!
//! # Refresh tool installers from upstream, reusing the download cache
//! packageit --fetch-tools
//!
//! # Full developer bundle: pacman, extra and devel package sets
//! packageit --msys-pacman --msys-extra --msys-devel
//! ```
//!
//! Setting `MOZ_DEV=1` switches the defaults to the developer bundle
//! (`--fetch-tools --msys-pacman --msys-extra`).

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use std::env;
use std::path::PathBuf;

use mozbuild::config::{Config, FetchTools};
use mozbuild::{fsutil, locate, preflight, stage};

#[derive(Parser)]
#[command(name = "packageit")]
#[command(author, version, about = "MozillaBuild bundle packager", long_about = None)]
struct Cli {
    /// Sources directory with bundled installers, content and NSIS
    /// scripts
    #[arg(short = 's', long, default_value = "sources")]
    sources_path: PathBuf,

    /// Reference MSYS2 installation (located automatically when omitted)
    #[arg(short = 'm', long)]
    msys2_ref_path: Option<PathBuf>,

    /// Staging directory; wiped at the start of every run
    #[arg(short = 'o', long, default_value = "stage")]
    staging_path: PathBuf,

    /// Download cache directory
    #[arg(short = 'd', long, default_value = "downloaded")]
    download_path: PathBuf,

    /// Visual Studio installation (located via vswhere when omitted)
    #[arg(short = 'v', long)]
    msvc_path: Option<PathBuf>,

    /// Windows 10 SDK x64 binary directory (located via the registry
    /// when omitted)
    #[arg(short = 'w', long)]
    win10_sdk_path: Option<PathBuf>,

    /// Download MSYS2 package sources into the staging tree
    #[arg(short = 'f', long)]
    fetch_sources: bool,

    /// Refresh bundled tool installers from upstream releases
    #[arg(
        short = 'u',
        long,
        value_enum,
        num_args = 0..=1,
        default_missing_value = "with-cache"
    )]
    fetch_tools: Option<FetchToolsArg>,

    /// Bundle pacman from the MSYS2 base repo
    #[arg(short = 'p', long)]
    msys_pacman: bool,

    /// Bundle zip, unzip and upx from the MSYS2 base repo instead of the
    /// standalone installers
    #[arg(short = 'x', long)]
    msys_extra: bool,

    /// Bundle development libraries (icu, libevent, libffi, zlib)
    #[arg(long)]
    msys_devel: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FetchToolsArg {
    /// Reuse the existing download cache
    WithCache,
    /// Wipe the download cache first
    WithoutCache,
}

impl From<FetchToolsArg> for FetchTools {
    fn from(arg: FetchToolsArg) -> Self {
        match arg {
            FetchToolsArg::WithCache => FetchTools::WithCache,
            FetchToolsArg::WithoutCache => FetchTools::WithoutCache,
        }
    }
}

/// Whether the developer-bundle defaults are enabled via MOZ_DEV=1.
fn moz_dev() -> bool {
    env::var("MOZ_DEV").is_ok_and(|value| value == "1")
}

/// Resolve CLI arguments and host lookups into the run configuration.
fn resolve_config(cli: Cli) -> Result<Config> {
    let dev = moz_dev();

    let ref_path = match cli.msys2_ref_path {
        Some(path) => path,
        None => match locate::msys2_install() {
            Some(path) => path,
            None => bail!("no MSYS2 installation found; pass --msys2-ref-path"),
        },
    };

    let msvc_path = match cli.msvc_path {
        Some(path) => path,
        None => {
            let vswhere = cli.sources_path.join("vswhere.exe");
            PathBuf::from(
                locate::vswhere(&vswhere, "installationPath")
                    .context("locating Visual Studio (pass --msvc-path to override)")?,
            )
        }
    };

    let sdk_path = match cli.win10_sdk_path {
        Some(path) => path,
        None => match locate::windows_sdk() {
            Some(path) => path,
            None => bail!("no Windows 10 SDK found; pass --win10-sdk-path"),
        },
    };

    let version = fsutil::read_trimmed(&PathBuf::from("VERSION"))
        .context("reading the VERSION file (run from the repository root)")?;

    Ok(Config {
        src_path: cli.sources_path,
        ref_path,
        out_path: cli.staging_path,
        msvc_path,
        sdk_path,
        download_path: cli.download_path,
        fetch_sources: cli.fetch_sources,
        fetch_tools: cli
            .fetch_tools
            .map(FetchTools::from)
            .unwrap_or(if dev { FetchTools::WithCache } else { FetchTools::Off }),
        msys_pacman: cli.msys_pacman || dev,
        msys_extra: cli.msys_extra || dev,
        msys_devel: cli.msys_devel,
        version,
    })
}

fn print_header(config: &Config) {
    println!("=== Packaging MozillaBuild {} ===", config.version);
    println!("  sources:   {}", config.src_path.display());
    println!("  reference: {}", config.ref_path.display());
    println!("  staging:   {}", config.out_path.display());
    println!("  downloads: {}", config.download_path.display());
    println!("  msvc:      {}", config.msvc_path.display());
    println!("  sdk:       {}", config.sdk_path.display());
}

async fn run(cli: Cli) -> Result<()> {
    let config = resolve_config(cli)?;
    print_header(&config);

    let report = preflight::run(&config);
    report.print_summary();
    if !report.is_ok() {
        bail!("preflight checks failed");
    }

    stage::run(&config).await
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_fetch_tools_flag_defaults_to_with_cache() {
        let cli = Cli::parse_from(["packageit", "--fetch-tools"]);
        assert!(matches!(cli.fetch_tools, Some(FetchToolsArg::WithCache)));

        let cli = Cli::parse_from(["packageit", "--fetch-tools", "without-cache"]);
        assert!(matches!(cli.fetch_tools, Some(FetchToolsArg::WithoutCache)));
    }

    #[test]
    fn test_preflight_cannot_be_bypassed() {
        assert!(Cli::try_parse_from(["packageit", "--skip-preflight"]).is_err());
    }
}
