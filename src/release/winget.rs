//! Latest-installer resolution against the winget manifest repository.
//!
//! winget-pkgs keeps one directory per published version under
//! `manifests/<initial>/<Publisher>/<Package>/`, each holding a
//! `<Publisher>.<Package>.installer.yaml` describing the downloadable
//! installers. Resolution lists the version directories through the
//! GitHub contents API, picks the newest by structural comparison, and
//! parses the installer manifest.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

use crate::download::Downloader;
use crate::release::version;

const WINGET_PKGS: &str = "https://api.github.com/repos/microsoft/winget-pkgs";

/// One entry of a GitHub contents API listing.
#[derive(Debug, Clone, Deserialize)]
struct ContentsEntry {
    name: String,
    download_url: Option<String>,
}

/// Parsed `installer.yaml` manifest (subset of fields).
#[derive(Debug, Clone, Deserialize)]
pub struct InstallerManifest {
    #[serde(rename = "PackageIdentifier")]
    pub package_identifier: Option<String>,
    #[serde(rename = "PackageVersion")]
    pub package_version: Option<String>,
    #[serde(rename = "Installers", default)]
    pub installers: Vec<Installer>,
}

/// A single installer variant listed in a manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct Installer {
    #[serde(rename = "Architecture")]
    pub architecture: Option<String>,
    #[serde(rename = "InstallerType")]
    pub installer_type: Option<String>,
    #[serde(rename = "InstallerUrl")]
    pub installer_url: String,
}

impl Installer {
    /// Whether this installer targets the given architecture.
    pub fn is_arch(&self, arch: &str) -> bool {
        self.architecture.as_deref() == Some(arch)
    }

    /// Whether this installer is of the given type (e.g. "wix").
    pub fn is_type(&self, installer_type: &str) -> bool {
        self.installer_type.as_deref() == Some(installer_type)
    }
}

/// Strip the `/download` suffix from SourceForge mirror URLs so the
/// fetch skips the countdown interstitial.
pub fn sourceforge_direct(url: &str) -> String {
    if url.contains("sourceforge.net") && url.ends_with("/download") {
        url.trim_end_matches("/download")
            .trim_end_matches('/')
            .to_string()
    } else {
        url.to_string()
    }
}

/// Manifest directory path for a package, e.g. `n/NSIS/NSIS`.
fn manifest_path(publisher: &str, package: &str) -> String {
    let initial = publisher
        .chars()
        .next()
        .map(|c| c.to_lowercase().to_string())
        .unwrap_or_default();
    format!("{}/{}/{}", initial, publisher, package)
}

/// First installer the predicate accepts.
fn pick_installer<'a>(
    manifest: &'a InstallerManifest,
    pred: impl Fn(&Installer) -> bool,
) -> Option<&'a Installer> {
    manifest.installers.iter().find(|installer| pred(installer))
}

/// Resolve and download the matching installer of the package's newest
/// winget manifest.
///
/// `sanitize` rewrites the installer URL before download (SourceForge
/// redirects, setup-exe to zip mappings). Returns `Ok(None)` when no
/// installer satisfies the predicate; the caller falls back to its
/// bundled installer.
pub async fn latest_installer(
    dl: &Downloader,
    publisher: &str,
    package: &str,
    pred: impl Fn(&Installer) -> bool,
    sanitize: impl Fn(&str) -> String,
) -> Result<Option<PathBuf>> {
    let base_url = format!(
        "{}/contents/manifests/{}",
        WINGET_PKGS,
        manifest_path(publisher, package)
    );
    println!("winget: {}", base_url);

    let versions: Vec<ContentsEntry> = dl
        .fetch_json(&base_url)
        .await
        .with_context(|| format!("listing winget manifests of {}.{}", publisher, package))?;
    let latest = version::latest(versions.iter().map(|entry| entry.name.as_str()))
        .with_context(|| format!("no winget manifest versions for {}.{}", publisher, package))?;

    // The contents API entry for the yaml file carries its raw
    // download URL.
    let manifest_url = format!(
        "{}/{}/{}.{}.installer.yaml",
        base_url, latest, publisher, package
    );
    let entry: ContentsEntry = dl
        .fetch_json(&manifest_url)
        .await
        .with_context(|| format!("fetching manifest entry for {}.{}", publisher, package))?;
    let yaml_url = entry
        .download_url
        .with_context(|| format!("manifest of {}.{} has no download URL", publisher, package))?;

    let manifest: InstallerManifest = dl
        .fetch_yaml(&yaml_url)
        .await
        .with_context(|| format!("parsing installer manifest of {}.{}", publisher, package))?;

    let Some(installer) = pick_installer(&manifest, pred) else {
        eprintln!("no suitable installers found for {}.{}", publisher, package);
        return Ok(None);
    };

    let app = manifest
        .package_identifier
        .clone()
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| format!("{}.{}", publisher, package));
    let ver = manifest
        .package_version
        .clone()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "latest".to_string());
    println!("download: {} {}", app, ver);

    let url = sanitize(&installer.installer_url);
    let path = dl.fetch_cached(&url, None).await?;
    Ok(Some(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST_YAML: &str = "\
PackageIdentifier: 7zip.7zip
PackageVersion: 21.07
Installers:
- Architecture: x86
  InstallerType: wix
  InstallerUrl: https://www.7-zip.org/a/7z2107.msi
- Architecture: x64
  InstallerType: wix
  InstallerUrl: https://www.7-zip.org/a/7z2107-x64.msi
";

    #[test]
    fn test_manifest_parses_from_yaml() {
        let manifest: InstallerManifest = serde_yaml::from_str(MANIFEST_YAML).unwrap();
        assert_eq!(manifest.package_identifier.as_deref(), Some("7zip.7zip"));
        assert_eq!(manifest.installers.len(), 2);
    }

    #[test]
    fn test_pick_installer_x64_wix() {
        let manifest: InstallerManifest = serde_yaml::from_str(MANIFEST_YAML).unwrap();
        let installer =
            pick_installer(&manifest, |i| i.is_arch("x64") && i.is_type("wix")).unwrap();
        assert!(installer.installer_url.ends_with("7z2107-x64.msi"));
    }

    #[test]
    fn test_pick_installer_no_match() {
        let manifest: InstallerManifest = serde_yaml::from_str(MANIFEST_YAML).unwrap();
        assert!(pick_installer(&manifest, |i| i.is_arch("arm64")).is_none());
    }

    #[test]
    fn test_manifest_path_initial_is_lowercased() {
        assert_eq!(manifest_path("NSIS", "NSIS"), "n/NSIS/NSIS");
        assert_eq!(manifest_path("7zip", "7zip"), "7/7zip/7zip");
    }

    #[test]
    fn test_sourceforge_direct_strips_interstitial() {
        assert_eq!(
            sourceforge_direct(
                "https://downloads.sourceforge.net/project/nsis/nsis-3.08-setup.exe/download"
            ),
            "https://downloads.sourceforge.net/project/nsis/nsis-3.08-setup.exe"
        );
    }

    #[test]
    fn test_sourceforge_direct_leaves_other_urls() {
        let url = "https://www.7-zip.org/a/7z2107-x64.msi";
        assert_eq!(sourceforge_direct(url), url);
    }
}
