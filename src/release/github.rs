//! Latest-release resolution against the GitHub API.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

use crate::download::Downloader;

const GITHUB_API: &str = "https://api.github.com/repos";

/// GitHub release metadata (subset of fields we need — serde ignores
/// the rest).
#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    /// Release title; may be absent or empty.
    pub name: Option<String>,
    /// Release tag, e.g. "v3.96".
    pub tag_name: Option<String>,
    /// Downloadable files attached to this release.
    pub assets: Vec<ReleaseAsset>,
}

/// A single downloadable file of a release.
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseAsset {
    /// Published file name, e.g. "upx-3.96-win64.zip".
    pub name: String,
    /// Direct download URL (works unauthenticated for public repos).
    pub browser_download_url: String,
}

impl ReleaseAsset {
    /// File extension of the asset name, lowercased.
    pub fn extension(&self) -> &str {
        self.name.rsplit_once('.').map_or("", |(_, ext)| ext)
    }
}

/// First asset the predicate accepts.
fn pick_asset<'a>(
    release: &'a Release,
    pred: impl Fn(&ReleaseAsset) -> bool,
) -> Option<&'a ReleaseAsset> {
    release.assets.iter().find(|asset| pred(asset))
}

/// Resolve and download the matching asset of `owner/repo`'s latest
/// release.
///
/// Returns `Ok(None)` when no asset satisfies the predicate; the caller
/// falls back to its bundled installer. Transport and format failures
/// abort the run.
pub async fn latest_asset(
    dl: &Downloader,
    owner: &str,
    repo: &str,
    pred: impl Fn(&ReleaseAsset) -> bool,
) -> Result<Option<PathBuf>> {
    let url = format!("{}/{}/{}/releases/latest", GITHUB_API, owner, repo);
    println!("github: {}", url);

    let release: Release = dl
        .fetch_json(&url)
        .await
        .with_context(|| format!("fetching latest release of {}/{}", owner, repo))?;

    let Some(asset) = pick_asset(&release, pred) else {
        eprintln!("no suitable assets found for {}/{}", owner, repo);
        return Ok(None);
    };

    let app = release
        .name
        .clone()
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| format!("{}/{}", owner, repo));
    let tag = release
        .tag_name
        .clone()
        .filter(|tag| !tag.is_empty())
        .unwrap_or_else(|| "latest".to_string());
    println!("download: {} {}", app, tag);

    let path = dl
        .fetch_cached(&asset.browser_download_url, Some(&asset.name))
        .await?;
    Ok(Some(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> Release {
        serde_json::from_str(
            r#"{
                "name": "tool 2.1",
                "tag_name": "v2.1",
                "assets": [
                    {"name": "tool-linux64.tar.gz",
                     "browser_download_url": "https://example.com/tool-linux64.tar.gz"},
                    {"name": "tool-win64.zip",
                     "browser_download_url": "https://example.com/tool-win64.zip"}
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_pick_asset_by_predicate() {
        let release = fixture();
        let asset = pick_asset(&release, |a| a.name.to_lowercase().contains("win64")).unwrap();
        assert_eq!(asset.name, "tool-win64.zip");
    }

    #[test]
    fn test_pick_asset_no_match() {
        let release = fixture();
        assert!(pick_asset(&release, |a| a.name.contains("macos")).is_none());
    }

    #[test]
    fn test_pick_asset_first_match_wins() {
        let release = fixture();
        let asset = pick_asset(&release, |_| true).unwrap();
        assert_eq!(asset.name, "tool-linux64.tar.gz");
    }

    #[test]
    fn test_asset_extension() {
        let release = fixture();
        assert_eq!(release.assets[1].extension(), "zip");
        assert_eq!(release.assets[0].extension(), "gz");
    }

    #[test]
    fn test_release_parses_without_optional_fields() {
        let release: Release =
            serde_json::from_str(r#"{"name": null, "tag_name": null, "assets": []}"#).unwrap();
        assert!(release.assets.is_empty());
    }
}
