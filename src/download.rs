//! ETag-cached downloader.
//!
//! Every network fetch in the packager goes through [`Downloader`]. A
//! download keeps a validator token next to the cache
//! (`cache/<basename>.etag`); repeated runs send the token as
//! `If-None-Match` and a 304 answer keeps the local artifact, so an
//! unchanged remote costs only the conditional round trip. Artifact and
//! token are always written together; a missing or stale token simply
//! forces a full fetch.
//!
//! There are no retries and no timeouts: a transport failure aborts the
//! packaging run (the tool is one-shot and human-invoked).

use anyhow::{bail, Context, Result};
use reqwest::header::{ETAG, IF_NONE_MATCH};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

/// Cached HTTP downloader.
pub struct Downloader {
    client: reqwest::Client,
    /// Directory for downloaded artifacts without an explicit
    /// destination.
    download_dir: PathBuf,
    /// Directory holding the ETag validator tokens.
    etag_dir: PathBuf,
}

impl Downloader {
    pub fn new(download_dir: impl Into<PathBuf>, etag_dir: impl Into<PathBuf>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("mozillabuild-packageit/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            client,
            download_dir: download_dir.into(),
            etag_dir: etag_dir.into(),
        })
    }

    /// Validator token location for a download destination.
    ///
    /// Derived from the destination's base name only, so the same
    /// logical download reuses the same cache slot regardless of which
    /// run (or which destination directory) triggered it.
    pub fn etag_path(&self, dest: &Path) -> PathBuf {
        let base = dest
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.etag_dir.join(format!("{}.etag", base))
    }

    /// Download `url` to `dest`, skipping the body when the cached copy
    /// is still current.
    pub async fn fetch(&self, url: &str, dest: &Path) -> Result<PathBuf> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        fs::create_dir_all(&self.etag_dir)
            .with_context(|| format!("creating {}", self.etag_dir.display()))?;

        let token_path = self.etag_path(dest);
        // Conditional only when both the artifact and its token survive
        // from an earlier run.
        let token = if dest.is_file() {
            fs::read_to_string(&token_path)
                .ok()
                .map(|t| t.trim().to_string())
        } else {
            None
        };

        println!("download: {} -> {}", url, dest.display());

        let mut request = self.client.get(url);
        if let Some(token) = &token {
            request = request.header(IF_NONE_MATCH, token);
        }
        let response = request
            .send()
            .await
            .with_context(|| format!("fetching {}", url))?;

        if response.status() == StatusCode::NOT_MODIFIED {
            println!("  not modified, using cached copy");
            return Ok(dest.to_path_buf());
        }
        if !response.status().is_success() {
            bail!("{} answered {}", url, response.status());
        }

        let validator = response
            .headers()
            .get(ETAG)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let body = response
            .bytes()
            .await
            .with_context(|| format!("reading body of {}", url))?;
        fs::write(dest, &body).with_context(|| format!("writing {}", dest.display()))?;

        // Keep artifact and validator in step: token written right after
        // the body, removed when the server stopped sending one.
        match validator {
            Some(validator) => fs::write(&token_path, validator)
                .with_context(|| format!("writing {}", token_path.display()))?,
            None => {
                let _ = fs::remove_file(&token_path);
            }
        }

        Ok(dest.to_path_buf())
    }

    /// Download `url` into the shared download directory.
    ///
    /// `name` overrides the slot file name (e.g. a release asset's
    /// published name); otherwise the URL's base name is used.
    pub async fn fetch_cached(&self, url: &str, name: Option<&str>) -> Result<PathBuf> {
        let base = match name {
            Some(name) => name.to_string(),
            None => url_basename(url),
        };
        let dest = self.download_dir.join(base);
        self.fetch(url, &dest).await
    }

    /// Fetch a small text resource through the cache.
    ///
    /// The cache slot mixes a URL digest into the name so two resources
    /// with the same base name never collide.
    pub async fn fetch_text(&self, url: &str, kind: &str) -> Result<String> {
        let dest = self.download_dir.join(cache_name(url, kind));
        let path = self.fetch(url, &dest).await?;
        fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))
    }

    /// Fetch and deserialize a JSON resource.
    pub async fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let text = self.fetch_text(url, "json").await?;
        serde_json::from_str(&text).with_context(|| format!("parsing JSON from {}", url))
    }

    /// Fetch and deserialize a YAML resource.
    pub async fn fetch_yaml<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let text = self.fetch_text(url, "yaml").await?;
        serde_yaml::from_str(&text).with_context(|| format!("parsing YAML from {}", url))
    }
}

/// Base name of a URL path, query and fragment stripped.
fn url_basename(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/').next().unwrap_or(path).to_string()
}

/// Cache slot name for a metadata fetch: URL base name, URL digest and
/// the resource kind as extension.
fn cache_name(url: &str, kind: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    let short: String = digest[..4].iter().map(|b| format!("{:02x}", b)).collect();
    let base = url_basename(url);
    let stem = base.rsplit_once('.').map_or(base.as_str(), |(stem, _)| stem);
    format!("{}.{}.{}", stem, short, kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::thread;
    use tempfile::tempdir;

    /// One-shot HTTP stub: answers each connection with the next
    /// scripted response and reports the captured request (lowercased)
    /// over the channel.
    fn serve(responses: Vec<&'static str>) -> (String, mpsc::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            for response in responses {
                let (mut stream, _) = listener.accept().unwrap();
                let mut request = Vec::new();
                let mut chunk = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    let n = stream.read(&mut chunk).unwrap();
                    if n == 0 {
                        break;
                    }
                    request.extend_from_slice(&chunk[..n]);
                }
                tx.send(String::from_utf8_lossy(&request).to_lowercase())
                    .unwrap();
                stream.write_all(response.as_bytes()).unwrap();
            }
        });

        (format!("http://{}/tool.zip", addr), rx)
    }

    const OK_WITH_ETAG: &str = "HTTP/1.1 200 OK\r\n\
        Content-Length: 5\r\n\
        Etag: \"v1\"\r\n\
        Connection: close\r\n\r\nhello";

    const NOT_MODIFIED: &str = "HTTP/1.1 304 Not Modified\r\n\
        Connection: close\r\n\r\n";

    const OK_NO_ETAG: &str = "HTTP/1.1 200 OK\r\n\
        Content-Length: 5\r\n\
        Connection: close\r\n\r\nfresh";

    #[tokio::test]
    async fn test_unchanged_remote_is_not_refetched() {
        let dir = tempdir().unwrap();
        let dl = Downloader::new(dir.path().join("downloaded"), dir.path().join("cache")).unwrap();
        let dest = dir.path().join("downloaded").join("tool.zip");
        let (url, requests) = serve(vec![OK_WITH_ETAG, NOT_MODIFIED]);

        dl.fetch(&url, &dest).await.unwrap();
        // First fetch has no token to validate against.
        assert!(!requests.recv().unwrap().contains("if-none-match"));
        assert_eq!(fs::read_to_string(&dest).unwrap(), "hello");
        // Token written together with the artifact.
        assert_eq!(fs::read_to_string(dl.etag_path(&dest)).unwrap(), "\"v1\"");

        dl.fetch(&url, &dest).await.unwrap();
        // Second fetch validates and the 304 keeps the cached body.
        assert!(requests.recv().unwrap().contains("if-none-match: \"v1\""));
        assert_eq!(fs::read_to_string(&dest).unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_missing_token_forces_full_fetch() {
        let dir = tempdir().unwrap();
        let dl = Downloader::new(dir.path().join("downloaded"), dir.path().join("cache")).unwrap();
        let dest = dir.path().join("downloaded").join("tool.zip");
        let (url, requests) = serve(vec![OK_WITH_ETAG, OK_NO_ETAG]);

        dl.fetch(&url, &dest).await.unwrap();
        requests.recv().unwrap();
        fs::remove_file(dl.etag_path(&dest)).unwrap();

        dl.fetch(&url, &dest).await.unwrap();
        // Artifact alone is not enough; the request goes unconditional.
        assert!(!requests.recv().unwrap().contains("if-none-match"));
        assert_eq!(fs::read_to_string(&dest).unwrap(), "fresh");
    }

    #[tokio::test]
    async fn test_token_removed_when_server_stops_sending_etag() {
        let dir = tempdir().unwrap();
        let dl = Downloader::new(dir.path().join("downloaded"), dir.path().join("cache")).unwrap();
        let dest = dir.path().join("downloaded").join("tool.zip");
        let (url, requests) = serve(vec![OK_WITH_ETAG, OK_NO_ETAG]);

        dl.fetch(&url, &dest).await.unwrap();
        requests.recv().unwrap();
        assert!(dl.etag_path(&dest).is_file());

        dl.fetch(&url, &dest).await.unwrap();
        requests.recv().unwrap();
        assert!(!dl.etag_path(&dest).exists());
        assert_eq!(fs::read_to_string(&dest).unwrap(), "fresh");
    }

    #[test]
    fn test_url_basename() {
        assert_eq!(
            url_basename("https://example.com/dl/tool-win64.zip"),
            "tool-win64.zip"
        );
        assert_eq!(
            url_basename("https://example.com/dl/tool.zip?mirror=1"),
            "tool.zip"
        );
    }

    #[test]
    fn test_cache_name_is_deterministic() {
        let a = cache_name("https://api.github.com/repos/upx/upx/releases/latest", "json");
        let b = cache_name("https://api.github.com/repos/upx/upx/releases/latest", "json");
        assert_eq!(a, b);
        assert!(a.ends_with(".json"));
    }

    #[test]
    fn test_cache_name_disambiguates_same_basename() {
        let a = cache_name("https://example.com/a/manifest.yaml", "yaml");
        let b = cache_name("https://example.com/b/manifest.yaml", "yaml");
        assert_ne!(a, b);
    }

    #[test]
    fn test_etag_path_derived_from_basename() {
        let dir = tempdir().unwrap();
        let dl = Downloader::new(dir.path().join("downloaded"), dir.path().join("cache")).unwrap();

        let from_stage = dl.etag_path(Path::new("/stage/a/nsis-3.08.zip"));
        let from_temp = dl.etag_path(Path::new("/tmp/other/nsis-3.08.zip"));

        // Same logical download, same cache slot.
        assert_eq!(from_stage, from_temp);
        assert_eq!(from_stage, dir.path().join("cache/nsis-3.08.zip.etag"));
    }
}
