use crate::game::installer::config::request_timeout;
use crate::LauncherError;
use anyhow::{Context, Result};
use futures::StreamExt;
use reqwest::Client;
use sha1::{Digest, Sha1};
use std::path::Path;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Content-addressed download primitive.
///
/// Every fetch is a single attempt; retrying is left to whoever re-runs the
/// pipeline, which is cheap because verified files are skipped.
#[derive(Clone)]
pub struct ContentStore {
    client: Client,
}

impl ContentStore {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout())
            .user_agent(concat!("mcz-launcher/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Make sure `path` holds the content of `url`.
    ///
    /// Returns `false` without touching the network when the file already
    /// matches `expected_sha1`. Otherwise streams into a temp file next to
    /// `path`, verifies it and renames it into place. On any failure the
    /// target is left as it was.
    pub async fn download(&self, url: &str, path: &Path, expected_sha1: Option<&str>) -> Result<bool> {
        if let Some(expected) = expected_sha1 {
            if path.exists() {
                match sha1_file(path).await {
                    Ok(actual) if actual.eq_ignore_ascii_case(expected) => {
                        log::debug!("File exists and hash matches, skipping: {:?}", path);
                        return Ok(false);
                    }
                    Ok(actual) => {
                        log::info!(
                            "File exists but hash mismatches ({} != {}), re-downloading: {:?}",
                            actual,
                            expected,
                            path
                        );
                    }
                    Err(e) => log::warn!("Failed to hash existing file {:?}: {:#}", path, e),
                }
            }
        }

        log::debug!("Downloading: {} -> {:?}", url, path);

        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create directory {:?}", parent))?;

        let response = self.get(url).await?;

        let (file, tmp_path) = tempfile::Builder::new()
            .prefix(".download-")
            .suffix(".part")
            .tempfile_in(parent)
            .with_context(|| format!("Failed to create temp file in {:?}", parent))?
            .into_parts();
        let mut file = tokio::fs::File::from_std(file);
        let mut hasher = Sha1::new();
        let mut downloaded: u64 = 0;

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|source| LauncherError::Transport {
                url: url.to_string(),
                source,
            })?;
            file.write_all(&chunk).await?;
            hasher.update(&chunk);
            downloaded += chunk.len() as u64;
        }
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        if let Some(expected) = expected_sha1 {
            let actual = format!("{:x}", hasher.finalize());
            if !actual.eq_ignore_ascii_case(expected) {
                // dropping the temp path removes the partial file
                drop(tmp_path);
                return Err(LauncherError::Integrity {
                    path: path.to_path_buf(),
                    expected: expected.to_lowercase(),
                    actual,
                }
                .into());
            }
        }

        tmp_path
            .persist(path)
            .with_context(|| format!("Failed to move download into place at {:?}", path))?;

        log::debug!("Downloaded {} bytes to {:?}", downloaded, path);
        Ok(true)
    }

    /// Fetch a resource into memory. `file://` URLs are read from disk.
    pub async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        if let Ok(parsed) = url::Url::parse(url) {
            if parsed.scheme() == "file" {
                let path = parsed
                    .to_file_path()
                    .map_err(|_| anyhow::anyhow!("Invalid file URL: {}", url))?;
                return tokio::fs::read(&path)
                    .await
                    .with_context(|| format!("Failed to read {:?}", path));
            }
        }

        let response = self.get(url).await?;
        let bytes = response.bytes().await.map_err(|source| LauncherError::Transport {
            url: url.to_string(),
            source,
        })?;
        Ok(bytes.to_vec())
    }

    pub async fn fetch_text(&self, url: &str) -> Result<String> {
        let bytes = self.fetch_bytes(url).await?;
        String::from_utf8(bytes).with_context(|| format!("Response from {} is not UTF-8", url))
    }

    /// Download JSON and deserialize
    pub async fn fetch_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        log::debug!("Downloading JSON: {}", url);
        let bytes = self.fetch_bytes(url).await?;
        serde_json::from_slice(&bytes).with_context(|| format!("Failed to parse JSON from {}", url))
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| LauncherError::Transport {
                url: url.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(LauncherError::Fetch {
                url: url.to_string(),
                status: response.status().as_u16(),
            }
            .into());
        }
        Ok(response)
    }
}

/// Lower-case hex SHA1 of a file's content
pub async fn sha1_file(path: &Path) -> Result<String> {
    let mut file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("Failed to open {:?}", path))?;
    let mut hasher = Sha1::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Lower-case hex SHA1 of a byte slice
pub fn sha1_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
