//! Remote checkpoint fetching
//!
//! Transfers a source's bytes (and, separately, its checksum file) into a
//! destination path over HTTP(S). Fetches are plain overwrites with no
//! atomic-replace guarantee; a failed fetch leaves the destination in an
//! undefined state. No retries happen here — transfer failures propagate
//! so the caller can abort the whole load plan.

use std::path::Path;
use std::time::Duration;

use reqwest::Client;

use crate::cache;
use crate::error::{LoadError, LoadResult};
use crate::source::FileSource;

const DOWNLOAD_TIMEOUT_SECS: u64 = 600;

/// HTTP fetcher for remote checkpoint sources
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    /// Create a fetcher with the default download timeout
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client }
    }

    /// Create a fetcher using a preconfigured client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Fetch `url` into `dest`, overwriting any existing file
    ///
    /// Non-success status codes, transport failures, and write failures at
    /// the destination all map to [`LoadError::Transfer`].
    pub async fn fetch(&self, url: &str, dest: &Path) -> LoadResult<()> {
        tracing::debug!(url = %url, dest = ?dest, "Fetching remote resource");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| LoadError::transfer(url, e))?;

        if !response.status().is_success() {
            return Err(LoadError::transfer(
                url,
                format!("HTTP {}", response.status()),
            ));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| LoadError::transfer(url, e))?;

        tokio::fs::write(dest, &bytes)
            .await
            .map_err(|e| LoadError::transfer(url, format!("write to {:?} failed: {}", dest, e)))?;

        tracing::debug!(url = %url, bytes = bytes.len(), "Fetch complete");
        Ok(())
    }

    /// Fetch a source's main artifact into `dest`
    ///
    /// When the source declares a checksum location, the checksum file is
    /// fetched alongside into the `.checksum` sibling of `dest`.
    pub async fn fetch_source(&self, source: &FileSource, dest: &Path) -> LoadResult<()> {
        if !source.is_remote() {
            return Err(LoadError::InvalidState(
                "cannot fetch a local source".to_string(),
            ));
        }

        self.fetch(&source.path, dest).await?;

        if let Some(ref checksum_url) = source.checksum_file_path {
            self.fetch(checksum_url, &cache::checksum_path(dest)).await?;
        }

        Ok(())
    }

    /// Fetch a source's checksum file into `dest`
    pub async fn fetch_checksum(&self, source: &FileSource, dest: &Path) -> LoadResult<()> {
        if !source.is_remote() {
            return Err(LoadError::InvalidState(
                "cannot fetch a checksum for a local source".to_string(),
            ));
        }

        let checksum_url = source.checksum_file_path.as_deref().ok_or_else(|| {
            LoadError::InvalidState("no checksum location specified".to_string())
        })?;

        self.fetch(checksum_url, dest).await
    }

    /// Fetch the current remote checksum and return its raw content
    ///
    /// Content is returned as bytes: the resolver only ever compares
    /// checksums for equality and is agnostic to their encoding. The
    /// checksum lands in a scoped temporary directory that is removed on
    /// every exit path, including fetch or read failure.
    pub async fn read_remote_checksum(&self, source: &FileSource) -> LoadResult<Vec<u8>> {
        let scratch = tempfile::tempdir()?;
        let dest = scratch.path().join("checksum");

        self.fetch_checksum(source, &dest).await?;

        let content = tokio::fs::read(&dest).await?;
        Ok(content)
    }
}

impl Default for Fetcher {
    fn default() -> Self {
        Self::new()
    }
}
