//! Cache resolution
//!
//! Turns a [`FileSource`] into a guaranteed-valid local path: local sources
//! pass through untouched, remote sources are fetched into either a
//! persistent cache directory (with checksum-based staleness detection) or
//! scoped temporary storage that lives exactly as long as the returned
//! [`ResolvedFile`].

use std::ops::Deref;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::cache;
use crate::error::LoadResult;
use crate::fetch::Fetcher;
use crate::source::FileSource;

/// A usable local copy of a checkpoint
///
/// When resolution had to fall back to temporary storage (remote source
/// with no cache directory), the backing directory is owned by this guard
/// and removed when it drops. Local and cache-backed paths outlive the
/// guard.
#[derive(Debug)]
pub struct ResolvedFile {
    path: PathBuf,
    _scratch: Option<TempDir>,
}

impl ResolvedFile {
    fn permanent(path: PathBuf) -> Self {
        Self {
            path,
            _scratch: None,
        }
    }

    fn ephemeral(path: PathBuf, scratch: TempDir) -> Self {
        Self {
            path,
            _scratch: Some(scratch),
        }
    }

    /// The resolved local path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the path is backed by temporary storage that goes away
    /// when this guard drops
    pub fn is_ephemeral(&self) -> bool {
        self._scratch.is_some()
    }
}

impl Deref for ResolvedFile {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.path
    }
}

impl AsRef<Path> for ResolvedFile {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}

/// Resolves checkpoint sources to local paths, fetching and caching as needed
pub struct Resolver {
    fetcher: Fetcher,
}

impl Resolver {
    /// Create a resolver with a default fetcher
    pub fn new() -> Self {
        Self {
            fetcher: Fetcher::new(),
        }
    }

    /// Create a resolver using a preconfigured fetcher
    pub fn with_fetcher(fetcher: Fetcher) -> Self {
        Self { fetcher }
    }

    /// Resolve a source to a usable local path
    ///
    /// Local sources return their path unchanged with zero I/O. Remote
    /// sources without a cache directory are fetched fresh into scoped
    /// temporary storage on every call. Remote sources with a cache
    /// directory are fetched once and then revalidated against the remote
    /// checksum; `check_for_updates` controls whether a missing or
    /// mismatched cached checksum triggers a re-fetch or just a notice.
    ///
    /// Transfer failures propagate unretried. Concurrent calls resolving
    /// the same cache path are not coordinated; callers that need mutual
    /// exclusion must serialize externally.
    pub async fn resolve(
        &self,
        source: &FileSource,
        check_for_updates: bool,
    ) -> LoadResult<ResolvedFile> {
        if !source.is_remote() {
            return Ok(ResolvedFile::permanent(PathBuf::from(&source.path)));
        }

        let Some(cache_dir) = source.cache_dir.clone() else {
            let scratch = tempfile::tempdir()?;
            let dest = scratch.path().join(source.filename());
            tracing::info!(
                url = %source.path,
                dest = ?dest,
                "No cache directory configured, fetching to temporary storage"
            );
            self.fetcher.fetch_source(source, &dest).await?;
            return Ok(ResolvedFile::ephemeral(dest, scratch));
        };

        tokio::fs::create_dir_all(&cache_dir).await?;
        let file_path = cache_dir.join(source.filename());
        let cached_checksum = cache::checksum_path(&file_path);

        if !file_path.exists() {
            tracing::info!(url = %source.path, dest = ?file_path, "Downloading checkpoint to cache");
            self.fetcher.fetch_source(source, &file_path).await?;
        } else if source.checksum_file_path.is_none() {
            tracing::info!(
                path = ?file_path,
                "Cached file has no checksum source; staleness cannot be determined, trusting existing copy"
            );
        } else if !cached_checksum.exists() {
            if check_for_updates {
                tracing::info!(path = ?file_path, "No cached checksum found, re-fetching");
                self.fetcher.fetch_source(source, &file_path).await?;
            } else {
                tracing::info!(
                    path = ?file_path,
                    "No cached checksum found, but update checks are disabled; keeping existing copy"
                );
            }
        } else {
            let remote_checksum = self.fetcher.read_remote_checksum(source).await?;
            let local_checksum = tokio::fs::read(&cached_checksum).await?;

            if remote_checksum == local_checksum {
                tracing::debug!(path = ?file_path, "Cached checksum matches remote, file is fresh");
            } else if check_for_updates {
                tracing::info!(
                    path = ?file_path,
                    "Checksum mismatch, deleting cached file and re-fetching"
                );
                tokio::fs::remove_file(&file_path).await?;
                self.fetcher.fetch_source(source, &file_path).await?;
            } else {
                tracing::warn!(
                    path = ?file_path,
                    "Cached file is stale, but update checks are disabled; keeping existing copy"
                );
            }
        }

        Ok(ResolvedFile::permanent(file_path))
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::FileSource;

    #[tokio::test]
    async fn test_local_source_passes_through() {
        let resolver = Resolver::new();
        let source = FileSource::local("/data/checkpoints/decoder.pth");

        let resolved = resolver.resolve(&source, true).await.unwrap();
        assert_eq!(resolved.path(), Path::new("/data/checkpoints/decoder.pth"));
        assert!(!resolved.is_ephemeral());
    }

    #[tokio::test]
    async fn test_cached_file_without_checksum_source_is_trusted() {
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::write(temp_dir.path().join("model.bin"), "weights").unwrap();

        let resolver = Resolver::new();
        // No checksum source: the cached copy is trusted indefinitely and
        // no network request is made.
        let source = FileSource::url("https://host/model.bin").with_cache_dir(temp_dir.path());

        let resolved = resolver.resolve(&source, true).await.unwrap();
        assert_eq!(resolved.path(), temp_dir.path().join("model.bin"));
        assert_eq!(std::fs::read(resolved.path()).unwrap(), b"weights");
    }

    #[tokio::test]
    async fn test_missing_cached_checksum_with_updates_disabled_keeps_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::write(temp_dir.path().join("model.bin"), "weights").unwrap();

        let resolver = Resolver::new();
        // Checksum source points at a closed port; with updates disabled
        // nothing is fetched, so resolution still succeeds.
        let source = FileSource::url("http://127.0.0.1:9/model.bin")
            .with_checksum_path("http://127.0.0.1:9/model.bin.sha")
            .with_cache_dir(temp_dir.path());

        let resolved = resolver.resolve(&source, false).await.unwrap();
        assert_eq!(std::fs::read(resolved.path()).unwrap(), b"weights");
    }

    #[tokio::test]
    async fn test_missing_file_fetch_failure_propagates() {
        let temp_dir = tempfile::tempdir().unwrap();

        let resolver = Resolver::new();
        let source =
            FileSource::url("http://127.0.0.1:9/model.bin").with_cache_dir(temp_dir.path());

        let result = resolver.resolve(&source, true).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_resolved_file_deref() {
        let resolved = ResolvedFile::permanent(PathBuf::from("/data/model.bin"));
        assert_eq!(resolved.file_name().unwrap(), "model.bin");
        assert_eq!(resolved.as_ref(), Path::new("/data/model.bin"));
    }

    #[test]
    fn test_ephemeral_scratch_removed_on_drop() {
        let scratch = tempfile::tempdir().unwrap();
        let scratch_root = scratch.path().to_path_buf();
        let file_path = scratch_root.join("model.bin");
        std::fs::write(&file_path, "weights").unwrap();

        let resolved = ResolvedFile::ephemeral(file_path.clone(), scratch);
        assert!(resolved.is_ephemeral());
        assert!(file_path.exists());

        drop(resolved);
        assert!(!scratch_root.exists());
    }
}
