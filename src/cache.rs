//! Cache directory conventions
//!
//! Cached checkpoints live flat under a cache directory:
//! ```text
//! <cache_dir>/
//! ├── decoder.pth
//! ├── decoder.pth.checksum
//! └── prior.pth
//! ```
//! The `.checksum` sibling holds the last-known-good checksum content and is
//! the only persisted cache metadata. It exists only for sources that
//! declare a checksum location.

use std::path::{Path, PathBuf};

use crate::source::FileSource;

/// Get the default checkpoint cache directory
///
/// Checks in order:
/// 1. `$CHECKPOINT_CACHE_DIR`
/// 2. `$XDG_CACHE_HOME/checkpoint-loader`
/// 3. `~/.cache/checkpoint-loader`
pub fn default_cache_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("CHECKPOINT_CACHE_DIR") {
        return PathBuf::from(dir);
    }

    if let Ok(xdg_cache) = std::env::var("XDG_CACHE_HOME") {
        return PathBuf::from(xdg_cache).join("checkpoint-loader");
    }

    dirs::home_dir()
        .map(|h| h.join(".cache/checkpoint-loader"))
        .unwrap_or_else(|| PathBuf::from("/tmp/checkpoint-loader"))
}

/// Path of the checksum sibling for a cached file
///
/// e.g., `/cache/decoder.pth` -> `/cache/decoder.pth.checksum`
pub fn checksum_path(file: &Path) -> PathBuf {
    let mut raw = file.as_os_str().to_os_string();
    raw.push(".checksum");
    PathBuf::from(raw)
}

/// Cache path a source resolves to, if it has a cache directory
pub fn cached_path(source: &FileSource) -> Option<PathBuf> {
    source.cache_dir.as_ref().map(|dir| dir.join(source.filename()))
}

/// Check whether a source's target file is present in its cache directory
pub fn is_cached(source: &FileSource) -> bool {
    cached_path(source).is_some_and(|p| p.exists())
}

/// Total size of a cache directory in bytes
pub fn cache_size(dir: &Path) -> u64 {
    dir_size(dir)
}

/// Recursively calculate directory size
fn dir_size(path: &Path) -> u64 {
    let mut size = 0;

    if let Ok(entries) = std::fs::read_dir(path) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                size += dir_size(&path);
            } else if let Ok(metadata) = std::fs::metadata(&path) {
                size += metadata.len();
            }
        }
    }

    size
}

/// List cached checkpoint filenames, excluding checksum siblings
pub fn list_cached_files(dir: &Path) -> Vec<String> {
    if !dir.exists() {
        return Vec::new();
    }

    let mut files = Vec::new();

    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            if !entry.path().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if name.ends_with(".checksum") {
                continue;
            }
            files.push(name);
        }
    }

    files.sort();
    files
}
