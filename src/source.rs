//! Checkpoint source descriptors
//!
//! A [`FileSource`] declares where one checkpoint artifact lives (local path
//! or remote URL), where its integrity checksum can be found, and where a
//! downloaded copy should be cached. Descriptors are built in two phases:
//! normalization (derive a default checksum location for hosted models)
//! followed by invariant checks. No network I/O happens at construction;
//! unreachable URLs only surface when the fetcher runs.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::LoadError;

/// Where a source's bytes come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadLocation {
    /// A path on the local filesystem
    Local,
    /// A remote HTTP(S) URL
    Url,
}

impl std::fmt::Display for LoadLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Url => write!(f, "url"),
        }
    }
}

const HF_URL_PREFIX: &str = "https://huggingface.co/";

/// Declarative description of one externally-sourced checkpoint file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawFileSource")]
pub struct FileSource {
    pub load_type: LoadLocation,

    /// Filesystem path when `load_type` is local, URL when it is url
    pub path: String,

    /// Location of a file holding the checksum for `path`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum_file_path: Option<String>,

    /// Persistent cache directory; when absent, resolution uses scoped
    /// temporary storage instead
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,

    /// Overrides the filename derived from the last segment of `path`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename_override: Option<String>,
}

/// Pre-normalization shape, straight off the wire
#[derive(Debug, Deserialize)]
struct RawFileSource {
    load_type: LoadLocation,
    path: String,
    #[serde(default)]
    checksum_file_path: Option<String>,
    #[serde(default)]
    cache_dir: Option<PathBuf>,
    #[serde(default)]
    filename_override: Option<String>,
}

impl TryFrom<RawFileSource> for FileSource {
    type Error = LoadError;

    fn try_from(raw: RawFileSource) -> Result<Self, Self::Error> {
        if raw.path.is_empty() {
            return Err(LoadError::Validation(
                "source path must not be empty".to_string(),
            ));
        }

        let checksum_file_path = match raw.checksum_file_path {
            Some(explicit) => Some(explicit),
            None if raw.load_type == LoadLocation::Url => derive_checksum_location(&raw.path),
            None => None,
        };

        Ok(Self {
            load_type: raw.load_type,
            path: raw.path,
            checksum_file_path,
            cache_dir: raw.cache_dir,
            filename_override: raw.filename_override,
        })
    }
}

/// Derive a checksum URL for hosted models
///
/// HuggingFace serves raw file metadata (including the content hash) at the
/// same path with `resolve/main/` swapped for `raw/main/`. Only applies to
/// huggingface.co URLs; everything else stays checksum-less unless one was
/// supplied explicitly.
fn derive_checksum_location(path: &str) -> Option<String> {
    if path.starts_with(HF_URL_PREFIX) && path.contains("resolve") {
        Some(path.replace("resolve/main/", "raw/main/"))
    } else {
        None
    }
}

impl FileSource {
    /// Create a descriptor for a file already on local disk
    pub fn local(path: impl Into<String>) -> Self {
        Self {
            load_type: LoadLocation::Local,
            path: path.into(),
            checksum_file_path: None,
            cache_dir: None,
            filename_override: None,
        }
    }

    /// Create a descriptor for a remote URL
    ///
    /// Applies the hosted-model checksum derivation. An explicit checksum
    /// set afterwards via [`with_checksum_path`](Self::with_checksum_path)
    /// replaces the derived one.
    pub fn url(path: impl Into<String>) -> Self {
        let path = path.into();
        let checksum_file_path = derive_checksum_location(&path);
        Self {
            load_type: LoadLocation::Url,
            path,
            checksum_file_path,
            cache_dir: None,
            filename_override: None,
        }
    }

    /// Set an explicit checksum location
    pub fn with_checksum_path(mut self, checksum_path: impl Into<String>) -> Self {
        self.checksum_file_path = Some(checksum_path.into());
        self
    }

    /// Set a persistent cache directory
    pub fn with_cache_dir(mut self, cache_dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(cache_dir.into());
        self
    }

    /// Override the cached filename
    pub fn with_filename_override(mut self, filename: impl Into<String>) -> Self {
        self.filename_override = Some(filename.into());
        self
    }

    /// Whether this source needs a network fetch to materialize
    pub fn is_remote(&self) -> bool {
        self.load_type == LoadLocation::Url
    }

    /// Filename the artifact is stored under
    ///
    /// Pure, no I/O. The override wins; otherwise the last `/`-delimited
    /// segment of `path` with any trailing query string stripped.
    pub fn filename(&self) -> String {
        if let Some(ref name) = self.filename_override {
            return name.clone();
        }
        let segment = self.path.rsplit('/').next().unwrap_or(&self.path);
        match segment.split_once('?') {
            Some((name, _query)) => name.to_string(),
            None => segment.to_string(),
        }
    }
}
