//! Checkpoint Loader - declarative checkpoint resolution and caching
//!
//! A small library that takes a declarative description of a checkpoint
//! file (local path or remote URL, optional checksum source, optional cache
//! directory) and guarantees a valid, up-to-date local copy exists on disk
//! before returning a usable path.

pub mod cache;
pub mod error;
pub mod fetch;
pub mod plan;
pub mod resolve;
pub mod source;

pub use error::{LoadError, LoadResult};
pub use fetch::Fetcher;
pub use plan::{DecoderLoadConfig, ModelLoadConfig, PriorLoadConfig, SingleDecoderLoadConfig};
pub use resolve::{ResolvedFile, Resolver};
pub use source::{FileSource, LoadLocation};
