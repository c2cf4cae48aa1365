//! Error types for checkpoint resolution

use thiserror::Error;

/// Errors surfaced by source construction, fetching, and resolution
#[derive(Debug, Error)]
pub enum LoadError {
    /// A remote-only operation was invoked on a descriptor that cannot
    /// support it (local origin, or no checksum location configured).
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Network/transport failure or missing remote resource during a fetch.
    #[error("transfer failed for {url}: {reason}")]
    Transfer { url: String, reason: String },

    /// Local filesystem failure while writing or reading fetched content.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Structural violation in a declarative load plan.
    #[error("validation error: {0}")]
    Validation(String),
}

impl LoadError {
    pub(crate) fn transfer(url: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Transfer {
            url: url.into(),
            reason: err.to_string(),
        }
    }
}

pub type LoadResult<T> = Result<T, LoadError>;
