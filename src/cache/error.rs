//! Error types for cache operations

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Boxed error produced by a codec or by value conversion
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used throughout the cache module
pub type Result<T> = std::result::Result<T, CacheError>;

/// Error types for cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    /// The requested key is not in the store
    #[error("Key not found in cache: '{0}'")]
    KeyNotFound(String),

    /// The backing file could not be opened, read or written
    #[error("I/O error on cache file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A value or the store could not be serialized
    #[error("Failed to encode cache data: {0}")]
    Encoding(#[source] BoxError),

    /// The backing file or a stored value could not be deserialized
    #[error("Failed to decode cache data: {0}")]
    Decoding(#[source] BoxError),

    /// `flush` was called after the backing file went away
    #[error("The following cache file does not exist: {}", .0.display())]
    CacheFileMissing(PathBuf),

    /// The backing file could not be removed
    #[error("Failed to delete cache file {path}: {source}")]
    Delete {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No platform cache directory could be determined (e.g., no home directory)
    #[error("Could not determine a cache directory for application '{appname}'")]
    NoCacheDir { appname: String },

    /// The timeout pushes the expiry past the representable time range
    #[error("Timeout out of range: {0:?}")]
    InvalidTimeout(Duration),
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CacheError::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns true for the "key absent" case, which callers often treat as a soft miss
    pub fn is_key_not_found(&self) -> bool {
        matches!(self, CacheError::KeyNotFound(_))
    }
}
