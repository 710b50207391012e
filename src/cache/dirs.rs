//! Cache directory resolution

use std::path::PathBuf;

use directories::ProjectDirs;

use super::error::{CacheError, Result};

/// Maps an application identity to the directory its caches live in
///
/// Implementations must be deterministic for a given `(appname, appauthor)`
/// pair and must not create the directory themselves.
pub trait DirResolver: Send + Sync {
    fn resolve(&self, appname: &str, appauthor: &str) -> Result<PathBuf>;
}

/// Platform cache directory (XDG on Linux, `%LOCALAPPDATA%` on Windows,
/// `~/Library/Caches` on macOS)
#[derive(Debug, Clone, Copy, Default)]
pub struct PlatformDirs;

impl DirResolver for PlatformDirs {
    fn resolve(&self, appname: &str, appauthor: &str) -> Result<PathBuf> {
        let project_dirs =
            ProjectDirs::from("", appauthor, appname).ok_or_else(|| CacheError::NoCacheDir {
                appname: appname.to_string(),
            })?;
        Ok(project_dirs.cache_dir().to_path_buf())
    }
}

/// A fixed directory, regardless of application identity
///
/// Useful for testing or when a specific cache location is needed.
#[derive(Debug, Clone)]
pub struct FixedDir(pub PathBuf);

impl DirResolver for FixedDir {
    fn resolve(&self, _appname: &str, _appauthor: &str) -> Result<PathBuf> {
        Ok(self.0.clone())
    }
}
