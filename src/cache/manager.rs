//! The file-backed cache
//!
//! Provides a `Cache` that keeps one file per cache identity. Every operation
//! reads the whole store from disk, and mutating operations write the whole
//! store back, so each call observes the latest on-disk state. Nothing is
//! held in memory between calls and there is no locking: concurrent writers
//! to the same file race, and the last full rewrite wins.

use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use sha1::{Digest, Sha1};
use tempfile::NamedTempFile;
use tracing::{debug, trace};

use super::codec::{Codec, JsonCodec};
use super::dirs::{DirResolver, FixedDir, PlatformDirs};
use super::entry::{Entry, Lookup, Store};
use super::error::{CacheError, Result};

/// How the backing file is rewritten after a mutation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WriteMode {
    /// Truncate and rewrite the file in place. A crash mid-write can leave a
    /// torn file that later fails to decode.
    #[default]
    InPlace,
    /// Write a synced temp file next to the backing file and rename it over
    /// the old one.
    Atomic,
}

/// Returns the backing file name for a cache name: hex(sha1(utf8(cachename)))
pub fn cache_file_name(cachename: &str) -> String {
    hex::encode(Sha1::digest(cachename.as_bytes()))
}

/// Computes the expiry for an entry written at `now` with the given timeout
fn expiry_after(now: DateTime<Utc>, timeout: Duration) -> Result<DateTime<Utc>> {
    chrono::Duration::from_std(timeout)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .ok_or(CacheError::InvalidTimeout(timeout))
}

/// Converts a value into its stored form
///
/// `serde_json` turns NaN and infinities into `null`, so non-finite floats are
/// rejected here instead of being stored as something else.
fn encode_value<T: Serialize + ?Sized>(value: &T) -> Result<serde_json::Value> {
    let raw = ciborium::Value::serialized(value)
        .map_err(|e| CacheError::Encoding(e.to_string().into()))?;
    if let Some(float) = find_non_finite(&raw) {
        return Err(CacheError::Encoding(
            format!("non-finite float {} cannot be cached", float).into(),
        ));
    }
    serde_json::to_value(value).map_err(|e| CacheError::Encoding(e.into()))
}

fn find_non_finite(value: &ciborium::Value) -> Option<f64> {
    match value {
        ciborium::Value::Float(float) if !float.is_finite() => Some(*float),
        ciborium::Value::Tag(_, inner) => find_non_finite(inner),
        ciborium::Value::Array(items) => items.iter().find_map(find_non_finite),
        ciborium::Value::Map(entries) => entries
            .iter()
            .find_map(|(key, value)| find_non_finite(key).or_else(|| find_non_finite(value))),
        _ => None,
    }
}

fn decode_value<T: DeserializeOwned>(data: serde_json::Value) -> Result<T> {
    serde_json::from_value(data).map_err(|e| CacheError::Decoding(e.into()))
}

/// Configures and opens a [`Cache`]
pub struct CacheBuilder {
    cachename: String,
    appname: String,
    appauthor: Option<String>,
    resolver: Box<dyn DirResolver>,
    codec: Arc<dyn Codec>,
    write_mode: WriteMode,
}

impl CacheBuilder {
    fn new(cachename: impl Into<String>, appname: impl Into<String>) -> Self {
        Self {
            cachename: cachename.into(),
            appname: appname.into(),
            appauthor: None,
            resolver: Box::new(PlatformDirs),
            codec: Arc::new(JsonCodec),
            write_mode: WriteMode::default(),
        }
    }

    /// Sets the application author; `None` or an empty string means "same as appname"
    pub fn appauthor(mut self, appauthor: Option<impl Into<String>>) -> Self {
        self.appauthor = appauthor.map(Into::into);
        self
    }

    /// Stores the cache in `dir` instead of the platform cache directory
    pub fn cache_dir(self, dir: impl Into<PathBuf>) -> Self {
        self.resolver(FixedDir(dir.into()))
    }

    pub fn resolver(mut self, resolver: impl DirResolver + 'static) -> Self {
        self.resolver = Box::new(resolver);
        self
    }

    pub fn codec(mut self, codec: impl Codec + 'static) -> Self {
        self.codec = Arc::new(codec);
        self
    }

    pub fn write_mode(mut self, write_mode: WriteMode) -> Self {
        self.write_mode = write_mode;
        self
    }

    /// Resolves the backing file and creates it if it does not exist yet
    ///
    /// Opening an identity whose file already exists leaves the file untouched.
    pub fn open(self) -> Result<Cache> {
        let appauthor = match self.appauthor {
            Some(author) if !author.is_empty() => author,
            _ => self.appname.clone(),
        };
        let cache_dir = self.resolver.resolve(&self.appname, &appauthor)?;
        let path = cache_dir.join(cache_file_name(&self.cachename));

        let cache = Cache {
            cachename: self.cachename,
            appname: self.appname,
            appauthor,
            cache_dir,
            path,
            codec: self.codec,
            write_mode: self.write_mode,
        };

        if !cache.path.exists() {
            cache.create()?;
        }
        Ok(cache)
    }
}

/// A cache that stores its data in a single file on the file system
///
/// Cached values can be any serializable type and can optionally expire
/// after a timeout. Any number of `Cache` values opened with the same
/// `(cachename, appname, appauthor)` address the same file.
#[derive(Clone)]
pub struct Cache {
    cachename: String,
    appname: String,
    appauthor: String,
    cache_dir: PathBuf,
    path: PathBuf,
    codec: Arc<dyn Codec>,
    write_mode: WriteMode,
}

impl fmt::Debug for Cache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("cachename", &self.cachename)
            .field("appname", &self.appname)
            .field("appauthor", &self.appauthor)
            .field("path", &self.path)
            .field("codec", &self.codec.name())
            .field("write_mode", &self.write_mode)
            .finish()
    }
}

impl Cache {
    /// Opens the cache `cachename` for `appname` in the platform cache directory
    ///
    /// # Arguments
    /// * `cachename` - A unique name for the cache
    /// * `appname` - The application the cache belongs to
    /// * `appauthor` - The application's author (used on Windows); defaults to `appname`
    ///
    /// # Returns
    /// * `Ok(Cache)` once the backing file exists
    /// * `Err` if no cache directory can be determined or the file cannot be created
    pub fn open(cachename: &str, appname: &str, appauthor: Option<&str>) -> Result<Self> {
        Self::builder(cachename, appname).appauthor(appauthor).open()
    }

    pub fn builder(cachename: impl Into<String>, appname: impl Into<String>) -> CacheBuilder {
        CacheBuilder::new(cachename, appname)
    }

    pub fn cachename(&self) -> &str {
        &self.cachename
    }

    pub fn appname(&self) -> &str {
        &self.appname
    }

    pub fn appauthor(&self) -> &str {
        &self.appauthor
    }

    /// Directory holding the backing file
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stores `value` under `key`, replacing any previous entry
    ///
    /// # Arguments
    /// * `key` - The name given to the data
    /// * `value` - The data to cache (must implement Serialize)
    /// * `timeout` - How long the data stays live; `None` means forever
    ///
    /// # Returns
    /// * `Err(CacheError::Encoding)` if `value` cannot be serialized or holds NaN or infinity
    /// * `Err(CacheError::Io)` if the backing file cannot be read or written
    pub fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        timeout: Option<Duration>,
    ) -> Result<()> {
        let mut store = self.load()?;
        let expires = timeout
            .map(|timeout| expiry_after(Utc::now(), timeout))
            .transpose()?;
        let data = encode_value(value)?;
        store.insert(key.to_string(), Entry { expires, data });
        self.store(&store)
    }

    /// Gets the data stored under `key`
    ///
    /// Returns `Ok(None)` if the entry has expired, unless `override_expiry`
    /// is set, in which case expired data is returned as well. A missing key
    /// yields `default` when one is given and `CacheError::KeyNotFound`
    /// otherwise.
    pub fn get<T: DeserializeOwned>(
        &self,
        key: &str,
        override_expiry: bool,
        default: Option<T>,
    ) -> Result<Option<T>> {
        let Some(entry) = self.load()?.remove(key) else {
            return default
                .map(Some)
                .ok_or_else(|| CacheError::KeyNotFound(key.to_string()));
        };
        if override_expiry || entry.is_live_at(Utc::now()) {
            decode_value(entry.data).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Looks up `key` without treating a missing key as an error
    pub fn lookup<T: DeserializeOwned>(&self, key: &str) -> Result<Lookup<T>> {
        let Some(entry) = self.load()?.remove(key) else {
            return Ok(Lookup::Missing);
        };
        let live = entry.is_live_at(Utc::now());
        let data = decode_value(entry.data)?;
        Ok(if live {
            Lookup::Fresh(data)
        } else {
            Lookup::Stale(data)
        })
    }

    /// Whether an entry exists under `key`, expired or not
    pub fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.load()?.contains_key(key))
    }

    /// All stored keys in sorted order, including expired ones
    pub fn keys(&self) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self.load()?.into_keys().collect();
        keys.sort();
        Ok(keys)
    }

    /// Number of stored entries, including expired ones
    pub fn len(&self) -> Result<usize> {
        Ok(self.load()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Forces the entry under `key` to expire now
    ///
    /// The entry is kept, so `get` with `override_expiry` still returns it.
    pub fn invalidate(&self, key: &str) -> Result<()> {
        let mut store = self.load()?;
        let entry = store
            .get_mut(key)
            .ok_or_else(|| CacheError::KeyNotFound(key.to_string()))?;
        entry.expires = Some(Utc::now());
        debug!(cache = %self.cachename, key, "Invalidated cache entry");
        self.store(&store)
    }

    /// Removes the entry under `key`
    pub fn remove(&self, key: &str) -> Result<()> {
        let mut store = self.load()?;
        if store.remove(key).is_none() {
            return Err(CacheError::KeyNotFound(key.to_string()));
        }
        self.store(&store)
    }

    /// Removes every entry; the backing file itself is kept
    pub fn flush(&self) -> Result<()> {
        if !self.path.exists() {
            return Err(CacheError::CacheFileMissing(self.path.clone()));
        }
        debug!(cache = %self.cachename, path = %self.path.display(), "Flushing cache");
        self.store(&Store::new())
    }

    /// Deletes the backing file
    ///
    /// Fails if the file does not exist, or on platforms where a file in use
    /// by another process cannot be removed.
    pub fn delete(&self) -> Result<()> {
        fs::remove_file(&self.path).map_err(|source| CacheError::Delete {
            path: self.path.clone(),
            source,
        })?;
        debug!(cache = %self.cachename, path = %self.path.display(), "Deleted cache file");
        Ok(())
    }

    /// Creates the backing file holding an empty store
    ///
    /// The encoded empty store is written to a temp file in the cache
    /// directory, which is then renamed onto the final name, so the file is
    /// never visible half-written. If another process creates the file first,
    /// its file is kept.
    fn create(&self) -> Result<bool> {
        fs::create_dir_all(&self.cache_dir).map_err(|e| CacheError::io(&self.cache_dir, e))?;

        let bytes = self.codec.encode(&Store::new())?;
        let mut temp_file =
            NamedTempFile::new_in(&self.cache_dir).map_err(|e| CacheError::io(&self.cache_dir, e))?;
        temp_file
            .write_all(&bytes)
            .map_err(|e| CacheError::io(temp_file.path(), e))?;

        match temp_file.persist_noclobber(&self.path) {
            Ok(_) => {
                debug!(
                    cache = %self.cachename,
                    path = %self.path.display(),
                    codec = self.codec.name(),
                    "Created cache file"
                );
                Ok(true)
            }
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                debug!(path = %self.path.display(), "Cache file appeared concurrently, keeping it");
                Ok(false)
            }
            Err(e) => Err(CacheError::io(&self.path, e.error)),
        }
    }

    fn load(&self) -> Result<Store> {
        let bytes = fs::read(&self.path).map_err(|e| CacheError::io(&self.path, e))?;
        trace!(path = %self.path.display(), bytes = bytes.len(), "Loaded cache file");
        self.codec.decode(&bytes)
    }

    fn store(&self, store: &Store) -> Result<()> {
        let bytes = self.codec.encode(store)?;
        match self.write_mode {
            WriteMode::InPlace => {
                fs::write(&self.path, &bytes).map_err(|e| CacheError::io(&self.path, e))?
            }
            WriteMode::Atomic => self.replace_atomically(&bytes)?,
        }
        trace!(
            path = %self.path.display(),
            bytes = bytes.len(),
            entries = store.len(),
            "Stored cache file"
        );
        Ok(())
    }

    fn replace_atomically(&self, bytes: &[u8]) -> Result<()> {
        let mut temp_file =
            NamedTempFile::new_in(&self.cache_dir).map_err(|e| CacheError::io(&self.cache_dir, e))?;
        temp_file
            .write_all(bytes)
            .and_then(|()| temp_file.as_file().sync_all())
            .map_err(|e| CacheError::io(temp_file.path(), e))?;
        temp_file
            .persist(&self.path)
            .map_err(|e| CacheError::io(&self.path, e.error))?;
        Ok(())
    }
}
