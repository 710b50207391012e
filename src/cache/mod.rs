//! Cache module for storing key/value data in a single file on disk
//!
//! Each cache is identified by `(cachename, appname, appauthor)` and lives in
//! one file under the application's platform cache directory, named after the
//! SHA-1 of the cache name. The file holds the whole key/entry mapping; every
//! operation re-reads it and mutations rewrite it. Entries can expire after a
//! timeout, and expired data stays readable when explicitly requested.

mod codec;
mod dirs;
mod entry;
mod error;
mod manager;

pub use codec::{CborCodec, Codec, JsonCodec};
pub use dirs::{DirResolver, FixedDir, PlatformDirs};
pub use entry::{Entry, Lookup, Store};
pub use error::{BoxError, CacheError, Result};
pub use manager::{cache_file_name, Cache, CacheBuilder, WriteMode};
