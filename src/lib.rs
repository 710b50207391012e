//! fcache - a simple, persistent, file-based key-value cache
//!
//! ```no_run
//! use fcache::Cache;
//!
//! # fn main() -> Result<(), fcache::CacheError> {
//! let cache = Cache::open("population", "statistics-fetcher", None)?;
//! cache.set("chicago", &9729825, None)?;
//! assert_eq!(cache.get::<u64>("chicago", false, None)?, Some(9729825));
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod cli;

pub use cache::{
    Cache, CacheBuilder, CacheError, CborCodec, Codec, DirResolver, Entry, FixedDir, JsonCodec,
    Lookup, PlatformDirs, WriteMode,
};
