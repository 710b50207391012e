//! Stored entries and lookup results

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The persisted mapping from key to entry
pub type Store = HashMap<String, Entry>;

/// A single value stored in the cache file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Entry {
    /// When the entry stops being live; `None` means never
    pub expires: Option<DateTime<Utc>>,
    /// The cached data
    pub data: serde_json::Value,
}

impl Entry {
    /// Creates an entry that never expires
    pub fn new(data: serde_json::Value) -> Self {
        Self {
            expires: None,
            data,
        }
    }

    /// Whether the entry is live at `now`
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires {
            None => true,
            Some(expires) => now < expires,
        }
    }
}

/// Result of looking up a key, including whether the entry is still fresh
///
/// Stale entries still carry their data so callers can fall back to it,
/// the same way `get` does with `override_expiry`.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    /// The entry exists and has not expired
    Fresh(T),
    /// The entry exists but has expired or been invalidated
    Stale(T),
    /// No entry is stored under the key
    Missing,
}

impl<T> Lookup<T> {
    /// Returns the data if the entry is fresh
    pub fn fresh(self) -> Option<T> {
        match self {
            Lookup::Fresh(data) => Some(data),
            _ => None,
        }
    }

    /// Returns the data whether or not the entry has expired
    pub fn any(self) -> Option<T> {
        match self {
            Lookup::Fresh(data) | Lookup::Stale(data) => Some(data),
            Lookup::Missing => None,
        }
    }

    /// Whether no entry is stored under the key
    pub fn is_missing(&self) -> bool {
        matches!(self, Lookup::Missing)
    }
}
