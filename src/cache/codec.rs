//! Byte codecs for the persisted store
//!
//! A codec turns the whole [`Store`] into bytes and back. The file has no
//! header or version field, so a cache must always be reopened with the codec
//! that wrote it.

use super::entry::Store;
use super::error::{CacheError, Result};

/// Serializes the entry mapping to and from the backing file's bytes
pub trait Codec: Send + Sync {
    /// Short name used in logs and on the command line
    fn name(&self) -> &'static str;

    fn encode(&self, store: &Store) -> Result<Vec<u8>>;

    fn decode(&self, bytes: &[u8]) -> Result<Store>;
}

/// JSON codec, the default
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn name(&self) -> &'static str {
        "json"
    }

    fn encode(&self, store: &Store) -> Result<Vec<u8>> {
        serde_json::to_vec(store).map_err(|e| CacheError::Encoding(e.into()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Store> {
        serde_json::from_slice(bytes).map_err(|e| CacheError::Decoding(e.into()))
    }
}

/// CBOR codec for compact binary cache files
#[derive(Debug, Clone, Copy, Default)]
pub struct CborCodec;

impl Codec for CborCodec {
    fn name(&self) -> &'static str {
        "cbor"
    }

    fn encode(&self, store: &Store) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        ciborium::into_writer(store, &mut bytes)
            .map_err(|e| CacheError::Encoding(e.to_string().into()))?;
        Ok(bytes)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Store> {
        ciborium::from_reader(bytes).map_err(|e| CacheError::Decoding(e.to_string().into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::entry::Entry;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn sample_store() -> Store {
        let mut store = Store::new();
        store.insert("chicago".to_string(), Entry::new(json!(9729825)));
        store.insert(
            "expiring".to_string(),
            Entry {
                expires: Some(Utc.with_ymd_and_hms(2030, 1, 2, 3, 4, 5).unwrap()),
                data: json!({"name": "v", "tags": ["a", "b"], "ratio": 0.5, "none": null}),
            },
        );
        store
    }

    #[test]
    fn test_json_preserves_store() {
        let store = sample_store();
        let bytes = JsonCodec.encode(&store).expect("Encode should succeed");
        assert_eq!(JsonCodec.decode(&bytes).expect("Decode should succeed"), store);
    }

    #[test]
    fn test_cbor_preserves_store() {
        let store = sample_store();
        let bytes = CborCodec.encode(&store).expect("Encode should succeed");
        assert_eq!(CborCodec.decode(&bytes).expect("Decode should succeed"), store);
    }

    #[test]
    fn test_empty_store_encodes_to_empty_json_object() {
        let bytes = JsonCodec.encode(&Store::new()).unwrap();
        assert_eq!(bytes, b"{}");
    }

    #[test]
    fn test_json_decode_rejects_garbage() {
        let err = JsonCodec.decode(b"not json").unwrap_err();
        assert!(matches!(err, CacheError::Decoding(_)));
    }

    #[test]
    fn test_json_decode_rejects_truncated_file() {
        let bytes = JsonCodec.encode(&sample_store()).unwrap();
        let err = JsonCodec.decode(&bytes[..bytes.len() / 2]).unwrap_err();
        assert!(matches!(err, CacheError::Decoding(_)));
    }

    #[test]
    fn test_cbor_decode_rejects_empty_input() {
        let err = CborCodec.decode(&[]).unwrap_err();
        assert!(matches!(err, CacheError::Decoding(_)));
    }

    #[test]
    fn test_codec_names() {
        assert_eq!(JsonCodec.name(), "json");
        assert_eq!(CborCodec.name(), "cbor");
    }
}
