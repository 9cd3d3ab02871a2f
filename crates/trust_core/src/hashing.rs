//! Single shared content-hash formula, used by both the retriever's chunk
//! cache and citations so the two always agree on a chunk's identity.
//!
//! Grounded on `source_service.py`'s `_content_hash` (`sha256(source_id +
//! text + timestamp)`, hex-encoded).

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

pub fn content_hash(source_id: &str, text: &str, timestamp: Option<DateTime<Utc>>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source_id.as_bytes());
    hasher.update(text.as_bytes());
    if let Some(ts) = timestamp {
        hasher.update(ts.to_rfc3339().as_bytes());
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_inputs_hash_identically() {
        let a = content_hash("src-1", "some text", None);
        let b = content_hash("src-1", "some text", None);
        assert_eq!(a, b);
    }

    #[test]
    fn different_text_hashes_differently() {
        let a = content_hash("src-1", "some text", None);
        let b = content_hash("src-1", "other text", None);
        assert_ne!(a, b);
    }

    #[test]
    fn hash_is_lowercase_hex() {
        let hash = content_hash("src-1", "some text", None);
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
