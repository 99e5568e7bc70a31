//! Hashing helpers used for item identity and content-addressed delivery.

use md5::{Digest as _, Md5};
use sha2::Sha256;

/// Stable `item_id` derivation: the first 32 hex characters of the BLAKE3
/// hash of the item's canonicalized source path, relative to the input root.
#[must_use]
pub fn item_id_from_path(relative_path: &str) -> String {
    let digest = blake3::hash(relative_path.as_bytes());
    digest.to_hex()[..32].to_string()
}

/// SHA-256 of concatenated raw text, hex-encoded, for `Artifact::raw_text_sha256`.
#[must_use]
pub fn sha256_hex(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// MD5 of the primary document's bytes, the delivery dedup key
/// (`Artifact::content_md5`). See DESIGN.md for the basis decision.
#[must_use]
pub fn content_md5_hex(bytes: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_id_is_deterministic() {
        let a = item_id_from_path("input/2024/item-42/");
        let b = item_id_from_path("input/2024/item-42/");
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn different_paths_differ() {
        assert_ne!(
            item_id_from_path("input/a"),
            item_id_from_path("input/b")
        );
    }

    #[test]
    fn content_md5_matches_known_vector() {
        assert_eq!(content_md5_hex(b""), "d41d8cd98f00b204e9800998ecf8427e");
    }
}
