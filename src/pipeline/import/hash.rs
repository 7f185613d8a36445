use sha2::{Digest, Sha256};

/// SHA-256 fingerprint of document text, lowercase hex.
pub fn content_hash(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}
