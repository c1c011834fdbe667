//! SHA-256 digests for sheet provenance.

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of `content`
pub fn sha256_hex(content: &str) -> String {
    format!("{:x}", Sha256::digest(content.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex_known_value() {
        assert_eq!(
            sha256_hex(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_sha256_hex_differs_by_content() {
        assert_ne!(sha256_hex("CREATE TABLE a(id int)"), sha256_hex("CREATE TABLE b(id int)"));
    }
}
