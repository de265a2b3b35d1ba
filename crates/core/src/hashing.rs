//! SHA-256 digests.
//!
//! Refresh tokens and verification tokens are stored only as digests, and
//! the audit chain links each entry to its predecessor with one.

use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// Digest of a bearer secret as stored at rest.
pub fn digest_secret(secret: &str) -> String {
    sha256_hex(secret.as_bytes())
}

/// Digest linking an audit entry to the hash of the entry before it.
pub fn chain_digest(prev_hash: &str, entry_data: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prev_hash.as_bytes());
    hasher.update(b"|");
    hasher.update(entry_data.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_published_vector() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn chain_digest_equals_joined_input() {
        assert_eq!(chain_digest("prev", "entry"), sha256_hex(b"prev|entry"));
    }

    #[test]
    fn secrets_never_digest_to_themselves() {
        let digest = digest_secret("refresh-token");
        assert_eq!(digest.len(), 64);
        assert_ne!(digest, "refresh-token");
    }
}
