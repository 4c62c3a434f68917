use sha1::{Digest, Sha1};

/// Compute the SHA-1 digest of the provided bytes.
///
/// Hosting providers use SHA-1 as their content deduplication key,
/// so this digest is not used for anything security-related.
pub fn sha1(data: &[u8]) -> [u8; 20] {
    let mut hasher = Sha1::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Compute the SHA-1 digest of the provided bytes as a lowercase hex string.
pub fn sha1_hex(data: &[u8]) -> String {
    hex::encode(sha1(data))
}
