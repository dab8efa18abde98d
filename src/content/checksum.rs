//! Content hashing for the `FileHash` column
//!
//! Digests are BLAKE3, rendered as 64 uppercase hex characters so that the
//! values line up with the hashes other inventory tools emit for the same
//! share.

/// Hash a file's full contents
///
/// # Example
///
/// ```
/// use share_inventory::content::checksum::content_digest;
///
/// let digest = content_digest(b"hello");
/// assert_eq!(digest.len(), 64);
/// assert!(digest.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
/// ```
pub fn content_digest(content: &[u8]) -> String {
    blake3::hash(content).to_hex().to_ascii_uppercase()
}
