//! Shared key generation for storage backends.
//!
//! Objects are keyed by the decimal file id; the variant selects the directory or bucket.

/// Storage key for a file id.
pub fn object_key(id: u64) -> String {
    id.to_string()
}
