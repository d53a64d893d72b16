/// Content checksums for cache keys.
use sha2::{Digest as _, Sha256};

use crate::types::Checksum;

/// SHA-256 of the raw document bytes, hex-encoded.
///
/// Only the bytes matter: the same content under another path or version
/// yields the same checksum.
pub fn checksum(content: &[u8]) -> Checksum {
    let hash = Sha256::digest(content);
    return Checksum(format!("{hash:x}"));
}
