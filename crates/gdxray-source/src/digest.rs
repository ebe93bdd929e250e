//! Container content digests.
//!
//! A digest identifies the exact bytes a dataset was loaded from, so that
//! reports and extracted arrays can be traced back to their container.
//!
//! - algorithm: **SHA-256**
//! - input: the raw bytes of the container as read from disk
//! - output: `"sha256:<64 lowercase hex digits>"`

use sha2::{Digest, Sha256};
use std::fmt::Write;

/// Prefix used in serialized digests.
pub const CONTAINER_DIGEST_PREFIX: &str = "sha256:";

/// Compute the digest of a container's raw bytes.
pub fn container_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let hash: [u8; 32] = hasher.finalize().into();

    let mut out = String::with_capacity(CONTAINER_DIGEST_PREFIX.len() + 64);
    out.push_str(CONTAINER_DIGEST_PREFIX);
    for b in hash {
        let _ = write!(out, "{b:02x}");
    }
    out
}
