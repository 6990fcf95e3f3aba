//! Content hashing for install-time recording and reconciliation.
//!
//! Both call sites (recording at write time, comparing at detect time) hash
//! the raw on-disk bytes. No line-ending normalization happens anywhere:
//! normalizing on one side but not the other is exactly how false-positive
//! "modified" detections appear.

use crate::Result;
use anyhow::Context;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Prefix identifying the hash algorithm in stored checksums
pub const HASH_PREFIX: &str = "sha256:";

/// Hash a byte slice into the stored checksum format ("sha256:" + hex)
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{}{:x}", HASH_PREFIX, hasher.finalize())
}

/// Hash a file's on-disk bytes
pub fn hash_file(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read {} for hashing", path.display()))?;
    Ok(hash_bytes(&bytes))
}
