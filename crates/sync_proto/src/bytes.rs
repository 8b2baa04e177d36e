//! Content digests and permission bitmasks.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Fixed-length content digest. Canonical form is a 16-byte MD5 of a file
/// block; a stronger hash may be substituted as long as both sides of the
/// wire agree on the length.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bytes(#[serde(with = "serde_bytes")] Vec<u8>);

impl Bytes {
    pub fn new(raw: Vec<u8>) -> Self {
        Self(raw)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn from_md5(digest: md5::Digest) -> Self {
        Self(digest.0.to_vec())
    }
}

impl fmt::Debug for Bytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bytes(")?;
        for b in &self.0 {
            write!(f, "{:02x}", b)?;
        }
        write!(f, ")")
    }
}

/// A POSIX-style permissions bitmask.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct PermSet(pub u32);

impl PermSet {
    pub const DEFAULT_FILE: PermSet = PermSet(0o644);
    pub const DEFAULT_DIR: PermSet = PermSet(0o755);

    pub fn bits(&self) -> u32 {
        self.0
    }
}

impl From<u32> for PermSet {
    fn from(bits: u32) -> Self {
        PermSet(bits)
    }
}
