//! Per-entry synchronization fingerprints.

use serde::{Deserialize, Serialize};

use crate::bytes::{Bytes, PermSet};

/// Block size used for content-addressed file hashing and transfer: 4 MiB.
///
/// `blockHashes[i]` covers bytes `[i*BLOCK_SIZE, min((i+1)*BLOCK_SIZE, size))`.
pub const BLOCK_SIZE: usize = 4 * 1024 * 1024;

/// The synchronization-relevant state of one filesystem entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Signature {
    /// A regular file: permissions, the ordered per-block digests, and the
    /// total size in bytes.
    File {
        perms: PermSet,
        block_hashes: Vec<Bytes>,
        size: u64,
    },
    /// A directory: permissions only.
    Dir { perms: PermSet },
    /// A symbolic link: the verbatim target string (never resolved).
    Symlink { target: String },
    /// Anything not supported (device, socket, fifo). Treated as absent by
    /// every consumer - this variant exists so a `FullScan` response can
    /// still name the subpath without silently dropping it.
    Other,
}

impl Signature {
    /// Number of blocks a `File` signature covers.
    ///
    /// `ceil(size / BLOCK_SIZE)`, zero for an empty file.
    pub fn expected_block_count(size: u64) -> usize {
        if size == 0 {
            0
        } else {
            ((size - 1) / BLOCK_SIZE as u64 + 1) as usize
        }
    }

    pub fn perms(&self) -> Option<PermSet> {
        match self {
            Signature::File { perms, .. } | Signature::Dir { perms } => Some(*perms),
            Signature::Symlink { .. } | Signature::Other => None,
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, Signature::File { .. })
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, Signature::Dir { .. })
    }

    pub fn is_symlink(&self) -> bool {
        matches!(self, Signature::Symlink { .. })
    }

    /// The `(size, block_hashes)` pair the VFS stores per file, if this is a
    /// `File` signature.
    pub fn file_value(&self) -> Option<(u64, Vec<Bytes>)> {
        match self {
            Signature::File {
                block_hashes, size, ..
            } => Some((*size, block_hashes.clone())),
            _ => None,
        }
    }
}
