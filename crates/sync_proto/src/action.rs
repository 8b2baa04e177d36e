//! VFS mutations, also the wire-level requests sent to the remote agent.

use serde::{Deserialize, Serialize};

use crate::bytes::{Bytes, PermSet};
use crate::subpath::SubPath;

/// An action applied to the VFS shadow tree and mirrored over the wire to
/// the remote agent. `dest` is the mapping's remote destination root; `sub`
/// is the subpath within it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Action {
    Remove {
        dest: String,
        sub: SubPath,
    },
    PutDir {
        dest: String,
        sub: SubPath,
        perms: PermSet,
    },
    /// Creates an empty regular file.
    PutFile {
        dest: String,
        sub: SubPath,
        perms: PermSet,
    },
    PutLink {
        dest: String,
        sub: SubPath,
        target: String,
    },
    SetPerms {
        dest: String,
        sub: SubPath,
        perms: PermSet,
    },
    /// Writes one block at offset `block_index * BLOCK_SIZE`. `bytes.len()`
    /// is at most `BLOCK_SIZE`; the final block of a file may be short.
    WriteChunk {
        dest: String,
        sub: SubPath,
        block_index: usize,
        hash: Bytes,
        #[serde(with = "serde_bytes")]
        bytes: Vec<u8>,
    },
    /// Truncates or extends the file at `sub` to `size` bytes.
    SetSize {
        dest: String,
        sub: SubPath,
        size: u64,
    },
}

impl Action {
    pub fn sub(&self) -> &SubPath {
        match self {
            Action::Remove { sub, .. }
            | Action::PutDir { sub, .. }
            | Action::PutFile { sub, .. }
            | Action::PutLink { sub, .. }
            | Action::SetPerms { sub, .. }
            | Action::WriteChunk { sub, .. }
            | Action::SetSize { sub, .. } => sub,
        }
    }

    pub fn dest(&self) -> &str {
        match self {
            Action::Remove { dest, .. }
            | Action::PutDir { dest, .. }
            | Action::PutFile { dest, .. }
            | Action::PutLink { dest, .. }
            | Action::SetPerms { dest, .. }
            | Action::WriteChunk { dest, .. }
            | Action::SetSize { dest, .. } => dest,
        }
    }
}
