//! Reads changed file blocks and emits chunk-write actions, skipping blocks
//! whose hash already matches the remote.
//!
//! This is delta-sync at block granularity: an append-only change rewrites
//! only the final (partial) block and extends size; a mid-file edit
//! rewrites exactly the touched blocks.

use std::path::Path;

use sync_proto::{Action, Bytes, PermSet, SubPath, RpcChannel, BLOCK_SIZE};

use crate::vfs::Vfs;

/// Every this-many streamed files, the caller should drain outstanding RPC
/// acknowledgements - mirrors the metadata sync's checkpoint cadence.
pub const DRAIN_EVERY_FILES: usize = 1000;

/// A block read failed, or the RPC channel rejected an action - the two
/// failure modes a caller needs to tell apart (the former re-enqueues the
/// batch and continues, the latter is fatal).
#[derive(Debug, thiserror::Error)]
pub enum StreamError<E> {
    #[error("reading file content failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("rpc channel rejected an action: {0}")]
    Rpc(E),
}

/// Streams the changed blocks of one local file against its (possibly
/// absent) remote counterpart, sending `WriteChunk`/`SetSize` actions and
/// applying each to `vfs` immediately after it is sent (send-before-apply).
///
/// `remote_value` is the VFS's `(size, block_hashes)` for this file *after*
/// metadata actions have already been applied - a `Dir`/`Symlink`-to-`File`
/// transition will have been replaced with an empty file by the metadata
/// step, so this always sees a file-shaped remote state (or none at all for
/// a brand new file).
pub async fn stream_file<C: RpcChannel>(
    channel: &C,
    vfs: &mut Vfs,
    root: &Path,
    dest: &str,
    sub: &SubPath,
    _perms: PermSet,
    block_hashes: &[Bytes],
    size: u64,
    remote_value: Option<(u64, Vec<Bytes>)>,
) -> Result<(), StreamError<C::Error>> {
    let (other_size, other_hashes) = remote_value.unwrap_or((0, Vec::new()));

    let abs = sub.to_path(root);

    for (index, hash) in block_hashes.iter().enumerate() {
        if index < other_hashes.len() && other_hashes[index] == *hash {
            continue;
        }

        let bytes = read_block(&abs, index)?;

        let action = Action::WriteChunk {
            dest: dest.to_string(),
            sub: sub.clone(),
            block_index: index,
            hash: hash.clone(),
            bytes,
        };

        channel
            .send_action(action.clone())
            .await
            .map_err(StreamError::Rpc)?;
        vfs.apply(&action);
    }

    if size != other_size {
        let action = Action::SetSize {
            dest: dest.to_string(),
            sub: sub.clone(),
            size,
        };

        channel
            .send_action(action.clone())
            .await
            .map_err(StreamError::Rpc)?;
        vfs.apply(&action);
    }

    Ok(())
}

fn read_block(abs: &Path, index: usize) -> std::io::Result<Vec<u8>> {
    let mut file = std::fs::File::open(abs)?;
    let mut buffer = vec![0u8; BLOCK_SIZE];
    let offset = (index as u64) * BLOCK_SIZE as u64;
    let read = crate::sigcompute::read_block_at(&mut file, offset, &mut buffer)?;
    buffer.truncate(read);
    Ok(buffer)
}
