//! Computes current local signatures for a batch of candidate subpaths in
//! parallel, bounded by a small pool of scan buffers.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use sync_proto::{Signature, SubPath, SyncError, BLOCK_SIZE};

use crate::skip::SkipPredicate;

/// Number of scan buffers kept in the pool - bounds scan memory to
/// `BUFFER_POOL_SIZE * BLOCK_SIZE` regardless of how many candidates are
/// scanned concurrently.
pub const BUFFER_POOL_SIZE: usize = 6;

type Buffer = Box<[u8]>;

/// A bounded pool of `BLOCK_SIZE` scan buffers. `borrow`/`return_buf` are the
/// async take/give pair; borrowing blocks (cooperatively) when the pool is
/// empty.
#[derive(Clone)]
pub struct BufferPool {
    sender: async_channel::Sender<Buffer>,
    receiver: async_channel::Receiver<Buffer>,
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

impl BufferPool {
    pub fn new() -> Self {
        let (sender, receiver) = async_channel::bounded(BUFFER_POOL_SIZE);
        for _ in 0..BUFFER_POOL_SIZE {
            sender
                .try_send(vec![0u8; BLOCK_SIZE].into_boxed_slice())
                .expect("pool channel sized to hold every buffer");
        }
        Self { sender, receiver }
    }

    pub async fn borrow(&self) -> Buffer {
        self.receiver
            .recv()
            .await
            .expect("buffer pool sender never dropped while pool is alive")
    }

    pub async fn give_back(&self, buffer: Buffer) {
        let _ = self.sender.send(buffer).await;
    }

    /// Builds a pool preloaded with exactly the given buffers, in order -
    /// lets a test hand out a deliberately wrong-sized buffer to force a
    /// `scan_one` panic without disturbing every other buffer in the pool.
    #[cfg(test)]
    pub(crate) fn from_buffers(buffers: Vec<Buffer>) -> Self {
        let (sender, receiver) = async_channel::bounded(buffers.len().max(1));
        for buffer in buffers {
            sender
                .try_send(buffer)
                .expect("pool channel sized to hold every buffer");
        }
        Self { sender, receiver }
    }
}

/// Computes `(sub, Option<Signature>)` for every candidate under `root`,
/// skipping entries the skip predicate excludes and treating a case
/// mismatch (on a case-insensitive volume) as absent.
///
/// Per-path failures (missing file, unreadable symlink, a bad `stat`) are
/// never errors here - they collapse into a `None` signature for that one
/// path, per §4.1/§7. The one failure this *does* surface as a batch-level
/// [`SyncError::ScanFailure`] is a signature-computation task that panicked
/// or was cancelled out from under `spawn_blocking` - a scan-wide fault, not
/// a per-path one, and exactly the "exception thrown while computing
/// signatures for a batch" case §4.8/§7 require the orchestrator to log,
/// re-enqueue, and recover from.
pub async fn scan_signatures(
    root: &Path,
    candidates: &[SubPath],
    skip: Arc<dyn SkipPredicate>,
    pool: BufferPool,
) -> Result<Vec<(SubPath, Option<Signature>)>, SyncError> {
    let root = Arc::new(root.to_path_buf());

    let tasks = candidates.iter().cloned().map(|sub| {
        let root = Arc::clone(&root);
        let skip = Arc::clone(&skip);
        let pool = pool.clone();

        async move {
            let abs = sub.to_path(&root);

            if skip.skip(&abs, &root) {
                return (sub, Ok(None));
            }

            let sig = scan_one(&root, &sub, pool).await;
            (sub, sig)
        }
    });

    let mut out = Vec::with_capacity(candidates.len());
    for (sub, result) in futures::future::join_all(tasks).await {
        match result {
            Ok(sig) => out.push((sub, sig)),
            Err(join_err) => return Err(scan_failure(join_err)),
        }
    }

    Ok(out)
}

/// Wraps a panicked/cancelled `spawn_blocking` task as the
/// [`SyncError::ScanFailure`] the orchestrator reacts to.
fn scan_failure(join_err: tokio::task::JoinError) -> SyncError {
    SyncError::ScanFailure(std::io::Error::new(
        std::io::ErrorKind::Other,
        join_err.to_string(),
    ))
}

async fn scan_one(
    root: &Path,
    sub: &SubPath,
    pool: BufferPool,
) -> Result<Option<Signature>, tokio::task::JoinError> {
    let abs = sub.to_path(root);

    if !case_matches(&abs) {
        return Ok(None);
    }

    let Ok(metadata) = fs::symlink_metadata(&abs) else {
        return Ok(None);
    };
    let file_type = metadata.file_type();

    let mut buffer = pool.borrow().await;
    let abs_owned = abs.clone();

    let result = tokio::task::spawn_blocking(move || {
        crate::sigcompute::compute(&abs_owned, &mut buffer, file_type).map(|sig| (sig, buffer))
    })
    .await?;

    match result {
        Some((sig, buffer)) => {
            pool.give_back(buffer).await;
            Ok(Some(sig))
        }
        None => Ok(None),
    }
}

/// `true` if `abs` exists under exactly the case its segments spell out.
///
/// On a case-insensitive volume, `stat("Foo")` and `stat("foo")` can both
/// succeed for a directory entry actually named `Foo` - the synchronizer
/// must treat the request for `foo` as a miss in that case, or a rename
/// `foo -> Foo` would never be observed as a delete-then-create.
fn case_matches(abs: &Path) -> bool {
    let meta = match fs::symlink_metadata(abs) {
        Ok(meta) => meta,
        Err(_) => return false,
    };

    if meta.file_type().is_symlink() {
        let (Some(parent), Some(name)) = (abs.parent(), abs.file_name()) else {
            return false;
        };

        fs::read_dir(parent)
            .map(|entries| {
                entries
                    .filter_map(Result::ok)
                    .any(|entry| entry.file_name() == name)
            })
            .unwrap_or(false)
    } else {
        real_path_matches(abs)
    }
}

/// Resolves `abs` to its canonical form and checks that the final
/// components agree byte-for-byte with `abs` - the non-symlink analogue of
/// the directory-listing check above, covering case-insensitive volumes
/// where `canonicalize` corrects case without erroring.
fn real_path_matches(abs: &Path) -> bool {
    let canonical = match fs::canonicalize(abs) {
        Ok(c) => c,
        Err(_) => return false,
    };

    let requested: Vec<_> = abs.components().collect();
    let real: Vec<_> = canonical.components().collect();

    if requested.len() > real.len() {
        return false;
    }

    let tail = &real[real.len() - requested.len()..];
    tail == requested.as_slice()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn scans_existing_and_missing_candidates() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("present.txt"), b"hi").unwrap();

        let candidates = vec![
            SubPath::from_segments(["present.txt"]).unwrap(),
            SubPath::from_segments(["missing.txt"]).unwrap(),
        ];

        let results = scan_signatures(
            dir.path(),
            &candidates,
            Arc::new(crate::skip::NoneSkip),
            BufferPool::new(),
        )
        .await
        .unwrap();

        assert_eq!(results.len(), 2);
        let present = results
            .iter()
            .find(|(s, _)| s.as_string() == "present.txt")
            .unwrap();
        assert!(present.1.is_some());

        let missing = results
            .iter()
            .find(|(s, _)| s.as_string() == "missing.txt")
            .unwrap();
        assert!(missing.1.is_none());
    }

    #[tokio::test]
    async fn skip_predicate_wins_over_existence() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join(".git").join("HEAD"), b"ref").unwrap();

        let candidates = vec![SubPath::from_segments([".git", "HEAD"]).unwrap()];

        let results = scan_signatures(
            dir.path(),
            &candidates,
            Arc::new(crate::skip::DotGitSkip),
            BufferPool::new(),
        )
        .await
        .unwrap();

        assert_eq!(results[0].1, None);
    }

    #[tokio::test]
    async fn scan_failure_wraps_a_panicked_compute_task() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("present.txt");
        std::fs::write(&path, b"hi").unwrap();
        let file_type = std::fs::symlink_metadata(&path).unwrap().file_type();

        // A buffer sized wrong trips `compute`'s own length assertion,
        // panicking inside the blocking task - the same fault `scan_one`
        // propagates as a `JoinError` rather than swallowing.
        let mut buffer: Buffer = vec![0u8; 1].into_boxed_slice();

        let join_err = tokio::task::spawn_blocking(move || {
            crate::sigcompute::compute(&path, &mut buffer, file_type)
        })
        .await
        .unwrap_err();

        let err = scan_failure(join_err);
        assert!(err.is_recoverable());
        assert!(matches!(err, SyncError::ScanFailure(_)));
    }
}
