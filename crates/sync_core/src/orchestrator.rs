//! The sync loop: initial full scan, debounced sync passes, error recovery,
//! completion notification.
//!
//! ```text
//! START -> INITIAL_SCAN -> IDLE <-> SYNCING -> ... -> CLOSING -> CLOSED
//! ```
//!
//! The orchestrator is the only component that owns a mapping's VFS and
//! writes to the RPC channel - every VFS mutation and RPC send is therefore
//! serialized through it without any explicit locking (§5).

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sync_proto::{Mapping, RpcChannel, SubPath, SyncError};

use crate::debounce::{debounced_deque, EventQueue};
use crate::metadata::metadata_actions;
use crate::planner::plan;
use crate::scanner::{scan_signatures, BufferPool};
use crate::skip::SkipPredicate;
use crate::streamer::{stream_file, StreamError};
use crate::vfs::{Node, Vfs};

/// Every this-many metadata actions (and once more at the end of each
/// phase), the orchestrator drains outstanding RPC acknowledgements - the
/// back-pressure checkpoint from §4.6/§4.7.
const DRAIN_CHECKPOINT: usize = 1000;

/// Default debounce window: absorbs an editor save-storm into one pass.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

/// Drives one or more [`Mapping`]s against a concrete [`RpcChannel`].
pub struct Orchestrator<C: RpcChannel> {
    mappings: Vec<Mapping>,
    vfs: HashMap<String, Vfs>,
    channel: Arc<C>,
    skip: Arc<dyn SkipPredicate>,
    queue: EventQueue,
    pool: BufferPool,
    debounce: Duration,
    running: Arc<AtomicBool>,
    on_complete: Option<Arc<dyn Fn() + Send + Sync>>,
}

impl<C: RpcChannel + 'static> Orchestrator<C> {
    pub fn new(mappings: Vec<Mapping>, channel: C, skip: Arc<dyn SkipPredicate>) -> Self {
        let vfs = mappings
            .iter()
            .map(|m| (m.remote_dest.clone(), Vfs::new()))
            .collect();

        Self {
            mappings,
            vfs,
            channel: Arc::new(channel),
            skip,
            queue: EventQueue::new(),
            pool: BufferPool::new(),
            debounce: DEFAULT_DEBOUNCE,
            running: Arc::new(AtomicBool::new(true)),
            on_complete: None,
        }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn with_on_complete(mut self, cb: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_complete = Some(Arc::new(cb));
        self
    }

    /// The handle a real filesystem watcher thread pushes batches into -
    /// the concrete integration point for the OS-specific watcher source,
    /// which is itself out of scope for this crate.
    pub fn event_sender(&self) -> crossbeam_channel::Sender<Vec<String>> {
        self.queue.sender()
    }

    /// Stops the sync loop: flips the running flag and wakes any thread
    /// currently blocked in the debounce wait, so a `run()` idling in
    /// `IDLE` returns promptly instead of waiting for the next batch. Does
    /// not itself interrupt a blocking RPC call already in flight mid
    /// `SYNCING` - that pass still runs to completion (or to its first
    /// fatal error) before `run()` observes the flag.
    pub fn stop(&self) {
        stop(&self.running, &self.queue);
    }

    /// A cheap, `Send + Sync` handle equivalent to [`Orchestrator::stop`],
    /// for a caller (a signal handler, a shutdown command) that needs to
    /// trigger `CLOSING` from another thread while `run()` holds the
    /// orchestrator by `&mut self` - the same escape hatch
    /// [`Orchestrator::event_sender`] provides for pushing batches.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            running: Arc::clone(&self.running),
            queue: self.queue.clone(),
        }
    }

    pub fn vfs(&self, dest: &str) -> Option<&Vfs> {
        self.vfs.get(dest)
    }

    /// The concrete channel this orchestrator sends actions through - handy
    /// for tests that want to inspect what was sent (e.g. a
    /// [`sync_proto::LoopbackChannel`]).
    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// `FullScan` every mapping and seed its VFS, then enqueue every local
    /// path under each root so the first `SYNCING` pass diffs the whole
    /// tree against what the remote reported.
    pub async fn initial_scan(&mut self) -> Result<(), SyncError> {
        for mapping in self.mappings.clone() {
            let entries = self
                .channel
                .full_scan(&mapping.remote_dest)
                .await
                .map_err(|e| SyncError::Rpc(Box::new(e)))?;

            let vfs = self
                .vfs
                .get_mut(&mapping.remote_dest)
                .expect("vfs is seeded for every mapping in the constructor");

            let mut entries = entries;
            entries.sort_by_key(|(sub, _)| sub.depth());
            for (sub, sig) in &entries {
                vfs.seed(sub, sig);
            }

            log::info!(
                "initial scan of {:?} -> {} seeded {} remote entries",
                mapping.local_root,
                mapping.remote_dest,
                entries.len()
            );

            let paths = walk_all_paths(&mapping.local_root);
            log::debug!(
                "enqueuing {} local paths under {:?} for the first sync pass",
                paths.len(),
                mapping.local_root
            );

            if !paths.is_empty() {
                let _ = self.queue.sender().send(paths);
            }
        }

        Ok(())
    }

    /// Runs `IDLE <-> SYNCING` until the event queue disconnects or
    /// [`Orchestrator::stop`] is called - `CLOSING`/`CLOSED` from the
    /// caller's perspective.
    pub async fn run(&mut self) -> Result<(), SyncError> {
        loop {
            if !self.running.load(Ordering::SeqCst) {
                log::info!("orchestrator stopping on request");
                return Ok(());
            }

            let receiver = self.queue.clone_receiver();
            let stop = self.queue.clone_stop_receiver();
            let debounce = self.debounce;
            let batch =
                tokio::task::spawn_blocking(move || debounced_deque(&receiver, &stop, debounce))
                    .await
                    .map_err(|e| SyncError::Rpc(Box::new(JoinErrorWrapper(e.to_string()))))?;

            let Some(batch) = batch else {
                log::info!("event queue disconnected or interrupted, orchestrator closing");
                return Ok(());
            };

            // sync_pass already isolates and re-enqueues each mapping's own
            // recoverable failure internally (§9); anything it still
            // returns here is fatal.
            if let Err(e) = self.sync_pass(batch).await {
                log::error!("fatal error in sync loop: {e}");
                return Err(e);
            }

            if self.queue.is_empty() {
                if let Some(cb) = &self.on_complete {
                    cb();
                }
            }
        }
    }

    /// One `SYNCING` cycle: canonicalize and de-dup the batch, scope each
    /// path to its mapping, scan, plan, and apply metadata + content
    /// changes for every mapping that had candidates.
    ///
    /// A recoverable failure (`SyncError::is_recoverable`) in one mapping's
    /// `sync_mapping` is logged and that mapping's own candidate paths are
    /// re-enqueued for a later pass, but the loop continues to the next
    /// mapping rather than aborting the whole pass - per §9, a signature or
    /// streaming exception in one mapping must not starve every mapping
    /// after it in `self.mappings`. A fatal error still aborts immediately.
    pub async fn sync_pass(&mut self, batch: Vec<String>) -> Result<(), SyncError> {
        let candidates = canonicalize_and_dedup(&batch);

        for mapping in self.mappings.clone() {
            let subs = self.candidates_for_mapping(&mapping, &candidates);
            if subs.is_empty() {
                continue;
            }

            let original_paths: Vec<String> = subs
                .iter()
                .map(|sub| sub.to_path(&mapping.local_root).to_string_lossy().into_owned())
                .collect();

            match self.sync_mapping(&mapping, subs).await {
                Ok(()) => {}
                Err(e) if e.is_recoverable() => {
                    log::warn!(
                        "recoverable failure syncing {} -> {}, re-enqueueing {} paths and continuing: {e}",
                        mapping.local_root.display(),
                        mapping.remote_dest,
                        original_paths.len(),
                    );
                    let _ = self.queue.sender().send(original_paths);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(())
    }

    fn candidates_for_mapping(&self, mapping: &Mapping, candidates: &[PathBuf]) -> Vec<SubPath> {
        candidates
            .iter()
            .filter(|abs| mapping.contains(abs.as_path()))
            .filter(|abs| !self.skip.skip(abs.as_path(), &mapping.local_root))
            .filter_map(|abs| {
                abs.strip_prefix(&mapping.local_root)
                    .ok()
                    .and_then(|rel| SubPath::from_relative_path(rel).ok())
            })
            .collect()
    }

    async fn sync_mapping(&mut self, mapping: &Mapping, subs: Vec<SubPath>) -> Result<(), SyncError> {
        let local_sigs = scan_signatures(
            &mapping.local_root,
            &subs,
            Arc::clone(&self.skip),
            self.pool.clone(),
        )
        .await?;

        let vfs = self
            .vfs
            .get_mut(&mapping.remote_dest)
            .expect("vfs is seeded for every mapping in the constructor");

        let triples = plan(vfs, local_sigs);
        log::debug!(
            "{} produced {} diff triples for {}",
            mapping.local_root.display(),
            triples.len(),
            mapping.remote_dest
        );

        let mut action_count = 0usize;
        let mut file_plans = Vec::new();

        for triple in &triples {
            let actions = metadata_actions(&mapping.remote_dest, triple);

            for action in actions {
                self.channel
                    .send_action(action.clone())
                    .await
                    .map_err(|e| SyncError::Rpc(Box::new(e)))?;
                vfs.apply(&action);

                action_count += 1;
                if action_count % DRAIN_CHECKPOINT == 0 {
                    self.channel
                        .drain()
                        .await
                        .map_err(|e| SyncError::Rpc(Box::new(e)))?;
                }
            }

            if let Some(sync_proto::Signature::File {
                perms,
                block_hashes,
                size,
            }) = &triple.local
            {
                file_plans.push((triple.sub.clone(), *perms, block_hashes.clone(), *size));
            }
        }

        self.channel
            .drain()
            .await
            .map_err(|e| SyncError::Rpc(Box::new(e)))?;

        let mut streamed = 0usize;
        for (sub, perms, block_hashes, size) in file_plans {
            let remote_value = match vfs.resolve(&sub) {
                Some(Node::File {
                    size, block_hashes, ..
                }) => Some((*size, block_hashes.clone())),
                _ => None,
            };

            stream_file(
                self.channel.as_ref(),
                vfs,
                &mapping.local_root,
                &mapping.remote_dest,
                &sub,
                perms,
                &block_hashes,
                size,
                remote_value,
            )
            .await
            .map_err(|e| match e {
                StreamError::Io(io) => SyncError::StreamFailure(io),
                StreamError::Rpc(rpc) => SyncError::Rpc(Box::new(rpc)),
            })?;

            streamed += 1;
            if streamed % crate::streamer::DRAIN_EVERY_FILES == 0 {
                self.channel
                    .drain()
                    .await
                    .map_err(|e| SyncError::Rpc(Box::new(e)))?;
            }
        }

        self.channel
            .drain()
            .await
            .map_err(|e| SyncError::Rpc(Box::new(e)))?;

        Ok(())
    }
}

/// A cloneable handle that stops an [`Orchestrator`]'s `run()` loop from
/// another thread or task. See [`Orchestrator::stop_handle`].
#[derive(Clone)]
pub struct StopHandle {
    running: Arc<AtomicBool>,
    queue: EventQueue,
}

impl StopHandle {
    pub fn stop(&self) {
        stop(&self.running, &self.queue);
    }
}

fn stop(running: &AtomicBool, queue: &EventQueue) {
    running.store(false, Ordering::SeqCst);
    queue.interrupt();
}

#[derive(Debug, thiserror::Error)]
#[error("sync-thread task panicked: {0}")]
struct JoinErrorWrapper(String);

fn canonicalize_and_dedup(batch: &[String]) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for raw in batch {
        let path = PathBuf::from(raw);
        let canonical = std::fs::canonicalize(&path).unwrap_or(path);

        if seen.insert(canonical.clone()) {
            out.push(canonical);
        }
    }

    out
}

fn walk_all_paths(root: &Path) -> Vec<String> {
    walkdir::WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .map(|entry| entry.path().to_string_lossy().into_owned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sync_proto::LoopbackChannel;

    #[tokio::test]
    async fn recoverable_scan_failure_in_one_mapping_does_not_abort_the_pass() {
        let dir_a = tempfile::tempdir().unwrap();
        let dir_b = tempfile::tempdir().unwrap();
        std::fs::write(dir_a.path().join("f"), b"hello").unwrap();
        std::fs::write(dir_b.path().join("g"), b"world").unwrap();

        let channel = LoopbackChannel::new();
        let mappings = vec![
            Mapping::new(dir_a.path(), "a"),
            Mapping::new(dir_b.path(), "b"),
        ];

        let mut orch = Orchestrator::new(mappings, channel, Arc::new(crate::skip::NoneSkip));
        orch.initial_scan().await.unwrap();

        // "a" gets a deliberately wrong-sized buffer (panics its scan); "b"
        // gets a healthy one. Mappings sync in order, so "a" consumes the
        // bad buffer and leaves the good one for "b".
        let bad = vec![0u8; 1].into_boxed_slice();
        let good = vec![0u8; sync_proto::BLOCK_SIZE].into_boxed_slice();
        orch.pool = BufferPool::from_buffers(vec![bad, good]);

        let batch = vec![
            dir_a.path().join("f").to_string_lossy().into_owned(),
            dir_b.path().join("g").to_string_lossy().into_owned(),
        ];

        // The pass as a whole still succeeds - "a"'s scan failure is
        // recoverable, so it's logged and re-enqueued rather than aborting
        // the loop before "b" is ever reached.
        orch.sync_pass(batch).await.unwrap();

        let sub_g = SubPath::from_segments(["g"]).unwrap();
        match orch.vfs("b").unwrap().resolve(&sub_g).unwrap() {
            Node::File { size, .. } => assert_eq!(*size, "world".len() as u64),
            _ => panic!("expected a file node"),
        }

        // "a" was genuinely skipped this pass, not silently marked done.
        let sub_f = SubPath::from_segments(["f"]).unwrap();
        assert!(orch.vfs("a").unwrap().resolve(&sub_f).is_none());
    }

    #[tokio::test]
    async fn stop_wakes_a_run_call_blocked_waiting_for_the_first_batch() {
        let dir = tempfile::tempdir().unwrap();

        let channel = LoopbackChannel::new();
        let mut orch = Orchestrator::new(
            vec![Mapping::new(dir.path(), "")],
            channel,
            Arc::new(crate::skip::NoneSkip),
        )
        .with_debounce(Duration::from_secs(60));

        orch.initial_scan().await.unwrap();

        // `run()` takes `orch` by `&mut self` for its whole lifetime, so a
        // caller needs this cheap handle (taken before the move) to stop it
        // from another task - same shape as `event_sender()`.
        let stop_handle = orch.stop_handle();
        let run = tokio::spawn(async move { orch.run().await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        stop_handle.stop();

        let result = tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .expect("run() should return promptly once interrupted")
            .unwrap();

        assert!(result.is_ok());
    }
}
