//! The RPC boundary to the remote agent.
//!
//! Only semantic request/response payloads are modeled here - the concrete
//! wire framing (length prefixes, handshakes, transport bring-up) is an
//! explicit non-goal of the synchronization core and is left to whatever
//! concrete channel a binary wires in.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::action::Action;
use crate::signature::Signature;
use crate::subpath::SubPath;

/// The duplex boundary between the sync orchestrator and a remote agent.
///
/// A `FullScan`/`send_action`/`drain` triple, matching §6 of the design: the
/// wire encoding is never named here, only the semantics each call has.
#[async_trait]
pub trait RpcChannel: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Requests the entire `(subpath, signature)` listing under `dest` from
    /// the remote, used once per mapping at startup to seed the VFS.
    async fn full_scan(&self, dest: &str) -> Result<Vec<(SubPath, Signature)>, Self::Error>;

    /// Sends one fire-and-forget action. The caller (the sync orchestrator)
    /// is responsible for writing this strictly before applying the
    /// corresponding VFS mutation (send-before-apply).
    async fn send_action(&self, action: Action) -> Result<(), Self::Error>;

    /// Blocks until every action sent so far has been acknowledged by the
    /// remote. Called at least every 1000 actions and at the end of each
    /// phase, bounding unacknowledged-write memory on the remote.
    async fn drain(&self) -> Result<(), Self::Error>;
}

/// In-memory test double for [`RpcChannel`] that mirrors actions into a
/// second in-memory tree instead of a real remote agent.
///
/// Used by unit and integration tests to intercept the wire: every action
/// handed to `send_action` is recorded verbatim (for order/content
/// assertions) and also folded into a signature map a test can read back as
/// if it were the remote's post-sync state.
pub struct LoopbackChannel {
    inner: Mutex<LoopbackState>,
}

#[derive(Default)]
struct LoopbackState {
    sent: Vec<Action>,
    /// Per-destination map of subpath -> signature, mutated the same way
    /// the remote agent would apply each action.
    trees: HashMap<String, HashMap<SubPath, Signature>>,
}

impl Default for LoopbackChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackChannel {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(LoopbackState::default()),
        }
    }

    /// Seeds the tree a subsequent `full_scan` will report for `dest`.
    pub fn seed(&self, dest: &str, entries: Vec<(SubPath, Signature)>) {
        let mut guard = self.inner.lock().expect("loopback channel lock poisoned");
        let tree = guard.trees.entry(dest.to_string()).or_default();
        for (sub, sig) in entries {
            tree.insert(sub, sig);
        }
    }

    /// Every action sent so far, in send order - used to assert ordering
    /// and send-before-apply invariants.
    pub fn sent_actions(&self) -> Vec<Action> {
        self.inner
            .lock()
            .expect("loopback channel lock poisoned")
            .sent
            .clone()
    }

    /// The current simulated remote tree for `dest`, as if freshly scanned.
    pub fn tree(&self, dest: &str) -> Vec<(SubPath, Signature)> {
        self.inner
            .lock()
            .expect("loopback channel lock poisoned")
            .trees
            .get(dest)
            .map(|tree| tree.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoopbackError {}

#[async_trait]
impl RpcChannel for LoopbackChannel {
    type Error = LoopbackError;

    async fn full_scan(&self, dest: &str) -> Result<Vec<(SubPath, Signature)>, Self::Error> {
        Ok(self.tree(dest))
    }

    async fn send_action(&self, action: Action) -> Result<(), Self::Error> {
        let mut guard = self.inner.lock().expect("loopback channel lock poisoned");
        apply_to_tree(&mut guard.trees, &action);
        guard.sent.push(action);
        Ok(())
    }

    async fn drain(&self) -> Result<(), Self::Error> {
        Ok(())
    }
}

fn apply_to_tree(trees: &mut HashMap<String, HashMap<SubPath, Signature>>, action: &Action) {
    use crate::bytes::PermSet;

    let tree = trees.entry(action.dest().to_string()).or_default();
    let sub = action.sub().clone();

    match action {
        Action::Remove { sub, .. } => {
            let prefix = sub.clone();
            tree.retain(|k, _| !is_prefix(&prefix, k));
        }
        Action::PutDir { perms, .. } => {
            tree.insert(sub, Signature::Dir { perms: *perms });
        }
        Action::PutFile { perms, .. } => {
            tree.insert(
                sub,
                Signature::File {
                    perms: *perms,
                    block_hashes: Vec::new(),
                    size: 0,
                },
            );
        }
        Action::PutLink { target, .. } => {
            tree.insert(
                sub,
                Signature::Symlink {
                    target: target.clone(),
                },
            );
        }
        Action::SetPerms { perms, .. } => {
            if let Some(existing) = tree.get_mut(&sub) {
                match existing {
                    Signature::File { perms: p, .. } | Signature::Dir { perms: p } => *p = *perms,
                    _ => {}
                }
            }
        }
        Action::WriteChunk {
            block_index, hash, ..
        } => {
            let entry = tree.entry(sub).or_insert_with(|| Signature::File {
                perms: PermSet::DEFAULT_FILE,
                block_hashes: Vec::new(),
                size: 0,
            });
            if let Signature::File { block_hashes, .. } = entry {
                if block_hashes.len() <= *block_index {
                    block_hashes.resize(*block_index + 1, hash.clone());
                }
                block_hashes[*block_index] = hash.clone();
            }
        }
        Action::SetSize { size, .. } => {
            if let Some(Signature::File {
                block_hashes, size: s, ..
            }) = tree.get_mut(&sub)
            {
                *s = *size;
                let expected = Signature::expected_block_count(*size);
                if block_hashes.len() > expected {
                    block_hashes.truncate(expected);
                }
            }
        }
    }
}

fn is_prefix(prefix: &SubPath, candidate: &SubPath) -> bool {
    candidate.segments().starts_with(prefix.segments())
}
