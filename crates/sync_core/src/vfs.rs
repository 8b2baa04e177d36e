//! In-memory shadow of the remote tree.
//!
//! The VFS is process-lifetime: seeded once from a `FullScan` response at
//! startup, mutated only through [`Vfs::apply`] after the corresponding
//! action has already been written to the wire (send-before-apply, owned by
//! the caller), and torn down on shutdown. Nothing is persisted across
//! restarts - a restart performs a full rescan.
//!
//! `S` in the design's `VFS<S>` is hard-coded here to `(u64, Vec<Bytes>)`,
//! the full remote file signature, rather than kept as a type parameter -
//! this is the one instantiation the system needs.

use std::collections::HashMap;

use sync_proto::{Action, Bytes, PermSet, Signature, SubPath};

/// A node in the shadow tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    Folder {
        perms: PermSet,
        children: HashMap<String, Node>,
    },
    File {
        perms: PermSet,
        size: u64,
        block_hashes: Vec<Bytes>,
    },
    Symlink {
        target: String,
    },
}

impl Node {
    fn new_folder(perms: PermSet) -> Self {
        Node::Folder {
            perms,
            children: HashMap::new(),
        }
    }

    /// The node's state as a [`Signature`], the same shape the planner diffs
    /// local signatures against.
    pub fn to_signature(&self) -> Signature {
        match self {
            Node::Folder { perms, .. } => Signature::Dir { perms: *perms },
            Node::File {
                perms,
                size,
                block_hashes,
            } => Signature::File {
                perms: *perms,
                block_hashes: block_hashes.clone(),
                size: *size,
            },
            Node::Symlink { target } => Signature::Symlink {
                target: target.clone(),
            },
        }
    }
}

/// The in-memory shadow of one mapping's remote tree. Root is always a
/// folder (I1/I2/I3 from the design: every non-root node has exactly one
/// parent folder, `resolve` walks from root or returns `None`, and every
/// mutation goes through [`Vfs::apply`]).
#[derive(Clone, Debug)]
pub struct Vfs {
    root: Node,
}

impl Default for Vfs {
    fn default() -> Self {
        Self::new()
    }
}

impl Vfs {
    pub fn new() -> Self {
        Self {
            root: Node::new_folder(PermSet::DEFAULT_DIR),
        }
    }

    /// Walks `sub` from root; `None` if any intermediate segment is missing
    /// or is not a folder.
    pub fn resolve(&self, sub: &SubPath) -> Option<&Node> {
        let mut current = &self.root;

        for segment in sub.segments() {
            match current {
                Node::Folder { children, .. } => {
                    current = children.get(segment)?;
                }
                _ => return None,
            }
        }

        Some(current)
    }

    fn resolve_parent_mut(&mut self, sub: &SubPath) -> Option<&mut HashMap<String, Node>> {
        let mut current = &mut self.root;
        let segments = sub.segments();
        let (last, ancestors) = segments.split_last()?;

        for segment in ancestors {
            match current {
                Node::Folder { children, .. } => {
                    current = children.get_mut(segment)?;
                }
                _ => return None,
            }
        }

        match current {
            Node::Folder { children, .. } => {
                let _ = last;
                Some(children)
            }
            _ => None,
        }
    }

    /// Seeds the VFS from one `(subpath, signature)` pair of a `FullScan`
    /// response. Entries must be applied in an order where every subpath's
    /// parent has already been created (shallow-first, as the scan response
    /// is expected to list them).
    pub fn seed(&mut self, sub: &SubPath, signature: &Signature) {
        if sub.is_root() {
            if let Signature::Dir { perms } = signature {
                if let Node::Folder { perms: p, .. } = &mut self.root {
                    *p = *perms;
                }
            }
            return;
        }

        let Some(last) = sub.last().map(str::to_string) else {
            return;
        };

        let node = match signature {
            Signature::Dir { perms } => Some(Node::new_folder(*perms)),
            Signature::File {
                perms,
                block_hashes,
                size,
            } => Some(Node::File {
                perms: *perms,
                size: *size,
                block_hashes: block_hashes.clone(),
            }),
            Signature::Symlink { target } => Some(Node::Symlink {
                target: target.clone(),
            }),
            Signature::Other => None,
        };

        if let (Some(node), Some(children)) = (node, self.resolve_parent_mut(sub)) {
            children.insert(last, node);
        }
    }

    /// Applies one [`Action`]'s semantics to the shadow tree. The action
    /// must already have been written to the RPC stream (send-before-apply
    /// is the caller's responsibility, not enforced here).
    pub fn apply(&mut self, action: &Action) {
        match action {
            Action::Remove { sub, .. } => self.remove(sub),
            Action::PutDir { sub, perms, .. } => self.put_dir(sub, *perms),
            Action::PutFile { sub, perms, .. } => self.put_file(sub, *perms),
            Action::PutLink { sub, target, .. } => self.put_link(sub, target.clone()),
            Action::SetPerms { sub, perms, .. } => self.set_perms(sub, *perms),
            Action::WriteChunk {
                sub,
                block_index,
                hash,
                ..
            } => self.write_chunk(sub, *block_index, hash.clone()),
            Action::SetSize { sub, size, .. } => self.set_size(sub, *size),
        }
    }

    /// Deletes the node and its subtree at `sub`. No-op if absent.
    fn remove(&mut self, sub: &SubPath) {
        if sub.is_root() {
            self.root = Node::new_folder(PermSet::DEFAULT_DIR);
            return;
        }
        if let (Some(last), Some(children)) = (sub.last(), self.resolve_parent_mut(sub)) {
            children.remove(last);
        }
    }

    /// Creates a folder if absent; updates perms if present and already a
    /// folder. Present-and-not-a-folder is a planner bug - the planner is
    /// required to emit `Remove` first in that case.
    fn put_dir(&mut self, sub: &SubPath, perms: PermSet) {
        if sub.is_root() {
            if let Node::Folder { perms: p, .. } = &mut self.root {
                *p = perms;
            }
            return;
        }

        let Some(last) = sub.last().map(str::to_string) else {
            return;
        };
        let Some(children) = self.resolve_parent_mut(sub) else {
            return;
        };

        match children.get_mut(&last) {
            Some(Node::Folder { perms: p, .. }) => *p = perms,
            Some(_) => debug_assert!(
                false,
                "put_dir on a non-folder node; planner must Remove first"
            ),
            None => {
                children.insert(last, Node::new_folder(perms));
            }
        }
    }

    /// Creates an empty file node if absent; updates perms and resets the
    /// value if present and already a file.
    fn put_file(&mut self, sub: &SubPath, perms: PermSet) {
        let Some(last) = sub.last().map(str::to_string) else {
            return;
        };
        let Some(children) = self.resolve_parent_mut(sub) else {
            return;
        };

        children.insert(
            last,
            Node::File {
                perms,
                size: 0,
                block_hashes: Vec::new(),
            },
        );
    }

    fn put_link(&mut self, sub: &SubPath, target: String) {
        let Some(last) = sub.last().map(str::to_string) else {
            return;
        };
        let Some(children) = self.resolve_parent_mut(sub) else {
            return;
        };

        children.insert(last, Node::Symlink { target });
    }

    /// Mutates perms of an existing node; no-op if absent.
    fn set_perms(&mut self, sub: &SubPath, perms: PermSet) {
        if sub.is_root() {
            if let Node::Folder { perms: p, .. } = &mut self.root {
                *p = perms;
            }
            return;
        }

        let Some(last) = sub.last() else { return };
        let Some(children) = self.resolve_parent_mut(sub) else {
            return;
        };

        match children.get_mut(last) {
            Some(Node::Folder { perms: p, .. }) | Some(Node::File { perms: p, .. }) => *p = perms,
            _ => {}
        }
    }

    /// Extends `block_hashes` to `max(len, index + 1)` and sets index `i`.
    /// The planner guarantees blocks are written left-to-right up to the new
    /// block count, so the extension never needs to synthesize a sentinel
    /// hash for a skipped slot.
    fn write_chunk(&mut self, sub: &SubPath, index: usize, hash: Bytes) {
        let Some(last) = sub.last() else { return };
        let Some(children) = self.resolve_parent_mut(sub) else {
            return;
        };

        if let Some(Node::File { block_hashes, .. }) = children.get_mut(last) {
            if block_hashes.len() <= index {
                block_hashes.resize(index + 1, hash.clone());
            }
            block_hashes[index] = hash;
        }
    }

    /// Sets the file's size; truncates `block_hashes` to `ceil(size/B)` if
    /// shorter than the current length.
    fn set_size(&mut self, sub: &SubPath, size: u64) {
        let Some(last) = sub.last() else { return };
        let Some(children) = self.resolve_parent_mut(sub) else {
            return;
        };

        if let Some(Node::File {
            size: s,
            block_hashes,
            ..
        }) = children.get_mut(last)
        {
            *s = size;
            let expected = Signature::expected_block_count(size);
            if block_hashes.len() > expected {
                block_hashes.truncate(expected);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sync_proto::BLOCK_SIZE;

    fn sub(segments: &[&str]) -> SubPath {
        SubPath::from_segments(segments.iter().copied()).unwrap()
    }

    #[test]
    fn put_dir_then_put_file_then_resolve() {
        let mut vfs = Vfs::new();
        vfs.apply(&Action::PutDir {
            dest: String::new(),
            sub: sub(&["foo"]),
            perms: PermSet(0o755),
        });
        vfs.apply(&Action::PutFile {
            dest: String::new(),
            sub: sub(&["foo", "bar.txt"]),
            perms: PermSet(0o644),
        });

        let node = vfs.resolve(&sub(&["foo", "bar.txt"])).unwrap();
        assert!(matches!(node, Node::File { size: 0, .. }));
        assert!(vfs.resolve(&sub(&["foo", "missing.txt"])).is_none());
    }

    #[test]
    fn write_chunk_extends_left_to_right_and_set_size_truncates() {
        let mut vfs = Vfs::new();
        vfs.apply(&Action::PutFile {
            dest: String::new(),
            sub: sub(&["f"]),
            perms: PermSet(0o644),
        });

        let h0 = Bytes::new(vec![1; 16]);
        let h1 = Bytes::new(vec![2; 16]);

        vfs.apply(&Action::WriteChunk {
            dest: String::new(),
            sub: sub(&["f"]),
            block_index: 0,
            hash: h0.clone(),
            bytes: vec![0; BLOCK_SIZE],
        });
        vfs.apply(&Action::WriteChunk {
            dest: String::new(),
            sub: sub(&["f"]),
            block_index: 1,
            hash: h1.clone(),
            bytes: vec![0; 10],
        });

        let Node::File { block_hashes, .. } = vfs.resolve(&sub(&["f"])).unwrap() else {
            panic!("expected file node");
        };
        assert_eq!(block_hashes, &[h0, h1]);

        vfs.apply(&Action::SetSize {
            dest: String::new(),
            sub: sub(&["f"]),
            size: BLOCK_SIZE as u64,
        });

        let Node::File {
            block_hashes, size, ..
        } = vfs.resolve(&sub(&["f"])).unwrap()
        else {
            panic!("expected file node");
        };
        assert_eq!(*size, BLOCK_SIZE as u64);
        assert_eq!(block_hashes.len(), 1);
    }

    #[test]
    fn remove_deletes_subtree() {
        let mut vfs = Vfs::new();
        vfs.apply(&Action::PutDir {
            dest: String::new(),
            sub: sub(&["foo"]),
            perms: PermSet(0o755),
        });
        vfs.apply(&Action::PutFile {
            dest: String::new(),
            sub: sub(&["foo", "bar.txt"]),
            perms: PermSet(0o644),
        });
        vfs.apply(&Action::Remove {
            dest: String::new(),
            sub: sub(&["foo"]),
        });

        assert!(vfs.resolve(&sub(&["foo"])).is_none());
        assert!(vfs.resolve(&sub(&["foo", "bar.txt"])).is_none());
    }

    #[test]
    fn remove_on_absent_path_is_a_no_op() {
        let mut vfs = Vfs::new();
        vfs.apply(&Action::Remove {
            dest: String::new(),
            sub: sub(&["nope"]),
        });
        assert!(vfs.resolve(&sub(&["nope"])).is_none());
    }
}
