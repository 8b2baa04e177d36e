//! Turns a diff triple into the minimal metadata `Action` sequence.
//!
//! Content blocks are never emitted here, even for a changed regular file -
//! that's the content streamer's job (§4.7), run after these actions have
//! been applied so it can diff against the VFS's post-metadata state.

use sync_proto::{Action, Signature};

use crate::planner::DiffTriple;

/// The minimal action sequence for one diff triple, following the
/// local-vs-remote table:
///
/// | local \ remote | None | Dir | File | Symlink |
/// |---|---|---|---|---|
/// | None | - | Remove | Remove | Remove |
/// | Dir(p) | PutDir(p) | SetPerms(p) | Remove;PutDir(p) | Remove;PutDir(p) |
/// | Symlink(t) | PutLink(t) | Remove;PutLink(t) | Remove;PutLink(t) | Remove;PutLink(t) |
/// | File(p,_,_) | PutFile(p) | Remove;PutFile(p) | SetPerms(p) if perms differ | Remove;PutFile(p) |
pub fn metadata_actions(dest: &str, triple: &DiffTriple) -> Vec<Action> {
    let sub = &triple.sub;

    match (&triple.local, &triple.remote) {
        (None, None) => Vec::new(),
        (None, Some(_)) => vec![remove(dest, sub)],

        (Some(Signature::Dir { perms }), None) => vec![put_dir(dest, sub, *perms)],
        (Some(Signature::Dir { perms }), Some(Signature::Dir { .. })) => {
            vec![set_perms(dest, sub, *perms)]
        }
        (Some(Signature::Dir { perms }), Some(_)) => {
            vec![remove(dest, sub), put_dir(dest, sub, *perms)]
        }

        (Some(Signature::Symlink { target }), None) => vec![put_link(dest, sub, target.clone())],
        (Some(Signature::Symlink { target }), Some(_)) => {
            vec![remove(dest, sub), put_link(dest, sub, target.clone())]
        }

        (Some(Signature::File { perms, .. }), None) => vec![put_file(dest, sub, *perms)],
        (Some(Signature::File { perms, .. }), Some(Signature::File { perms: rperms, .. })) => {
            if perms != rperms {
                vec![set_perms(dest, sub, *perms)]
            } else {
                Vec::new()
            }
        }
        (Some(Signature::File { perms, .. }), Some(_)) => {
            vec![remove(dest, sub), put_file(dest, sub, *perms)]
        }

        (Some(Signature::Other), _) | (_, Some(Signature::Other)) => Vec::new(),
    }
}

fn remove(dest: &str, sub: &sync_proto::SubPath) -> Action {
    Action::Remove {
        dest: dest.to_string(),
        sub: sub.clone(),
    }
}

fn put_dir(dest: &str, sub: &sync_proto::SubPath, perms: sync_proto::PermSet) -> Action {
    Action::PutDir {
        dest: dest.to_string(),
        sub: sub.clone(),
        perms,
    }
}

fn put_file(dest: &str, sub: &sync_proto::SubPath, perms: sync_proto::PermSet) -> Action {
    Action::PutFile {
        dest: dest.to_string(),
        sub: sub.clone(),
        perms,
    }
}

fn put_link(dest: &str, sub: &sync_proto::SubPath, target: String) -> Action {
    Action::PutLink {
        dest: dest.to_string(),
        sub: sub.clone(),
        target,
    }
}

fn set_perms(dest: &str, sub: &sync_proto::SubPath, perms: sync_proto::PermSet) -> Action {
    Action::SetPerms {
        dest: dest.to_string(),
        sub: sub.clone(),
        perms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sync_proto::{PermSet, SubPath};

    fn sub() -> SubPath {
        SubPath::from_segments(["f"]).unwrap()
    }

    #[test]
    fn dir_over_file_removes_then_recreates() {
        let triple = DiffTriple {
            sub: sub(),
            local: Some(Signature::Dir { perms: PermSet(0o755) }),
            remote: Some(Signature::File {
                perms: PermSet(0o644),
                block_hashes: vec![],
                size: 0,
            }),
        };

        let actions = metadata_actions("", &triple);
        assert!(matches!(actions[0], Action::Remove { .. }));
        assert!(matches!(actions[1], Action::PutDir { .. }));
    }

    #[test]
    fn file_over_file_same_perms_emits_nothing() {
        let triple = DiffTriple {
            sub: sub(),
            local: Some(Signature::File {
                perms: PermSet(0o644),
                block_hashes: vec![],
                size: 5,
            }),
            remote: Some(Signature::File {
                perms: PermSet(0o644),
                block_hashes: vec![],
                size: 0,
            }),
        };

        assert!(metadata_actions("", &triple).is_empty());
    }

    #[test]
    fn file_over_file_different_perms_emits_set_perms_only() {
        let triple = DiffTriple {
            sub: sub(),
            local: Some(Signature::File {
                perms: PermSet(0o600),
                block_hashes: vec![],
                size: 0,
            }),
            remote: Some(Signature::File {
                perms: PermSet(0o644),
                block_hashes: vec![],
                size: 0,
            }),
        };

        let actions = metadata_actions("", &triple);
        assert_eq!(actions.len(), 1);
        assert!(matches!(actions[0], Action::SetPerms { .. }));
    }

    #[test]
    fn delete_emits_remove_only() {
        let triple = DiffTriple {
            sub: sub(),
            local: None,
            remote: Some(Signature::Dir { perms: PermSet(0o755) }),
        };

        let actions = metadata_actions("", &triple);
        assert_eq!(actions.len(), 1);
        assert!(matches!(actions[0], Action::Remove { .. }));
    }
}
