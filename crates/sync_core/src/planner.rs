//! Diffs freshly scanned local signatures against the VFS shadow and
//! produces a deterministically ordered sequence of triples to act on.

use sync_proto::{Signature, SubPath};

use crate::vfs::Vfs;

/// One path whose local and remote (VFS) signatures disagree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiffTriple {
    pub sub: SubPath,
    pub local: Option<Signature>,
    pub remote: Option<Signature>,
}

/// Diffs `local_sigs` against `vfs`, dropping paths where the two already
/// agree, and sorts what's left by `(depth, local.is_some(), sub-as-string)`:
///
/// - Shallow-first ensures a folder is created before its children are
///   written.
/// - Within the same depth, deletions (`local.is_none()`) precede
///   creations/updates - required for correctness on case-insensitive
///   remotes, where a rename `foo -> Foo` must delete `foo` before creating
///   `Foo`.
/// - Ties break on the stringified subpath for determinism.
pub fn plan<I>(vfs: &Vfs, local_sigs: I) -> Vec<DiffTriple>
where
    I: IntoIterator<Item = (SubPath, Option<Signature>)>,
{
    let mut triples: Vec<DiffTriple> = local_sigs
        .into_iter()
        .filter_map(|(sub, local)| {
            let remote = vfs.resolve(&sub).map(|node| node.to_signature());

            if local == remote {
                None
            } else {
                Some(DiffTriple { sub, local, remote })
            }
        })
        .collect();

    triples.sort_by(|a, b| {
        a.sub
            .depth()
            .cmp(&b.sub.depth())
            .then_with(|| a.local.is_some().cmp(&b.local.is_some()))
            .then_with(|| a.sub.as_string().cmp(&b.sub.as_string()))
    });

    triples
}

#[cfg(test)]
mod tests {
    use super::*;
    use sync_proto::{Action, PermSet};

    fn sub(s: &str) -> SubPath {
        SubPath::from_segments(s.split('/')).unwrap()
    }

    #[test]
    fn unchanged_paths_are_dropped() {
        let mut vfs = Vfs::new();
        vfs.apply(&Action::PutDir {
            dest: String::new(),
            sub: sub("foo"),
            perms: PermSet(0o755),
        });

        let local = vec![(sub("foo"), Some(Signature::Dir { perms: PermSet(0o755) }))];
        assert!(plan(&vfs, local).is_empty());
    }

    #[test]
    fn shallow_paths_sort_before_deep_ones() {
        let vfs = Vfs::new();

        let local = vec![
            (sub("foo/bar.txt"), Some(Signature::Dir { perms: PermSet(0o755) })),
            (sub("foo"), Some(Signature::Dir { perms: PermSet(0o755) })),
        ];

        let triples = plan(&vfs, local);
        assert_eq!(triples[0].sub.as_string(), "foo");
        assert_eq!(triples[1].sub.as_string(), "foo/bar.txt");
    }

    #[test]
    fn deletions_precede_creations_at_the_same_depth() {
        let mut vfs = Vfs::new();
        vfs.apply(&Action::PutDir {
            dest: String::new(),
            sub: sub("foo"),
            perms: PermSet(0o755),
        });

        // rename foo -> Foo: foo disappears locally, Foo appears.
        let local = vec![
            (sub("Foo"), Some(Signature::Dir { perms: PermSet(0o755) })),
            (sub("foo"), None),
        ];

        let triples = plan(&vfs, local);
        assert_eq!(triples[0].sub.as_string(), "foo");
        assert!(triples[0].local.is_none());
        assert_eq!(triples[1].sub.as_string(), "Foo");
    }
}
