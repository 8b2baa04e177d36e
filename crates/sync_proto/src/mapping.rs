//! Local-root-to-remote-destination pairs mirrored by the synchronizer.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// One `(localRoot, remoteDest)` pair.
///
/// A set of `Mapping`s must have pairwise-disjoint `local_root`s (no root is
/// a prefix of another) - callers are responsible for validating this before
/// handing mappings to the orchestrator; see [`validate_disjoint`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mapping {
    pub local_root: PathBuf,
    pub remote_dest: String,
}

impl Mapping {
    pub fn new(local_root: impl Into<PathBuf>, remote_dest: impl Into<String>) -> Self {
        Self {
            local_root: local_root.into(),
            remote_dest: remote_dest.into(),
        }
    }

    /// `true` if `candidate` lies under this mapping's local root.
    pub fn contains(&self, candidate: &Path) -> bool {
        candidate.starts_with(&self.local_root)
    }
}

/// A root-prefix violation between two mappings.
#[derive(Debug, Clone, thiserror::Error)]
#[error("mapping root `{prefix}` is a prefix of mapping root `{nested}`")]
pub struct OverlappingMappingError {
    pub prefix: PathBuf,
    pub nested: PathBuf,
}

/// Checks that no mapping's local root is a prefix of another's.
pub fn validate_disjoint(mappings: &[Mapping]) -> Result<(), OverlappingMappingError> {
    for a in mappings {
        for b in mappings {
            if a.local_root != b.local_root && b.local_root.starts_with(&a.local_root) {
                return Err(OverlappingMappingError {
                    prefix: a.local_root.clone(),
                    nested: b.local_root.clone(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_prefix_overlap() {
        let mappings = vec![
            Mapping::new("/home/user/proj", "proj"),
            Mapping::new("/home/user/proj/sub", "sub"),
        ];

        assert!(validate_disjoint(&mappings).is_err());
    }

    #[test]
    fn disjoint_roots_pass() {
        let mappings = vec![
            Mapping::new("/home/user/a", "a"),
            Mapping::new("/home/user/b", "b"),
        ];

        assert!(validate_disjoint(&mappings).is_ok());
    }
}
