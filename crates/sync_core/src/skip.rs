//! Skip policies: the predicate consulted before a path ever reaches the
//! signature scanner.
//!
//! The core only consumes a [`SkipPredicate`]; it does not mandate a single
//! policy. `dotgit`, `none`, and a glob list are the "standard policies"
//! named by the design; a full `.gitignore` engine is an extension point
//! left to a caller that wants one.

use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};

/// `(candidate, root) -> bool`. `true` means the candidate is excluded from
/// every stage downstream - scanning, planning, and streaming.
pub trait SkipPredicate: Send + Sync {
    fn skip(&self, candidate: &Path, root: &Path) -> bool;
}

impl<F> SkipPredicate for F
where
    F: Fn(&Path, &Path) -> bool + Send + Sync,
{
    fn skip(&self, candidate: &Path, root: &Path) -> bool {
        self(candidate, root)
    }
}

/// Never skips anything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoneSkip;

impl SkipPredicate for NoneSkip {
    fn skip(&self, _candidate: &Path, _root: &Path) -> bool {
        false
    }
}

/// Skips any path whose first relative segment (from `root`) is `.git`.
#[derive(Clone, Copy, Debug, Default)]
pub struct DotGitSkip;

impl SkipPredicate for DotGitSkip {
    fn skip(&self, candidate: &Path, root: &Path) -> bool {
        candidate
            .strip_prefix(root)
            .ok()
            .and_then(|rel| rel.components().next())
            .map(|first| first.as_os_str() == ".git")
            .unwrap_or(false)
    }
}

/// Skips any path whose relative-to-root string matches one of a fixed set
/// of glob patterns, via a compiled [`GlobSet`] - not a full `.gitignore`
/// engine (negation and directory-only patterns are out of scope), but
/// real glob syntax (`*`, `?`, `[...]`, `**`) rather than a hand-rolled
/// wildcard matcher.
#[derive(Clone, Debug)]
pub struct GlobSkip {
    patterns: Vec<String>,
    set: GlobSet,
}

impl GlobSkip {
    pub fn new(
        patterns: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<Self, globset::Error> {
        let patterns: Vec<String> = patterns.into_iter().map(Into::into).collect();

        let mut builder = GlobSetBuilder::new();
        for pattern in &patterns {
            builder.add(Glob::new(pattern)?);
        }

        Ok(Self {
            patterns,
            set: builder.build()?,
        })
    }

    /// The raw pattern strings this policy was built from, for logging.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

impl SkipPredicate for GlobSkip {
    fn skip(&self, candidate: &Path, root: &Path) -> bool {
        let Ok(rel) = candidate.strip_prefix(root) else {
            return false;
        };

        self.set.is_match(rel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dotgit_skips_only_the_git_subtree() {
        let root = Path::new("/repo");
        let skip = DotGitSkip;

        assert!(skip.skip(Path::new("/repo/.git/HEAD"), root));
        assert!(skip.skip(Path::new("/repo/.git"), root));
        assert!(!skip.skip(Path::new("/repo/src/main.rs"), root));
        assert!(!skip.skip(Path::new("/repo/.gitignore"), root));
    }

    #[test]
    fn none_never_skips() {
        let skip = NoneSkip;
        assert!(!skip.skip(Path::new("/repo/.git/HEAD"), Path::new("/repo")));
    }

    #[test]
    fn glob_matches_wildcard_patterns() {
        let skip = GlobSkip::new(["*.tmp", "target/*"]).unwrap();
        let root = Path::new("/repo");

        assert!(skip.skip(Path::new("/repo/foo.tmp"), root));
        assert!(skip.skip(Path::new("/repo/target/debug"), root));
        assert!(!skip.skip(Path::new("/repo/src/main.rs"), root));
    }

    #[test]
    fn invalid_pattern_is_rejected_at_construction() {
        assert!(GlobSkip::new(["[unterminated"]).is_err());
    }
}
