//! Relative paths from a mapping root.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// A relative path from a mapping root, represented as an ordered sequence
/// of path segments.
///
/// Equality and ordering are segment-wise and case-sensitive. No segment is
/// ever `.` or `..`, and no segment is ever empty.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubPath(Vec<String>);

/// A segment failed the validation rules in [`SubPath`]'s invariants.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubPathError {
    #[error("empty path segment")]
    EmptySegment,
    #[error("path segment `{0}` is not allowed (`.`/`..` are not representable)")]
    DotSegment(String),
}

impl SubPath {
    /// The empty subpath, denoting the mapping root itself.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Builds a `SubPath` from an iterator of segments, validating each one.
    pub fn from_segments<I, S>(segments: I) -> Result<Self, SubPathError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments
            .into_iter()
            .map(Into::into)
            .map(|s| validate_segment(&s).map(|()| s))
            .collect::<Result<_, _>>()?;

        Ok(Self(segments))
    }

    /// Builds a `SubPath` from a path relative to some root, skipping `.`
    /// components and rejecting `..` components.
    pub fn from_relative_path(path: &Path) -> Result<Self, SubPathError> {
        let mut segments = Vec::new();

        for component in path.components() {
            use std::path::Component;

            match component {
                Component::Normal(seg) => {
                    let seg = seg.to_string_lossy().into_owned();
                    validate_segment(&seg)?;
                    segments.push(seg);
                }
                Component::CurDir => {}
                Component::ParentDir => {
                    return Err(SubPathError::DotSegment("..".to_string()));
                }
                Component::RootDir | Component::Prefix(_) => {}
            }
        }

        Ok(Self(segments))
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// The parent subpath, or `None` for the root.
    pub fn parent(&self) -> Option<SubPath> {
        if self.0.is_empty() {
            None
        } else {
            Some(SubPath(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    /// A new subpath with one more segment appended.
    pub fn join(&self, segment: impl Into<String>) -> Result<SubPath, SubPathError> {
        let segment = segment.into();
        validate_segment(&segment)?;
        let mut segments = self.0.clone();
        segments.push(segment);
        Ok(SubPath(segments))
    }

    /// Renders the subpath as a `/`-joined string, used for tie-breaking and
    /// logging (never for filesystem access - use [`SubPath::to_path`]).
    pub fn as_string(&self) -> String {
        self.0.join("/")
    }

    /// Resolves this subpath against a filesystem root.
    pub fn to_path(&self, root: &Path) -> std::path::PathBuf {
        let mut buf = root.to_path_buf();
        for seg in &self.0 {
            buf.push(seg);
        }
        buf
    }
}

fn validate_segment(segment: &str) -> Result<(), SubPathError> {
    if segment.is_empty() {
        return Err(SubPathError::EmptySegment);
    }
    if segment == "." || segment == ".." {
        return Err(SubPathError::DotSegment(segment.to_string()));
    }
    Ok(())
}

impl fmt::Debug for SubPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubPath({:?})", self.as_string())
    }
}

impl fmt::Display for SubPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_and_dot_segments() {
        assert!(SubPath::from_segments(["a", ""]).is_err());
        assert!(SubPath::from_segments(["a", "."]).is_err());
        assert!(SubPath::from_segments(["a", ".."]).is_err());
        assert!(SubPath::from_segments(["a", "b"]).is_ok());
    }

    #[test]
    fn ordering_is_segment_wise_then_string() {
        let a = SubPath::from_segments(["a"]).unwrap();
        let b = SubPath::from_segments(["b"]).unwrap();
        assert!(a < b);

        let short = SubPath::from_segments(["z"]).unwrap();
        let long = SubPath::from_segments(["a", "a"]).unwrap();
        assert!(short < long);
    }

    #[test]
    fn display_round_trips_through_string() {
        let p = SubPath::from_segments(["foo", "bar.txt"]).unwrap();
        assert_eq!(p.as_string(), "foo/bar.txt");
        assert_eq!(p.to_string(), "foo/bar.txt");
    }

    #[test]
    fn parent_and_join() {
        let p = SubPath::from_segments(["foo", "bar.txt"]).unwrap();
        assert_eq!(p.parent().unwrap().as_string(), "foo");
        assert_eq!(SubPath::root().parent(), None);

        let joined = SubPath::root().join("foo").unwrap().join("bar.txt").unwrap();
        assert_eq!(joined, p);
    }
}
