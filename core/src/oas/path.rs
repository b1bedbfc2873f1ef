//! # Coding Paths
//!
//! Ordered path segments locating a node inside a document.
//! Rendered by joining segments with `/`.

use std::fmt;

/// Location of a node inside a document, e.g. `paths` / `/users` / `get`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CodingPath(Vec<String>);

impl CodingPath {
    /// An empty path (the document root).
    pub fn root() -> Self {
        Self::default()
    }

    /// Returns a new path with `segment` appended.
    pub fn appending(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }

    /// Appends a segment in place.
    pub fn push(&mut self, segment: impl Into<String>) {
        self.0.push(segment.into());
    }

    /// Removes the last segment.
    pub fn pop(&mut self) -> Option<String> {
        self.0.pop()
    }

    /// The individual segments.
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// True for the document root.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>, const N: usize> From<[S; N]> for CodingPath {
    fn from(segments: [S; N]) -> Self {
        Self(segments.into_iter().map(Into::into).collect())
    }
}

impl From<Vec<String>> for CodingPath {
    fn from(segments: Vec<String>) -> Self {
        Self(segments)
    }
}

impl fmt::Display for CodingPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coding_path_display() {
        let path = CodingPath::root()
            .appending("components")
            .appending("schemas")
            .appending("User");
        assert_eq!(path.to_string(), "components/schemas/User");
        assert_eq!(CodingPath::root().to_string(), "");
    }
}
