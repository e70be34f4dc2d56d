//! Segment-wise path form used as the lock key throughout the scheduler.

use std::fmt;

use super::error::SchedulerError;

/// A normalized path: an ordered sequence of non-empty segments.
///
/// The empty sequence denotes the root of the namespace. Leading and
/// trailing slashes in the source string are ignored; interior empty
/// segments are rejected so that `/a//b` cannot silently alias `/a/b`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LockPath {
    segments: Vec<String>,
}

impl LockPath {
    pub fn root() -> Self {
        LockPath {
            segments: Vec::new(),
        }
    }

    pub fn parse(raw: &str) -> Result<Self, SchedulerError> {
        let trimmed = raw.trim_matches('/');
        if trimmed.is_empty() {
            return Ok(Self::root());
        }
        let mut segments = Vec::new();
        for part in trimmed.split('/') {
            if part.is_empty() {
                return Err(SchedulerError::MalformedPath {
                    path: raw.to_string(),
                    reason: "empty path segment".to_string(),
                });
            }
            segments.push(part.to_string());
        }
        Ok(LockPath { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }
}

impl fmt::Display for LockPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.segments.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes_slashes() {
        let path = LockPath::parse("/a/b/c/").unwrap();
        assert_eq!(path.segments(), &["a", "b", "c"]);
        assert_eq!(LockPath::parse("a/b/c").unwrap(), path);
    }

    #[test]
    fn test_parse_root_forms() {
        assert!(LockPath::parse("").unwrap().is_root());
        assert!(LockPath::parse("/").unwrap().is_root());
        assert!(LockPath::parse("//").unwrap().is_root());
    }

    #[test]
    fn test_parse_rejects_empty_segment() {
        let err = LockPath::parse("a//b").unwrap_err();
        assert!(matches!(err, SchedulerError::MalformedPath { .. }));
    }

    #[test]
    fn test_display_round_trip() {
        let path = LockPath::parse("a/b").unwrap();
        assert_eq!(path.to_string(), "/a/b");
        assert_eq!(LockPath::root().to_string(), "/");
        assert_eq!(LockPath::parse(&path.to_string()).unwrap(), path);
    }
}
