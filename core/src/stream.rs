//! Journal stream identity and versioning.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when parsing a [`StreamId`] from untrusted input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid stream ID: {0}")]
pub struct ParseStreamIdError(String);

/// Identifies one aggregate's journal stream, e.g. `"course-<uuid>"`.
///
/// A stream id is `<category>-<key>`. The category groups streams of the same
/// aggregate type so a journal can be scanned per category on restart.
///
/// `FromStr` rejects empty input; `new` and `From` trust the caller.
///
/// ```
/// use classbook_core::stream::StreamId;
///
/// let id = StreamId::for_aggregate("course", "42");
/// assert_eq!(id.as_str(), "course-42");
/// assert_eq!(id.key_in("course"), Some("42"));
/// assert_eq!(id.key_in("member"), None);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StreamId(String);

impl StreamId {
    /// Create a stream id from a string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Build `<category>-<key>`.
    #[must_use]
    pub fn for_aggregate(category: &str, key: impl fmt::Display) -> Self {
        Self(format!("{category}-{key}"))
    }

    /// Category prefix used when listing streams, `"<category>-"`.
    #[must_use]
    pub fn category_prefix(category: &str) -> String {
        format!("{category}-")
    }

    /// The key part if this stream belongs to `category`.
    #[must_use]
    pub fn key_in(&self, category: &str) -> Option<&str> {
        self.0
            .strip_prefix(category)
            .and_then(|rest| rest.strip_prefix('-'))
            .filter(|key| !key.is_empty())
    }

    /// Borrow as `&str`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Take the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for StreamId {
    type Err = ParseStreamIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ParseStreamIdError("Stream ID cannot be empty".to_string()));
        }
        Ok(Self(s.to_string()))
    }
}

impl From<String> for StreamId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for StreamId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for StreamId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Number of facts in a stream, used for optimistic concurrency.
///
/// An empty stream is at [`Version::INITIAL`]. Appending `n` facts to a stream at
/// version `v` moves it to `v + n`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version(u64);

impl Version {
    /// Version of a stream with no facts.
    pub const INITIAL: Self = Self(0);

    /// Wrap a raw version number.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Raw version number.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// `self + 1`.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Whether the stream is empty.
    #[must_use]
    pub const fn is_initial(self) -> bool {
        self.0 == 0
    }

    /// Version after appending `count` facts.
    #[must_use]
    pub fn advanced_by(self, count: usize) -> Self {
        Self(self.0 + count as u64)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Version {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Version> for u64 {
    fn from(version: Version) -> Self {
        version.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_stream_round_trips_its_key() {
        let id = StreamId::for_aggregate("course", "abc-def");
        assert_eq!(id.as_str(), "course-abc-def");
        assert_eq!(id.key_in("course"), Some("abc-def"));
    }

    #[test]
    fn key_in_rejects_other_categories() {
        let id = StreamId::new("courses-1");
        assert_eq!(id.key_in("course"), None);
        assert_eq!(StreamId::new("course-").key_in("course"), None);
    }

    #[test]
    fn parse_empty_string_fails() {
        assert!("".parse::<StreamId>().is_err());
    }

    #[test]
    fn category_prefix_has_separator() {
        assert_eq!(StreamId::category_prefix("course"), "course-");
    }

    #[test]
    fn version_advances() {
        let v = Version::INITIAL;
        assert!(v.is_initial());
        assert_eq!(v.next(), Version::new(1));
        assert_eq!(Version::new(3).advanced_by(4), Version::new(7));
        assert!(Version::new(1) < Version::new(2));
    }
}
