//! Static hostname blocklist
//!
//! The blocklist is built once at startup from configuration and read by
//! every connection task concurrently. It is never mutated afterwards, so
//! lookups need no synchronization.

use std::collections::HashSet;

/// Immutable set of forbidden tunnel destinations.
///
/// Matching is exact and case-sensitive; no wildcard or suffix matching.
#[derive(Debug, Clone, Default)]
pub struct Blocklist {
    hosts: HashSet<String>,
}

impl Blocklist {
    /// Build a blocklist from an iterator of hostnames.
    pub fn new<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            hosts: hosts.into_iter().map(Into::into).collect(),
        }
    }

    /// Check whether a hostname is blocked.
    #[must_use]
    pub fn is_blocked(&self, host: &str) -> bool {
        self.hosts.contains(host)
    }

    /// Number of blocked hostnames.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    /// True when no hostname is blocked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        let blocklist = Blocklist::new(["www.youtube.com", "fonts.gstatic.com"]);
        assert!(blocklist.is_blocked("www.youtube.com"));
        assert!(blocklist.is_blocked("fonts.gstatic.com"));
        assert!(!blocklist.is_blocked("example.com"));
    }

    #[test]
    fn test_no_suffix_matching() {
        let blocklist = Blocklist::new(["youtube.com"]);
        assert!(!blocklist.is_blocked("www.youtube.com"));
        assert!(!blocklist.is_blocked("youtube.com.evil.example"));
    }

    #[test]
    fn test_case_sensitive() {
        let blocklist = Blocklist::new(["www.youtube.com"]);
        assert!(!blocklist.is_blocked("WWW.YOUTUBE.COM"));
        assert!(!blocklist.is_blocked("www.YouTube.com"));
    }

    #[test]
    fn test_empty_blocklist() {
        let blocklist = Blocklist::default();
        assert!(blocklist.is_empty());
        assert!(!blocklist.is_blocked("anything.example"));
    }

    #[test]
    fn test_duplicates_collapse() {
        let blocklist = Blocklist::new(["a.example", "a.example"]);
        assert_eq!(blocklist.len(), 1);
    }
}
