//! Ordered, de-duplicated set of target hosts.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::CoreError;

/// The hosts a run is dispatched to.
///
/// A `HostSet` is never empty and never holds the same host twice; the first
/// occurrence of a host decides its position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostSet(Vec<String>);

impl HostSet {
    /// Build a HostSet from candidate host names.
    ///
    /// Names are trimmed and blank entries dropped. `origin` names what was
    /// resolved and ends up in the error when nothing is left.
    pub fn new<I, S>(hosts: I, origin: &str) -> Result<Self, CoreError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut ordered = Vec::new();
        for host in hosts {
            let host = host.as_ref().trim();
            if host.is_empty() {
                continue;
            }
            if seen.insert(host.to_string()) {
                ordered.push(host.to_string());
            }
        }

        if ordered.is_empty() {
            return Err(CoreError::EmptyHostSet(origin.to_string()));
        }
        Ok(Self(ordered))
    }

    /// Parse a whitespace separated host list (spaces, tabs or newlines).
    pub fn parse(text: &str, origin: &str) -> Result<Self, CoreError> {
        Self::new(text.split_whitespace(), origin)
    }

    /// Number of hosts.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; kept for API symmetry with collections.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn contains(&self, host: &str) -> bool {
        self.0.iter().any(|h| h == host)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Render as one host per line, newline terminated.
    pub fn to_lines(&self) -> String {
        let mut out = self.0.join("\n");
        out.push('\n');
        out
    }
}

impl IntoIterator for HostSet {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_keeps_first_occurrence() {
        let hosts = HostSet::new(["b", "a", "b", "c", "a"], "test").unwrap();
        assert_eq!(hosts.as_slice(), &["b", "a", "c"]);
    }

    #[test]
    fn test_parse_mixed_whitespace() {
        let hosts = HostSet::parse("h1 h2\n\th3\n\n", "file").unwrap();
        assert_eq!(hosts.as_slice(), &["h1", "h2", "h3"]);
        assert_eq!(hosts.len(), 3);
    }

    #[test]
    fn test_whitespace_only_is_error() {
        let err = HostSet::parse("  \n\t \n", "hosts.txt").unwrap_err();
        assert!(matches!(err, CoreError::EmptyHostSet(ref o) if o == "hosts.txt"));
    }

    #[test]
    fn test_blank_entries_dropped() {
        let hosts = HostSet::new(["", " web1 ", "  "], "test").unwrap();
        assert_eq!(hosts.as_slice(), &["web1"]);
        assert!(hosts.contains("web1"));
    }

    #[test]
    fn test_to_lines() {
        let hosts = HostSet::new(["h1", "h2"], "test").unwrap();
        assert_eq!(hosts.to_lines(), "h1\nh2\n");
    }
}
