use std::collections::BTreeMap;

use crate::errors::{Result, SoapError};

/// Prefix → URI table shared by message construction and path evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceTable {
    entries: BTreeMap<String, String>,
}

impl NamespaceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a prefix, replacing any previous binding.
    pub fn add(&mut self, prefix: &str, uri: &str) {
        self.entries.insert(prefix.to_string(), uri.to_string());
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn get(&self, prefix: &str) -> Option<&str> {
        self.entries.get(prefix).map(String::as_str)
    }

    /// Resolves a prefix or fails with [`SoapError::NamespaceUnbound`].
    pub fn resolve(&self, prefix: &str) -> Result<&str> {
        self.get(prefix)
            .ok_or_else(|| SoapError::namespace_unbound(prefix))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(prefix, uri)| (prefix.as_str(), uri.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_registered_prefix() {
        let mut table = NamespaceTable::new();
        table.add("s", "urn:test");
        assert_eq!(table.resolve("s").unwrap(), "urn:test");
    }

    #[test]
    fn test_resolve_unknown_prefix_fails() {
        let table = NamespaceTable::new();
        match table.resolve("s") {
            Err(SoapError::NamespaceUnbound(prefix)) => assert_eq!(prefix, "s"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_add_replaces_and_clear_empties() {
        let mut table = NamespaceTable::new();
        table.add("s", "urn:one");
        table.add("s", "urn:two");
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("s"), Some("urn:two"));

        table.clear();
        assert!(table.is_empty());
    }
}
