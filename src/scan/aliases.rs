//! Alias table: in-file spelling -> module record.

use std::collections::HashMap;

/// Maps an alias key (alias when present, else canonical module name) to
/// the index of its record in [`crate::context::Analysis::modules`].
///
/// This is the only deduplication key used while scanning.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasTable {
    keys: HashMap<String, usize>,
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive the alias key for an import.
    pub fn key_for<'a>(module: &'a str, alias: Option<&'a str>) -> &'a str {
        alias.unwrap_or(module)
    }

    pub fn get(&self, key: &str) -> Option<usize> {
        self.keys.get(key).copied()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains_key(key)
    }

    /// Register `key`. An already present key keeps its first record.
    pub fn insert(&mut self, key: impl Into<String>, index: usize) -> usize {
        *self.keys.entry(key.into()).or_insert(index)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_for() {
        assert_eq!(AliasTable::key_for("numpy", Some("np")), "np");
        assert_eq!(AliasTable::key_for("numpy", None), "numpy");
    }

    #[test]
    fn test_first_insert_wins() {
        let mut table = AliasTable::new();
        assert_eq!(table.insert("np", 0), 0);
        assert_eq!(table.insert("np", 3), 0);
        assert_eq!(table.get("np"), Some(0));
        assert_eq!(table.len(), 1);
        assert!(!table.contains("numpy"));
    }
}
