//! Label mapping with structural equality

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Value marking an advertised frequency label as set
pub const LABEL_TRUE: &str = "true";

/// Ordered label mapping of a node
///
/// Equality is structural: two mappings are equal when they hold the same
/// keys with the same values, regardless of insertion history. This is what
/// decides whether a node needs a patch at all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Labels(BTreeMap<String, String>);

impl Labels {
    /// Create an empty label mapping
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a label value
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Whether a label is present
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Whether a label is present with the value `"true"`
    pub fn is_true(&self, key: &str) -> bool {
        self.get(key) == Some(LABEL_TRUE)
    }

    /// Set a label, returning the previous value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    /// Remove a label, returning its value
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    /// Iterate over key/value pairs in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Iterate over keys in order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Labels
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_equality_ignores_insertion_order() {
        let mut a = Labels::new();
        a.insert("b", "2");
        a.insert("a", "1");

        let b: Labels = [("a", "1"), ("b", "2")].into_iter().collect();

        assert_eq!(a, b);
    }

    #[test]
    fn test_value_change_breaks_equality() {
        let a: Labels = [("a", "1")].into_iter().collect();
        let b: Labels = [("a", "2")].into_iter().collect();

        assert_ne!(a, b);
    }

    #[test]
    fn test_is_true() {
        let labels: Labels = [("x", "true"), ("y", "false")].into_iter().collect();

        assert!(labels.is_true("x"));
        assert!(!labels.is_true("y"));
        assert!(!labels.is_true("z"));
    }

    #[test]
    fn test_serializes_as_plain_map() {
        let labels: Labels = [("zone", "a")].into_iter().collect();
        let json = serde_json::to_value(&labels).unwrap();

        assert_eq!(json, serde_json::json!({ "zone": "a" }));
    }
}
