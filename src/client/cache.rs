//! In-memory caches shared between the reflector and the updater

use super::NodeStore;
use crate::node::{Frequency, Node};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock};

/// Node cache indexed by node name
///
/// Cheap to clone; all clones share the same storage. Readers always get a
/// consistent snapshot of every node.
#[derive(Debug, Clone, Default)]
pub struct NodeCache {
    nodes: Arc<RwLock<BTreeMap<String, Node>>>,
}

impl NodeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the cache contents with a fresh listing
    pub fn replace_all(&self, nodes: impl IntoIterator<Item = Node>) {
        let fresh: BTreeMap<String, Node> = nodes
            .into_iter()
            .map(|node| (node.name().to_string(), node))
            .collect();
        let mut guard = self.nodes.write().unwrap_or_else(|e| e.into_inner());
        *guard = fresh;
    }

    /// Insert or replace a single node
    pub fn upsert(&self, node: Node) {
        let mut guard = self.nodes.write().unwrap_or_else(|e| e.into_inner());
        guard.insert(node.name().to_string(), node);
    }

    /// Remove a node by name
    pub fn remove(&self, name: &str) -> Option<Node> {
        let mut guard = self.nodes.write().unwrap_or_else(|e| e.into_inner());
        guard.remove(name)
    }

    /// Get a node by name
    pub fn get(&self, name: &str) -> Option<Node> {
        let guard = self.nodes.read().unwrap_or_else(|e| e.into_inner());
        guard.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.nodes.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl NodeStore for NodeCache {
    fn list(&self) -> Vec<Node> {
        let guard = self.nodes.read().unwrap_or_else(|e| e.into_inner());
        guard.values().cloned().collect()
    }
}

/// Frequencies in use by running workloads
#[derive(Debug, Clone, Default)]
pub struct FrequencyCache {
    frequencies: Arc<RwLock<BTreeSet<Frequency>>>,
}

impl FrequencyCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the tracked frequencies
    pub fn replace_all(&self, frequencies: impl IntoIterator<Item = Frequency>) {
        let fresh: BTreeSet<Frequency> = frequencies.into_iter().collect();
        let mut guard = self.frequencies.write().unwrap_or_else(|e| e.into_inner());
        *guard = fresh;
    }

    /// Current set of frequencies
    pub fn snapshot(&self) -> BTreeSet<Frequency> {
        self.frequencies
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}
