//! Cluster access
//!
//! Traits the updater uses to read and write nodes, plus their concrete
//! implementations:
//!
//! - **NodeStore**: synchronous snapshot of cached nodes (`NodeCache`)
//! - **NodePatcher**: submits merge patches for a node (`KubeClient`)
//! - **ClusterSource**: full listings used to refill the caches (`KubeClient`)
//! - **Reflector**: periodic relisting into the caches

mod cache;
mod kube;
mod reflector;

pub use cache::{FrequencyCache, NodeCache};
pub use kube::KubeClient;
pub use reflector::{Reflector, DEFAULT_RESYNC_INTERVAL};

use crate::node::{Frequency, Node};
use crate::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Read-only snapshot source of nodes
pub trait NodeStore: Send + Sync {
    /// All nodes currently known
    fn list(&self) -> Vec<Node>;
}

/// Sink for node patches
#[async_trait]
pub trait NodePatcher: Send + Sync {
    /// Apply a merge patch to the named node
    async fn patch_node(&self, name: &str, patch: &Value) -> Result<()>;
}

/// Authoritative cluster listings
#[async_trait]
pub trait ClusterSource: Send + Sync {
    async fn list_nodes(&self) -> Result<Vec<Node>>;

    async fn list_frequencies_in_use(&self) -> Result<Vec<Frequency>>;
}
