//! Cluster-wide frequency hints
//!
//! A hinter answers which TSC frequencies have to stay schedulable somewhere
//! in the cluster: the frequencies workloads currently run at, plus the
//! lowest frequency every invtsc node can serve.

use super::filter::has_invtsc_frequency;
use crate::client::{FrequencyCache, NodeStore};
use crate::node::Frequency;
use crate::{FreqSyncError, Result};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Source of cluster-wide frequency requirements
pub trait Hinter: Send + Sync {
    /// Lowest native TSC frequency among eligible nodes
    fn lowest_tsc_frequency_on_cluster(&self) -> Result<Frequency>;

    /// Frequencies currently used by running workloads
    fn tsc_frequencies_in_use(&self) -> Vec<Frequency>;
}

/// Required frequency set for one reconciliation cycle
///
/// A failing lowest-frequency lookup degrades the set to the in-use
/// frequencies only; it never fails the cycle.
pub fn required_frequencies(hinter: &dyn Hinter) -> BTreeSet<Frequency> {
    let mut required: BTreeSet<Frequency> = hinter.tsc_frequencies_in_use().into_iter().collect();

    match hinter.lowest_tsc_frequency_on_cluster() {
        Ok(lowest) => {
            required.insert(lowest);
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to calculate lowest TSC frequency for nodes");
        }
    }

    required
}

/// Hinter backed by the node cache and the in-use frequency cache
#[derive(Clone)]
pub struct ClusterHinter {
    nodes: Arc<dyn NodeStore>,
    in_use: FrequencyCache,
}

impl ClusterHinter {
    pub fn new(nodes: Arc<dyn NodeStore>, in_use: FrequencyCache) -> Self {
        Self { nodes, in_use }
    }
}

impl Hinter for ClusterHinter {
    fn lowest_tsc_frequency_on_cluster(&self) -> Result<Frequency> {
        self.nodes
            .list()
            .iter()
            .filter(|node| has_invtsc_frequency(node))
            .filter_map(|node| match node.tsc_frequency() {
                Ok((freq, _)) => Some(freq),
                Err(e) => {
                    tracing::debug!(node = node.name(), error = %e, "Skipping node for lowest frequency");
                    None
                }
            })
            .min()
            .ok_or_else(|| {
                FreqSyncError::NoFrequencies("no node exposes a valid TSC frequency".to_string())
            })
    }

    fn tsc_frequencies_in_use(&self) -> Vec<Frequency> {
        self.in_use.snapshot().into_iter().collect()
    }
}

/// Hinter with fixed answers, for offline planning and tests
#[derive(Debug, Clone, Default)]
pub struct StaticHinter {
    pub lowest: Option<Frequency>,
    pub in_use: Vec<Frequency>,
}

impl StaticHinter {
    pub fn new(lowest: Option<Frequency>, in_use: Vec<Frequency>) -> Self {
        Self { lowest, in_use }
    }
}

impl Hinter for StaticHinter {
    fn lowest_tsc_frequency_on_cluster(&self) -> Result<Frequency> {
        self.lowest
            .ok_or_else(|| FreqSyncError::Hinter("lowest frequency not configured".to_string()))
    }

    fn tsc_frequencies_in_use(&self) -> Vec<Frequency> {
        self.in_use.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::NodeCache;
    use crate::node::{Node, TSC_FREQUENCY_LABEL};

    fn hz(v: i64) -> Frequency {
        Frequency::new(v).unwrap()
    }

    #[test]
    fn test_required_is_union() {
        let hinter = StaticHinter::new(Some(hz(800)), vec![hz(1000), hz(900), hz(1000)]);
        let required = required_frequencies(&hinter);

        assert_eq!(
            required.into_iter().collect::<Vec<_>>(),
            vec![hz(800), hz(900), hz(1000)]
        );
    }

    #[test]
    fn test_required_degrades_without_lowest() {
        let hinter = StaticHinter::new(None, vec![hz(1000)]);
        let required = required_frequencies(&hinter);

        assert_eq!(required.into_iter().collect::<Vec<_>>(), vec![hz(1000)]);
    }

    #[test]
    fn test_cluster_hinter_lowest() {
        let cache = NodeCache::new();
        cache.replace_all(vec![
            Node::new("a").with_tsc_frequency(hz(1000)),
            Node::new("b").with_tsc_frequency(hz(900)),
            Node::new("c").with_label(TSC_FREQUENCY_LABEL, "bogus"),
            Node::new("d"),
        ]);
        let in_use = FrequencyCache::new();
        in_use.replace_all([hz(950)]);

        let hinter = ClusterHinter::new(Arc::new(cache), in_use);

        assert_eq!(hinter.lowest_tsc_frequency_on_cluster().unwrap(), hz(900));
        assert_eq!(hinter.tsc_frequencies_in_use(), vec![hz(950)]);
    }

    #[test]
    fn test_cluster_hinter_empty_cluster() {
        let hinter = ClusterHinter::new(Arc::new(NodeCache::new()), FrequencyCache::new());
        assert!(matches!(
            hinter.lowest_tsc_frequency_on_cluster(),
            Err(FreqSyncError::NoFrequencies(_))
        ));
    }
}
