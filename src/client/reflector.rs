//! Keeps the local caches in step with the API server
//!
//! The updater reads nodes from [`NodeCache`] only. The reflector relists
//! nodes and in-use frequencies on its own interval so that the cache never
//! lags behind by more than one resync period.

use super::{ClusterSource, FrequencyCache, NodeCache};
use crate::updater::{jitter_until, JitterSchedule};
use crate::Result;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Default resync interval (15 seconds)
pub const DEFAULT_RESYNC_INTERVAL: Duration = Duration::from_secs(15);

const RESYNC_JITTER_FACTOR: f64 = 0.1;

/// Periodic relister for the node and frequency caches
pub struct Reflector {
    source: Arc<dyn ClusterSource>,
    nodes: NodeCache,
    in_use: FrequencyCache,
    resync_interval: Duration,
}

impl Reflector {
    pub fn new(
        source: Arc<dyn ClusterSource>,
        nodes: NodeCache,
        in_use: FrequencyCache,
    ) -> Self {
        Self {
            source,
            nodes,
            in_use,
            resync_interval: DEFAULT_RESYNC_INTERVAL,
        }
    }

    /// Set the resync interval
    pub fn with_resync_interval(mut self, interval: Duration) -> Self {
        self.resync_interval = interval;
        self
    }

    /// Relist once
    ///
    /// A failed listing leaves the corresponding cache untouched.
    pub async fn refresh(&self) -> Result<()> {
        let nodes = self.source.list_nodes().await?;
        tracing::debug!(nodes = nodes.len(), "Node cache refreshed");
        self.nodes.replace_all(nodes);

        let in_use = self.source.list_frequencies_in_use().await?;
        tracing::debug!(frequencies = in_use.len(), "In-use frequencies refreshed");
        self.in_use.replace_all(in_use);

        Ok(())
    }

    /// Relist every resync interval (lightly jittered) until `stop` resolves
    pub async fn run<F>(self, stop: F)
    where
        F: Future<Output = ()>,
    {
        let schedule = JitterSchedule::new(self.resync_interval, RESYNC_JITTER_FACTOR);
        let this = &self;

        jitter_until(schedule, stop, move || async move {
            if let Err(e) = this.refresh().await {
                tracing::warn!(error = %e, "Failed to refresh caches");
            }
        })
        .await;

        tracing::debug!("Reflector stopped");
    }
}
