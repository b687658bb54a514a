//! Node topology updater
//!
//! Background reconciliation loop keeping TSC frequency labels on nodes in
//! step with the frequencies the cluster requires.
//!
//! # Cycle Phases
//!
//! 1. **Hint Phase**: Ask the hinter for frequencies in use and the lowest
//!    common frequency
//! 2. **Filter Phase**: Snapshot the node cache and keep invtsc nodes
//! 3. **Diff Phase**: Compute each node's label additions and removals
//! 4. **Patch Phase**: Submit a merge patch for every node that drifted
//! 5. **Report Phase**: Log one summary line, update metrics, emit an event
//!
//! # Example
//!
//! ```ignore
//! use freqsync::client::{FrequencyCache, KubeClient, NodeCache};
//! use freqsync::topology::ClusterHinter;
//! use freqsync::updater::{NodeTopologyUpdater, UpdaterConfig};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> freqsync::Result<()> {
//!     let client = Arc::new(KubeClient::new("https://127.0.0.1:6443", None, Duration::from_secs(10))?);
//!     let nodes = NodeCache::new();
//!     let hinter = ClusterHinter::new(Arc::new(nodes.clone()), FrequencyCache::new());
//!
//!     let mut updater = NodeTopologyUpdater::new(
//!         UpdaterConfig::default(),
//!         Arc::new(nodes),
//!         Arc::new(hinter),
//!         client,
//!     );
//!     updater
//!         .run(Duration::from_secs(30), async {
//!             let _ = tokio::signal::ctrl_c().await;
//!         })
//!         .await
//! }
//! ```

mod daemon;
mod jitter;
pub mod metrics;
pub mod server;
mod stats;

pub use daemon::{
    NodeTopologyUpdater, UpdaterCommand, UpdaterConfig, UpdaterEvent, DEFAULT_INTERVAL,
};
pub use jitter::{jitter_until, jittered, JitterSchedule, DEFAULT_JITTER_FACTOR};
pub use stats::{CycleReport, CycleStats};
