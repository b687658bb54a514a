//! freqsync - TSC frequency node label reconciler
//!
//! Keeps the `scheduling.node.kubevirt.io/tsc-frequency-<hz>` labels on
//! cluster nodes in step with the TSC frequencies workloads need, so that a
//! workload started at one frequency can still be scheduled onto (or migrated
//! to) every node able to present it.
//!
//! # Architecture
//!
//! - **node**: Node objects, labels and the `Frequency` newtype
//! - **topology**: Filtering, label diffs, merge patches and frequency hints
//! - **client**: API server access, node/frequency caches and the reflector
//! - **updater**: Background reconciliation loop, stats and metrics endpoint
//! - **config**: ~/.config/freqsync/config.yaml handling and validation

pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod node;
pub mod topology;
pub mod updater;

// Re-exports
pub use error::{FreqSyncError, Result};
