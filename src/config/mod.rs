//! Configuration system
//!
//! Loads ~/.config/freqsync/config.yaml with support for:
//! - Reconciliation interval and jitter
//! - Scaling policy for scalable nodes
//! - API server connection and credentials
//! - Optional metrics endpoint

mod freqsync_config;
pub mod validation;

pub use freqsync_config::{ApiConfig, FreqSyncConfig};
pub use validation::{
    validate_config, validate_config_result, ValidationError, MAX_INTERVAL_SECS,
};
