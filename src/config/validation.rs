//! Configuration validation
//!
//! Validates freqsync configuration for correctness:
//! - Positive intervals and timeouts
//! - A usable jitter factor
//! - An http(s) API server URL
//! - A parseable metrics address

use super::freqsync_config::FreqSyncConfig;
use crate::FreqSyncError;
use std::net::SocketAddr;

/// Upper bound for the reconciliation and resync intervals (one week)
pub const MAX_INTERVAL_SECS: u64 = 7 * 24 * 60 * 60;

/// Validation error details
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validation result
pub type ValidationResult = std::result::Result<(), Vec<ValidationError>>;

/// Validate a freqsync configuration
pub fn validate_config(config: &FreqSyncConfig) -> ValidationResult {
    let mut errors = Vec::new();

    if config.interval_secs == 0 {
        errors.push(ValidationError::new(
            "interval_secs",
            "Interval must be greater than 0",
        ));
    } else if config.interval_secs > MAX_INTERVAL_SECS {
        errors.push(ValidationError::new(
            "interval_secs",
            format!("Interval must be at most {} seconds", MAX_INTERVAL_SECS),
        ));
    }

    if !config.jitter_factor.is_finite() || config.jitter_factor < 0.0 {
        errors.push(ValidationError::new(
            "jitter_factor",
            format!(
                "Jitter factor must be a non-negative number, got {}",
                config.jitter_factor
            ),
        ));
    }

    let server = &config.api.server;
    if !server.starts_with("http://") && !server.starts_with("https://") {
        errors.push(ValidationError::new(
            "api.server",
            format!("Invalid API server URL: {}", server),
        ));
    }

    if config.api.timeout_secs == 0 {
        errors.push(ValidationError::new(
            "api.timeout_secs",
            "Timeout must be greater than 0",
        ));
    }

    if config.api.resync_interval_secs == 0 {
        errors.push(ValidationError::new(
            "api.resync_interval_secs",
            "Resync interval must be greater than 0",
        ));
    } else if config.api.resync_interval_secs > MAX_INTERVAL_SECS {
        errors.push(ValidationError::new(
            "api.resync_interval_secs",
            format!("Resync interval must be at most {} seconds", MAX_INTERVAL_SECS),
        ));
    }

    if let Some(ref addr) = config.metrics_addr {
        if addr.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::new(
                "metrics_addr",
                format!("Invalid socket address: {}", addr),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate and convert to a crate error
pub fn validate_config_result(config: &FreqSyncConfig) -> crate::Result<()> {
    validate_config(config).map_err(|errors| {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        FreqSyncError::Config(format!(
            "Configuration validation failed:\n  - {}",
            messages.join("\n  - ")
        ))
    })
}
