//! Error types for freqsync
//!
//! Defines the error enum covering every failure mode of the controller.
//! Uses thiserror for ergonomic error handling.

use thiserror::Error;

/// Result type alias for freqsync operations
pub type Result<T> = std::result::Result<T, FreqSyncError>;

/// Error type for freqsync operations
#[derive(Error, Debug)]
pub enum FreqSyncError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Node carries no TSC frequency label
    #[error("Node {node} has no TSC frequency label")]
    MissingFrequency { node: String },

    /// Node carries a TSC frequency label that is not a positive integer
    #[error("Node {node} has invalid TSC frequency {value:?}")]
    InvalidFrequency { node: String, value: String },

    /// No lowest common frequency could be computed
    #[error("No TSC frequencies available: {0}")]
    NoFrequencies(String),

    /// Hinter failures
    #[error("Hinter error: {0}")]
    Hinter(String),

    /// Patch construction or submission failed
    #[error("Could not patch node {node}: {message}")]
    Patch { node: String, message: String },

    /// API server answered with a non-success status
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl FreqSyncError {
    /// Whether the error comes from reading a node's own capability labels
    pub fn is_capability_error(&self) -> bool {
        matches!(
            self,
            FreqSyncError::MissingFrequency { .. } | FreqSyncError::InvalidFrequency { .. }
        )
    }

    /// Short machine-friendly name, used as a metric label
    pub fn kind(&self) -> &'static str {
        match self {
            FreqSyncError::Config(_) => "config",
            FreqSyncError::MissingFrequency { .. } | FreqSyncError::InvalidFrequency { .. } => {
                "capability"
            }
            FreqSyncError::NoFrequencies(_) | FreqSyncError::Hinter(_) => "hinter",
            FreqSyncError::Patch { .. } | FreqSyncError::Api { .. } => "patch",
            FreqSyncError::Io(_) => "io",
            FreqSyncError::Json(_) | FreqSyncError::Yaml(_) => "serialization",
            FreqSyncError::Http(_) => "http",
            FreqSyncError::Other(_) => "other",
        }
    }
}
