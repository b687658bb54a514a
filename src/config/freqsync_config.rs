//! freqsync configuration file handling
//!
//! Loads and manages the ~/.config/freqsync/config.yaml file.

use crate::topology::ScalingPolicy;
use crate::updater::{UpdaterConfig, DEFAULT_INTERVAL, DEFAULT_JITTER_FACTOR};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// API server connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API server URL
    #[serde(default = "default_server")]
    pub server: String,

    /// Bearer token, or `$VAR` to read it from the environment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// File holding the bearer token (e.g. a mounted service account token)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_file: Option<PathBuf>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// How often the node cache is relisted, in seconds
    #[serde(default = "default_resync_interval_secs")]
    pub resync_interval_secs: u64,
}

fn default_server() -> String {
    "https://127.0.0.1:6443".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_resync_interval_secs() -> u64 {
    15
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            server: default_server(),
            token: None,
            token_file: None,
            timeout_secs: default_timeout_secs(),
            resync_interval_secs: default_resync_interval_secs(),
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.resync_interval_secs)
    }

    /// Resolve the bearer token
    ///
    /// An explicit `token` wins over `token_file`. A token of the form `$VAR`
    /// is read from the environment.
    pub fn resolve_token(&self) -> Result<Option<String>> {
        if let Some(ref token) = self.token {
            if let Some(var) = token.strip_prefix('$') {
                let value = std::env::var(var).map_err(|_| {
                    crate::FreqSyncError::Config(format!(
                        "Environment variable {} for api.token is not set",
                        var
                    ))
                })?;
                return Ok(Some(value));
            }
            return Ok(Some(token.clone()));
        }

        if let Some(ref path) = self.token_file {
            let token = fs::read_to_string(path)?;
            return Ok(Some(token.trim().to_string()));
        }

        Ok(None)
    }
}

/// freqsync configuration
///
/// Represents the complete ~/.config/freqsync/config.yaml file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FreqSyncConfig {
    /// Reconciliation interval in seconds
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Maximum jitter as a multiple of the interval
    #[serde(default = "default_jitter_factor")]
    pub jitter_factor: f64,

    /// Which required frequencies scalable nodes advertise
    #[serde(default)]
    pub scaling_policy: ScalingPolicy,

    /// Compute patches without submitting them
    #[serde(default)]
    pub dry_run: bool,

    /// API server connection
    #[serde(default)]
    pub api: ApiConfig,

    /// Address for the /metrics endpoint (disabled when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics_addr: Option<String>,
}

fn default_interval_secs() -> u64 {
    DEFAULT_INTERVAL.as_secs()
}

fn default_jitter_factor() -> f64 {
    DEFAULT_JITTER_FACTOR
}

impl FreqSyncConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            jitter_factor: default_jitter_factor(),
            scaling_policy: ScalingPolicy::default(),
            dry_run: false,
            api: ApiConfig::default(),
            metrics_addr: None,
        }
    }

    /// Load configuration from the default path (~/.config/freqsync/config.yaml)
    pub fn load_default() -> Result<Self> {
        let path = Self::default_path();
        Self::load(&path)
    }

    /// Load configuration from a specific path
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(crate::FreqSyncError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        tracing::info!(path = %path.display(), "Loading freqsync configuration");

        let content = fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;

        tracing::debug!(
            interval_secs = config.interval_secs,
            server = %config.api.server,
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    /// Save configuration to a specific path
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        tracing::info!(path = %path.display(), "Saving freqsync configuration");

        let yaml = serde_yaml::to_string(self)?;
        fs::write(path, yaml)?;

        Ok(())
    }

    /// Get the default config path (~/.config/freqsync/config.yaml)
    pub fn default_path() -> PathBuf {
        let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(".config");
        path.push("freqsync");
        path.push("config.yaml");
        path
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Settings for the reconciliation loop
    pub fn updater_config(&self) -> UpdaterConfig {
        UpdaterConfig::default()
            .with_jitter_factor(self.jitter_factor)
            .with_scaling_policy(self.scaling_policy)
            .with_dry_run(self.dry_run)
    }
}

impl Default for FreqSyncConfig {
    fn default() -> Self {
        Self::new()
    }
}
