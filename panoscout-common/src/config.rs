//! Configuration loading
//!
//! Resolution order for the config file:
//! 1. Command-line argument (highest priority)
//! 2. `PANOSCOUT_CONFIG` environment variable
//! 3. `<config dir>/panoscout/config.toml`
//! 4. Built-in defaults (no file)
//!
//! Individual environment variables override file values afterwards.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "PANOSCOUT_CONFIG";

/// Default imagery metadata RPC endpoint
pub const DEFAULT_ENDPOINT: &str = "https://maps.googleapis.com/$rpc/google.internal.maps.mapsjs.v1.MapsJsInternalService/GetMetadata";

/// Full configuration, every section optional in the TOML file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub logging: LoggingConfig,
    pub provider: ProviderConfig,
    pub resolver: ResolverConfig,
    pub batch: BatchConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "panoscout_engine=info,panoscout=info".to_string(),
        }
    }
}

/// Imagery metadata provider settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub endpoint: String,
    pub region: String,
    pub language: String,
    pub content_type: String,
    pub x_user_agent: String,
    /// Per-attempt timeout for single lookups
    pub request_timeout_secs: u64,
    /// Per-attempt timeout when resolving a batch
    pub batch_request_timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            region: "US".to_string(),
            language: "en".to_string(),
            content_type: "application/json+protobuf".to_string(),
            x_user_agent: "grpc-web-javascript/0.1".to_string(),
            request_timeout_secs: 15,
            batch_request_timeout_secs: 20,
        }
    }
}

impl ProviderConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn batch_request_timeout(&self) -> Duration {
        Duration::from_secs(self.batch_request_timeout_secs)
    }
}

/// Coverage resolution settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Spatial neighbors farther than this from the base pano are ignored
    pub radius_meters: f64,
    /// Spatial neighbors are probed only while the best month gap is at most this
    pub spatial_probe_max_month_diff: i64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            radius_meters: 20.0,
            spatial_probe_max_month_diff: 2,
        }
    }
}

/// Batch resolution settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Global cap on simultaneously in-flight provider requests
    pub max_concurrent_fetches: usize,
    /// Resolutions polled at once; fetches inside them still share the global cap
    pub max_inflight_resolutions: usize,
    /// Whole-batch deadline; unfinished items resolve to nothing
    pub deadline_secs: Option<u64>,
    /// Log progress every N completed items
    pub progress_log_every: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: 4,
            max_inflight_resolutions: 64,
            deadline_secs: None,
            progress_log_every: 25,
        }
    }
}

impl BatchConfig {
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }
}

impl TomlConfig {
    /// Load configuration from the resolved file (if any), then apply
    /// environment overrides and validate
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        let mut config = match resolve_config_path(cli_path)? {
            Some(path) => {
                let config = read_toml_config(&path)?;
                info!("Loaded configuration from {}", path.display());
                config
            }
            None => {
                debug!("No configuration file found, using built-in defaults");
                Self::default()
            }
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `PANOSCOUT_*` environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(endpoint) = std::env::var("PANOSCOUT_ENDPOINT") {
            self.provider.endpoint = endpoint;
        }
        if let Ok(value) = std::env::var("PANOSCOUT_MAX_CONCURRENT_FETCHES") {
            self.batch.max_concurrent_fetches = value.trim().parse().map_err(|_| {
                Error::Config(format!("PANOSCOUT_MAX_CONCURRENT_FETCHES is not a count: {:?}", value))
            })?;
        }
        if let Ok(value) = std::env::var("PANOSCOUT_RADIUS_METERS") {
            self.resolver.radius_meters = value.trim().parse().map_err(|_| {
                Error::Config(format!("PANOSCOUT_RADIUS_METERS is not a number: {:?}", value))
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch.max_concurrent_fetches == 0 {
            return Err(Error::Config("batch.max_concurrent_fetches must be at least 1".to_string()));
        }
        if self.batch.max_inflight_resolutions == 0 {
            return Err(Error::Config("batch.max_inflight_resolutions must be at least 1".to_string()));
        }
        if !self.resolver.radius_meters.is_finite() || self.resolver.radius_meters < 0.0 {
            return Err(Error::Config(format!(
                "resolver.radius_meters must be a non-negative number, got {}",
                self.resolver.radius_meters
            )));
        }
        if self.provider.request_timeout_secs == 0 || self.provider.batch_request_timeout_secs == 0 {
            return Err(Error::Config("provider timeouts must be greater than zero".to_string()));
        }
        if self.provider.endpoint.trim().is_empty() {
            return Err(Error::Config("provider.endpoint must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Find the configuration file to load, if any
///
/// An explicitly named file (CLI or environment) must exist; the default
/// location is optional.
pub fn resolve_config_path(cli_path: Option<&Path>) -> Result<Option<PathBuf>> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_path {
        return require_exists(path.to_path_buf()).map(Some);
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        return require_exists(PathBuf::from(path)).map(Some);
    }

    // Priority 3: Platform config directory
    Ok(default_config_path().filter(|p| p.exists()))
}

fn require_exists(path: PathBuf) -> Result<PathBuf> {
    if path.exists() {
        Ok(path)
    } else {
        Err(Error::Config(format!("Config file not found: {}", path.display())))
    }
}

/// `<config dir>/panoscout/config.toml` for the current platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("panoscout").join("config.toml"))
}

/// Read and parse a TOML config file
pub fn read_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content).map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Render a config as TOML
pub fn to_toml_string(config: &TomlConfig) -> Result<String> {
    toml::to_string_pretty(config).map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))
}
