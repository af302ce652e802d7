//! Configuration management for Tollgate.
//!
//! Settings come from an optional YAML file, overlaid with environment
//! variables prefixed `TOLLGATE_` using `__` between nested keys, e.g.
//! `TOLLGATE_ADMISSION__QUEUE_CAPACITY=100`.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::admission::MAX_QUEUE_CAPACITY;
use crate::error::{Result, TollgateError};
use crate::ratelimit::{ClientSpec, ResourceLimits};

/// Main configuration for the Tollgate service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TollgateConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Admission control configuration
    #[serde(default)]
    pub admission: AdmissionConfig,

    /// Limits applied by the seed-client endpoint
    #[serde(default)]
    pub seed: SeedConfig,

    /// Clients registered at startup
    #[serde(default)]
    pub clients: Vec<ClientSpec>,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP listen address
    #[serde(default = "default_http_addr")]
    pub http_addr: SocketAddr,

    /// Token required on client management routes. When unset, any
    /// non-empty `Authorization` header is accepted.
    #[serde(default)]
    pub admin_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
            admin_token: None,
        }
    }
}

fn default_http_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

/// Admission control configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmissionConfig {
    /// Maximum number of outstanding admission queue entries
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Age in seconds after which a queue entry is evicted
    #[serde(default = "default_staleness_window")]
    pub staleness_window_secs: u64,

    /// Seconds between eviction sweeps
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Per-endpoint refill rate in tokens per second
    #[serde(default = "default_refill_rate")]
    pub refill_rate: f64,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            staleness_window_secs: default_staleness_window(),
            sweep_interval_secs: default_sweep_interval(),
            refill_rate: default_refill_rate(),
        }
    }
}

fn default_queue_capacity() -> usize {
    crate::admission::DEFAULT_QUEUE_CAPACITY
}

fn default_staleness_window() -> u64 {
    crate::admission::DEFAULT_STALENESS_WINDOW.as_secs()
}

fn default_sweep_interval() -> u64 {
    crate::admission::DEFAULT_SWEEP_INTERVAL.as_secs()
}

fn default_refill_rate() -> f64 {
    crate::ratelimit::DEFAULT_REFILL_RATE
}

impl AdmissionConfig {
    pub fn staleness_window(&self) -> Duration {
        Duration::from_secs(self.staleness_window_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Default client created by the seed endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedConfig {
    /// Display name of the seeded client
    #[serde(default = "default_seed_name")]
    pub name: String,

    /// Per-endpoint limits of the seeded client
    #[serde(default = "default_seed_resources")]
    pub resources: ResourceLimits,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            name: default_seed_name(),
            resources: default_seed_resources(),
        }
    }
}

fn default_seed_name() -> String {
    "default".to_string()
}

fn default_seed_resources() -> ResourceLimits {
    [
        ("/api/resource1", 10),
        ("/api/resource2", 5),
        ("/api/resource3", 3),
    ]
    .into_iter()
    .map(|(endpoint, limit)| (endpoint.to_string(), limit))
    .collect()
}

impl TollgateConfig {
    /// Load configuration from an optional YAML file and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = ::config::Config::builder();

        if let Some(path) = path {
            info!(path = %path.display(), "Loading configuration file");
            builder = builder.add_source(
                ::config::File::from(path)
                    .format(::config::FileFormat::Yaml)
                    .required(true),
            );
        }

        let config: TollgateConfig = builder
            .add_source(
                ::config::Environment::with_prefix("TOLLGATE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| TollgateError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: TollgateConfig = serde_yaml::from_str(yaml)
            .map_err(|e| TollgateError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the service cannot run with.
    pub fn validate(&self) -> Result<()> {
        let admission = &self.admission;
        if admission.queue_capacity == 0 {
            return Err(TollgateError::Config(
                "admission.queue_capacity must be positive".to_string(),
            ));
        }
        if admission.queue_capacity > MAX_QUEUE_CAPACITY {
            return Err(TollgateError::Config(format!(
                "admission.queue_capacity must be at most {}",
                MAX_QUEUE_CAPACITY
            )));
        }
        if admission.staleness_window_secs == 0 || admission.sweep_interval_secs == 0 {
            return Err(TollgateError::Config(
                "admission staleness window and sweep interval must be positive".to_string(),
            ));
        }
        if !(admission.refill_rate.is_finite() && admission.refill_rate > 0.0) {
            return Err(TollgateError::Config(
                "admission.refill_rate must be positive".to_string(),
            ));
        }
        if matches!(self.server.admin_token.as_deref(), Some("")) {
            return Err(TollgateError::Config(
                "server.admin_token must not be empty when set".to_string(),
            ));
        }
        Ok(())
    }
}
