//! Application configuration with layered loading.
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded in this order (later overrides earlier):
//!
//! 1. **Compiled defaults**: hardcoded in struct `Default` implementations
//! 2. **Config file**: TOML file specified by the `MANIFOLD_CONFIG` env var
//! 3. **Environment variables**: `MANIFOLD_*` overrides for specific fields
//!
//! # Validation
//!
//! Configuration is validated at load time. Invalid configurations (empty
//! provider list, duplicate names, malformed endpoints, zero intervals,
//! out-of-range rates) return [`ConfigError`] rather than failing later at
//! request time. Construction-time misconfiguration is fatal and never
//! retried.
//!
//! # Example
//!
//! ```toml
//! [routing]
//! policy = "health_first"
//! health_check_interval_ms = 15000
//! max_error_rate = 0.3
//!
//! [[providers]]
//! name = "helios"
//! endpoint = "https://rpc.helios.example"
//! priority = 10
//! features = { bundle = true, fee_estimate = true }
//! ```

use crate::{
    provider::http_adapter::HttpAdapterConfig,
    types::{ProviderConfig, ProviderFeatures},
};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while loading or validating configuration.
///
/// Fatal at construction; a router is never built from invalid config.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ConfigError {
    /// Underlying loader failure (missing file, malformed TOML, bad env).
    #[error("configuration load failed: {0}")]
    Load(#[from] config::ConfigError),

    /// The provider list is empty.
    #[error("at least one provider must be configured")]
    NoProviders,

    /// Two providers share a name.
    #[error("duplicate provider name: {0}")]
    DuplicateProvider(String),

    /// A provider endpoint is not an HTTP(S) URL.
    #[error("provider {name} has invalid endpoint: {endpoint}")]
    InvalidEndpoint {
        /// Offending provider.
        name: String,
        /// The rejected endpoint value.
        endpoint: String,
    },

    /// A numeric field is out of its valid range.
    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        /// Dotted field path.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Selection policy identifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    /// Prefer healthy providers ordered by priority, latency, name.
    #[default]
    HealthFirst,
    /// Rotate evenly across eligible providers.
    RoundRobin,
}

/// Configuration for a single upstream provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSpec {
    /// Unique identifier used in metrics, logs, and results.
    pub name: String,

    /// HTTP(S) endpoint URL.
    pub endpoint: String,

    /// Operator toggle. Defaults to `true`.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Selection tie-break; lower is preferred. Defaults to `100`.
    #[serde(default = "default_priority")]
    pub priority: u32,

    /// Advertised capability set. All flags default to `false`.
    #[serde(default)]
    pub features: ProviderFeatures,

    /// Per-attempt request timeout in milliseconds. Defaults to `5000`.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Per-provider circuit breaker threshold override.
    #[serde(default)]
    pub circuit_breaker_threshold: Option<u32>,

    /// Per-provider circuit breaker open-duration override (milliseconds).
    #[serde(default)]
    pub circuit_breaker_timeout_ms: Option<u64>,

    /// Liveness probe method override.
    #[serde(default)]
    pub health_method: Option<String>,

    /// Bundle submission method override.
    #[serde(default)]
    pub bundle_method: Option<String>,

    /// Fee estimation method override.
    #[serde(default)]
    pub fee_method: Option<String>,
}

fn default_enabled() -> bool {
    true
}

fn default_priority() -> u32 {
    100
}

fn default_timeout_ms() -> u64 {
    5_000
}

impl ProviderSpec {
    /// Builds the runtime provider config, applying routing-level breaker
    /// defaults where no per-provider override exists.
    #[must_use]
    pub fn to_provider_config(&self, routing: &RoutingConfig) -> ProviderConfig {
        ProviderConfig {
            name: Arc::from(self.name.as_str()),
            endpoint: self.endpoint.clone(),
            enabled: self.enabled,
            priority: self.priority,
            features: self.features,
            timeout_ms: self.timeout_ms,
            circuit_breaker_threshold: self
                .circuit_breaker_threshold
                .unwrap_or(routing.circuit_breaker_threshold),
            circuit_breaker_timeout_ms: self
                .circuit_breaker_timeout_ms
                .unwrap_or(routing.circuit_breaker_timeout_ms),
        }
    }

    /// Builds the wire-level adapter config.
    #[must_use]
    pub fn to_adapter_config(&self) -> HttpAdapterConfig {
        let mut adapter = HttpAdapterConfig::new(self.endpoint.clone(), self.features);
        if let Some(method) = &self.health_method {
            adapter.health_method.clone_from(method);
        }
        if let Some(method) = &self.bundle_method {
            adapter.bundle_method.clone_from(method);
        }
        if let Some(method) = &self.fee_method {
            adapter.fee_method.clone_from(method);
        }
        adapter
    }
}

/// Routing and health policy knobs. Immutable after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Selection policy. Defaults to `health_first`.
    #[serde(default)]
    pub policy: PolicyKind,

    /// Interval between health probes per provider, in milliseconds.
    /// Defaults to `15000`.
    #[serde(default = "default_health_check_interval_ms")]
    pub health_check_interval_ms: u64,

    /// Timeout for each individual health probe, in milliseconds.
    /// Defaults to `2000`.
    #[serde(default = "default_health_check_timeout_ms")]
    pub health_check_timeout_ms: u64,

    /// Maximum acceptable rolling error rate before a provider is unhealthy.
    /// Defaults to `0.5`.
    #[serde(default = "default_max_error_rate")]
    pub max_error_rate: f64,

    /// Maximum acceptable smoothed latency before a provider is unhealthy,
    /// in milliseconds. Defaults to `2000`.
    #[serde(default = "default_max_latency_ms")]
    pub max_latency_ms: u64,

    /// Consecutive failures before a provider's circuit opens.
    /// Defaults to `5`.
    #[serde(default = "default_circuit_breaker_threshold")]
    pub circuit_breaker_threshold: u32,

    /// Milliseconds an open circuit waits before admitting a probe.
    /// Defaults to `30000`.
    #[serde(default = "default_circuit_breaker_timeout_ms")]
    pub circuit_breaker_timeout_ms: u64,

    /// Smoothed latency at or below which a provider counts as fast-path,
    /// in milliseconds. Defaults to `150`.
    #[serde(default = "default_latency_threshold_ms")]
    pub latency_threshold_ms: u64,

    /// Windowed bundle success rate below which the degradation signal is
    /// raised. Defaults to `0.8`.
    #[serde(default = "default_bundle_success_rate_threshold")]
    pub bundle_success_rate_threshold: f64,
}

fn default_health_check_interval_ms() -> u64 {
    15_000
}

fn default_health_check_timeout_ms() -> u64 {
    2_000
}

fn default_max_error_rate() -> f64 {
    0.5
}

fn default_max_latency_ms() -> u64 {
    2_000
}

fn default_circuit_breaker_threshold() -> u32 {
    5
}

fn default_circuit_breaker_timeout_ms() -> u64 {
    30_000
}

fn default_latency_threshold_ms() -> u64 {
    150
}

fn default_bundle_success_rate_threshold() -> f64 {
    0.8
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            policy: PolicyKind::default(),
            health_check_interval_ms: default_health_check_interval_ms(),
            health_check_timeout_ms: default_health_check_timeout_ms(),
            max_error_rate: default_max_error_rate(),
            max_latency_ms: default_max_latency_ms(),
            circuit_breaker_threshold: default_circuit_breaker_threshold(),
            circuit_breaker_timeout_ms: default_circuit_breaker_timeout_ms(),
            latency_threshold_ms: default_latency_threshold_ms(),
            bundle_success_rate_threshold: default_bundle_success_rate_threshold(),
        }
    }
}

/// HTTP transport knobs shared by every provider adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Global cap on concurrent upstream requests. Defaults to `512`.
    #[serde(default = "default_concurrent_limit")]
    pub concurrent_limit: usize,

    /// Permit acquisition timeout in milliseconds. Defaults to `500`.
    #[serde(default = "default_permit_timeout_ms")]
    pub permit_timeout_ms: u64,

    /// TCP connect timeout in seconds. Defaults to `5`.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_concurrent_limit() -> usize {
    512
}

fn default_permit_timeout_ms() -> u64 {
    500
}

fn default_connect_timeout_secs() -> u64 {
    5
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            concurrent_limit: default_concurrent_limit(),
            permit_timeout_ms: default_permit_timeout_ms(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

/// Root configuration for a router instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Upstream providers, keyed by unique name. Cannot be empty.
    #[serde(default)]
    pub providers: Vec<ProviderSpec>,

    /// Routing and health policy knobs.
    #[serde(default)]
    pub routing: RoutingConfig,

    /// Shared HTTP transport knobs.
    #[serde(default)]
    pub transport: TransportConfig,
}

impl AppConfig {
    /// Loads configuration from the `MANIFOLD_CONFIG` file (when set) with
    /// `MANIFOLD_*` environment overrides, then validates it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Ok(path) = std::env::var("MANIFOLD_CONFIG") {
            builder = builder.add_source(File::with_name(&path));
        }
        let loaded: Self = builder
            .add_source(Environment::with_prefix("MANIFOLD").separator("__"))
            .build()?
            .try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Parses configuration from a TOML string, then validates it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let loaded: Self = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Validates cross-field invariants the serde layer cannot express.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] encountered.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.providers.is_empty() {
            return Err(ConfigError::NoProviders);
        }

        let mut seen = ahash::AHashSet::with_capacity(self.providers.len());
        for provider in &self.providers {
            if !seen.insert(provider.name.as_str()) {
                return Err(ConfigError::DuplicateProvider(provider.name.clone()));
            }
            if !provider.endpoint.starts_with("http://") &&
                !provider.endpoint.starts_with("https://")
            {
                return Err(ConfigError::InvalidEndpoint {
                    name: provider.name.clone(),
                    endpoint: provider.endpoint.clone(),
                });
            }
            if provider.timeout_ms == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "providers.timeout_ms",
                    reason: format!("must be greater than 0 for provider {}", provider.name),
                });
            }
        }

        let routing = &self.routing;
        if routing.health_check_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "routing.health_check_interval_ms",
                reason: "must be greater than 0".to_string(),
            });
        }
        if routing.health_check_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "routing.health_check_timeout_ms",
                reason: "must be greater than 0".to_string(),
            });
        }
        if routing.circuit_breaker_threshold == 0 {
            return Err(ConfigError::InvalidValue {
                field: "routing.circuit_breaker_threshold",
                reason: "must be greater than 0".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&routing.max_error_rate) {
            return Err(ConfigError::InvalidValue {
                field: "routing.max_error_rate",
                reason: format!("{} is outside [0, 1]", routing.max_error_rate),
            });
        }
        if !(0.0..=1.0).contains(&routing.bundle_success_rate_threshold) {
            return Err(ConfigError::InvalidValue {
                field: "routing.bundle_success_rate_threshold",
                reason: format!("{} is outside [0, 1]", routing.bundle_success_rate_threshold),
            });
        }

        Ok(())
    }
}
