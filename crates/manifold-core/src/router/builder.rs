use crate::{
    config::{AppConfig, ConfigError, PolicyKind},
    metrics::MetricsRegistry,
    provider::{
        adapter::ProviderAdapter,
        entry::ProviderEntry,
        health::HealthMonitor,
        http_adapter::HttpProviderAdapter,
        http_client::{HttpClient, HttpClientConfig},
        policy::{HealthFirstPolicy, RoundRobinPolicy, RoutingPolicy},
        registry::ProviderRegistry,
    },
    router::Router,
};
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::sync::broadcast;
use tracing::debug;

/// Default grace period for draining in-flight operations on shutdown.
const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Builder for [`Router`] instances.
///
/// The usual path is configuration only; tests and embedders with custom
/// backends can inject adapters per provider name, which replaces the
/// production HTTP adapter for that provider.
///
/// # Example
///
/// ```no_run
/// # use manifold_core::{config::AppConfig, router::Router};
/// # fn example(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
/// let router = Router::builder().config(config).build()?;
/// # Ok(())
/// # }
/// ```
pub struct RouterBuilder {
    config: Option<AppConfig>,
    policy: Option<Arc<dyn RoutingPolicy>>,
    adapters: HashMap<String, Arc<dyn ProviderAdapter>>,
    shutdown_grace: Duration,
    health_monitor: bool,
}

impl RouterBuilder {
    /// Creates a builder with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: None,
            policy: None,
            adapters: HashMap::new(),
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            health_monitor: true,
        }
    }

    /// Sets the configuration. Required.
    #[must_use]
    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Overrides the routing policy chosen by configuration.
    #[must_use]
    pub fn policy(mut self, policy: Arc<dyn RoutingPolicy>) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Injects an adapter for the named provider instead of constructing
    /// the production HTTP adapter.
    #[must_use]
    pub fn adapter(mut self, name: impl Into<String>, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.adapters.insert(name.into(), adapter);
        self
    }

    /// Overrides the shutdown grace period.
    #[must_use]
    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Disables the background health monitor. Intended for tests that
    /// drive probes explicitly.
    #[must_use]
    pub fn without_health_monitor(mut self) -> Self {
        self.health_monitor = false;
        self
    }

    /// Validates configuration, constructs the provider registry, spawns
    /// health probe tasks, and assembles the router.
    ///
    /// Must be called within a Tokio runtime when the health monitor is
    /// enabled.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when validation fails, an injected adapter
    /// names an unknown provider, or the HTTP transport cannot be built.
    pub fn build(mut self) -> Result<Router, ConfigError> {
        let config = self.config.take().unwrap_or_default();
        config.validate()?;

        for name in self.adapters.keys() {
            if !config.providers.iter().any(|spec| spec.name == *name) {
                return Err(ConfigError::InvalidValue {
                    field: "adapters",
                    reason: format!("injected adapter {name} matches no configured provider"),
                });
            }
        }

        // The shared transport is only built when at least one provider
        // needs the production adapter.
        let mut transport: Option<Arc<HttpClient>> = None;
        let mut entries = Vec::with_capacity(config.providers.len());
        for spec in &config.providers {
            let provider_config = spec.to_provider_config(&config.routing);
            let adapter: Arc<dyn ProviderAdapter> = match self.adapters.remove(&spec.name) {
                Some(injected) => injected,
                None => {
                    let client = match transport.clone() {
                        Some(client) => client,
                        None => {
                            let client =
                                Arc::new(build_transport(&config).map_err(|e| {
                                    ConfigError::InvalidValue {
                                        field: "transport",
                                        reason: e.to_string(),
                                    }
                                })?);
                            transport = Some(Arc::clone(&client));
                            client
                        }
                    };
                    Arc::new(HttpProviderAdapter::new(
                        Arc::clone(&provider_config.name),
                        spec.to_adapter_config(),
                        client,
                    ))
                }
            };
            debug!(provider = %provider_config.name, "constructed provider entry");
            entries.push(Arc::new(ProviderEntry::new(provider_config, adapter)));
        }

        let registry = Arc::new(ProviderRegistry::new(entries));
        let metrics =
            Arc::new(MetricsRegistry::new(config.routing.bundle_success_rate_threshold));
        let policy = self.policy.unwrap_or_else(|| policy_for(config.routing.policy));

        let (shutdown_tx, _) = broadcast::channel(4);
        let health_tasks = if self.health_monitor {
            let monitor = HealthMonitor::new(
                Arc::clone(&registry),
                Duration::from_millis(config.routing.health_check_interval_ms),
                Duration::from_millis(config.routing.health_check_timeout_ms),
                config.routing.max_error_rate,
                config.routing.max_latency_ms,
            )
            .with_fast_path_latency_ms(config.routing.latency_threshold_ms);
            monitor.start(&shutdown_tx)
        } else {
            Vec::new()
        };

        Ok(Router::assemble(
            registry,
            policy,
            metrics,
            shutdown_tx,
            health_tasks,
            self.shutdown_grace,
        ))
    }
}

impl Default for RouterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn build_transport(config: &AppConfig) -> Result<HttpClient, crate::provider::RouterError> {
    HttpClient::with_config(HttpClientConfig {
        concurrent_limit: config.transport.concurrent_limit,
        permit_timeout_ms: config.transport.permit_timeout_ms,
        connect_timeout_secs: config.transport.connect_timeout_secs,
    })
}

fn policy_for(kind: PolicyKind) -> Arc<dyn RoutingPolicy> {
    match kind {
        PolicyKind::HealthFirst => Arc::new(HealthFirstPolicy),
        PolicyKind::RoundRobin => Arc::new(RoundRobinPolicy::new()),
    }
}
