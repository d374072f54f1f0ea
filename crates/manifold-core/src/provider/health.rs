use crate::provider::registry::ProviderRegistry;
use std::{sync::Arc, time::Duration};
use tokio::{sync::broadcast, task::JoinHandle, time::interval};
use tracing::{debug, info, warn};

/// Periodically probes every provider and recomputes its health flag.
///
/// Each provider gets its own independent probe task so a slow or hung
/// backend never delays another provider's probe cycle. Probing continues
/// for disabled and unhealthy providers (recovery has to be observable)
/// and stops only on shutdown.
///
/// The health recompute after every probe is the only writer of the derived
/// `healthy` flag:
/// `enabled && error_rate <= max && latency <= max && circuit != Open`.
pub struct HealthMonitor {
    registry: Arc<ProviderRegistry>,
    check_interval: Duration,
    probe_timeout: Duration,
    max_error_rate: f64,
    max_latency_ms: u64,
    /// Smoothed latency at or below which a provider counts as fast-path.
    fast_path_latency_ms: u64,
}

impl HealthMonitor {
    /// Creates a monitor over the given registry.
    #[must_use]
    pub fn new(
        registry: Arc<ProviderRegistry>,
        check_interval: Duration,
        probe_timeout: Duration,
        max_error_rate: f64,
        max_latency_ms: u64,
    ) -> Self {
        Self {
            registry,
            check_interval,
            probe_timeout,
            max_error_rate,
            max_latency_ms,
            fast_path_latency_ms: 150,
        }
    }

    /// Overrides the fast-path latency classification threshold.
    #[must_use]
    pub fn with_fast_path_latency_ms(mut self, fast_path_latency_ms: u64) -> Self {
        self.fast_path_latency_ms = fast_path_latency_ms;
        self
    }

    /// Spawns one probe task per provider; tasks exit when the shutdown
    /// channel fires.
    #[must_use]
    pub fn start(&self, shutdown_tx: &broadcast::Sender<()>) -> Vec<JoinHandle<()>> {
        self.registry
            .entries()
            .iter()
            .map(|entry| {
                let entry = Arc::clone(entry);
                let registry = Arc::clone(&self.registry);
                let shutdown_rx = shutdown_tx.subscribe();
                let check_interval = self.check_interval;
                let probe_timeout = self.probe_timeout;
                let max_error_rate = self.max_error_rate;
                let max_latency_ms = self.max_latency_ms;
                let fast_path_latency_ms = self.fast_path_latency_ms;

                tokio::spawn(async move {
                    Self::probe_loop(
                        entry,
                        registry,
                        shutdown_rx,
                        check_interval,
                        probe_timeout,
                        max_error_rate,
                        max_latency_ms,
                        fast_path_latency_ms,
                    )
                    .await;
                })
            })
            .collect()
    }

    #[allow(clippy::too_many_arguments)]
    async fn probe_loop(
        entry: Arc<crate::provider::entry::ProviderEntry>,
        registry: Arc<ProviderRegistry>,
        mut shutdown_rx: broadcast::Receiver<()>,
        check_interval: Duration,
        probe_timeout: Duration,
        max_error_rate: f64,
        max_latency_ms: u64,
        fast_path_latency_ms: u64,
    ) {
        let mut ticker = interval(check_interval);
        // The first tick fires immediately so startup health converges fast.
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    Self::run_probe(
                        &entry,
                        &registry,
                        probe_timeout,
                        max_error_rate,
                        max_latency_ms,
                        fast_path_latency_ms,
                    ).await;
                }
                _ = shutdown_rx.recv() => {
                    debug!(provider = %entry.name(), "health probe task shutting down");
                    break;
                }
            }
        }
    }

    async fn run_probe(
        entry: &Arc<crate::provider::entry::ProviderEntry>,
        registry: &Arc<ProviderRegistry>,
        probe_timeout: Duration,
        max_error_rate: f64,
        max_latency_ms: u64,
        fast_path_latency_ms: u64,
    ) {
        let was_healthy = entry.is_healthy();
        let probe_result = entry.probe(probe_timeout).await;
        let healthy = entry.recompute_health(max_error_rate, max_latency_ms);
        let fast_path =
            entry.stats().latency_ms().is_some_and(|latency| latency <= fast_path_latency_ms);

        let label = crate::metrics::provider_label(entry.name());
        metrics::gauge!("manifold_provider_healthy", "provider" => label)
            .set(if healthy { 1.0 } else { 0.0 });
        metrics::gauge!("manifold_provider_circuit_state", "provider" => label).set(
            match entry.breaker().state() {
                crate::provider::circuit_breaker::CircuitState::Closed => 0.0,
                crate::provider::circuit_breaker::CircuitState::HalfOpen => 0.5,
                crate::provider::circuit_breaker::CircuitState::Open => 1.0,
            },
        );
        metrics::gauge!("manifold_provider_fast_path", "provider" => label)
            .set(if fast_path { 1.0 } else { 0.0 });
        #[allow(clippy::cast_precision_loss)]
        metrics::gauge!("manifold_healthy_providers").set(registry.healthy_count() as f64);

        match probe_result {
            Ok(latency_ms) => {
                debug!(
                    provider = %entry.name(),
                    latency_ms,
                    healthy,
                    fast_path,
                    "health probe passed"
                );
            }
            Err(error) => {
                warn!(
                    provider = %entry.name(),
                    error = %error,
                    healthy,
                    "health probe failed"
                );
            }
        }

        if was_healthy != healthy {
            info!(
                provider = %entry.name(),
                healthy,
                error_rate = entry.stats().error_rate(),
                "provider health changed"
            );
        }
    }
}
