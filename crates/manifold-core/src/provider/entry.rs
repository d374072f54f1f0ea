use crate::{
    provider::{
        adapter::ProviderAdapter,
        circuit_breaker::{CircuitBreaker, CircuitState},
        errors::RouterError,
        stats::ProviderStats,
    },
    types::{BundleRequest, BundleResult, FeeEstimate, ProviderConfig, ProviderSnapshot, Urgency},
};
use serde_json::Value;
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

/// Window for the rolling request counters backing the error rate.
const STATS_WINDOW_SECS: u64 = 300;

/// Releases an acquired breaker slot if the call is cancelled before its
/// outcome is recorded; a stranded HalfOpen probe would otherwise leave the
/// provider permanently ineligible.
struct AcquireGuard<'a> {
    breaker: &'a CircuitBreaker,
    armed: bool,
}

impl<'a> AcquireGuard<'a> {
    fn new(breaker: &'a CircuitBreaker) -> Self {
        Self { breaker, armed: true }
    }

    /// The outcome is about to be recorded; recording resolves the slot.
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for AcquireGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.breaker.abandon_probe();
        }
    }
}

/// One provider's guarded state block: a stateless adapter plus the mutable
/// health, circuit, and latency state the router maintains around it.
///
/// All call paths are gated by the provider's circuit breaker and wrapped in
/// the per-attempt timeout, and every outcome is recorded into the stats
/// block. The derived `healthy` flag is recomputed only by the health
/// monitor (after each probe); request paths merely feed the inputs.
///
/// Synchronization is per-entry (atomics plus the breaker's own lock), so
/// one provider's updates never block operations on another.
pub struct ProviderEntry {
    config: ProviderConfig,
    adapter: Arc<dyn ProviderAdapter>,
    breaker: CircuitBreaker,
    stats: ProviderStats,
    healthy: AtomicBool,
    enabled: AtomicBool,
}

impl ProviderEntry {
    /// Creates an entry wrapping the given adapter.
    #[must_use]
    pub fn new(config: ProviderConfig, adapter: Arc<dyn ProviderAdapter>) -> Self {
        let breaker = CircuitBreaker::new(
            config.circuit_breaker_threshold,
            Duration::from_millis(config.circuit_breaker_timeout_ms),
        );
        let enabled = config.enabled;
        Self {
            config,
            adapter,
            breaker,
            stats: ProviderStats::new(STATS_WINDOW_SECS),
            healthy: AtomicBool::new(true),
            enabled: AtomicBool::new(enabled),
        }
    }

    /// Provider name.
    #[must_use]
    pub fn name(&self) -> &Arc<str> {
        &self.config.name
    }

    /// Static configuration for this provider.
    #[must_use]
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// The provider's circuit breaker.
    #[must_use]
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// The provider's rolling stats.
    #[must_use]
    pub fn stats(&self) -> &ProviderStats {
        &self.stats
    }

    /// Current derived health flag.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }

    /// Current operator toggle.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Flips the operator toggle. Disabled providers are never selected but
    /// keep being probed so recovery stays observable.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
        tracing::info!(provider = %self.config.name, enabled, "provider toggle changed");
    }

    /// Whether this provider is selectable right now: enabled and not
    /// short-circuited. Health is a preference, not an eligibility gate.
    ///
    /// An Open circuit whose open duration has elapsed counts as selectable
    /// so the next attempt can take the HalfOpen probe slot.
    #[must_use]
    pub fn is_eligible(&self) -> bool {
        self.is_enabled() && self.breaker.admits_request()
    }

    fn per_attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.config.timeout_ms)
    }

    /// Records an attempt outcome into stats, the breaker, and the
    /// per-provider metrics labels.
    ///
    /// Breaker bookkeeping is driven by error classification: outcomes that
    /// don't indicate a provider-side failure (client errors, rate limits)
    /// count as breaker successes, because the backend demonstrably
    /// responded. This also guarantees a consumed HalfOpen probe slot is
    /// always resolved.
    fn record_outcome<T>(
        &self,
        started: Instant,
        result: Result<T, RouterError>,
    ) -> Result<T, RouterError> {
        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let label = crate::metrics::provider_label(&self.config.name);
        match &result {
            Ok(_) => {
                self.stats.record_success(latency_ms);
                self.breaker.record_success();
                metrics::counter!(
                    "manifold_provider_requests_total",
                    "provider" => label,
                    "outcome" => "success"
                )
                .increment(1);
                #[allow(clippy::cast_precision_loss)]
                metrics::histogram!(
                    "manifold_provider_latency_ms",
                    "provider" => label
                )
                .record(latency_ms as f64);
            }
            Err(error) => {
                if error.penalizes_provider() {
                    self.stats.record_failure();
                }
                if error.trips_breaker() {
                    self.breaker.record_failure();
                } else {
                    self.breaker.record_success();
                }
                metrics::counter!(
                    "manifold_provider_requests_total",
                    "provider" => label,
                    "outcome" => error.as_metric_str()
                )
                .increment(1);
            }
        }
        result
    }

    /// Sends a generic call through this provider.
    ///
    /// # Errors
    ///
    /// [`RouterError::CircuitOpen`] when short-circuited (the adapter is not
    /// contacted and nothing is recorded against this provider), otherwise
    /// the adapter outcome mapped through the taxonomy.
    pub async fn invoke(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<Value, RouterError> {
        if !self.breaker.try_acquire() {
            return Err(RouterError::CircuitOpen);
        }
        let guard = AcquireGuard::new(&self.breaker);

        let timeout = self.per_attempt_timeout();
        let started = Instant::now();
        let result = match tokio::time::timeout(
            timeout,
            self.adapter.invoke(method, params, timeout),
        )
        .await
        {
            Ok(inner) => inner,
            Err(_) => Err(RouterError::Timeout),
        };

        guard.disarm();
        self.record_outcome(started, result)
    }

    /// Submits a bundle through this provider.
    ///
    /// # Errors
    ///
    /// Same contract as [`ProviderEntry::invoke`].
    pub async fn submit_bundle(
        &self,
        request: &BundleRequest,
    ) -> Result<BundleResult, RouterError> {
        if !self.breaker.try_acquire() {
            return Err(RouterError::CircuitOpen);
        }
        let guard = AcquireGuard::new(&self.breaker);

        let timeout = self.per_attempt_timeout();
        let started = Instant::now();
        let result = match tokio::time::timeout(
            timeout,
            self.adapter.submit_bundle(request, timeout),
        )
        .await
        {
            Ok(inner) => inner,
            Err(_) => Err(RouterError::Timeout),
        };

        guard.disarm();
        let result = self.record_outcome(started, result);
        result.map(|bundle_id| BundleResult {
            bundle_id,
            provider: Arc::clone(&self.config.name),
            accepted: true,
            latency_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        })
    }

    /// Queries a fee estimate from this provider.
    ///
    /// # Errors
    ///
    /// Same contract as [`ProviderEntry::invoke`].
    pub async fn estimate_fee(&self, urgency: Urgency) -> Result<FeeEstimate, RouterError> {
        if !self.breaker.try_acquire() {
            return Err(RouterError::CircuitOpen);
        }
        let guard = AcquireGuard::new(&self.breaker);

        let timeout = self.per_attempt_timeout();
        let started = Instant::now();
        let result = match tokio::time::timeout(
            timeout,
            self.adapter.estimate_fee(urgency, timeout),
        )
        .await
        {
            Ok(inner) => inner,
            Err(_) => Err(RouterError::Timeout),
        };

        guard.disarm();
        self.record_outcome(started, result)
    }

    /// Runs one liveness probe with its own timeout.
    ///
    /// Probes flow through the circuit breaker gate like real traffic, so a
    /// HalfOpen probe slot may be consumed (and the circuit closed) by the
    /// health monitor. A skipped probe (circuit still Open) records nothing.
    pub async fn probe(&self, timeout: Duration) -> Result<u64, RouterError> {
        if !self.breaker.try_acquire() {
            return Err(RouterError::CircuitOpen);
        }
        let guard = AcquireGuard::new(&self.breaker);

        let started = Instant::now();
        let result = match tokio::time::timeout(timeout, self.adapter.probe(timeout)).await {
            Ok(inner) => inner,
            Err(_) => Err(RouterError::Timeout),
        };

        guard.disarm();
        self.record_outcome(started, result)
    }

    /// Recomputes the derived health flag from current inputs.
    ///
    /// `healthy = enabled && error_rate <= max && latency <= max && circuit != Open`.
    /// An unseeded latency passes the latency bound: a provider is given the
    /// benefit of the doubt until it produces evidence either way.
    pub fn recompute_health(&self, max_error_rate: f64, max_latency_ms: u64) -> bool {
        let healthy = self.is_enabled()
            && self.stats.error_rate() <= max_error_rate
            && self.stats.latency_ms().is_none_or(|l| l <= max_latency_ms)
            && self.breaker.state() != CircuitState::Open;
        self.healthy.store(healthy, Ordering::Relaxed);
        healthy
    }

    /// Point-in-time view of this provider for health reporting.
    #[must_use]
    pub fn snapshot(&self) -> ProviderSnapshot {
        ProviderSnapshot {
            healthy: self.is_healthy(),
            enabled: self.is_enabled(),
            priority: self.config.priority,
            latency_ms: self.stats.latency_ms(),
            error_rate: self.stats.error_rate(),
            circuit_state: self.breaker.state(),
        }
    }
}
