//! The router facade: public entry point composing the registry, policy,
//! health monitor, metrics, and feature-specific submission paths.
//!
//! # Lifecycle
//!
//! ```text
//! Initializing ──► Ready ◄──► Degraded ──► ShuttingDown ──► Closed
//!   (construction)   │  (zero healthy providers)   │    (terminal)
//!                    └──────── shutdown() ─────────┘
//! ```
//!
//! `Ready`/`Degraded` are derived continuously from the healthy-provider
//! count, not discrete transitions; `shutdown()` drains in-flight operations
//! up to a grace period before the terminal `Closed` state. Operations
//! arriving while shutting down or closed fail with `RouterClosed`.

pub mod builder;
mod bundle;
mod fees;

pub use builder::RouterBuilder;

use crate::{
    config::AppConfig,
    metrics::{MetricsRegistry, MetricsSnapshot},
    provider::{
        entry::ProviderEntry,
        errors::RouterError,
        policy::{Candidate, RoutingPolicy},
        registry::ProviderRegistry,
    },
    types::{BundleRequest, BundleResult, Feature, FeeEstimate, HealthSnapshot, Urgency},
};
use bundle::BundleSubmitter;
use fees::FeeEstimator;
use serde_json::Value;
use std::{
    sync::{
        atomic::{AtomicU8, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::{sync::broadcast, task::JoinHandle};
use tracing::{debug, info, warn};

/// Caller-visible lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterState {
    /// Constructing adapters; not yet accepting calls.
    Initializing,
    /// Normal operation with at least one healthy provider.
    Ready,
    /// Operating with zero healthy providers; calls still attempted via the
    /// policy's degraded fallback.
    Degraded,
    /// Draining in-flight operations; refusing new ones.
    ShuttingDown,
    /// Terminal; all operations fail immediately.
    Closed,
}

const PHASE_RUNNING: u8 = 0;
const PHASE_SHUTTING_DOWN: u8 = 1;
const PHASE_CLOSED: u8 = 2;

/// Shared lifecycle state: the coarse phase plus the in-flight operation
/// count used to drain on shutdown.
pub(crate) struct Lifecycle {
    phase: AtomicU8,
    in_flight: AtomicUsize,
    drained: tokio::sync::Notify,
}

impl Lifecycle {
    fn new() -> Self {
        Self {
            phase: AtomicU8::new(PHASE_RUNNING),
            in_flight: AtomicUsize::new(0),
            drained: tokio::sync::Notify::new(),
        }
    }

    /// Registers an in-flight operation, refusing when not running.
    ///
    /// The count is incremented before the phase check so shutdown can never
    /// miss an operation that raced past it.
    fn acquire(self: &Arc<Self>) -> Result<OpGuard, RouterError> {
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        if self.phase.load(Ordering::Acquire) != PHASE_RUNNING {
            self.release();
            return Err(RouterError::RouterClosed);
        }
        Ok(OpGuard { lifecycle: Arc::clone(self) })
    }

    fn release(&self) {
        if self.in_flight.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.drained.notify_waiters();
        }
    }
}

/// RAII guard for one in-flight operation.
pub(crate) struct OpGuard {
    lifecycle: Arc<Lifecycle>,
}

impl Drop for OpGuard {
    fn drop(&mut self) {
        self.lifecycle.release();
    }
}

/// Assembles the ordered preference list for one routing decision:
/// eligibility filtering by the registry, snapshotting, then pure ordering
/// by the policy.
pub(crate) fn ordered_candidates(
    registry: &ProviderRegistry,
    policy: &dyn RoutingPolicy,
    feature: Option<Feature>,
) -> Vec<Arc<ProviderEntry>> {
    let candidates: Vec<Candidate> =
        registry.candidates(feature).into_iter().map(Candidate::observe).collect();
    policy.order(candidates)
}

/// Multi-provider RPC router with health-aware failover.
///
/// Composes the provider registry, routing policy, health monitor, circuit
/// breakers, and metrics into one facade. Construct via [`RouterBuilder`]
/// (or [`Router::from_config`]); the provider set is fixed for the router's
/// lifetime.
///
/// All methods take `&self` and are safe to share behind an `Arc` across
/// tasks. Provider attempts within one operation are strictly sequential in
/// policy order; there is no speculative fan-out.
pub struct Router {
    registry: Arc<ProviderRegistry>,
    policy: Arc<dyn RoutingPolicy>,
    metrics: Arc<MetricsRegistry>,
    bundles: BundleSubmitter,
    fees: FeeEstimator,
    lifecycle: Arc<Lifecycle>,
    shutdown_tx: broadcast::Sender<()>,
    health_tasks: parking_lot::Mutex<Vec<JoinHandle<()>>>,
    shutdown_grace: Duration,
}

impl Router {
    /// Creates a builder for constructing a router.
    #[must_use]
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    /// Builds a router from validated configuration with the production
    /// HTTP adapters. Must be called within a Tokio runtime: construction
    /// spawns the per-provider health probe tasks.
    ///
    /// # Errors
    ///
    /// Returns [`crate::config::ConfigError`] when the configuration is
    /// invalid or no adapter can be constructed.
    pub fn from_config(config: AppConfig) -> Result<Self, crate::config::ConfigError> {
        RouterBuilder::new().config(config).build()
    }

    pub(crate) fn assemble(
        registry: Arc<ProviderRegistry>,
        policy: Arc<dyn RoutingPolicy>,
        metrics: Arc<MetricsRegistry>,
        shutdown_tx: broadcast::Sender<()>,
        health_tasks: Vec<JoinHandle<()>>,
        shutdown_grace: Duration,
    ) -> Self {
        let bundles = BundleSubmitter::new(
            Arc::clone(&registry),
            Arc::clone(&policy),
            Arc::clone(&metrics),
        );
        let fees = FeeEstimator::new(Arc::clone(&registry), Arc::clone(&policy));
        info!(
            providers = registry.len(),
            policy = policy.name(),
            "router ready"
        );
        Self {
            registry,
            policy,
            metrics,
            bundles,
            fees,
            lifecycle: Arc::new(Lifecycle::new()),
            shutdown_tx,
            health_tasks: parking_lot::Mutex::new(health_tasks),
            shutdown_grace,
        }
    }

    /// Current lifecycle state.
    ///
    /// `Ready` vs `Degraded` is a continuous derivation from the healthy
    /// count; no caller action is required on the transition.
    #[must_use]
    pub fn state(&self) -> RouterState {
        match self.lifecycle.phase.load(Ordering::Acquire) {
            PHASE_CLOSED => RouterState::Closed,
            PHASE_SHUTTING_DOWN => RouterState::ShuttingDown,
            _ => {
                if self.registry.healthy_count() > 0 {
                    RouterState::Ready
                } else {
                    RouterState::Degraded
                }
            }
        }
    }

    /// The provider registry backing this router.
    #[must_use]
    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// Generic passthrough RPC call with health-aware failover.
    ///
    /// Attempts providers sequentially in policy order. Per-attempt failures
    /// are absorbed and recorded; only candidate exhaustion (or a failure
    /// that would reproduce identically on every provider) surfaces.
    ///
    /// # Errors
    ///
    /// - [`RouterError::RouterClosed`] after shutdown
    /// - [`RouterError::Timeout`] when `timeout` elapses (cancels the
    ///   in-flight attempt and any pending retries)
    /// - [`RouterError::AllProvidersExhausted`] when every candidate failed
    pub async fn call(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Option<Duration>,
    ) -> Result<Value, RouterError> {
        let _guard = self.lifecycle.acquire()?;
        let result = match timeout {
            Some(limit) => tokio::time::timeout(limit, self.call_inner(method, params))
                .await
                .unwrap_or(Err(RouterError::Timeout)),
            None => self.call_inner(method, params).await,
        };
        self.metrics.record_request(result.is_ok());
        result
    }

    async fn call_inner(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<Value, RouterError> {
        let candidates = ordered_candidates(&self.registry, &*self.policy, None);
        let mut attempts = 0usize;

        for entry in candidates {
            match entry.invoke(method, params.clone()).await {
                Ok(value) => {
                    debug!(provider = %entry.name(), method, "call served");
                    return Ok(value);
                }
                // A circuit that opened between snapshot and attempt: skip
                // without counting it as an attempted candidate.
                Err(RouterError::CircuitOpen) => {
                    debug!(provider = %entry.name(), "skipping provider with open circuit");
                }
                Err(error) if error.is_retryable() => {
                    attempts += 1;
                    warn!(
                        provider = %entry.name(),
                        error = %error,
                        method,
                        "provider attempt failed, trying next candidate"
                    );
                }
                Err(error) => {
                    // Deterministic failure (e.g. malformed request): every
                    // provider would reject it identically.
                    warn!(provider = %entry.name(), error = %error, method, "call rejected");
                    return Err(error);
                }
            }
        }

        Err(RouterError::AllProvidersExhausted { attempts })
    }

    /// Submits a transaction bundle to a bundle-capable provider.
    ///
    /// MEV-urgent bundles prefer shredstream-capable providers. See
    /// [`RouterError`] for the failure contract; absence of any capable
    /// provider fails before any network attempt.
    ///
    /// # Errors
    ///
    /// - [`RouterError::RouterClosed`] after shutdown
    /// - [`RouterError::NoCapableProvider`] with no bundle-capable candidate
    /// - [`RouterError::Timeout`] when `timeout` elapses
    /// - [`RouterError::AllProvidersExhausted`] when every candidate failed
    pub async fn submit_bundle(
        &self,
        request: BundleRequest,
        timeout: Option<Duration>,
    ) -> Result<BundleResult, RouterError> {
        let _guard = self.lifecycle.acquire()?;
        match timeout {
            Some(limit) => tokio::time::timeout(limit, self.bundles.submit(request))
                .await
                .unwrap_or_else(|_| {
                    self.metrics.record_bundle(false);
                    Err(RouterError::Timeout)
                }),
            None => self.bundles.submit(request).await,
        }
    }

    /// Returns a priority-fee estimate from the best fee-capable provider,
    /// failing over to the next candidate on error or timeout.
    ///
    /// # Errors
    ///
    /// - [`RouterError::RouterClosed`] after shutdown
    /// - [`RouterError::NoCapableProvider`] with no fee-capable candidate
    /// - [`RouterError::Timeout`] when `timeout` elapses
    /// - [`RouterError::AllProvidersExhausted`] when every candidate failed
    pub async fn estimate_priority_fee(
        &self,
        urgency: Urgency,
        timeout: Option<Duration>,
    ) -> Result<FeeEstimate, RouterError> {
        let _guard = self.lifecycle.acquire()?;
        let result = match timeout {
            Some(limit) => tokio::time::timeout(limit, self.fees.estimate(urgency))
                .await
                .unwrap_or(Err(RouterError::Timeout)),
            None => self.fees.estimate(urgency).await,
        };
        self.metrics.record_request(result.is_ok());
        result
    }

    /// Point-in-time health view: router-level flag plus per-provider
    /// detail. Readable in every lifecycle state.
    #[must_use]
    pub fn health(&self) -> HealthSnapshot {
        self.registry.health_snapshot()
    }

    /// Point-in-time metrics snapshot. Readable in every lifecycle state.
    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot(&self.registry)
    }

    /// Gracefully shuts the router down.
    ///
    /// Stops health probing, waits for in-flight operations up to the grace
    /// period, then transitions to `Closed`. Idempotent: repeated calls are
    /// no-ops, and operations issued after the first call fail with
    /// [`RouterError::RouterClosed`].
    pub async fn shutdown(&self) {
        if self
            .lifecycle
            .phase
            .compare_exchange(
                PHASE_RUNNING,
                PHASE_SHUTTING_DOWN,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            debug!("shutdown already initiated, ignoring duplicate call");
            return;
        }

        info!("router shutdown initiated");
        if self.shutdown_tx.send(()).is_err() {
            debug!("no health probe tasks were listening for shutdown");
        }

        let tasks: Vec<JoinHandle<()>> = std::mem::take(&mut *self.health_tasks.lock());
        if !tasks.is_empty() &&
            tokio::time::timeout(Duration::from_secs(1), futures::future::join_all(tasks))
                .await
                .is_err()
        {
            warn!("health probe tasks did not stop within 1s");
        }

        // Drain in-flight operations, bounded by the grace period. The
        // waiter is registered before the count re-check so a release
        // between the check and the await cannot be missed.
        let deadline = tokio::time::Instant::now() + self.shutdown_grace;
        while self.lifecycle.in_flight.load(Ordering::Acquire) > 0 {
            let mut notified = std::pin::pin!(self.lifecycle.drained.notified());
            notified.as_mut().enable();
            if self.lifecycle.in_flight.load(Ordering::Acquire) == 0 {
                break;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                warn!(
                    in_flight = self.lifecycle.in_flight.load(Ordering::Acquire),
                    "grace period elapsed with operations still in flight"
                );
                break;
            }
        }

        self.lifecycle.phase.store(PHASE_CLOSED, Ordering::Release);
        info!("router shutdown complete");
    }
}

const _: () = {
    const fn assert_send_sync<T: Send + Sync>() {}
    let _ = assert_send_sync::<Router>;
};
