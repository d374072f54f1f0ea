//! Router metrics: monotonic counters, a windowed bundle success rate, and
//! point-in-time snapshots.
//!
//! # Dual-Path Design
//!
//! Hot-path recording is lock-free atomic increments, mirrored into the
//! `metrics` facade so an exporter installed by the embedding process picks
//! the same series up. Snapshots derive rates on read and never block
//! recorders.
//!
//! Counters are monotonic for the router's lifetime. Rates are always in
//! `[0, 1]`; a rate over zero recorded events is reported as 0 rather than
//! dividing by zero. The bundle path additionally tracks a *windowed*
//! success rate compared against the configured threshold - an observability
//! signal only, never an automatic remediation.

use crate::{provider::registry::ProviderRegistry, types::Feature};
use serde::Serialize;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        OnceLock,
    },
    time::Instant,
};

/// Window over which the bundle success rate is evaluated.
const BUNDLE_WINDOW_SECS: u64 = 300;

// Provider names appear as metrics labels. The label pool interns each name
// once (the set is bounded by configuration, so the leak is a few hundred
// bytes for the process lifetime) so hot-path recording allocates nothing.
static PROVIDER_LABEL_POOL: OnceLock<dashmap::DashMap<String, &'static str>> = OnceLock::new();

/// Interns a provider name for use as a `'static` metrics label.
#[must_use]
pub fn provider_label(name: &str) -> &'static str {
    let pool = PROVIDER_LABEL_POOL.get_or_init(dashmap::DashMap::new);
    if let Some(interned) = pool.get(name) {
        return *interned;
    }
    let leaked: &'static str = Box::leak(name.to_string().into_boxed_str());
    pool.insert(name.to_string(), leaked);
    leaked
}

#[allow(clippy::cast_precision_loss)]
fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Windowed success/total counter pair with CAS-claimed resets.
struct RollingRate {
    total: AtomicU64,
    successes: AtomicU64,
    window_start_nanos: AtomicU64,
    epoch: Instant,
    window_duration_nanos: u64,
}

impl RollingRate {
    fn new(window_seconds: u64) -> Self {
        Self {
            total: AtomicU64::new(0),
            successes: AtomicU64::new(0),
            window_start_nanos: AtomicU64::new(0),
            epoch: Instant::now(),
            window_duration_nanos: window_seconds.saturating_mul(1_000_000_000),
        }
    }

    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    fn now_nanos(&self) -> u64 {
        self.epoch.elapsed().as_nanos() as u64
    }

    fn record(&self, success: bool) {
        self.maybe_reset();
        self.total.fetch_add(1, Ordering::Relaxed);
        if success {
            self.successes.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Windowed success rate; `None` when the window holds no samples.
    fn rate(&self) -> Option<f64> {
        let total = self.total.load(Ordering::Relaxed);
        if total == 0 {
            None
        } else {
            Some(ratio(self.successes.load(Ordering::Relaxed), total))
        }
    }

    fn maybe_reset(&self) {
        let now = self.now_nanos();
        let start = self.window_start_nanos.load(Ordering::Acquire);
        if now.saturating_sub(start) < self.window_duration_nanos {
            return;
        }
        if self
            .window_start_nanos
            .compare_exchange(start, now, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
        {
            self.total.store(0, Ordering::Relaxed);
            self.successes.store(0, Ordering::Relaxed);
        }
    }
}

/// Point-in-time view of router-level metrics.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Total top-level requests routed (monotonic).
    pub requests_total: u64,
    /// Total top-level requests that succeeded (monotonic).
    pub requests_succeeded: u64,
    /// `requests_succeeded / requests_total`, 0 when empty.
    pub request_success_rate: f64,
    /// Total bundle submissions attempted (monotonic).
    pub bundles_total: u64,
    /// Total bundle submissions accepted (monotonic).
    pub bundles_succeeded: u64,
    /// `bundles_succeeded / bundles_total`, 0 when empty.
    pub bundle_success_rate: f64,
    /// Success rate over the current bundle window; `None` without samples.
    pub bundle_window_success_rate: Option<f64>,
    /// True when the windowed bundle rate is below the configured threshold.
    pub bundle_rate_degraded: bool,
    /// Count of available (enabled AND healthy) providers per feature.
    pub feature_availability: HashMap<Feature, usize>,
}

/// Lock-free metrics registry shared by the router's call paths.
pub struct MetricsRegistry {
    requests_total: AtomicU64,
    requests_succeeded: AtomicU64,
    bundles_total: AtomicU64,
    bundles_succeeded: AtomicU64,
    bundle_window: RollingRate,
    bundle_success_rate_threshold: f64,
}

impl MetricsRegistry {
    /// Creates a registry with the given bundle success-rate threshold.
    #[must_use]
    pub fn new(bundle_success_rate_threshold: f64) -> Self {
        Self {
            requests_total: AtomicU64::new(0),
            requests_succeeded: AtomicU64::new(0),
            bundles_total: AtomicU64::new(0),
            bundles_succeeded: AtomicU64::new(0),
            bundle_window: RollingRate::new(BUNDLE_WINDOW_SECS),
            bundle_success_rate_threshold,
        }
    }

    /// Records the outcome of one top-level routed request.
    pub fn record_request(&self, success: bool) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        if success {
            self.requests_succeeded.fetch_add(1, Ordering::Relaxed);
        }
        metrics::counter!(
            "manifold_requests_total",
            "outcome" => if success { "success" } else { "failure" }
        )
        .increment(1);
    }

    /// Records the outcome of one bundle submission.
    pub fn record_bundle(&self, success: bool) {
        self.bundles_total.fetch_add(1, Ordering::Relaxed);
        if success {
            self.bundles_succeeded.fetch_add(1, Ordering::Relaxed);
        }
        self.bundle_window.record(success);
        metrics::counter!(
            "manifold_bundles_total",
            "outcome" => if success { "success" } else { "failure" }
        )
        .increment(1);

        if let Some(rate) = self.bundle_window.rate() {
            metrics::gauge!("manifold_bundle_window_success_rate").set(rate);
            if rate < self.bundle_success_rate_threshold {
                metrics::gauge!("manifold_bundle_rate_degraded").set(1.0);
            } else {
                metrics::gauge!("manifold_bundle_rate_degraded").set(0.0);
            }
        }
    }

    /// Whether the windowed bundle success rate has fallen below the
    /// configured threshold. False without samples.
    #[must_use]
    pub fn bundle_rate_degraded(&self) -> bool {
        self.bundle_window
            .rate()
            .is_some_and(|rate| rate < self.bundle_success_rate_threshold)
    }

    /// Builds a snapshot, resolving per-feature availability against the
    /// provider registry.
    #[must_use]
    pub fn snapshot(&self, registry: &ProviderRegistry) -> MetricsSnapshot {
        let requests_total = self.requests_total.load(Ordering::Relaxed);
        let requests_succeeded = self.requests_succeeded.load(Ordering::Relaxed);
        let bundles_total = self.bundles_total.load(Ordering::Relaxed);
        let bundles_succeeded = self.bundles_succeeded.load(Ordering::Relaxed);

        MetricsSnapshot {
            requests_total,
            requests_succeeded,
            request_success_rate: ratio(requests_succeeded, requests_total),
            bundles_total,
            bundles_succeeded,
            bundle_success_rate: ratio(bundles_succeeded, bundles_total),
            bundle_window_success_rate: self.bundle_window.rate(),
            bundle_rate_degraded: self.bundle_rate_degraded(),
            feature_availability: registry.feature_availability(),
        }
    }
}
