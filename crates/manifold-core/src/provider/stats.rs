//! Per-provider rolling request statistics.
//!
//! Tracks a windowed error rate and an exponentially weighted moving average
//! of request latency. All fields are atomics so recording on the hot path
//! is lock-free; readers get slightly stale but internally consistent values.

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Instant,
};

/// Smoothing factor for the latency EWMA. Higher reacts faster to change.
const EWMA_ALPHA: f64 = 0.2;

/// Sentinel marking the EWMA as unseeded (no successful sample yet).
const LATENCY_UNSEEDED: u64 = u64::MAX;

/// Rolling statistics for a single provider.
///
/// # Lock-Free Design
///
/// Counters use a windowed reset driven by an atomic compare-and-swap: the
/// first recorder past the window boundary claims the reset and zeroes the
/// counters, other threads observe the new window start and skip. A brief
/// window where readers see a new window timestamp with old counters is
/// acceptable for health scoring; values self-correct on the next record.
///
/// The latency EWMA survives window resets: it is a smoothed estimate, not
/// a windowed aggregate, and is seeded by the first successful sample.
pub struct ProviderStats {
    total_requests: AtomicU64,
    error_count: AtomicU64,
    /// EWMA latency in microseconds; [`LATENCY_UNSEEDED`] until first sample.
    latency_ewma_us: AtomicU64,
    /// Nanoseconds since `epoch` when the current window started.
    window_start_nanos: AtomicU64,
    epoch: Instant,
    window_duration_nanos: u64,
}

impl ProviderStats {
    /// Creates a stats block with the given counter window in seconds.
    #[must_use]
    pub fn new(window_seconds: u64) -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            error_count: AtomicU64::new(0),
            latency_ewma_us: AtomicU64::new(LATENCY_UNSEEDED),
            window_start_nanos: AtomicU64::new(0),
            epoch: Instant::now(),
            window_duration_nanos: window_seconds.saturating_mul(1_000_000_000),
        }
    }

    /// Nanoseconds elapsed since the epoch.
    ///
    /// The u128 to u64 truncation only overflows after ~584 years of uptime.
    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    fn now_nanos(&self) -> u64 {
        self.epoch.elapsed().as_nanos() as u64
    }

    /// Records a successful request and folds its latency into the EWMA.
    pub fn record_success(&self, latency_ms: u64) {
        self.maybe_reset_window();
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.observe_latency(latency_ms);
    }

    /// Records a failed request.
    pub fn record_failure(&self) {
        self.maybe_reset_window();
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.error_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Folds a latency sample into the EWMA without touching the counters.
    ///
    /// Uses a CAS loop so concurrent samples are never lost, only reordered.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    pub fn observe_latency(&self, latency_ms: u64) {
        let sample_us = latency_ms.saturating_mul(1_000);
        let mut current = self.latency_ewma_us.load(Ordering::Relaxed);
        loop {
            let next = if current == LATENCY_UNSEEDED {
                sample_us
            } else {
                (EWMA_ALPHA * sample_us as f64 + (1.0 - EWMA_ALPHA) * current as f64) as u64
            };
            match self.latency_ewma_us.compare_exchange_weak(
                current,
                next,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }
    }

    /// Returns the smoothed latency in milliseconds, or `None` before the
    /// first successful sample.
    #[must_use]
    pub fn latency_ms(&self) -> Option<u64> {
        let us = self.latency_ewma_us.load(Ordering::Relaxed);
        if us == LATENCY_UNSEEDED {
            None
        } else {
            Some(us / 1_000)
        }
    }

    /// Returns the error rate (errors / total) within the current window.
    /// Zero when no requests have been recorded.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn error_rate(&self) -> f64 {
        let total = self.total_requests.load(Ordering::Relaxed);
        if total == 0 {
            return 0.0;
        }
        let errors = self.error_count.load(Ordering::Relaxed);
        errors as f64 / total as f64
    }

    /// Returns the total requests recorded in the current window.
    #[must_use]
    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    /// Resets the windowed counters when the window duration has elapsed.
    ///
    /// The CAS claims the reset exactly once; losers observe the updated
    /// window start and skip. The EWMA is deliberately not reset.
    fn maybe_reset_window(&self) {
        if self.window_duration_nanos == 0 {
            return;
        }
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
            self.total_requests.store(0, Ordering::Relaxed);
            self.error_count.store(0, Ordering::Relaxed);
        }
    }
}
