//! Pluggable provider selection policies.
//!
//! A policy is a pure ordering function: it receives point-in-time candidate
//! snapshots (already filtered for eligibility by the registry) and returns
//! an ordered preference list. Policies never mutate provider state and
//! never block; snapshots may be slightly stale, bounded by the health-check
//! interval.

use crate::provider::entry::ProviderEntry;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

/// Point-in-time view of one eligible candidate, captured once per routing
/// decision so sort keys stay consistent while ordering.
#[derive(Clone)]
pub struct Candidate {
    /// The underlying registry entry.
    pub entry: Arc<ProviderEntry>,
    /// Health flag at observation time.
    pub healthy: bool,
    /// Configured priority (lower preferred).
    pub priority: u32,
    /// Smoothed latency at observation time; unseeded sorts last.
    pub latency_ms: u64,
    /// Provider name, the deterministic final tie-break.
    pub name: Arc<str>,
}

impl Candidate {
    /// Snapshots the fields relevant to ordering from an entry.
    #[must_use]
    pub fn observe(entry: Arc<ProviderEntry>) -> Self {
        let healthy = entry.is_healthy();
        let priority = entry.config().priority;
        let latency_ms = entry.stats().latency_ms().unwrap_or(u64::MAX);
        let name = Arc::clone(entry.name());
        Self { entry, healthy, priority, latency_ms, name }
    }

    fn sort_key(&self) -> (u32, u64, Arc<str>) {
        (self.priority, self.latency_ms, Arc::clone(&self.name))
    }
}

/// Ordering strategy over eligible candidates.
pub trait RoutingPolicy: Send + Sync {
    /// Policy identifier for logs and metrics.
    fn name(&self) -> &'static str;

    /// Returns candidates as an ordered preference list.
    fn order(&self, candidates: Vec<Candidate>) -> Vec<Arc<ProviderEntry>>;
}

/// Default policy: prefer healthy providers, then lowest priority, then
/// lowest smoothed latency, with provider name as the deterministic
/// tie-break.
///
/// When no candidate is healthy the full eligible set is used instead of
/// failing outright. This fail-open branch is deliberate: health is derived
/// from probes and can lag recovery by up to one health-check interval, and
/// a lagging flag should degrade service rather than cut it.
pub struct HealthFirstPolicy;

impl RoutingPolicy for HealthFirstPolicy {
    fn name(&self) -> &'static str {
        "health_first"
    }

    fn order(&self, candidates: Vec<Candidate>) -> Vec<Arc<ProviderEntry>> {
        let (mut healthy, mut fallback): (Vec<_>, Vec<_>) =
            candidates.into_iter().partition(|candidate| candidate.healthy);

        healthy.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        fallback.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

        if healthy.is_empty() && !fallback.is_empty() {
            tracing::warn!(
                candidates = fallback.len(),
                "no healthy provider available, degrading to full eligible set"
            );
        }

        healthy.into_iter().chain(fallback).map(|candidate| candidate.entry).collect()
    }
}

/// Rotates evenly across eligible candidates, ignoring health preference
/// beyond eligibility.
///
/// The rotation base is the name-sorted candidate list so the cycle is
/// stable across calls even though candidate snapshots arrive unordered.
pub struct RoundRobinPolicy {
    cursor: AtomicUsize,
}

impl RoundRobinPolicy {
    /// Creates a round-robin policy starting at the first candidate.
    #[must_use]
    pub fn new() -> Self {
        Self { cursor: AtomicUsize::new(0) }
    }
}

impl Default for RoundRobinPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl RoutingPolicy for RoundRobinPolicy {
    fn name(&self) -> &'static str {
        "round_robin"
    }

    fn order(&self, mut candidates: Vec<Candidate>) -> Vec<Arc<ProviderEntry>> {
        if candidates.is_empty() {
            return Vec::new();
        }
        candidates.sort_by(|a, b| a.name.cmp(&b.name));

        let start = self.cursor.fetch_add(1, Ordering::Relaxed) % candidates.len();
        let mut ordered = Vec::with_capacity(candidates.len());
        for offset in 0..candidates.len() {
            let index = (start + offset) % candidates.len();
            ordered.push(Arc::clone(&candidates[index].entry));
        }
        ordered
    }
}
