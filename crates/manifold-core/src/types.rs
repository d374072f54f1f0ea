//! Core type definitions for provider capabilities, routing requests, and
//! health snapshots.
//!
//! # Type Categories
//!
//! ## Capability Types
//! - [`Feature`], [`ProviderFeatures`]: what an upstream backend can do
//! - [`Urgency`]: submission urgency class used by feature-specific paths
//!
//! ## Request/Result Types
//! - [`BundleRequest`], [`BundleResult`]: atomic transaction group submission
//! - [`FeeEstimate`]: single-source priority fee read
//!
//! ## Configuration and Monitoring Types
//! - [`ProviderConfig`]: runtime provider configuration (built from the
//!   validated serde layer in [`crate::config`])
//! - [`ProviderSnapshot`], [`HealthSnapshot`]: point-in-time health views
//!
//! Provider names use `Arc<str>` so they can be cloned onto results, metrics
//! labels, and log events without per-request `String` allocations.

use crate::provider::circuit_breaker::CircuitState;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc};

/// Optional capabilities an upstream provider may support.
///
/// Capability filtering happens before any network attempt: a request that
/// needs a feature only considers providers whose flags declare it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    /// Atomic bundle submission (`submit_bundle`).
    BundleSubmission,
    /// Priority-fee estimation (`estimate_fee`).
    FeeEstimate,
    /// Low-latency shred streaming; preferred for MEV-urgent bundles.
    Shredstream,
}

impl Feature {
    /// All features, in a stable order (used for availability reporting).
    pub const ALL: [Feature; 3] =
        [Feature::BundleSubmission, Feature::FeeEstimate, Feature::Shredstream];

    /// Returns a static string representation for metrics labels.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BundleSubmission => "bundle_submission",
            Self::FeeEstimate => "fee_estimate",
            Self::Shredstream => "shredstream",
        }
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The capability set advertised by a provider adapter.
///
/// Raw call support is universal and therefore not a flag; only the optional
/// features are represented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderFeatures {
    /// Supports atomic bundle submission.
    #[serde(default)]
    pub bundle: bool,
    /// Supports priority-fee estimation.
    #[serde(default)]
    pub fee_estimate: bool,
    /// Supports shred streaming (implies nothing about bundle support).
    #[serde(default)]
    pub shredstream: bool,
}

impl ProviderFeatures {
    /// Returns whether the given feature is supported.
    #[must_use]
    pub fn supports(&self, feature: Feature) -> bool {
        match feature {
            Feature::BundleSubmission => self.bundle,
            Feature::FeeEstimate => self.fee_estimate,
            Feature::Shredstream => self.shredstream,
        }
    }
}

/// Urgency class attached to bundle submissions and fee queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    /// No special ordering requirements.
    #[default]
    Normal,
    /// Latency-sensitive but not ordering-sensitive.
    High,
    /// Ordering-sensitive; shredstream-capable providers are preferred.
    Mev,
}

impl Urgency {
    /// Returns a static string representation for metrics labels.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::High => "high",
            Self::Mev => "mev",
        }
    }
}

/// An atomic group of opaque transaction payloads submitted together.
///
/// The router never inspects payload bytes; encoding for the wire is the
/// submitting adapter's concern.
#[derive(Debug, Clone)]
pub struct BundleRequest {
    /// Opaque serialized transactions, in submission order.
    pub transactions: Vec<Bytes>,
    /// Urgency class driving candidate ordering.
    pub urgency: Urgency,
}

impl BundleRequest {
    /// Creates a bundle request from opaque payloads.
    #[must_use]
    pub fn new(transactions: Vec<Bytes>, urgency: Urgency) -> Self {
        Self { transactions, urgency }
    }
}

/// Outcome of a successful bundle submission.
#[derive(Debug, Clone, Serialize)]
pub struct BundleResult {
    /// Identifier assigned by the accepting backend.
    pub bundle_id: String,
    /// Name of the provider that accepted the bundle.
    pub provider: Arc<str>,
    /// Whether the backend accepted the bundle.
    pub accepted: bool,
    /// Wall-clock submission latency in milliseconds.
    pub latency_ms: u64,
}

/// A single-source priority-fee estimate.
#[derive(Debug, Clone, Serialize)]
pub struct FeeEstimate {
    /// Estimated fee value.
    pub value: f64,
    /// Unit the value is denominated in (adapter-supplied).
    pub unit: String,
    /// Adapter-supplied confidence score in `[0, 1]`.
    pub confidence: f64,
    /// Name of the provider that produced the estimate.
    pub provider: Arc<str>,
}

/// Runtime configuration for a single upstream provider.
///
/// Built once from the validated serde layer ([`crate::config::ProviderSpec`])
/// during router construction; the provider set is immutable for the
/// router's lifetime.
///
/// # Example
///
/// ```
/// use manifold_core::types::{ProviderConfig, ProviderFeatures};
/// use std::sync::Arc;
///
/// let config = ProviderConfig {
///     name: Arc::from("helios-main"),
///     endpoint: "https://rpc.helios.example".to_string(),
///     enabled: true,
///     priority: 10,
///     features: ProviderFeatures { bundle: true, fee_estimate: true, shredstream: false },
///     timeout_ms: 5_000,
///     circuit_breaker_threshold: 5,
///     circuit_breaker_timeout_ms: 30_000,
/// };
/// assert!(config.features.bundle);
/// ```
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Unique identifier used in metrics, logs, and results.
    pub name: Arc<str>,
    /// Backend endpoint URL.
    pub endpoint: String,
    /// Operator toggle; disabled providers are never selected but keep
    /// being probed so recovery is observable.
    pub enabled: bool,
    /// Selection tie-break; lower is preferred.
    pub priority: u32,
    /// Advertised capability set.
    pub features: ProviderFeatures,
    /// Per-attempt request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Consecutive failures before the circuit opens.
    pub circuit_breaker_threshold: u32,
    /// Milliseconds to wait in Open before admitting a probe.
    pub circuit_breaker_timeout_ms: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: Arc::from(""),
            endpoint: String::new(),
            enabled: true,
            priority: 100,
            features: ProviderFeatures::default(),
            timeout_ms: 5_000,
            circuit_breaker_threshold: 5,
            circuit_breaker_timeout_ms: 30_000,
        }
    }
}

/// Point-in-time view of a single provider's health state.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderSnapshot {
    /// Derived health flag (see `HealthMonitor` recompute rule).
    pub healthy: bool,
    /// Operator toggle state.
    pub enabled: bool,
    /// Selection priority (lower preferred).
    pub priority: u32,
    /// Smoothed latency estimate in milliseconds; `None` until the first
    /// successful probe or request seeds it.
    pub latency_ms: Option<u64>,
    /// Rolling error rate in `[0, 1]` over the current window.
    pub error_rate: f64,
    /// Current circuit breaker state.
    pub circuit_state: CircuitState,
}

/// Point-in-time view of the whole router's health.
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    /// True when at least one provider is healthy.
    pub healthy: bool,
    /// Total number of registered providers.
    pub total_providers: usize,
    /// Number of providers currently passing the health recompute.
    pub healthy_providers: usize,
    /// Per-provider detail keyed by provider name.
    pub providers: HashMap<String, ProviderSnapshot>,
}
