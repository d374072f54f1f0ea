use crate::{
    provider::errors::RouterError,
    types::{BundleRequest, Feature, FeeEstimate, ProviderFeatures, Urgency},
};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// Uniform interface over one upstream RPC backend.
///
/// Adapters are stateless wrappers: health, circuit, and latency state live
/// in the [`ProviderEntry`](crate::provider::entry::ProviderEntry) that owns
/// the adapter. An adapter advertises its optional capabilities through
/// [`ProviderAdapter::features`]; the optional operations have default
/// implementations that fail with a capability error and are overridden only
/// by adapters whose flags declare support.
///
/// Every operation takes an explicit timeout. Adapters should make a best
/// effort to bound their own work, but the owning entry enforces the timeout
/// regardless, so exceeding it always surfaces as [`RouterError::Timeout`]
/// attributed to this provider.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Backend identifier; must match the registry entry's configured name.
    fn name(&self) -> &str;

    /// The capability set this backend supports.
    fn features(&self) -> ProviderFeatures;

    /// Generic passthrough call. Supported by every adapter.
    async fn invoke(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> Result<Value, RouterError>;

    /// Lightweight liveness probe; returns the observed round-trip latency
    /// in milliseconds.
    async fn probe(&self, timeout: Duration) -> Result<u64, RouterError>;

    /// Submits an atomic transaction bundle, returning the backend-assigned
    /// bundle id. Only meaningful when `features().bundle` is set.
    async fn submit_bundle(
        &self,
        request: &BundleRequest,
        timeout: Duration,
    ) -> Result<String, RouterError> {
        let _ = (request, timeout);
        Err(RouterError::NoCapableProvider(Feature::BundleSubmission))
    }

    /// Returns a priority-fee estimate for the given urgency. Only
    /// meaningful when `features().fee_estimate` is set.
    async fn estimate_fee(
        &self,
        urgency: Urgency,
        timeout: Duration,
    ) -> Result<FeeEstimate, RouterError> {
        let _ = (urgency, timeout);
        Err(RouterError::NoCapableProvider(Feature::FeeEstimate))
    }
}
