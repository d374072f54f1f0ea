use crate::{
    metrics::MetricsRegistry,
    provider::{
        entry::ProviderEntry, errors::RouterError, policy::RoutingPolicy,
        registry::ProviderRegistry,
    },
    types::{BundleRequest, BundleResult, Feature, Urgency},
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Failover path for atomic bundle submission.
///
/// Candidates are bundle-capable providers, filtered and ordered like any
/// other request; for MEV-urgent bundles, shredstream-capable providers are
/// moved to the front (stable within each group, so the policy's ordering
/// still decides ties).
///
/// Every submission outcome feeds the bundle-specific windowed success rate
/// in [`MetricsRegistry`]; crossing the configured threshold raises an
/// observability signal, never an automatic remediation.
pub(crate) struct BundleSubmitter {
    registry: Arc<ProviderRegistry>,
    policy: Arc<dyn RoutingPolicy>,
    metrics: Arc<MetricsRegistry>,
}

impl BundleSubmitter {
    pub(crate) fn new(
        registry: Arc<ProviderRegistry>,
        policy: Arc<dyn RoutingPolicy>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self { registry, policy, metrics }
    }

    /// Orders bundle-capable candidates for the given urgency.
    fn candidates(&self, urgency: Urgency) -> Vec<Arc<ProviderEntry>> {
        let mut ordered = super::ordered_candidates(
            &self.registry,
            &*self.policy,
            Some(Feature::BundleSubmission),
        );

        if urgency == Urgency::Mev {
            // Stable partition: shredstream-capable first, policy order
            // preserved within each group.
            let (preferred, rest): (Vec<_>, Vec<_>) = ordered
                .into_iter()
                .partition(|entry| entry.config().features.shredstream);
            ordered = preferred.into_iter().chain(rest).collect();
        }

        ordered
    }

    /// Attempts submission against the ordered candidate list.
    pub(crate) async fn submit(
        &self,
        request: BundleRequest,
    ) -> Result<BundleResult, RouterError> {
        let candidates = self.candidates(request.urgency);
        if candidates.is_empty() {
            return Err(RouterError::NoCapableProvider(Feature::BundleSubmission));
        }

        let mut attempts = 0usize;
        for entry in candidates {
            match entry.submit_bundle(&request).await {
                Ok(result) => {
                    debug!(
                        provider = %result.provider,
                        bundle_id = %result.bundle_id,
                        latency_ms = result.latency_ms,
                        urgency = request.urgency.as_str(),
                        "bundle accepted"
                    );
                    self.metrics.record_bundle(true);
                    return Ok(result);
                }
                Err(RouterError::CircuitOpen) => {
                    debug!(provider = %entry.name(), "skipping provider with open circuit");
                }
                Err(error) if error.is_retryable() => {
                    attempts += 1;
                    warn!(
                        provider = %entry.name(),
                        error = %error,
                        "bundle submission failed, trying next candidate"
                    );
                }
                Err(error) => {
                    warn!(provider = %entry.name(), error = %error, "bundle rejected");
                    self.metrics.record_bundle(false);
                    return Err(error);
                }
            }
        }

        self.metrics.record_bundle(false);
        Err(RouterError::AllProvidersExhausted { attempts })
    }
}
