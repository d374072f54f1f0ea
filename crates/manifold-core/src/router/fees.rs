use crate::{
    provider::{errors::RouterError, policy::RoutingPolicy, registry::ProviderRegistry},
    types::{Feature, FeeEstimate, Urgency},
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Single-source priority-fee read with failover.
///
/// Queries the top-ranked fee-capable candidate and falls over to the next
/// when it errors or times out. Estimates from different providers are never
/// aggregated; the returned value is annotated with the provider it came
/// from and that adapter's confidence score.
pub(crate) struct FeeEstimator {
    registry: Arc<ProviderRegistry>,
    policy: Arc<dyn RoutingPolicy>,
}

impl FeeEstimator {
    pub(crate) fn new(registry: Arc<ProviderRegistry>, policy: Arc<dyn RoutingPolicy>) -> Self {
        Self { registry, policy }
    }

    pub(crate) async fn estimate(&self, urgency: Urgency) -> Result<FeeEstimate, RouterError> {
        let candidates =
            super::ordered_candidates(&self.registry, &*self.policy, Some(Feature::FeeEstimate));
        if candidates.is_empty() {
            return Err(RouterError::NoCapableProvider(Feature::FeeEstimate));
        }

        let mut attempts = 0usize;
        for entry in candidates {
            match entry.estimate_fee(urgency).await {
                Ok(estimate) => {
                    debug!(
                        provider = %estimate.provider,
                        value = estimate.value,
                        confidence = estimate.confidence,
                        urgency = urgency.as_str(),
                        "fee estimate served"
                    );
                    return Ok(estimate);
                }
                Err(RouterError::CircuitOpen) => {
                    debug!(provider = %entry.name(), "skipping provider with open circuit");
                }
                Err(error) if error.is_retryable() => {
                    attempts += 1;
                    warn!(
                        provider = %entry.name(),
                        error = %error,
                        "fee estimate failed, trying next candidate"
                    );
                }
                Err(error) => {
                    warn!(provider = %entry.name(), error = %error, "fee estimate rejected");
                    return Err(error);
                }
            }
        }

        Err(RouterError::AllProvidersExhausted { attempts })
    }
}
