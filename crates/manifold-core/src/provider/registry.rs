use crate::{
    provider::entry::ProviderEntry,
    types::{Feature, HealthSnapshot, ProviderSnapshot},
};
use ahash::AHashMap;
use std::{collections::HashMap, sync::Arc};

/// Immutable registry of provider entries.
///
/// Built once during router construction from validated configuration.
/// Membership never changes at runtime; only the per-entry mutable fields
/// (health, circuit, stats, operator toggle) are written, and never through
/// the registry itself.
pub struct ProviderRegistry {
    entries: Vec<Arc<ProviderEntry>>,
    by_name: AHashMap<Arc<str>, usize>,
}

impl ProviderRegistry {
    /// Builds a registry from constructed entries.
    ///
    /// Name uniqueness is enforced upstream by config validation; a
    /// duplicate here is a programming error.
    #[must_use]
    pub fn new(entries: Vec<Arc<ProviderEntry>>) -> Self {
        let mut by_name = AHashMap::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            let previous = by_name.insert(Arc::clone(entry.name()), index);
            debug_assert!(previous.is_none(), "duplicate provider name {}", entry.name());
        }
        Self { entries, by_name }
    }

    /// Number of registered providers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no providers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in configuration order.
    #[must_use]
    pub fn entries(&self) -> &[Arc<ProviderEntry>] {
        &self.entries
    }

    /// Looks up an entry by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<ProviderEntry>> {
        self.by_name.get(name).map(|&index| &self.entries[index])
    }

    /// Selectable candidates for a request: enabled, circuit not Open, and
    /// supporting `feature` when one is required.
    ///
    /// Health does not filter here; preferring healthy candidates is the
    /// routing policy's job, so degraded operation stays possible when
    /// nothing is healthy.
    #[must_use]
    pub fn candidates(&self, feature: Option<Feature>) -> Vec<Arc<ProviderEntry>> {
        self.entries
            .iter()
            .filter(|entry| entry.is_eligible())
            .filter(|entry| feature.is_none_or(|f| entry.config().features.supports(f)))
            .cloned()
            .collect()
    }

    /// Number of providers currently passing the health recompute.
    #[must_use]
    pub fn healthy_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.is_healthy()).count()
    }

    /// Per-feature count of available (enabled AND healthy) providers.
    ///
    /// Callers use this to decide whether a feature-dependent path is viable
    /// before attempting it.
    #[must_use]
    pub fn feature_availability(&self) -> HashMap<Feature, usize> {
        let mut availability = HashMap::with_capacity(Feature::ALL.len());
        for feature in Feature::ALL {
            let count = self
                .entries
                .iter()
                .filter(|entry| {
                    entry.is_enabled()
                        && entry.is_healthy()
                        && entry.config().features.supports(feature)
                })
                .count();
            availability.insert(feature, count);
        }
        availability
    }

    /// Point-in-time health view over the whole registry.
    #[must_use]
    pub fn health_snapshot(&self) -> HealthSnapshot {
        let providers: HashMap<String, ProviderSnapshot> = self
            .entries
            .iter()
            .map(|entry| (entry.name().to_string(), entry.snapshot()))
            .collect();
        let healthy_providers = providers.values().filter(|snapshot| snapshot.healthy).count();

        HealthSnapshot {
            healthy: healthy_providers > 0,
            total_providers: self.entries.len(),
            healthy_providers,
            providers,
        }
    }
}
