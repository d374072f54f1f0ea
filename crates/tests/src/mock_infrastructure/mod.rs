//! Reusable mock types and router fixtures for integration tests.

pub mod mock_adapter;

pub use mock_adapter::MockAdapter;

use manifold_core::{
    config::{AppConfig, ProviderSpec, RoutingConfig},
    provider::ProviderAdapter,
    router::Router,
    types::ProviderFeatures,
};
use std::sync::Arc;

/// Provider spec with mock-friendly defaults: very short breaker timeout,
/// short per-attempt timeout, sequential priorities left to the caller.
pub fn spec(name: &str, priority: u32, features: ProviderFeatures) -> ProviderSpec {
    ProviderSpec {
        name: name.to_string(),
        endpoint: format!("http://{name}.mock.invalid"),
        enabled: true,
        priority,
        features,
        timeout_ms: 500,
        circuit_breaker_threshold: None,
        circuit_breaker_timeout_ms: None,
        health_method: None,
        bundle_method: None,
        fee_method: None,
    }
}

/// Routing config tuned for tests: tight intervals so nothing sleeps long.
pub fn routing() -> RoutingConfig {
    RoutingConfig {
        health_check_interval_ms: 20,
        health_check_timeout_ms: 100,
        max_error_rate: 0.5,
        max_latency_ms: 5_000,
        circuit_breaker_threshold: 5,
        circuit_breaker_timeout_ms: 100,
        bundle_success_rate_threshold: 0.8,
        ..Default::default()
    }
}

/// Builds a router over the given (spec, adapter) pairs with the health
/// monitor disabled; tests drive probes and health recomputes explicitly.
pub fn build_router(providers: Vec<(ProviderSpec, Arc<dyn ProviderAdapter>)>) -> Router {
    build_router_with(providers, routing(), false)
}

/// Builds a router with the background health monitor running.
pub fn build_monitored_router(
    providers: Vec<(ProviderSpec, Arc<dyn ProviderAdapter>)>,
) -> Router {
    build_router_with(providers, routing(), true)
}

/// Installs the test tracing subscriber once; set `RUST_LOG` to see router
/// logs while debugging a test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Builds a router with explicit routing config and monitor choice.
pub fn build_router_with(
    providers: Vec<(ProviderSpec, Arc<dyn ProviderAdapter>)>,
    routing: RoutingConfig,
    health_monitor: bool,
) -> Router {
    init_tracing();
    let config = AppConfig {
        providers: providers.iter().map(|(spec, _)| spec.clone()).collect(),
        routing,
        ..Default::default()
    };

    let mut builder = Router::builder().config(config);
    for (spec, adapter) in providers {
        builder = builder.adapter(spec.name, adapter);
    }
    if !health_monitor {
        builder = builder.without_health_monitor();
    }
    builder.build().expect("test router should build")
}

/// Marks a provider unhealthy by recording failures and recomputing with a
/// tight error bound.
pub fn force_unhealthy(router: &Router, name: &str) {
    let entry = router.registry().get(name).expect("provider exists");
    entry.stats().record_failure();
    entry.stats().record_failure();
    entry.recompute_health(0.1, u64::MAX);
    assert!(!entry.is_healthy());
}

/// Seeds a provider's smoothed latency and marks it healthy.
pub fn seed_latency(router: &Router, name: &str, latency_ms: u64) {
    let entry = router.registry().get(name).expect("provider exists");
    entry.stats().record_success(latency_ms);
    entry.recompute_health(1.0, u64::MAX);
    assert!(entry.is_healthy());
}
