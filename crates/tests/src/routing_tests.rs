//! Health-first selection behavior observed through the router facade.

use crate::mock_infrastructure::{
    build_router, force_unhealthy, seed_latency, spec, MockAdapter,
};
use manifold_core::{types::ProviderFeatures, RouterState};
use serde_json::json;

fn served_by(value: &serde_json::Value) -> &str {
    value["served_by"].as_str().expect("mock response tags its provider")
}

#[tokio::test]
async fn test_selects_healthy_provider_over_faster_unhealthy_one() {
    let a = MockAdapter::new("a");
    let b = MockAdapter::new("b");
    let router = build_router(vec![
        (spec("a", 10, ProviderFeatures::default()), a.clone()),
        (spec("b", 10, ProviderFeatures::default()), b.clone()),
    ]);

    // A is faster but unhealthy; B is healthy at 20ms.
    seed_latency(&router, "a", 50);
    force_unhealthy(&router, "a");
    seed_latency(&router, "b", 20);

    let value = router.call("getSlot", None, None).await.unwrap();
    assert_eq!(served_by(&value), "b");
    assert_eq!(a.invoke_calls(), 0);
    assert_eq!(b.invoke_calls(), 1);
}

#[tokio::test]
async fn test_lower_priority_wins_among_healthy() {
    let vip = MockAdapter::new("vip");
    let bulk = MockAdapter::new("bulk");
    let router = build_router(vec![
        (spec("bulk", 50, ProviderFeatures::default()), bulk.clone()),
        (spec("vip", 5, ProviderFeatures::default()), vip.clone()),
    ]);
    seed_latency(&router, "bulk", 10);
    seed_latency(&router, "vip", 100);

    let value = router.call("getSlot", None, None).await.unwrap();
    assert_eq!(served_by(&value), "vip");
}

#[tokio::test]
async fn test_latency_orders_equal_priority() {
    let fast = MockAdapter::new("fast");
    let slow = MockAdapter::new("slow");
    let router = build_router(vec![
        (spec("slow", 10, ProviderFeatures::default()), slow.clone()),
        (spec("fast", 10, ProviderFeatures::default()), fast.clone()),
    ]);
    seed_latency(&router, "slow", 400);
    seed_latency(&router, "fast", 15);

    let value = router.call("getSlot", None, None).await.unwrap();
    assert_eq!(served_by(&value), "fast");
}

#[tokio::test]
async fn test_health_snapshot_counts_agree() {
    let router = build_router(vec![
        (spec("a", 10, ProviderFeatures::default()), MockAdapter::new("a")),
        (spec("b", 10, ProviderFeatures::default()), MockAdapter::new("b")),
        (spec("c", 10, ProviderFeatures::default()), MockAdapter::new("c")),
    ]);
    force_unhealthy(&router, "b");

    let health = router.health();
    assert_eq!(health.total_providers, 3);
    assert_eq!(health.healthy_providers, 2);
    assert!(health.healthy);
    assert_eq!(
        health.healthy_providers,
        health.providers.values().filter(|p| p.healthy).count()
    );
    assert!(!health.providers["b"].healthy);
    assert!(health.providers["a"].enabled);
}

#[tokio::test]
async fn test_total_providers_matches_config_immediately() {
    let names = ["p1", "p2", "p3", "p4"];
    let providers = names
        .iter()
        .map(|name| {
            let adapter: std::sync::Arc<dyn manifold_core::provider::ProviderAdapter> =
                MockAdapter::new(name);
            (spec(name, 10, ProviderFeatures::default()), adapter)
        })
        .collect();
    let router = build_router(providers);

    // No probes have run; the count reflects configuration alone.
    assert_eq!(router.health().total_providers, names.len());
}

#[tokio::test]
async fn test_degraded_fallback_still_serves_calls() {
    let a = MockAdapter::new("a");
    let b = MockAdapter::new("b");
    let router = build_router(vec![
        (spec("a", 10, ProviderFeatures::default()), a.clone()),
        (spec("b", 20, ProviderFeatures::default()), b.clone()),
    ]);
    force_unhealthy(&router, "a");
    force_unhealthy(&router, "b");
    assert_eq!(router.state(), RouterState::Degraded);
    assert!(!router.health().healthy);

    // Fail open: unhealthy candidates are still attempted, in order.
    let value = router.call("getSlot", None, None).await.unwrap();
    assert_eq!(served_by(&value), "a");

    seed_latency(&router, "b", 10);
    assert_eq!(router.state(), RouterState::Ready);
}

#[tokio::test]
async fn test_disabled_provider_not_selected() {
    let on = MockAdapter::new("on");
    let off = MockAdapter::new("off");
    let router = build_router(vec![
        (spec("off", 1, ProviderFeatures::default()), off.clone()),
        (spec("on", 99, ProviderFeatures::default()), on.clone()),
    ]);
    router.registry().get("off").unwrap().set_enabled(false);

    for _ in 0..3 {
        let value = router.call("getSlot", Some(json!([1])), None).await.unwrap();
        assert_eq!(served_by(&value), "on");
    }
    assert_eq!(off.invoke_calls(), 0);
}
