//! Metrics invariants across operation sequences: monotonic counters, rate
//! bounds, and per-feature availability.

use crate::mock_infrastructure::{build_router, spec, MockAdapter};
use manifold_core::types::{BundleRequest, Feature, ProviderFeatures, Urgency};
use bytes::Bytes;

fn full_features() -> ProviderFeatures {
    ProviderFeatures { bundle: true, fee_estimate: true, shredstream: true }
}

#[tokio::test]
async fn test_counters_monotonic_and_rates_bounded_across_mixed_ops() {
    let adapter = MockAdapter::with_features("p", full_features());
    let router = build_router(vec![(spec("p", 10, full_features()), adapter.clone())]);

    let mut last = router.metrics();
    for i in 0..12 {
        match i % 4 {
            0 => {
                let _ = router.call("getSlot", None, None).await;
            }
            1 => {
                // Scripted failure: still counts, still monotonic.
                adapter.queue_invoke_backend_errors(1);
                let _ = router.call("getSlot", None, None).await;
            }
            2 => {
                let _ = router
                    .submit_bundle(
                        BundleRequest::new(vec![Bytes::from_static(b"tx")], Urgency::Normal),
                        None,
                    )
                    .await;
            }
            _ => {
                let _ = router.estimate_priority_fee(Urgency::Normal, None).await;
            }
        }

        let current = router.metrics();
        assert!(current.requests_total >= last.requests_total);
        assert!(current.requests_succeeded >= last.requests_succeeded);
        assert!(current.bundles_total >= last.bundles_total);
        assert!(current.bundles_succeeded >= last.bundles_succeeded);
        assert!((0.0..=1.0).contains(&current.request_success_rate));
        assert!((0.0..=1.0).contains(&current.bundle_success_rate));
        if let Some(rate) = current.bundle_window_success_rate {
            assert!((0.0..=1.0).contains(&rate));
        }
        last = current;
    }

    // 12 ops: 6 calls + 3 fee estimates count as requests, 3 bundles apart.
    assert_eq!(last.requests_total, 9);
    assert_eq!(last.bundles_total, 3);
    assert_eq!(last.bundles_succeeded, 3);
}

#[tokio::test]
async fn test_feature_availability_tracks_enabled_and_healthy() {
    let full = MockAdapter::with_features("full", full_features());
    let fee_only = MockAdapter::with_features(
        "fee-only",
        ProviderFeatures { fee_estimate: true, ..Default::default() },
    );
    let plain = MockAdapter::new("plain");
    let router = build_router(vec![
        (spec("full", 10, full_features()), full),
        (
            spec(
                "fee-only",
                20,
                ProviderFeatures { fee_estimate: true, ..Default::default() },
            ),
            fee_only,
        ),
        (spec("plain", 30, ProviderFeatures::default()), plain),
    ]);

    let availability = router.metrics().feature_availability;
    assert_eq!(availability[&Feature::BundleSubmission], 1);
    assert_eq!(availability[&Feature::FeeEstimate], 2);
    assert_eq!(availability[&Feature::Shredstream], 1);

    // Disabling removes a provider from availability counts.
    let entry = router.registry().get("fee-only").unwrap();
    entry.set_enabled(false);
    entry.recompute_health(1.0, u64::MAX);

    let availability = router.metrics().feature_availability;
    assert_eq!(availability[&Feature::FeeEstimate], 1);
}

#[tokio::test]
async fn test_failed_requests_lower_rate_but_never_shrink_counters() {
    let adapter = MockAdapter::new("p");
    let router =
        build_router(vec![(spec("p", 10, ProviderFeatures::default()), adapter.clone())]);

    let _ = router.call("getSlot", None, None).await;
    adapter.queue_invoke_backend_errors(1);
    let _ = router.call("getSlot", None, None).await;

    let metrics = router.metrics();
    assert_eq!(metrics.requests_total, 2);
    assert_eq!(metrics.requests_succeeded, 1);
    assert!((metrics.request_success_rate - 0.5).abs() < f64::EPSILON);
}
