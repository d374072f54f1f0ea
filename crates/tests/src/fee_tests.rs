//! Priority-fee estimation: capability filtering, single-source reads, and
//! failover to the next candidate.

use crate::mock_infrastructure::{build_router, seed_latency, spec, MockAdapter};
use manifold_core::{
    provider::RouterError,
    types::{Feature, ProviderFeatures, Urgency},
};

fn fee_features() -> ProviderFeatures {
    ProviderFeatures { fee_estimate: true, ..Default::default() }
}

#[tokio::test]
async fn test_no_fee_capable_provider_fails_before_network() {
    let a = MockAdapter::new("a");
    let b = MockAdapter::new("b");
    let router = build_router(vec![
        (spec("a", 10, ProviderFeatures::default()), a.clone()),
        (spec("b", 20, ProviderFeatures::default()), b.clone()),
    ]);

    let err = router.estimate_priority_fee(Urgency::High, None).await.unwrap_err();
    assert!(matches!(err, RouterError::NoCapableProvider(Feature::FeeEstimate)));
    assert_eq!(a.fee_calls(), 0);
    assert_eq!(b.fee_calls(), 0);
}

#[tokio::test]
async fn test_disabled_fee_provider_does_not_count_as_capable() {
    let only = MockAdapter::with_features("only", fee_features());
    let router = build_router(vec![(spec("only", 10, fee_features()), only.clone())]);
    router.registry().get("only").unwrap().set_enabled(false);

    let err = router.estimate_priority_fee(Urgency::Normal, None).await.unwrap_err();
    assert!(matches!(err, RouterError::NoCapableProvider(Feature::FeeEstimate)));
    assert_eq!(only.fee_calls(), 0);
}

#[tokio::test]
async fn test_single_source_read_queries_top_ranked_only() {
    let best = MockAdapter::with_features("best", fee_features());
    let backup = MockAdapter::with_features("backup", fee_features());
    let router = build_router(vec![
        (spec("best", 10, fee_features()), best.clone()),
        (spec("backup", 20, fee_features()), backup.clone()),
    ]);
    seed_latency(&router, "best", 10);
    seed_latency(&router, "backup", 10);
    best.queue_fee(Ok(2_500.0));

    let estimate = router.estimate_priority_fee(Urgency::Mev, None).await.unwrap();
    assert_eq!(estimate.provider.as_ref(), "best");
    assert!((estimate.value - 2_500.0).abs() < f64::EPSILON);
    assert!((estimate.confidence - 0.9).abs() < f64::EPSILON);
    assert_eq!(estimate.unit, "micro-lamports");

    // No aggregation: the runner-up was never consulted.
    assert_eq!(backup.fee_calls(), 0);
}

#[tokio::test]
async fn test_fee_failover_when_top_candidate_errors() {
    let best = MockAdapter::with_features("best", fee_features());
    let backup = MockAdapter::with_features("backup", fee_features());
    let router = build_router(vec![
        (spec("best", 10, fee_features()), best.clone()),
        (spec("backup", 20, fee_features()), backup.clone()),
    ]);
    best.queue_fee(Err(RouterError::Timeout));

    let estimate = router.estimate_priority_fee(Urgency::High, None).await.unwrap();
    assert_eq!(estimate.provider.as_ref(), "backup");
    assert_eq!(best.fee_calls(), 1);
    assert_eq!(backup.fee_calls(), 1);
}

#[tokio::test]
async fn test_fee_exhaustion_when_all_capable_fail() {
    let a = MockAdapter::with_features("a", fee_features());
    let b = MockAdapter::with_features("b", fee_features());
    let router = build_router(vec![
        (spec("a", 10, fee_features()), a.clone()),
        (spec("b", 20, fee_features()), b.clone()),
    ]);
    a.queue_fee(Err(RouterError::Timeout));
    b.queue_fee(Err(RouterError::Connection("refused".to_string())));

    let err = router.estimate_priority_fee(Urgency::Normal, None).await.unwrap_err();
    assert!(matches!(err, RouterError::AllProvidersExhausted { attempts: 2 }));
}
