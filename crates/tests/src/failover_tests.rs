//! Sequential failover behavior: retry-to-next-candidate, attempt bounds,
//! deterministic failures, and top-level timeout cancellation.

use crate::mock_infrastructure::{build_router, seed_latency, spec, MockAdapter};
use manifold_core::{provider::RouterError, types::ProviderFeatures};
use std::time::Duration;

#[tokio::test]
async fn test_failover_to_next_candidate_on_backend_error() {
    let a = MockAdapter::new("a");
    let b = MockAdapter::new("b");
    let router = build_router(vec![
        (spec("a", 10, ProviderFeatures::default()), a.clone()),
        (spec("b", 20, ProviderFeatures::default()), b.clone()),
    ]);
    a.queue_invoke_backend_errors(1);

    let value = router.call("getSlot", None, None).await.unwrap();
    assert_eq!(value["served_by"], "b");
    assert_eq!(a.invoke_calls(), 1);
    assert_eq!(b.invoke_calls(), 1);

    let metrics = router.metrics();
    assert_eq!(metrics.requests_total, 1);
    assert_eq!(metrics.requests_succeeded, 1);
}

#[tokio::test]
async fn test_timeout_attempt_fails_over() {
    let slow = MockAdapter::new("slow");
    let backup = MockAdapter::new("backup");
    // Per-attempt timeout is 500ms in the fixture; the slow backend takes 700.
    slow.set_delay_ms(700);
    let router = build_router(vec![
        (spec("slow", 10, ProviderFeatures::default()), slow.clone()),
        (spec("backup", 20, ProviderFeatures::default()), backup.clone()),
    ]);

    let value = router.call("getSlot", None, None).await.unwrap();
    assert_eq!(value["served_by"], "backup");

    // The timed-out attempt penalized the slow provider's stats.
    let entry = router.registry().get("slow").unwrap();
    assert!(entry.stats().error_rate() > 0.0);
}

#[tokio::test]
async fn test_all_providers_exhausted_bounds_attempts() {
    let a = MockAdapter::new("a");
    let b = MockAdapter::new("b");
    let router = build_router(vec![
        (spec("a", 10, ProviderFeatures::default()), a.clone()),
        (spec("b", 20, ProviderFeatures::default()), b.clone()),
    ]);
    a.queue_invoke_backend_errors(1);
    b.queue_invoke_backend_errors(1);

    let err = router.call("getSlot", None, None).await.unwrap_err();
    match err {
        RouterError::AllProvidersExhausted { attempts } => assert_eq!(attempts, 2),
        other => panic!("expected exhaustion, got {other:?}"),
    }
    assert_eq!(a.invoke_calls(), 1);
    assert_eq!(b.invoke_calls(), 1);

    let metrics = router.metrics();
    assert_eq!(metrics.requests_total, 1);
    assert_eq!(metrics.requests_succeeded, 0);
}

#[tokio::test]
async fn test_client_error_is_not_retried_elsewhere() {
    let a = MockAdapter::new("a");
    let b = MockAdapter::new("b");
    let router = build_router(vec![
        (spec("a", 10, ProviderFeatures::default()), a.clone()),
        (spec("b", 20, ProviderFeatures::default()), b.clone()),
    ]);
    a.queue_invoke(Err(RouterError::Provider {
        code: -32602,
        message: "invalid params".to_string(),
    }));

    let err = router.call("getSlot", None, None).await.unwrap_err();
    assert!(matches!(err, RouterError::Provider { code: -32602, .. }));
    // The same malformed request would fail identically on B.
    assert_eq!(b.invoke_calls(), 0);
}

#[tokio::test]
async fn test_top_level_timeout_cancels_pending_retries() {
    let a = MockAdapter::new("a");
    let b = MockAdapter::new("b");
    a.set_delay_ms(200);
    let router = build_router(vec![
        (spec("a", 10, ProviderFeatures::default()), a.clone()),
        (spec("b", 20, ProviderFeatures::default()), b.clone()),
    ]);
    seed_latency(&router, "a", 10);
    seed_latency(&router, "b", 10);

    let err = router
        .call("getSlot", None, Some(Duration::from_millis(50)))
        .await
        .unwrap_err();
    assert!(matches!(err, RouterError::Timeout));

    // The in-flight attempt was cancelled; the retry never started.
    assert_eq!(a.invoke_calls(), 1);
    assert_eq!(b.invoke_calls(), 0);

    let metrics = router.metrics();
    assert_eq!(metrics.requests_total, 1);
    assert_eq!(metrics.requests_succeeded, 0);
}

#[tokio::test]
async fn test_attempts_are_sequential_not_parallel() {
    let a = MockAdapter::new("a");
    let b = MockAdapter::new("b");
    a.set_delay_ms(50);
    a.queue_invoke_backend_errors(1);
    let router = build_router(vec![
        (spec("a", 10, ProviderFeatures::default()), a.clone()),
        (spec("b", 20, ProviderFeatures::default()), b.clone()),
    ]);

    let started = std::time::Instant::now();
    let value = router.call("getSlot", None, None).await.unwrap();
    assert_eq!(value["served_by"], "b");

    // B was only attempted after A's delayed failure resolved.
    assert!(started.elapsed() >= Duration::from_millis(50));
}
