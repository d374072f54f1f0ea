//! Scriptable in-process provider adapter.
//!
//! Outcomes are queued per operation; an empty queue falls back to a
//! success default, so fixtures only script the interesting calls. All
//! invocation counts are observable so tests can assert a backend was (or
//! was not) contacted.

use async_trait::async_trait;
use manifold_core::{
    provider::{ProviderAdapter, RouterError},
    types::{BundleRequest, Feature, FeeEstimate, ProviderFeatures, Urgency},
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

/// Scripted adapter for driving the router in tests.
pub struct MockAdapter {
    name: Arc<str>,
    features: ProviderFeatures,
    invoke_outcomes: Mutex<VecDeque<Result<Value, RouterError>>>,
    bundle_outcomes: Mutex<VecDeque<Result<String, RouterError>>>,
    fee_outcomes: Mutex<VecDeque<Result<f64, RouterError>>>,
    probe_up: AtomicBool,
    probe_latency_ms: AtomicU64,
    /// Artificial latency applied to every operation, for timeout tests.
    delay_ms: AtomicU64,
    invoke_calls: AtomicUsize,
    bundle_calls: AtomicUsize,
    fee_calls: AtomicUsize,
    probe_calls: AtomicUsize,
}

impl MockAdapter {
    /// Creates a healthy mock with no optional capabilities.
    pub fn new(name: &str) -> Arc<Self> {
        Self::with_features(name, ProviderFeatures::default())
    }

    /// Creates a mock advertising the given capability set.
    pub fn with_features(name: &str, features: ProviderFeatures) -> Arc<Self> {
        Arc::new(Self {
            name: Arc::from(name),
            features,
            invoke_outcomes: Mutex::new(VecDeque::new()),
            bundle_outcomes: Mutex::new(VecDeque::new()),
            fee_outcomes: Mutex::new(VecDeque::new()),
            probe_up: AtomicBool::new(true),
            probe_latency_ms: AtomicU64::new(5),
            delay_ms: AtomicU64::new(0),
            invoke_calls: AtomicUsize::new(0),
            bundle_calls: AtomicUsize::new(0),
            fee_calls: AtomicUsize::new(0),
            probe_calls: AtomicUsize::new(0),
        })
    }

    /// Queues an invoke outcome (consumed in order).
    pub fn queue_invoke(&self, outcome: Result<Value, RouterError>) {
        self.invoke_outcomes.lock().push_back(outcome);
    }

    /// Queues `n` identical backend errors for invoke.
    pub fn queue_invoke_backend_errors(&self, n: usize) {
        for _ in 0..n {
            self.queue_invoke(Err(RouterError::Provider {
                code: -32603,
                message: "internal".to_string(),
            }));
        }
    }

    /// Queues a bundle submission outcome.
    pub fn queue_bundle(&self, outcome: Result<String, RouterError>) {
        self.bundle_outcomes.lock().push_back(outcome);
    }

    /// Queues a fee estimate outcome (value only; unit and confidence use
    /// the mock defaults).
    pub fn queue_fee(&self, outcome: Result<f64, RouterError>) {
        self.fee_outcomes.lock().push_back(outcome);
    }

    /// Flips whether probes succeed.
    pub fn set_probe_up(&self, up: bool) {
        self.probe_up.store(up, Ordering::SeqCst);
    }

    /// Sets the latency reported by successful probes.
    pub fn set_probe_latency_ms(&self, latency_ms: u64) {
        self.probe_latency_ms.store(latency_ms, Ordering::SeqCst);
    }

    /// Applies an artificial delay to every operation.
    pub fn set_delay_ms(&self, delay_ms: u64) {
        self.delay_ms.store(delay_ms, Ordering::SeqCst);
    }

    /// Number of invoke calls that reached this adapter.
    pub fn invoke_calls(&self) -> usize {
        self.invoke_calls.load(Ordering::SeqCst)
    }

    /// Number of bundle submissions that reached this adapter.
    pub fn bundle_calls(&self) -> usize {
        self.bundle_calls.load(Ordering::SeqCst)
    }

    /// Number of fee queries that reached this adapter.
    pub fn fee_calls(&self) -> usize {
        self.fee_calls.load(Ordering::SeqCst)
    }

    /// Number of probes that reached this adapter.
    pub fn probe_calls(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }

    async fn apply_delay(&self) {
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
    }
}

#[async_trait]
impl ProviderAdapter for MockAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn features(&self) -> ProviderFeatures {
        self.features
    }

    async fn invoke(
        &self,
        _method: &str,
        _params: Option<Value>,
        _timeout: Duration,
    ) -> Result<Value, RouterError> {
        self.invoke_calls.fetch_add(1, Ordering::SeqCst);
        self.apply_delay().await;
        match self.invoke_outcomes.lock().pop_front() {
            Some(outcome) => outcome,
            None => Ok(json!({ "served_by": self.name.as_ref() })),
        }
    }

    async fn probe(&self, _timeout: Duration) -> Result<u64, RouterError> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        self.apply_delay().await;
        if self.probe_up.load(Ordering::SeqCst) {
            Ok(self.probe_latency_ms.load(Ordering::SeqCst))
        } else {
            Err(RouterError::Connection("probe refused".to_string()))
        }
    }

    async fn submit_bundle(
        &self,
        _request: &BundleRequest,
        _timeout: Duration,
    ) -> Result<String, RouterError> {
        if !self.features.bundle {
            return Err(RouterError::NoCapableProvider(Feature::BundleSubmission));
        }
        self.bundle_calls.fetch_add(1, Ordering::SeqCst);
        self.apply_delay().await;
        match self.bundle_outcomes.lock().pop_front() {
            Some(outcome) => outcome,
            None => {
                let n = self.bundle_calls.load(Ordering::SeqCst);
                Ok(format!("{}-bundle-{n}", self.name))
            }
        }
    }

    async fn estimate_fee(
        &self,
        _urgency: Urgency,
        _timeout: Duration,
    ) -> Result<FeeEstimate, RouterError> {
        if !self.features.fee_estimate {
            return Err(RouterError::NoCapableProvider(Feature::FeeEstimate));
        }
        self.fee_calls.fetch_add(1, Ordering::SeqCst);
        self.apply_delay().await;
        match self.fee_outcomes.lock().pop_front() {
            Some(outcome) => outcome.map(|value| FeeEstimate {
                value,
                unit: "micro-lamports".to_string(),
                confidence: 0.9,
                provider: Arc::clone(&self.name),
            }),
            None => Ok(FeeEstimate {
                value: 1_000.0,
                unit: "micro-lamports".to_string(),
                confidence: 0.9,
                provider: Arc::clone(&self.name),
            }),
        }
    }
}
