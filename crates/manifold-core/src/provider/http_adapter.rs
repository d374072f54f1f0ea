//! JSON-RPC 2.0 provider adapter over HTTP.
//!
//! The production adapter implementation. Wire details (method names,
//! payload encodings) are configurable per backend and never leak out of
//! this module; the router only sees [`ProviderAdapter`] results.

use crate::{
    provider::{
        adapter::ProviderAdapter,
        errors::RouterError,
        http_client::HttpClient,
    },
    types::{BundleRequest, Feature, FeeEstimate, ProviderFeatures, Urgency},
};
use async_trait::async_trait;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

/// Wire-level configuration for one HTTP JSON-RPC backend.
///
/// Method names default to the common self-hosted conventions and can be
/// overridden per provider for backends with vendor-specific APIs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpAdapterConfig {
    /// Backend endpoint URL.
    pub endpoint: String,
    /// Capability set this backend supports.
    #[serde(default)]
    pub features: ProviderFeatures,
    /// Method used for liveness probes.
    #[serde(default = "default_health_method")]
    pub health_method: String,
    /// Method used for bundle submission.
    #[serde(default = "default_bundle_method")]
    pub bundle_method: String,
    /// Method used for priority-fee estimation.
    #[serde(default = "default_fee_method")]
    pub fee_method: String,
}

fn default_health_method() -> String {
    "getHealth".to_string()
}

fn default_bundle_method() -> String {
    "sendBundle".to_string()
}

fn default_fee_method() -> String {
    "getPriorityFeeEstimate".to_string()
}

impl HttpAdapterConfig {
    /// Creates a config with default method names for the given endpoint.
    #[must_use]
    pub fn new(endpoint: impl Into<String>, features: ProviderFeatures) -> Self {
        Self {
            endpoint: endpoint.into(),
            features,
            health_method: default_health_method(),
            bundle_method: default_bundle_method(),
            fee_method: default_fee_method(),
        }
    }
}

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Value,
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i32,
    message: String,
}

/// JSON-RPC adapter for one upstream backend.
pub struct HttpProviderAdapter {
    name: Arc<str>,
    config: HttpAdapterConfig,
    client: Arc<HttpClient>,
    request_id: AtomicU64,
}

impl HttpProviderAdapter {
    /// Creates an adapter sharing the given transport.
    #[must_use]
    pub fn new(name: Arc<str>, config: HttpAdapterConfig, client: Arc<HttpClient>) -> Self {
        Self { name, config, client, request_id: AtomicU64::new(1) }
    }

    async fn rpc(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> Result<Value, RouterError> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.request_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };
        let body = serde_json::to_vec(&request).map_err(|e| {
            RouterError::InvalidResponse(format!("request serialization failed: {e}"))
        })?;

        let response_bytes =
            self.client.post_json(&self.config.endpoint, bytes::Bytes::from(body), timeout).await?;

        let response: RpcResponse = serde_json::from_slice(&response_bytes)
            .map_err(|e| RouterError::InvalidResponse(format!("invalid JSON: {e}")))?;

        if let Some(error) = response.error {
            return Err(RouterError::Provider { code: error.code, message: error.message });
        }

        Ok(response.result)
    }
}

#[async_trait]
impl ProviderAdapter for HttpProviderAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn features(&self) -> ProviderFeatures {
        self.config.features
    }

    async fn invoke(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> Result<Value, RouterError> {
        self.rpc(method, params, timeout).await
    }

    async fn probe(&self, timeout: Duration) -> Result<u64, RouterError> {
        let start = Instant::now();
        self.rpc(&self.config.health_method, None, timeout).await?;
        Ok(u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX))
    }

    async fn submit_bundle(
        &self,
        request: &BundleRequest,
        timeout: Duration,
    ) -> Result<String, RouterError> {
        if !self.config.features.bundle {
            return Err(RouterError::NoCapableProvider(Feature::BundleSubmission));
        }

        let encoded: Vec<String> = request
            .transactions
            .iter()
            .map(|tx| base64::engine::general_purpose::STANDARD.encode(tx))
            .collect();

        let result =
            self.rpc(&self.config.bundle_method, Some(json!([encoded])), timeout).await?;

        match result {
            Value::String(id) => Ok(id),
            other => Err(RouterError::InvalidResponse(format!(
                "expected bundle id string, got {other}"
            ))),
        }
    }

    async fn estimate_fee(
        &self,
        urgency: Urgency,
        timeout: Duration,
    ) -> Result<FeeEstimate, RouterError> {
        if !self.config.features.fee_estimate {
            return Err(RouterError::NoCapableProvider(Feature::FeeEstimate));
        }

        let params = json!([{ "urgency": urgency.as_str() }]);
        let result = self.rpc(&self.config.fee_method, Some(params), timeout).await?;

        // Backends answer either a bare number or an object with fee detail.
        let (value, unit, confidence) = match &result {
            Value::Number(n) => (n.as_f64(), None, None),
            Value::Object(fields) => (
                fields.get("fee").and_then(Value::as_f64),
                fields.get("unit").and_then(Value::as_str).map(str::to_string),
                fields.get("confidence").and_then(Value::as_f64),
            ),
            _ => (None, None, None),
        };

        let value = value.ok_or_else(|| {
            RouterError::InvalidResponse(format!("expected fee estimate, got {result}"))
        })?;

        Ok(FeeEstimate {
            value,
            unit: unit.unwrap_or_else(|| "micro-lamports".to_string()),
            confidence: confidence.unwrap_or(0.5).clamp(0.0, 1.0),
            provider: Arc::clone(&self.name),
        })
    }
}
