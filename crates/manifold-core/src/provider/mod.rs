//! Provider management: adapters, per-provider guarded state, health
//! probing, circuit breaking, and selection policies.
//!
//! This module owns everything between the router facade and the upstream
//! backends:
//! - Capability-polymorphic adapters ([`ProviderAdapter`], with
//!   [`HttpProviderAdapter`] as the production implementation)
//! - Per-provider state blocks ([`ProviderEntry`]) combining rolling stats,
//!   a circuit breaker, and the derived health flag
//! - The immutable [`ProviderRegistry`] built once from validated config
//! - Independent per-provider probe tasks ([`HealthMonitor`])
//! - Pure ordering policies ([`HealthFirstPolicy`], [`RoundRobinPolicy`])
//!
//! # Selection Flow
//!
//! ```text
//! Request → Registry.candidates(feature?)   eligibility: enabled && circuit != Open
//!               │
//!               ▼
//!           Policy.order(snapshots)         preference: healthy, priority, latency, name
//!               │
//!               ▼
//!           sequential attempts             bounded by the candidate list
//!               │
//!               ├─ success ────────────► result
//!               └─ exhausted ──────────► AllProvidersExhausted
//! ```

pub mod adapter;
pub mod circuit_breaker;
pub mod entry;
pub mod errors;
pub mod health;
pub mod http_adapter;
pub mod http_client;
pub mod policy;
pub mod registry;
pub mod stats;

pub use adapter::ProviderAdapter;
pub use circuit_breaker::{CircuitBreaker, CircuitState};
pub use entry::ProviderEntry;
pub use errors::{BackendErrorKind, RouterError};
pub use health::HealthMonitor;
pub use http_adapter::{HttpAdapterConfig, HttpProviderAdapter};
pub use http_client::{HttpClient, HttpClientConfig};
pub use policy::{Candidate, HealthFirstPolicy, RoundRobinPolicy, RoutingPolicy};
pub use registry::ProviderRegistry;
pub use stats::ProviderStats;
