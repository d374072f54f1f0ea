//! # Manifold Core
//!
//! Core library for Manifold, a multi-provider RPC routing and failover
//! layer. Manifold sits in front of several RPC backends with uneven
//! feature sets (bundle submission, priority-fee estimation, raw call
//! proxying) and picks a healthy, low-latency provider per request while
//! tolerating partial backend failure.
//!
//! This crate provides:
//!
//! - **[`provider`]**: Capability-polymorphic adapters, per-provider guarded
//!   state (rolling stats, circuit breaker, derived health flag), the
//!   immutable provider registry, independent health probe tasks, and
//!   pluggable selection policies.
//!
//! - **[`router`]**: The public facade composing everything - generic
//!   calls, bundle submission, fee estimation, health and metrics
//!   snapshots, and graceful shutdown.
//!
//! - **[`metrics`]**: Monotonic counters, a windowed bundle success rate,
//!   and per-feature provider availability, mirrored into the `metrics`
//!   facade for exporters.
//!
//! - **[`config`]**: Layered, validated configuration (defaults → TOML file
//!   → environment overrides).
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                           Router                              │
//! │  call / submit_bundle / estimate_priority_fee                 │
//! │  health / metrics / shutdown                                  │
//! │        │                                                      │
//! │        ▼                                                      │
//! │  ┌───────────────┐   orders   ┌────────────────────────────┐  │
//! │  │ RoutingPolicy │ ◄───────── │ ProviderRegistry           │  │
//! │  │ (health-first)│            │  ┌───────────────────────┐ │  │
//! │  └──────┬────────┘            │  │ ProviderEntry          │ │  │
//! │         │ sequential          │  │  stats · breaker ·     │ │  │
//! │         ▼ attempts            │  │  health flag           │ │  │
//! │  ┌───────────────┐            │  │   └─ ProviderAdapter   │ │  │
//! │  │ MetricsRegistry│           │  └───────────────────────┘ │  │
//! │  └───────────────┘            └────────────▲───────────────┘  │
//! │                                            │ probes           │
//! │                               ┌────────────┴───────────────┐  │
//! │                               │ HealthMonitor (1 task per  │  │
//! │                               │ provider, broadcast stop)  │  │
//! │                               └────────────────────────────┘  │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use manifold_core::{config::AppConfig, router::Router};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::from_toml(
//!     r#"
//!     [[providers]]
//!     name = "helios"
//!     endpoint = "https://rpc.helios.example"
//!     features = { bundle = true, fee_estimate = true }
//!     "#,
//! )?;
//!
//! let router = Router::from_config(config)?;
//! let slot = router.call("getSlot", None, None).await?;
//! println!("slot: {slot}");
//! router.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod metrics;
pub mod provider;
pub mod router;
pub mod types;

pub use provider::errors::RouterError;
pub use router::{Router, RouterBuilder, RouterState};
pub use types::{
    BundleRequest, BundleResult, Feature, FeeEstimate, HealthSnapshot, ProviderFeatures,
    ProviderSnapshot, Urgency,
};
