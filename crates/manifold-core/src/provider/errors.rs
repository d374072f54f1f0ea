use crate::types::Feature;
use thiserror::Error;

/// Classification of backend-reported JSON-RPC errors.
///
/// Different kinds require different handling:
/// - Client errors are the caller's fault and never penalize a provider
/// - Backend errors penalize the provider and trip its circuit breaker
/// - Rate limits are transient and trigger failover without penalties
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendErrorKind {
    /// Invalid request, unknown method, bad params. Not the provider's fault.
    Client,
    /// Internal/server-side failure reported by the backend.
    Backend,
    /// Backend-level rate limiting (-32005).
    RateLimit,
    /// Malformed response from the backend.
    Parse,
}

impl BackendErrorKind {
    /// Classifies a JSON-RPC error code.
    ///
    /// Standard codes: -32700 parse error, -32600..-32602 client errors,
    /// -32603 internal error, -32005 limit exceeded. The -32000..-32099
    /// server range and unknown codes default to `Backend`.
    #[must_use]
    pub fn from_code(code: i32) -> Self {
        match code {
            -32700 => Self::Parse,
            -32602..=-32600 => Self::Client,
            -32005 => Self::RateLimit,
            _ => Self::Backend,
        }
    }

    /// Whether this kind indicates a provider-side problem that should count
    /// against the provider's health and circuit breaker.
    #[must_use]
    pub fn penalizes_provider(&self) -> bool {
        matches!(self, Self::Backend | Self::Parse)
    }

    /// Returns a static string representation for metrics labels.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Backend => "backend",
            Self::RateLimit => "rate_limit",
            Self::Parse => "parse",
        }
    }
}

/// Errors surfaced by the router and its provider call paths.
///
/// Per-attempt variants (`Timeout`, `Provider`, `Connection`,
/// `InvalidResponse`, `CircuitOpen`) are absorbed by the failover loop and
/// drive retry against the next candidate; callers only see them when a
/// single-provider operation is invoked directly. Terminal variants
/// (`AllProvidersExhausted`, `NoCapableProvider`, `RouterClosed`) are the
/// ones a `Router` caller observes.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum RouterError {
    /// The attempt exceeded its timeout; attributed to the provider that
    /// was being called, distinct from a backend-reported failure.
    #[error("request timed out")]
    Timeout,

    /// Failure reported by the backend itself (JSON-RPC error object).
    #[error("provider error {code}: {message}")]
    Provider {
        /// Backend error code (JSON-RPC convention).
        code: i32,
        /// Backend error message.
        message: String,
    },

    /// The backend could not be reached.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The backend responded with something unparseable.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The provider's circuit breaker is open; the backend was not contacted.
    #[error("circuit breaker is open")]
    CircuitOpen,

    /// Every eligible candidate was attempted and failed.
    #[error("all providers exhausted after {attempts} attempt(s)")]
    AllProvidersExhausted {
        /// Number of candidates actually attempted.
        attempts: usize,
    },

    /// No enabled provider currently supports the requested feature.
    /// Returned before any network attempt.
    #[error("no capable provider for feature {0}")]
    NoCapableProvider(Feature),

    /// The router is shutting down or closed.
    #[error("router is closed")]
    RouterClosed,
}

impl RouterError {
    /// Returns the backend error kind for `Provider` variants.
    #[must_use]
    pub fn backend_kind(&self) -> Option<BackendErrorKind> {
        match self {
            Self::Provider { code, .. } => Some(BackendErrorKind::from_code(*code)),
            _ => None,
        }
    }

    /// Whether the failover loop should move on to the next candidate.
    ///
    /// Client-side backend errors are not retryable: the same malformed
    /// request would fail identically against every provider.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::Connection(_) | Self::InvalidResponse(_) | Self::CircuitOpen => {
                true
            }
            Self::Provider { .. } => self
                .backend_kind()
                .is_some_and(|kind| !matches!(kind, BackendErrorKind::Client)),
            _ => false,
        }
    }

    /// Whether this error should count against the provider's rolling error
    /// rate.
    ///
    /// Circuit-open skips never penalize: the backend was not contacted.
    /// Rate limits and client errors are not the provider's fault.
    #[must_use]
    pub fn penalizes_provider(&self) -> bool {
        match self {
            Self::Timeout | Self::Connection(_) | Self::InvalidResponse(_) => true,
            Self::Provider { .. } => {
                self.backend_kind().is_some_and(|kind| kind.penalizes_provider())
            }
            _ => false,
        }
    }

    /// Whether this error should advance the provider's circuit breaker.
    ///
    /// Matches [`RouterError::penalizes_provider`]: only failures that
    /// indicate a provider-side problem open circuits.
    #[must_use]
    pub fn trips_breaker(&self) -> bool {
        self.penalizes_provider()
    }

    /// Returns a static string representation for metrics labels.
    #[must_use]
    pub fn as_metric_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Provider { .. } => match self.backend_kind() {
                Some(BackendErrorKind::Client) => "provider_client_error",
                Some(BackendErrorKind::RateLimit) => "provider_rate_limit",
                Some(BackendErrorKind::Parse) => "provider_parse_error",
                _ => "provider_error",
            },
            Self::Connection(_) => "connection_failed",
            Self::InvalidResponse(_) => "invalid_response",
            Self::CircuitOpen => "circuit_open",
            Self::AllProvidersExhausted { .. } => "all_providers_exhausted",
            Self::NoCapableProvider(_) => "no_capable_provider",
            Self::RouterClosed => "router_closed",
        }
    }
}
