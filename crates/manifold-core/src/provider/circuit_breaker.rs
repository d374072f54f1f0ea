use parking_lot::Mutex;
use serde::Serialize;
use std::time::{Duration, Instant};

/// Circuit breaker state machine.
///
/// Transitions between states based on consecutive failures and the open
/// duration:
/// - `Closed` -> `Open`: when consecutive failures reach the threshold
/// - `Open` -> `HalfOpen`: when the open duration elapses
/// - `HalfOpen` -> `Closed`: the admitted probe succeeds
/// - `HalfOpen` -> `Open`: the admitted probe fails (timer restarts)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation, requests flow through.
    Closed,
    /// Failures reached the threshold; requests are short-circuited.
    Open,
    /// Recovery mode: exactly one probe request is in flight.
    HalfOpen,
}

impl CircuitState {
    /// Returns a static string representation for metrics labels.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

/// Mutable breaker state consolidated under a single lock.
///
/// Failure count, the open timestamp, the FSM state, and the half-open probe
/// token are updated together within one lock acquisition so transitions are
/// atomic with respect to concurrent callers.
#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    /// Set while the single HalfOpen probe is in flight.
    probe_in_flight: bool,
}

/// Per-provider failure-isolation state machine.
///
/// Guards a single upstream from being hammered while it is failing. One
/// breaker exists per provider and breakers never influence each other.
///
/// HalfOpen admits exactly one probe: the first caller through
/// [`CircuitBreaker::try_acquire`] after the open duration elapses takes the
/// probe slot; concurrent callers are rejected until the probe resolves via
/// [`CircuitBreaker::record_success`] or [`CircuitBreaker::record_failure`].
pub struct CircuitBreaker {
    inner: Mutex<BreakerInner>,
    threshold: u32,
    open_duration: Duration,
}

impl CircuitBreaker {
    /// Creates a breaker that opens after `threshold` consecutive failures
    /// and admits a probe after `open_duration` in the Open state.
    #[must_use]
    pub fn new(threshold: u32, open_duration: Duration) -> Self {
        Self {
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                probe_in_flight: false,
            }),
            threshold,
            open_duration,
        }
    }

    /// Attempts to acquire permission to contact the backend.
    ///
    /// Returns `true` when the circuit is Closed, or when the open duration
    /// has elapsed and this caller wins the single HalfOpen probe slot.
    /// Returns `false` while Open, or while another probe is in flight.
    pub fn try_acquire(&self) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => {
                if inner.probe_in_flight {
                    false
                } else {
                    inner.probe_in_flight = true;
                    true
                }
            }
            CircuitState::Open => {
                let elapsed = inner.opened_at.map(|at| at.elapsed());
                if elapsed.is_some_and(|e| e >= self.open_duration) {
                    inner.state = CircuitState::HalfOpen;
                    inner.probe_in_flight = true;
                    tracing::warn!("circuit breaker transitioning to half-open, admitting probe");
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Records a successful call, closing the circuit and clearing failures.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        let was = inner.state;
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
        inner.probe_in_flight = false;
        if was != CircuitState::Closed {
            tracing::info!("circuit breaker closed after successful request");
        }
    }

    /// Records a failed call.
    ///
    /// In Closed, advances the consecutive-failure count and opens the
    /// circuit at the threshold. In HalfOpen, the failed probe reopens the
    /// circuit and restarts the open-duration timer.
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
                inner.probe_in_flight = false;
                tracing::warn!("circuit breaker reopened after failed probe");
            }
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.threshold {
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(Instant::now());
                    tracing::warn!(
                        threshold = self.threshold,
                        "circuit breaker opened after reaching failure threshold"
                    );
                }
            }
            // Failures reported while Open (e.g. from a call that was already
            // in flight when the circuit opened) keep the timer as-is.
            CircuitState::Open => {}
        }
    }

    /// Returns a consumed HalfOpen probe slot without resolving it.
    ///
    /// A request cancelled between acquisition and outcome recording must
    /// not strand the slot; the next caller takes a fresh probe instead.
    pub(crate) fn abandon_probe(&self) {
        let mut inner = self.inner.lock();
        if inner.state == CircuitState::HalfOpen && inner.probe_in_flight {
            inner.probe_in_flight = false;
            tracing::debug!("half-open probe abandoned before resolving");
        }
    }

    /// Non-mutating mirror of [`CircuitBreaker::try_acquire`]: whether a
    /// request arriving now would be admitted.
    ///
    /// Used for candidate eligibility so a provider whose open duration has
    /// elapsed is selectable again; the actual Open -> HalfOpen transition
    /// still happens only in `try_acquire`, on the admitted request.
    #[must_use]
    pub fn admits_request(&self) -> bool {
        let inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => !inner.probe_in_flight,
            CircuitState::Open => {
                inner.opened_at.is_some_and(|at| at.elapsed() >= self.open_duration)
            }
        }
    }

    /// Returns the current state without side effects.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Returns the current consecutive-failure count.
    #[must_use]
    pub fn failure_count(&self) -> u32 {
        self.inner.lock().consecutive_failures
    }
}
