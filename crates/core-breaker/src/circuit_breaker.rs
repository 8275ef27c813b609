//! Circuit breaker state machine
//!
//! The circuit breaker stops issuing calls to a dependency that keeps failing.
//! It has three phases:
//! - Closed: normal operation, calls pass through and failures are counted
//! - Open: calls are rejected immediately until the cooldown has elapsed
//! - HalfOpen: a bounded number of trial calls probe the dependency
//!
//! # State Transitions
//! ```text
//! Closed ──[failure_threshold consecutive failures]──> Open
//!   ▲                                                   │
//!   │                                                   │ [reset_timeout since last failure,
//!   │                                                   │  checked on the next query]
//!   │                                                   ▼
//!   └──[half_open_trial_limit successes]────────── HalfOpen
//!                            [any failure] ──────────> Open
//! ```
//!
//! There is no timer: the Open → HalfOpen edge is evaluated lazily by every
//! admission check and state query. All bookkeeping for one breaker happens
//! under a single mutex that is never held across the caller's call.

use crate::config::BreakerConfig;
use crate::error::{CircuitOpenError, ExecuteError};
use crate::events::{TracingListener, TransitionEvent, TransitionKind, TransitionListener};
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;
use tokio::time::Instant;

/// Phase of the circuit breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Calls pass through normally
    Closed,
    /// Calls fail immediately
    Open,
    /// Limited trial calls test whether the dependency recovered
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        };
        f.write_str(s)
    }
}

/// Read-only snapshot of a breaker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreakerStats {
    pub name: String,
    pub phase: CircuitState,
    pub consecutive_failures: u32,
    pub trial_successes: u32,
    pub admitted_trials: u32,
    /// Wall-clock time of the most recent recorded failure
    pub last_failure_at: Option<SystemTime>,
}

/// Internal mutable state, always accessed under the breaker's lock
#[derive(Debug)]
struct BreakerState {
    phase: CircuitState,
    consecutive_failures: u32,
    trial_successes: u32,
    admitted_trials: u32,
    /// Monotonic time of the last failure, drives the cooldown
    last_failure_at: Option<Instant>,
    /// Same moment on the wall clock, only reported in stats
    last_failure_wall: Option<SystemTime>,
}

impl BreakerState {
    fn new() -> Self {
        Self {
            phase: CircuitState::Closed,
            consecutive_failures: 0,
            trial_successes: 0,
            admitted_trials: 0,
            last_failure_at: None,
            last_failure_wall: None,
        }
    }

    fn clear_counters(&mut self) {
        self.consecutive_failures = 0;
        self.trial_successes = 0;
        self.admitted_trials = 0;
    }

    fn enter(&mut self, phase: CircuitState) {
        self.phase = phase;
        self.clear_counters();
    }

    /// Apply the lazy Open -> HalfOpen edge if the cooldown has elapsed
    fn refresh(&mut self, name: &str, config: &BreakerConfig) -> Option<TransitionEvent> {
        if self.phase != CircuitState::Open {
            return None;
        }

        // Open is only ever entered after a failure, so an unset timestamp
        // cannot occur; treat it as an elapsed cooldown regardless.
        let elapsed = self
            .last_failure_at
            .map(|at| Instant::now().saturating_duration_since(at) >= config.reset_timeout())
            .unwrap_or(true);

        if !elapsed {
            return None;
        }

        self.enter(CircuitState::HalfOpen);
        Some(TransitionEvent::new(
            name,
            CircuitState::Open,
            TransitionKind::HalfOpened,
            "cooldown elapsed, admitting trial calls",
        ))
    }

    fn admits(&self, config: &BreakerConfig) -> bool {
        match self.phase {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => self.admitted_trials < config.half_open_trial_limit(),
            CircuitState::Open => false,
        }
    }
}

/// Circuit breaker guarding a single dependency
///
/// Cloning is cheap and clones share state, so one breaker can be handed to
/// every call site that talks to the same dependency.
///
/// # Example
/// ```
/// use tripwire_core_breaker::{BreakerConfig, CircuitBreaker, CircuitState};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let breaker = CircuitBreaker::new("billing-api", BreakerConfig::default());
///
/// let value = breaker
///     .execute(|| async { Ok::<_, std::io::Error>(42) })
///     .await
///     .unwrap();
///
/// assert_eq!(value, 42);
/// assert_eq!(breaker.phase(), CircuitState::Closed);
/// # }
/// ```
#[derive(Clone)]
pub struct CircuitBreaker {
    name: Arc<str>,
    config: BreakerConfig,
    state: Arc<Mutex<BreakerState>>,
    listener: Arc<dyn TransitionListener>,
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("state", &*self.lock())
            .finish_non_exhaustive()
    }
}

impl CircuitBreaker {
    /// Create a breaker that reports transitions through `tracing`
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self::with_listener(name, config, Arc::new(TracingListener))
    }

    /// Create a breaker with default configuration
    pub fn new_default(name: impl Into<String>) -> Self {
        Self::new(name, BreakerConfig::default())
    }

    /// Create a breaker that reports transitions to a custom sink
    pub fn with_listener(
        name: impl Into<String>,
        config: BreakerConfig,
        listener: Arc<dyn TransitionListener>,
    ) -> Self {
        let name: String = name.into();
        Self {
            name: Arc::from(name),
            config,
            state: Arc::new(Mutex::new(BreakerState::new())),
            listener,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    /// Current phase, after applying any pending cooldown transition
    pub fn phase(&self) -> CircuitState {
        let (phase, event) = {
            let mut state = self.lock();
            let event = state.refresh(&self.name, &self.config);
            (state.phase, event)
        };
        self.emit(event);
        phase
    }

    /// Whether a call would be admitted right now.
    ///
    /// This is advisory: between this check and the call another caller may
    /// take the last half-open slot. Use [`try_admit`](Self::try_admit) or
    /// [`execute`](Self::execute) when admission must be claimed atomically.
    pub fn can_execute(&self) -> bool {
        let (admits, event) = {
            let mut state = self.lock();
            let event = state.refresh(&self.name, &self.config);
            (state.admits(&self.config), event)
        };
        self.emit(event);
        admits
    }

    /// Check admission and, while half-open, claim a trial slot in the same
    /// critical section.
    ///
    /// A caller that gets `Ok` must later report the outcome with
    /// [`record_success`](Self::record_success) or
    /// [`record_failure`](Self::record_failure).
    pub fn try_admit(&self) -> Result<(), CircuitOpenError> {
        let (admitted, event) = {
            let mut state = self.lock();
            let event = state.refresh(&self.name, &self.config);
            let admitted = state.admits(&self.config);
            if admitted && state.phase == CircuitState::HalfOpen {
                state.admitted_trials += 1;
            }
            (admitted, event)
        };
        self.emit(event);

        if admitted {
            Ok(())
        } else {
            Err(CircuitOpenError {
                name: self.name.to_string(),
            })
        }
    }

    /// Report a successful call
    pub fn record_success(&self) {
        let event = {
            let mut state = self.lock();
            match state.phase {
                CircuitState::Closed => {
                    state.consecutive_failures = 0;
                    None
                }
                CircuitState::HalfOpen => {
                    state.trial_successes += 1;
                    if state.trial_successes >= self.config.half_open_trial_limit() {
                        state.enter(CircuitState::Closed);
                        Some(TransitionEvent::new(
                            &self.name,
                            CircuitState::HalfOpen,
                            TransitionKind::Recovered,
                            "trial calls succeeded, circuit closed",
                        ))
                    } else {
                        None
                    }
                }
                // A late result from a call admitted before the trip
                CircuitState::Open => None,
            }
        };
        self.emit(event);
    }

    /// Report a failed call. Never fails.
    pub fn record_failure(&self) {
        let event = {
            let mut state = self.lock();
            state.last_failure_at = Some(Instant::now());
            state.last_failure_wall = Some(SystemTime::now());

            match state.phase {
                CircuitState::Closed => {
                    state.consecutive_failures = state.consecutive_failures.saturating_add(1);
                    let failures = state.consecutive_failures;
                    if failures >= self.config.failure_threshold() {
                        state.enter(CircuitState::Open);
                        Some(TransitionEvent::new(
                            &self.name,
                            CircuitState::Closed,
                            TransitionKind::Opened,
                            format!("failure threshold reached ({}), circuit opened", failures),
                        ))
                    } else {
                        None
                    }
                }
                CircuitState::HalfOpen => {
                    state.enter(CircuitState::Open);
                    Some(TransitionEvent::new(
                        &self.name,
                        CircuitState::HalfOpen,
                        TransitionKind::Opened,
                        "trial call failed, circuit reopened",
                    ))
                }
                // Late failure while already open: the refreshed timestamp
                // restarts the cooldown.
                CircuitState::Open => None,
            }
        };
        self.emit(event);
    }

    /// Return to `Closed` with all counters cleared, whatever the current phase
    pub fn force_reset(&self) {
        let from = {
            let mut state = self.lock();
            let from = state.phase;
            state.enter(CircuitState::Closed);
            from
        };
        self.emit(Some(TransitionEvent::new(
            &self.name,
            from,
            TransitionKind::ForcedReset,
            "circuit manually reset to closed",
        )));
    }

    /// Observability snapshot, taken after any pending cooldown transition
    pub fn stats(&self) -> BreakerStats {
        let (stats, event) = {
            let mut state = self.lock();
            let event = state.refresh(&self.name, &self.config);
            let stats = BreakerStats {
                name: self.name.to_string(),
                phase: state.phase,
                consecutive_failures: state.consecutive_failures,
                trial_successes: state.trial_successes,
                admitted_trials: state.admitted_trials,
                last_failure_at: state.last_failure_wall,
            };
            (stats, event)
        };
        self.emit(event);
        stats
    }

    /// Run an async call under breaker protection.
    ///
    /// A rejected call is never invoked and nothing is recorded for it. An
    /// admitted call's outcome is recorded and its value or error is handed
    /// back unchanged. If the returned future is dropped while the call is in
    /// flight, the call counts as a failure.
    pub async fn execute<F, Fut, T, E>(&self, op: F) -> Result<T, ExecuteError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.try_admit()?;

        let guard = CallGuard::new(self);
        let result = op().await;
        guard.finish(result.is_ok());

        result.map_err(ExecuteError::Inner)
    }

    /// Blocking counterpart of [`execute`](Self::execute) for synchronous calls.
    /// A panic inside `op` counts as a failure.
    pub fn execute_sync<F, T, E>(&self, op: F) -> Result<T, ExecuteError<E>>
    where
        F: FnOnce() -> Result<T, E>,
    {
        self.try_admit()?;

        let guard = CallGuard::new(self);
        let result = op();
        guard.finish(result.is_ok());

        result.map_err(ExecuteError::Inner)
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        // Every critical section leaves the state consistent, so a poisoned
        // lock still holds a usable value.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: Option<TransitionEvent>) {
        if let Some(event) = event {
            self.listener.on_transition(&event);
        }
    }
}

/// Records a failure for an admitted call that never reported back
struct CallGuard<'a> {
    breaker: &'a CircuitBreaker,
    armed: bool,
}

impl<'a> CallGuard<'a> {
    fn new(breaker: &'a CircuitBreaker) -> Self {
        Self {
            breaker,
            armed: true,
        }
    }

    fn finish(mut self, success: bool) {
        self.armed = false;
        if success {
            self.breaker.record_success();
        } else {
            self.breaker.record_failure();
        }
    }
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            tracing::debug!(
                breaker = %self.breaker.name,
                "admitted call abandoned before completion, recording failure"
            );
            self.breaker.record_failure();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RecordingListener;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn config(failures: u32, timeout_ms: u64, trials: u32) -> BreakerConfig {
        BreakerConfig::new(failures, Duration::from_millis(timeout_ms), trials).unwrap()
    }

    fn trip(breaker: &CircuitBreaker) {
        for _ in 0..breaker.config().failure_threshold() {
            breaker.record_failure();
        }
    }

    #[test]
    fn test_closed_to_open_after_threshold() {
        let breaker = CircuitBreaker::new("test", config(3, 1_000, 2));

        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.phase(), CircuitState::Closed);
        assert!(breaker.can_execute());
        assert_eq!(breaker.stats().consecutive_failures, 2);

        breaker.record_failure();
        assert_eq!(breaker.phase(), CircuitState::Open);
        assert!(!breaker.can_execute());
        assert_eq!(breaker.stats().consecutive_failures, 0);
    }

    #[test]
    fn test_success_clears_failure_count() {
        let breaker = CircuitBreaker::new("test", config(3, 1_000, 2));

        breaker.record_failure();
        breaker.record_failure();
        breaker.record_success();
        assert_eq!(breaker.stats().consecutive_failures, 0);

        // Counter starts over, so two more failures do not trip
        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.phase(), CircuitState::Closed);
    }

    #[test]
    fn test_success_while_closed_with_no_failures_is_noop() {
        let breaker = CircuitBreaker::new_default("test");
        breaker.record_success();
        let stats = breaker.stats();
        assert_eq!(stats.phase, CircuitState::Closed);
        assert_eq!(stats.consecutive_failures, 0);
        assert_eq!(stats.last_failure_at, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_gate() {
        let breaker = CircuitBreaker::new("test", config(1, 1_000, 1));
        breaker.record_failure();

        tokio::time::advance(Duration::from_millis(999)).await;
        assert!(!breaker.can_execute());
        assert_eq!(breaker.phase(), CircuitState::Open);

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(breaker.can_execute());
        assert_eq!(breaker.phase(), CircuitState::HalfOpen);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stats_applies_lazy_transition() {
        let breaker = CircuitBreaker::new("test", config(1, 100, 1));
        breaker.record_failure();
        tokio::time::advance(Duration::from_millis(100)).await;

        assert_eq!(breaker.stats().phase, CircuitState::HalfOpen);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_failure_reopens_immediately() {
        let breaker = CircuitBreaker::new("test", config(5, 100, 3));
        trip(&breaker);
        tokio::time::advance(Duration::from_millis(100)).await;
        assert_eq!(breaker.phase(), CircuitState::HalfOpen);

        breaker.record_failure();
        assert_eq!(breaker.phase(), CircuitState::Open);

        // Cooldown restarts from the half-open failure
        tokio::time::advance(Duration::from_millis(99)).await;
        assert!(!breaker.can_execute());
        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(breaker.can_execute());
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_successes_close_circuit() {
        let breaker = CircuitBreaker::new("test", config(2, 100, 2));
        trip(&breaker);
        tokio::time::advance(Duration::from_millis(100)).await;
        assert!(breaker.try_admit().is_ok());
        assert!(breaker.try_admit().is_ok());

        breaker.record_success();
        let stats = breaker.stats();
        assert_eq!(stats.phase, CircuitState::HalfOpen);
        assert_eq!(stats.trial_successes, 1);

        breaker.record_success();
        let stats = breaker.stats();
        assert_eq!(stats.phase, CircuitState::Closed);
        assert_eq!(stats.consecutive_failures, 0);
        assert_eq!(stats.trial_successes, 0);
        assert_eq!(stats.admitted_trials, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_admission_cap() {
        let breaker = CircuitBreaker::new("test", config(1, 50, 2));
        breaker.record_failure();
        tokio::time::advance(Duration::from_millis(50)).await;

        assert!(breaker.try_admit().is_ok());
        assert!(breaker.can_execute());
        assert!(breaker.try_admit().is_ok());
        assert!(!breaker.can_execute());

        let err = breaker.try_admit().unwrap_err();
        assert_eq!(err.name, "test");
        assert_eq!(breaker.stats().admitted_trials, 2);
    }

    #[test]
    fn test_can_execute_does_not_claim_slots() {
        let breaker = CircuitBreaker::new("test", config(1, 1_000, 1));
        for _ in 0..10 {
            assert!(breaker.can_execute());
        }
        assert_eq!(breaker.stats().admitted_trials, 0);
    }

    #[test]
    fn test_success_while_open_is_ignored() {
        let breaker = CircuitBreaker::new("test", config(1, 60_000, 1));
        breaker.record_failure();
        breaker.record_success();
        assert_eq!(breaker.phase(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_while_open_restarts_cooldown() {
        let breaker = CircuitBreaker::new("test", config(1, 100, 1));
        breaker.record_failure();

        tokio::time::advance(Duration::from_millis(60)).await;
        breaker.record_failure();
        assert_eq!(breaker.stats().consecutive_failures, 0);

        tokio::time::advance(Duration::from_millis(60)).await;
        assert_eq!(breaker.phase(), CircuitState::Open);

        tokio::time::advance(Duration::from_millis(40)).await;
        assert_eq!(breaker.phase(), CircuitState::HalfOpen);
    }

    #[test]
    fn test_force_reset_from_open() {
        let breaker = CircuitBreaker::new("test", config(2, 60_000, 1));
        trip(&breaker);
        assert_eq!(breaker.phase(), CircuitState::Open);

        breaker.force_reset();
        let stats = breaker.stats();
        assert_eq!(stats.phase, CircuitState::Closed);
        assert_eq!(stats.consecutive_failures, 0);
        assert!(stats.last_failure_at.is_some());
        assert!(breaker.can_execute());
    }

    #[tokio::test]
    async fn test_execute_passes_value_and_error_through() {
        let breaker = CircuitBreaker::new("test", config(3, 1_000, 1));

        let ok = breaker.execute(|| async { Ok::<_, String>(7) }).await;
        assert_eq!(ok, Ok(7));

        let err = breaker
            .execute(|| async { Err::<(), _>("boom".to_string()) })
            .await;
        assert_eq!(err, Err(ExecuteError::Inner("boom".to_string())));
        assert_eq!(breaker.stats().consecutive_failures, 1);
    }

    #[tokio::test]
    async fn test_rejected_execute_is_not_recorded() {
        let breaker = CircuitBreaker::new("test", config(1, 60_000, 1));
        breaker.record_failure();
        let before = breaker.stats();

        let invoked = Arc::new(AtomicUsize::new(0));
        let counter = invoked.clone();
        let result = breaker
            .execute(move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>("unreachable")
            })
            .await;

        assert!(matches!(result, Err(ExecuteError::Open(_))));
        assert_eq!(invoked.load(Ordering::SeqCst), 0);
        assert_eq!(breaker.stats(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_claims_trial_slot() {
        let breaker = CircuitBreaker::new("test", config(1, 10, 2));
        breaker.record_failure();
        tokio::time::advance(Duration::from_millis(10)).await;

        let result = breaker.execute(|| async { Ok::<_, String>(()) }).await;
        assert!(result.is_ok());

        let stats = breaker.stats();
        assert_eq!(stats.phase, CircuitState::HalfOpen);
        assert_eq!(stats.admitted_trials, 1);
        assert_eq!(stats.trial_successes, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_call_counts_as_failure() {
        let breaker = CircuitBreaker::new("test", config(1, 1_000, 1));

        let call = breaker.execute(|| std::future::pending::<Result<(), String>>());
        let timed_out = tokio::time::timeout(Duration::from_millis(10), call).await;

        assert!(timed_out.is_err());
        assert_eq!(breaker.phase(), CircuitState::Open);
    }

    #[test]
    fn test_execute_sync() {
        let breaker = CircuitBreaker::new("test", config(2, 60_000, 1));

        assert_eq!(breaker.execute_sync(|| Ok::<_, &str>("fine")), Ok("fine"));
        assert_eq!(
            breaker.execute_sync(|| Err::<(), _>("bad")),
            Err(ExecuteError::Inner("bad"))
        );
        let _ = breaker.execute_sync(|| Err::<(), _>("bad"));

        let rejected = breaker.execute_sync(|| Ok::<_, &str>("never"));
        assert!(rejected.unwrap_err().is_open());
    }

    #[test]
    fn test_panicking_call_counts_as_failure() {
        let breaker = CircuitBreaker::new("test", config(1, 60_000, 1));
        let b = breaker.clone();

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _: Result<(), ExecuteError<()>> = b.execute_sync(|| panic!("call blew up"));
        }));

        assert!(outcome.is_err());
        assert_eq!(breaker.phase(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_listener_sees_each_transition_once() {
        let listener = Arc::new(RecordingListener::new());
        let breaker = CircuitBreaker::with_listener("orders", config(2, 100, 1), listener.clone());

        trip(&breaker);
        tokio::time::advance(Duration::from_millis(100)).await;
        assert!(breaker.can_execute());
        assert!(breaker.can_execute());
        breaker.record_failure();
        tokio::time::advance(Duration::from_millis(100)).await;
        breaker.phase();
        breaker.record_success();
        breaker.force_reset();

        assert_eq!(
            listener.kinds(),
            vec![
                TransitionKind::Opened,
                TransitionKind::HalfOpened,
                TransitionKind::Opened,
                TransitionKind::HalfOpened,
                TransitionKind::Recovered,
                TransitionKind::ForcedReset,
            ]
        );

        let events = listener.events();
        assert!(events.iter().all(|e| e.breaker == "orders"));
        assert_eq!(events[0].level, tracing::Level::WARN);
        assert_eq!(events[2].from, CircuitState::HalfOpen);
    }

    #[test]
    fn test_clones_share_state() {
        let breaker = CircuitBreaker::new("shared", config(1, 60_000, 1));
        let clone = breaker.clone();
        clone.record_failure();
        assert_eq!(breaker.phase(), CircuitState::Open);
    }

    #[test]
    fn test_phase_display_and_serialize() {
        assert_eq!(CircuitState::HalfOpen.to_string(), "HALF_OPEN");
        assert_eq!(
            serde_json::to_string(&CircuitState::HalfOpen).unwrap(),
            "\"HALF_OPEN\""
        );
    }
}
