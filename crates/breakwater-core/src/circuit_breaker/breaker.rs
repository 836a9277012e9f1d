//! Circuit breaker implementation

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::time::Instant;

use super::types::{CircuitBreakerConfig, CircuitBreakerError, CircuitBreakerStats, CircuitState};

/// Number of recent response times kept for the running average
pub const RESPONSE_TIME_WINDOW: usize = 100;

/// Mutable breaker state, only touched under the breaker's lock
#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    /// Failures in the current episode
    failures: u32,
    /// Successes in the current episode
    successes: u32,
    last_failure_time: Option<chrono::DateTime<Utc>>,
    last_success_time: Option<chrono::DateTime<Utc>>,
    total_requests: u64,
    total_failures: u64,
    total_successes: u64,
    response_times: VecDeque<Duration>,
    /// Earliest instant an open circuit lets a trial call through; `None`
    /// while open means the recovery timeout is beyond the clock's range
    next_attempt: Option<Instant>,
    /// Trial calls currently running while half-open
    trials_in_flight: u32,
    /// Bumped on every transition so stale trial permits are ignored
    episode: u64,
}

impl BreakerInner {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failures: 0,
            successes: 0,
            last_failure_time: None,
            last_success_time: None,
            total_requests: 0,
            total_failures: 0,
            total_successes: 0,
            response_times: VecDeque::with_capacity(RESPONSE_TIME_WINDOW),
            next_attempt: None,
            trials_in_flight: 0,
            episode: 0,
        }
    }

    fn record_response_time(&mut self, elapsed: Duration) {
        if self.response_times.len() == RESPONSE_TIME_WINDOW {
            self.response_times.pop_front();
        }
        self.response_times.push_back(elapsed);
    }

    fn average_response_ms(&self) -> f64 {
        if self.response_times.is_empty() {
            return 0.0;
        }
        let total: f64 = self
            .response_times
            .iter()
            .map(|d| d.as_secs_f64() * 1000.0)
            .sum();
        total / self.response_times.len() as f64
    }
}

enum Admission<'a> {
    Allowed(Option<TrialPermit<'a>>),
    Blocked(CircuitState),
}

/// Slot held by a half-open trial call; released on drop
struct TrialPermit<'a> {
    breaker: &'a CircuitBreaker,
    episode: u64,
}

impl Drop for TrialPermit<'_> {
    fn drop(&mut self) {
        let mut inner = self.breaker.inner.lock();
        if inner.episode == self.episode {
            inner.trials_in_flight = inner.trials_in_flight.saturating_sub(1);
        }
    }
}

/// Circuit breaker guarding calls to a single dependency
pub struct CircuitBreaker {
    /// Dependency name (for errors, logging and registry keying)
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("state", &self.state())
            .finish()
    }
}

impl CircuitBreaker {
    /// Create a new circuit breaker with default config
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, CircuitBreakerConfig::default())
    }

    /// Create a new circuit breaker with custom config
    pub fn with_config(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerInner::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Current state, without evaluating the recovery timer
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// True iff the circuit is closed
    pub fn is_healthy(&self) -> bool {
        self.state() == CircuitState::Closed
    }

    /// Execute an operation with circuit breaker protection.
    ///
    /// When the circuit is open the operation is not invoked: the configured
    /// fallback value is returned if it matches `T`, otherwise
    /// [`CircuitBreakerError::Open`]. Operations that run past the configured
    /// timeout are dropped and reported as [`CircuitBreakerError::Timeout`].
    ///
    /// `T: 'static` is required so the type-erased configured fallback can be
    /// downcast to `T`; operations returning borrowed data cannot be wrapped.
    pub async fn execute<T, E, F, Fut>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        T: 'static,
        E: std::error::Error + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run(operation, None::<fn() -> T>).await
    }

    /// Like [`execute`](Self::execute), with a per-call fallback that takes
    /// precedence over the configured one when the call is blocked.
    pub async fn execute_with_fallback<T, E, F, Fut, G>(
        &self,
        operation: F,
        fallback: G,
    ) -> Result<T, CircuitBreakerError<E>>
    where
        T: 'static,
        E: std::error::Error + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        G: FnOnce() -> T,
    {
        self.run(operation, Some(fallback)).await
    }

    async fn run<T, E, F, Fut, G>(
        &self,
        operation: F,
        fallback: Option<G>,
    ) -> Result<T, CircuitBreakerError<E>>
    where
        T: 'static,
        E: std::error::Error + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        G: FnOnce() -> T,
    {
        let (admission, transition) = self.admit();
        self.notify(transition);

        // Held until the outcome is recorded
        let _permit = match admission {
            Admission::Allowed(permit) => permit,
            Admission::Blocked(state) => return self.blocked(state, fallback),
        };

        let started = Instant::now();
        match tokio::time::timeout(self.config.timeout, operation()).await {
            Ok(Ok(value)) => {
                self.record_success(started.elapsed());
                Ok(value)
            }
            Ok(Err(error)) => {
                if self.config.skips(&error) {
                    tracing::debug!(
                        circuit = %self.name,
                        error = %error,
                        "Error excluded from failure count"
                    );
                    self.record_skipped(started.elapsed());
                } else {
                    self.record_failure(started.elapsed());
                }
                Err(CircuitBreakerError::Operation(error))
            }
            Err(_) => {
                tracing::warn!(
                    circuit = %self.name,
                    timeout_ms = self.config.timeout.as_millis() as u64,
                    "Operation timed out"
                );
                self.record_failure(started.elapsed());
                Err(CircuitBreakerError::Timeout {
                    name: self.name.clone(),
                    timeout: self.config.timeout,
                })
            }
        }
    }

    /// Count the request and decide whether it may run
    fn admit(&self) -> (Admission<'_>, Option<CircuitState>) {
        let mut inner = self.inner.lock();
        inner.total_requests += 1;

        let mut transition = None;
        if inner.state == CircuitState::Open {
            let due = inner
                .next_attempt
                .is_some_and(|next_attempt| Instant::now() >= next_attempt);
            if !due {
                return (Admission::Blocked(CircuitState::Open), None);
            }
            transition = self.transition(&mut inner, CircuitState::HalfOpen);
        }

        if inner.state == CircuitState::HalfOpen {
            if let Some(max) = self.config.half_open_max_calls {
                if inner.trials_in_flight >= max {
                    return (Admission::Blocked(CircuitState::HalfOpen), transition);
                }
                inner.trials_in_flight += 1;
                let permit = TrialPermit {
                    breaker: self,
                    episode: inner.episode,
                };
                return (Admission::Allowed(Some(permit)), transition);
            }
        }

        (Admission::Allowed(None), transition)
    }

    fn blocked<T, E, G>(&self, state: CircuitState, fallback: Option<G>) -> Result<T, CircuitBreakerError<E>>
    where
        T: 'static,
        G: FnOnce() -> T,
    {
        if let Some(fallback) = fallback {
            tracing::debug!(circuit = %self.name, state = %state, "Call blocked, using fallback");
            return Ok(fallback());
        }

        if let Some(on_fallback) = &self.config.on_fallback {
            match on_fallback().downcast::<T>() {
                Ok(value) => {
                    tracing::debug!(circuit = %self.name, state = %state, "Call blocked, using fallback");
                    return Ok(*value);
                }
                Err(_) => {
                    tracing::warn!(
                        circuit = %self.name,
                        "Configured fallback does not match the call's result type"
                    );
                }
            }
        }

        tracing::debug!(circuit = %self.name, state = %state, "Call blocked");
        Err(CircuitBreakerError::Open {
            name: self.name.clone(),
            state,
        })
    }

    fn record_success(&self, elapsed: Duration) {
        let transition = {
            let mut inner = self.inner.lock();
            inner.record_response_time(elapsed);
            inner.successes += 1;
            inner.total_successes += 1;
            inner.last_success_time = Some(Utc::now());

            match inner.state {
                CircuitState::HalfOpen if inner.successes >= self.config.success_threshold => {
                    self.transition(&mut inner, CircuitState::Closed)
                }
                CircuitState::Closed => {
                    inner.failures = 0;
                    None
                }
                _ => None,
            }
        };
        self.notify(transition);
    }

    fn record_failure(&self, elapsed: Duration) {
        let transition = {
            let mut inner = self.inner.lock();
            inner.record_response_time(elapsed);
            inner.failures += 1;
            inner.total_failures += 1;
            inner.last_failure_time = Some(Utc::now());

            match inner.state {
                CircuitState::Closed if inner.failures >= self.config.failure_threshold => {
                    self.transition(&mut inner, CircuitState::Open)
                }
                CircuitState::HalfOpen => self.transition(&mut inner, CircuitState::Open),
                _ => None,
            }
        };
        self.notify(transition);
    }

    fn record_skipped(&self, elapsed: Duration) {
        self.inner.lock().record_response_time(elapsed);
    }

    /// Move to `to`, resetting episode counters. Returns the new state if it changed.
    fn transition(&self, inner: &mut BreakerInner, to: CircuitState) -> Option<CircuitState> {
        let from = inner.state;
        if from == to {
            return None;
        }

        inner.state = to;
        inner.episode += 1;
        inner.trials_in_flight = 0;

        match to {
            CircuitState::Open => {
                inner.successes = 0;
                inner.next_attempt = self.recovery_deadline();
                tracing::warn!(
                    circuit = %self.name,
                    from = %from,
                    failures = inner.failures,
                    retry_in_ms = self.config.recovery_timeout.as_millis() as u64,
                    "Circuit breaker opened"
                );
            }
            CircuitState::HalfOpen => {
                inner.failures = 0;
                inner.successes = 0;
                tracing::info!(
                    circuit = %self.name,
                    "Circuit breaker transitioning to half-open"
                );
            }
            CircuitState::Closed => {
                inner.failures = 0;
                inner.successes = 0;
                inner.next_attempt = None;
                tracing::info!(circuit = %self.name, from = %from, "Circuit breaker closed");
            }
        }

        Some(to)
    }

    fn recovery_deadline(&self) -> Option<Instant> {
        Instant::now().checked_add(self.config.recovery_timeout)
    }

    /// Run the state-change hook; never called with the lock held
    fn notify(&self, transition: Option<CircuitState>) {
        if let (Some(state), Some(hook)) = (transition, &self.config.on_state_change) {
            hook(state);
        }
    }

    /// Get circuit breaker statistics
    pub fn stats(&self) -> CircuitBreakerStats {
        let inner = self.inner.lock();
        CircuitBreakerStats {
            state: inner.state,
            failures: inner.failures,
            successes: inner.successes,
            last_failure_time: inner.last_failure_time,
            last_success_time: inner.last_success_time,
            total_requests: inner.total_requests,
            total_failures: inner.total_failures,
            total_successes: inner.total_successes,
            average_response_time: inner.average_response_ms(),
        }
    }

    /// Recent response times, oldest first
    pub fn response_times(&self) -> Vec<Duration> {
        self.inner.lock().response_times.iter().copied().collect()
    }

    /// Force the circuit into `state`, bypassing the normal transition rules.
    ///
    /// Forcing `Closed` or `HalfOpen` clears the failure and success counters
    /// even when the circuit is already in that state; forcing `Open` restarts
    /// the recovery timer.
    pub fn force_state(&self, state: CircuitState) {
        let transition = {
            let mut inner = self.inner.lock();
            let transition = self.transition(&mut inner, state);
            if transition.is_none() {
                match state {
                    CircuitState::Closed => {
                        inner.failures = 0;
                        inner.successes = 0;
                    }
                    CircuitState::Open => {
                        inner.next_attempt = self.recovery_deadline();
                    }
                    CircuitState::HalfOpen => {
                        inner.failures = 0;
                        inner.successes = 0;
                    }
                }
            }
            transition
        };
        tracing::info!(circuit = %self.name, state = %state, "Circuit breaker state forced");
        self.notify(transition);
    }

    /// Manually reset the circuit breaker to closed state
    pub fn reset(&self) {
        self.force_state(CircuitState::Closed);
    }

    /// Manually open the circuit breaker
    pub fn trip(&self) {
        self.force_state(CircuitState::Open);
    }
}
