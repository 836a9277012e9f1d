//! Circuit breaker types and configuration

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{BreakwaterError, BreakwaterResult};

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Circuit is closed, operations proceed normally
    Closed,
    /// Circuit is open, operations are rejected
    Open,
    /// Circuit is half-open, trial operations probe for recovery
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "CLOSED",
            Self::Open => "OPEN",
            Self::HalfOpen => "HALF_OPEN",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hook invoked with the new state after every committed transition
pub type StateChangeHook = Arc<dyn Fn(CircuitState) + Send + Sync>;

/// Type-erased fallback producer used when a call is blocked
pub type FallbackFn = Arc<dyn Fn() -> Box<dyn Any + Send> + Send + Sync>;

/// Predicate deciding whether an operation error is left out of failure counting
pub type SkipPredicate = Arc<dyn Fn(&(dyn std::error::Error + 'static)) -> bool + Send + Sync>;

/// Configuration for circuit breaker behavior
///
/// The breaker name is not part of the config; it is supplied to
/// [`CircuitBreaker::with_config`](super::CircuitBreaker::with_config) or the registry.
#[derive(Clone)]
pub struct CircuitBreakerConfig {
    /// Number of failures in closed state before opening the circuit
    pub failure_threshold: u32,
    /// Number of successes needed in half-open state to close
    pub success_threshold: u32,
    /// Time the circuit stays open before a trial call is allowed
    pub recovery_timeout: Duration,
    /// Maximum time a single operation may run
    pub timeout: Duration,
    /// Maximum in-flight trial calls in half-open state (`None` = unlimited)
    pub half_open_max_calls: Option<u32>,
    pub on_state_change: Option<StateChangeHook>,
    pub on_fallback: Option<FallbackFn>,
    pub should_skip: Option<SkipPredicate>,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            recovery_timeout: Duration::from_secs(60),
            timeout: Duration::from_secs(30),
            half_open_max_calls: None,
            on_state_change: None,
            on_fallback: None,
            should_skip: None,
        }
    }
}

impl fmt::Debug for CircuitBreakerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreakerConfig")
            .field("failure_threshold", &self.failure_threshold)
            .field("success_threshold", &self.success_threshold)
            .field("recovery_timeout", &self.recovery_timeout)
            .field("timeout", &self.timeout)
            .field("half_open_max_calls", &self.half_open_max_calls)
            .field("on_state_change", &self.on_state_change.is_some())
            .field("on_fallback", &self.on_fallback.is_some())
            .field("should_skip", &self.should_skip.is_some())
            .finish()
    }
}

impl CircuitBreakerConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a config for aggressive circuit breaking
    pub fn aggressive() -> Self {
        Self {
            failure_threshold: 3,
            success_threshold: 2,
            recovery_timeout: Duration::from_secs(15),
            timeout: Duration::from_secs(10),
            half_open_max_calls: Some(1),
            ..Default::default()
        }
    }

    /// Create a config for lenient circuit breaking
    pub fn lenient() -> Self {
        Self {
            failure_threshold: 10,
            success_threshold: 5,
            recovery_timeout: Duration::from_secs(60),
            timeout: Duration::from_secs(60),
            ..Default::default()
        }
    }

    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    pub fn with_success_threshold(mut self, threshold: u32) -> Self {
        self.success_threshold = threshold;
        self
    }

    pub fn with_recovery_timeout(mut self, recovery_timeout: Duration) -> Self {
        self.recovery_timeout = recovery_timeout;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Limit the number of concurrent trial calls while half-open
    pub fn with_half_open_max_calls(mut self, max: u32) -> Self {
        self.half_open_max_calls = Some(max);
        self
    }

    pub fn on_state_change<F>(mut self, hook: F) -> Self
    where
        F: Fn(CircuitState) + Send + Sync + 'static,
    {
        self.on_state_change = Some(Arc::new(hook));
        self
    }

    /// Set the value returned instead of an error when a call is blocked.
    ///
    /// The fallback only applies to calls whose success type is `T`; calls
    /// of any other type still fail with [`CircuitBreakerError::Open`].
    pub fn with_fallback<T, F>(mut self, fallback: F) -> Self
    where
        T: Send + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.on_fallback = Some(Arc::new(move || Box::new(fallback()) as Box<dyn Any + Send>));
        self
    }

    pub fn with_skip<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&(dyn std::error::Error + 'static)) -> bool + Send + Sync + 'static,
    {
        self.should_skip = Some(Arc::new(predicate));
        self
    }

    /// Skip errors whose message contains any of `patterns` (case-insensitive)
    pub fn skip_messages_containing(self, patterns: &[&str]) -> Self {
        let patterns: Vec<String> = patterns.iter().map(|p| p.to_lowercase()).collect();
        self.with_skip(move |error| {
            let message = error.to_string().to_lowercase();
            patterns.iter().any(|p| message.contains(p.as_str()))
        })
    }

    /// Check thresholds and timeouts are usable
    pub fn validate(&self) -> BreakwaterResult<()> {
        if self.failure_threshold == 0 {
            return Err(BreakwaterError::config(
                "failure_threshold must be at least 1",
            ));
        }
        if self.success_threshold == 0 {
            return Err(BreakwaterError::config(
                "success_threshold must be at least 1",
            ));
        }
        if self.timeout.is_zero() {
            return Err(BreakwaterError::config("timeout must be greater than zero"));
        }
        if self.half_open_max_calls == Some(0) {
            return Err(BreakwaterError::config(
                "half_open_max_calls must be at least 1 when set",
            ));
        }
        Ok(())
    }

    pub(crate) fn skips(&self, error: &(dyn std::error::Error + 'static)) -> bool {
        self.should_skip
            .as_ref()
            .is_some_and(|predicate| predicate(error))
    }
}

/// Error from circuit breaker operations
#[derive(Debug)]
pub enum CircuitBreakerError<E> {
    /// Call was blocked because the circuit is open
    Open { name: String, state: CircuitState },
    /// Operation did not settle within the configured timeout
    Timeout { name: String, timeout: Duration },
    /// Operation failed; the original error is carried unchanged
    Operation(E),
}

impl<E> CircuitBreakerError<E> {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Unwrap the operation's own error, if that is what this is
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Operation(e) => Some(e),
            _ => None,
        }
    }

    /// Name of the breaker that rejected the call, for breaker-originated errors
    pub fn breaker_name(&self) -> Option<&str> {
        match self {
            Self::Open { name, .. } | Self::Timeout { name, .. } => Some(name),
            Self::Operation(_) => None,
        }
    }
}

impl<E: fmt::Display> fmt::Display for CircuitBreakerError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open { name, state } => {
                write!(f, "Circuit breaker '{}' is {}", name, state)
            }
            Self::Timeout { name, timeout } => write!(
                f,
                "Circuit breaker '{}': operation timed out after {}ms",
                name,
                timeout.as_millis()
            ),
            Self::Operation(e) => e.fmt(f),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for CircuitBreakerError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Operation(e) => e.source(),
            _ => None,
        }
    }
}

/// Point-in-time statistics for a circuit breaker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitBreakerStats {
    pub state: CircuitState,
    pub failures: u32,
    pub successes: u32,
    pub last_failure_time: Option<DateTime<Utc>>,
    pub last_success_time: Option<DateTime<Utc>>,
    pub total_requests: u64,
    pub total_failures: u64,
    pub total_successes: u64,
    /// Mean of recent response times, in milliseconds
    pub average_response_time: f64,
}

impl CircuitBreakerStats {
    /// Failure rate as a percentage of counted calls
    pub fn failure_rate(&self) -> f64 {
        let counted = self.total_failures + self.total_successes;
        if counted == 0 {
            0.0
        } else {
            (self.total_failures as f64 / counted as f64) * 100.0
        }
    }
}
