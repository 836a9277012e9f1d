//! Circuit breaker pattern for fault tolerance
//!
//! Prevents cascading failures by failing fast while a dependency is known to
//! be unhealthy, and probing for recovery once the recovery timeout elapses.

mod breaker;
mod presets;
mod protect;
mod registry;
mod types;


// Re-export all public items
pub use breaker::{CircuitBreaker, RESPONSE_TIME_WINDOW};
pub use presets::{BreakerPreset, PresetTuning};
pub use protect::{Protected, protect};
pub use registry::CircuitBreakerRegistry;
pub use types::{
    CircuitBreakerConfig, CircuitBreakerError, CircuitBreakerStats, CircuitState, FallbackFn,
    SkipPredicate, StateChangeHook,
};
