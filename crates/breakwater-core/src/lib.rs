//! Breakwater Core Library
//!
//! Circuit breakers for async Rust services: a per-dependency failure
//! isolation state machine, a registry that hands out one shared breaker per
//! dependency name, recommended presets, and a TOML settings loader.
//!
//! ```ignore
//! use breakwater_core::{BreakerPreset, CircuitBreakerRegistry};
//! use std::sync::Arc;
//!
//! let registry = Arc::new(CircuitBreakerRegistry::new());
//! let db = registry.get_or_create_preset("orders-db", BreakerPreset::Database);
//! let rows = db.execute(|| async { pool.fetch_orders().await }).await?;
//! ```

pub mod circuit_breaker;
pub mod error;
pub mod settings;

// Re-export commonly used types
pub use circuit_breaker::{
    BreakerPreset, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError,
    CircuitBreakerRegistry, CircuitBreakerStats, CircuitState, Protected, protect,
};
pub use error::{BreakwaterError, BreakwaterResult};
pub use settings::{BreakerOverrides, BreakerSettings, ConfigSummary};
