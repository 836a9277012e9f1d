//! Circuit breaker registry for managing multiple circuit breakers

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;
use parking_lot::RwLock;

use super::breaker::CircuitBreaker;
use super::presets::BreakerPreset;
use super::types::{CircuitBreakerConfig, CircuitBreakerStats};

static GLOBAL: Lazy<RwLock<Option<Arc<CircuitBreakerRegistry>>>> = Lazy::new(|| RwLock::new(None));

/// Collection of circuit breakers keyed by dependency name.
///
/// Each name maps to exactly one breaker for the lifetime of the entry.
/// Construct one at the application's composition root and share it as
/// `Arc<CircuitBreakerRegistry>`.
#[derive(Debug, Default)]
pub struct CircuitBreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl CircuitBreakerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide shared registry, created on first access
    pub fn global() -> Arc<CircuitBreakerRegistry> {
        if let Some(registry) = GLOBAL.read().as_ref() {
            return Arc::clone(registry);
        }
        let mut slot = GLOBAL.write();
        Arc::clone(slot.get_or_insert_with(|| Arc::new(CircuitBreakerRegistry::new())))
    }

    /// Discard the process-wide registry so the next [`global`](Self::global)
    /// call starts empty. Holders of the old instance keep it alive.
    pub fn reset_global() {
        GLOBAL.write().take();
    }

    /// Get the breaker for `name`, creating it with `config` if absent.
    ///
    /// `config` is only used on first creation; later calls for the same
    /// name return the original breaker unchanged.
    pub fn get_or_create(&self, name: &str, config: CircuitBreakerConfig) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(name.to_string())
            .or_insert_with(|| {
                tracing::debug!(circuit = %name, "Registering circuit breaker");
                Arc::new(CircuitBreaker::with_config(name, config))
            })
            .clone()
    }

    /// Get or create a breaker configured from `preset`
    pub fn get_or_create_preset(&self, name: &str, preset: BreakerPreset) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.get(name) {
            return existing;
        }
        self.get_or_create(name, preset.config())
    }

    /// Get a breaker without creating it
    pub fn get(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Snapshot of every registered breaker
    pub fn get_all(&self) -> HashMap<String, Arc<CircuitBreaker>> {
        self.breakers
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect()
    }

    /// Get stats for all circuit breakers
    pub fn get_all_stats(&self) -> BTreeMap<String, CircuitBreakerStats> {
        self.breakers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().stats()))
            .collect()
    }

    /// Get all circuit breaker names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.breakers.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Remove a breaker; returns whether it was registered
    pub fn remove(&self, name: &str) -> bool {
        self.breakers.remove(name).is_some()
    }

    pub fn clear(&self) {
        self.breakers.clear();
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }

    /// Reset all circuit breakers to closed
    pub fn reset_all(&self) {
        // Collected first so state-change hooks never run under a shard lock
        for breaker in self.get_all().into_values() {
            breaker.reset();
        }
    }
}
