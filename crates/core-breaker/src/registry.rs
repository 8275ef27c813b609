//! Named breakers, one per protected dependency
//!
//! Breakers are created once at startup and looked up by name wherever a
//! protected call is issued. Breakers in the same registry share nothing but
//! the transition listener.
//!
//! # Example
//!
//! ```
//! use tripwire_core_breaker::{BreakerConfig, BreakerRegistry};
//!
//! let registry = BreakerRegistry::new();
//! registry.register("search", BreakerConfig::default()).unwrap();
//! registry.register("lyrics", BreakerConfig::strict()).unwrap();
//!
//! let search = registry.get("search").unwrap();
//! assert!(search.can_execute());
//! assert_eq!(registry.names(), vec!["lyrics", "search"]);
//! ```

use crate::circuit_breaker::{BreakerStats, CircuitBreaker};
use crate::config::BreakerConfig;
use crate::error::RegistryError;
use crate::events::{TracingListener, TransitionListener};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Registry of named circuit breakers
#[derive(Clone)]
pub struct BreakerRegistry {
    breakers: Arc<RwLock<BTreeMap<String, CircuitBreaker>>>,
    listener: Arc<dyn TransitionListener>,
}

impl BreakerRegistry {
    /// Create an empty registry whose breakers log through `tracing`
    pub fn new() -> Self {
        Self::with_listener(Arc::new(TracingListener))
    }

    /// Create an empty registry whose breakers all report to `listener`
    pub fn with_listener(listener: Arc<dyn TransitionListener>) -> Self {
        Self {
            breakers: Arc::new(RwLock::new(BTreeMap::new())),
            listener,
        }
    }

    /// Create and register a new breaker
    pub fn register(
        &self,
        name: &str,
        config: BreakerConfig,
    ) -> Result<CircuitBreaker, RegistryError> {
        let mut breakers = self.write();
        if breakers.contains_key(name) {
            return Err(RegistryError::AlreadyRegistered(name.to_string()));
        }

        let breaker = CircuitBreaker::with_listener(name, config, self.listener.clone());
        breakers.insert(name.to_string(), breaker.clone());
        tracing::debug!(
            breaker = name,
            failure_threshold = config.failure_threshold(),
            reset_timeout_ms = config.reset_timeout().as_millis() as u64,
            half_open_trial_limit = config.half_open_trial_limit(),
            "registered circuit breaker"
        );
        Ok(breaker)
    }

    /// Find a breaker by name
    pub fn get(&self, name: &str) -> Option<CircuitBreaker> {
        self.read().get(name).cloned()
    }

    /// Return the existing breaker, or register one with `config`.
    /// An existing breaker keeps its original configuration.
    pub fn get_or_register(&self, name: &str, config: BreakerConfig) -> CircuitBreaker {
        if let Some(breaker) = self.get(name) {
            return breaker;
        }

        self.write()
            .entry(name.to_string())
            .or_insert_with(|| CircuitBreaker::with_listener(name, config, self.listener.clone()))
            .clone()
    }

    /// Remove a breaker by name, returning it if present
    pub fn remove(&self, name: &str) -> Option<CircuitBreaker> {
        self.write().remove(name)
    }

    /// Registered names in sorted order
    pub fn names(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Snapshot of every breaker, sorted by name
    pub fn all_stats(&self) -> Vec<BreakerStats> {
        self.snapshot().iter().map(CircuitBreaker::stats).collect()
    }

    /// Names of breakers that would admit a call right now
    pub fn available(&self) -> Vec<String> {
        self.snapshot()
            .iter()
            .filter(|b| b.can_execute())
            .map(|b| b.name().to_string())
            .collect()
    }

    /// Force every breaker back to `Closed`
    pub fn force_reset_all(&self) {
        for breaker in self.snapshot() {
            breaker.force_reset();
        }
    }

    // Breaker queries may emit events, so they run on a copy taken outside
    // the registry lock.
    fn snapshot(&self) -> Vec<CircuitBreaker> {
        self.read().values().cloned().collect()
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, CircuitBreaker>> {
        self.breakers.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, CircuitBreaker>> {
        self.breakers.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for BreakerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BreakerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BreakerRegistry")
            .field("breakers", &self.names())
            .finish_non_exhaustive()
    }
}
