//! Breakers grouped by dependency name.
//!
//! # Responsibilities
//! - Build one breaker per configured dependency
//! - Hand the same shared instance to every caller of that dependency

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::CircuitBreakerConfig;
use crate::resilience::circuit_breaker::{BreakerSnapshot, CircuitBreaker};

/// Owns the breakers for a set of dependencies. Breakers exist only for
/// configured names; nothing is created on lookup.
#[derive(Debug, Default)]
pub struct CircuitBreakers {
    breakers: HashMap<String, Arc<CircuitBreaker>>,
}

impl CircuitBreakers {
    /// Build breakers from configuration.
    ///
    /// Duplicate names keep the first entry.
    pub fn from_config(configs: &[CircuitBreakerConfig]) -> Self {
        let mut breakers = HashMap::new();

        for config in configs {
            if breakers.contains_key(&config.name) {
                tracing::warn!(breaker = %config.name, "Duplicate breaker config ignored");
                continue;
            }
            breakers.insert(config.name.clone(), Arc::new(CircuitBreaker::new(config.clone())));
        }

        tracing::debug!(count = breakers.len(), "Circuit breakers initialized");
        Self { breakers }
    }

    /// Shared breaker for `name`.
    pub fn get(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(name).cloned()
    }

    /// Snapshots of all breakers, sorted by name.
    pub fn snapshots(&self) -> Vec<BreakerSnapshot> {
        let mut snaps: Vec<_> = self.breakers.values().map(|b| b.snapshot()).collect();
        snaps.sort_by(|a, b| a.name.cmp(&b.name));
        snaps
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }
}
