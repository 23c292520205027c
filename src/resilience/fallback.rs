//! Degraded-mode fallback registry.
//!
//! # Responsibilities
//! - Hold one substitute producer per dependency key
//! - Invoke it on demand when the primary path is unavailable
//!
//! # Design Decisions
//! - Registering an existing key replaces the previous entry (last write
//!   wins) and logs a warning
//! - A missing key is a configuration error, never a silent default
//! - Producer errors pass through untouched; no catching, no retrying

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;

use crate::observability::metrics;
use crate::BoxError;

/// Error returned by [`FallbackRegistry::execute`].
#[derive(Debug, Error)]
pub enum FallbackError<E> {
    /// Nothing registered under the requested key.
    #[error("no fallback registered for '{key}'")]
    NotRegistered { key: String },

    /// The producer itself failed.
    #[error("{0}")]
    Producer(E),
}

impl<E> FallbackError<E> {
    pub fn is_not_registered(&self) -> bool {
        matches!(self, FallbackError::NotRegistered { .. })
    }
}

type Producer<T, E> = Arc<dyn Fn() -> Result<T, E> + Send + Sync>;

struct FallbackEntry<T, E> {
    producer: Producer<T, E>,
    description: String,
}

/// Keyed registry of fallback producers.
pub struct FallbackRegistry<T, E = BoxError> {
    entries: DashMap<String, FallbackEntry<T, E>>,
}

impl<T, E> FallbackRegistry<T, E> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Store `producer` under `key`, replacing any previous entry.
    pub fn register<F>(&self, key: impl Into<String>, producer: F, description: impl Into<String>)
    where
        F: Fn() -> Result<T, E> + Send + Sync + 'static,
    {
        let key = key.into();
        let description = description.into();

        let entry = FallbackEntry {
            producer: Arc::new(producer),
            description: description.clone(),
        };

        if let Some(previous) = self.entries.insert(key.clone(), entry) {
            tracing::warn!(
                key = %key,
                previous = %previous.description,
                replacement = %description,
                "Replacing registered fallback"
            );
        } else {
            tracing::debug!(key = %key, description = %description, "Fallback registered");
        }
    }

    /// Register a constant substitute value.
    pub fn register_value(&self, key: impl Into<String>, value: T, description: impl Into<String>)
    where
        T: Clone + Send + Sync + 'static,
    {
        self.register(key, move || Ok(value.clone()), description);
    }

    /// Invoke the producer registered under `key`.
    pub fn execute(&self, key: &str) -> Result<T, FallbackError<E>> {
        // Clone the producer out so no map lock is held while it runs.
        let producer = match self.entries.get(key) {
            Some(entry) => Arc::clone(&entry.producer),
            None => {
                tracing::error!(key = %key, "No fallback registered");
                metrics::record_fallback(key, "missing");
                return Err(FallbackError::NotRegistered {
                    key: key.to_string(),
                });
            }
        };

        tracing::debug!(key = %key, "Executing fallback");
        match producer() {
            Ok(value) => {
                metrics::record_fallback(key, "ok");
                Ok(value)
            }
            Err(e) => {
                metrics::record_fallback(key, "error");
                Err(FallbackError::Producer(e))
            }
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Human-readable description of the entry under `key`.
    pub fn description(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|e| e.description.clone())
    }

    /// Registered keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.iter().map(|r| r.key().clone()).collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T, E> Default for FallbackRegistry<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> fmt::Debug for FallbackRegistry<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FallbackRegistry")
            .field("keys", &self.keys())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_execute_registered_producer() {
        let registry: FallbackRegistry<&'static str> = FallbackRegistry::new();
        registry.register("feed", || Ok("STALE_QUOTE"), "last cached quote");

        assert_eq!(registry.execute("feed").unwrap(), "STALE_QUOTE");
        assert_eq!(registry.description("feed").as_deref(), Some("last cached quote"));
    }

    #[test]
    fn test_unknown_key_is_not_registered() {
        let registry: FallbackRegistry<&'static str> = FallbackRegistry::new();
        registry.register("feed", || Ok("STALE_QUOTE"), "last cached quote");

        let err = registry.execute("unknown").unwrap_err();
        assert!(err.is_not_registered());
        assert_eq!(err.to_string(), "no fallback registered for 'unknown'");
    }

    #[test]
    fn test_last_registration_wins() {
        let registry: FallbackRegistry<u32> = FallbackRegistry::new();
        registry.register_value("llm", 1, "first");
        registry.register_value("llm", 2, "second");

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.execute("llm").unwrap(), 2);
        assert_eq!(registry.description("llm").as_deref(), Some("second"));
    }

    #[test]
    fn test_producer_error_propagates_unchanged() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let registry: FallbackRegistry<u32, String> = FallbackRegistry::new();
        registry.register(
            "broker",
            move || {
                c.fetch_add(1, Ordering::SeqCst);
                Err("cache empty".to_string())
            },
            "cached fills",
        );

        match registry.execute("broker") {
            Err(FallbackError::Producer(e)) => assert_eq!(e, "cache empty"),
            other => panic!("unexpected {:?}", other),
        }
        // Not retried by the registry.
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_producer_runs_each_time() {
        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();
        let registry: FallbackRegistry<u32> = FallbackRegistry::new();
        registry.register("seq", move || Ok(c.fetch_add(1, Ordering::SeqCst)), "sequence");

        assert_eq!(registry.execute("seq").unwrap(), 0);
        assert_eq!(registry.execute("seq").unwrap(), 1);
    }

    #[test]
    fn test_keys_sorted() {
        let registry: FallbackRegistry<u8> = FallbackRegistry::default();
        assert!(registry.is_empty());
        registry.register_value("b", 0, "");
        registry.register_value("a", 0, "");
        assert_eq!(registry.keys(), vec!["a".to_string(), "b".to_string()]);
        assert!(registry.contains("a"));
        assert!(!registry.contains("c"));
    }
}
