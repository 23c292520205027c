//! Startup orchestration.
//!
//! # Responsibilities
//! - Load and validate configuration
//! - Build the shared breakers, retry strategy and health monitor once
//! - Start the health polling loop
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - The resulting `Guard` is passed explicitly to every consumer

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;

use crate::config::{load_config, ConfigError, GuardConfig, RetryStrategy};
use crate::health::probe::register_endpoints;
use crate::health::{breaker_check, HealthMonitor};
use crate::lifecycle::shutdown::Shutdown;
use crate::resilience::{CircuitBreaker, CircuitBreakers};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Everything built from one configuration.
#[derive(Debug)]
pub struct Guard {
    pub config: GuardConfig,
    pub breakers: CircuitBreakers,
    pub retry: RetryStrategy,
    pub monitor: Arc<HealthMonitor>,
}

impl Guard {
    /// Load configuration from `path` and build from it.
    pub fn load(path: &Path) -> Result<Self, StartupError> {
        Self::from_config(load_config(path)?)
    }

    /// Build breakers, the health monitor and its checks.
    ///
    /// Every breaker gets a `breaker:<name>` check; every endpoint gets an
    /// HTTP probe.
    pub fn from_config(config: GuardConfig) -> Result<Self, StartupError> {
        let check_timeout = Duration::from_secs(config.health.timeout_secs);
        let client = reqwest::Client::builder().timeout(check_timeout).build()?;

        let breakers = CircuitBreakers::from_config(&config.breakers);
        let monitor = HealthMonitor::new().with_timeout(check_timeout);
        register_endpoints(&monitor, &config.health.endpoints, &breakers, &client);

        let registered = monitor.names();
        for snapshot in breakers.snapshots() {
            let check_name = format!("breaker:{}", snapshot.name);
            if registered.contains(&check_name) {
                continue;
            }
            if let Some(breaker) = breakers.get(&snapshot.name) {
                monitor.register(check_name, breaker_check(breaker));
            }
        }

        tracing::info!(
            breakers = breakers.len(),
            checks = monitor.len(),
            max_attempts = config.retry.max_attempts,
            "Dependency guard initialized"
        );

        Ok(Self {
            retry: config.retry.clone(),
            config,
            breakers,
            monitor: Arc::new(monitor),
        })
    }

    /// Shared breaker for dependency `name`.
    pub fn breaker(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(name)
    }

    /// Poll health checks in the background until `shutdown` fires. A stop
    /// requested before the call yields a task that finishes immediately.
    pub fn spawn_monitor(&self, shutdown: &Shutdown) -> JoinHandle<()> {
        let stop = shutdown.subscribe();
        if shutdown.is_triggered() {
            tracing::debug!("Stop already requested, health monitor not started");
            return tokio::spawn(async {});
        }

        let monitor = Arc::clone(&self.monitor);
        let interval = Duration::from_secs(self.config.health.interval_secs);
        tokio::spawn(async move { monitor.run(interval, stop).await })
    }
}
