//! Active health checking.
//!
//! # Responsibilities
//! - Hold the named health checks of the process
//! - Evaluate every check once per round, concurrently
//! - Downgrade broken checks (error, panic, timeout) to `Unavailable`
//! - Periodically publish a `HealthReport` to subscribers

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use futures_util::future::{join_all, BoxFuture};
use futures_util::FutureExt;
use parking_lot::RwLock;
use tokio::sync::{broadcast, watch};
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::health::state::{HealthReport, ServiceHealth, ServiceStatus};
use crate::observability::metrics;
use crate::BoxError;

/// Future produced by a health check.
pub type CheckFuture = BoxFuture<'static, Result<ServiceStatus, BoxError>>;

/// A value together with the wall time it took to produce.
#[derive(Debug)]
pub struct Timed<T> {
    pub value: T,
    pub elapsed: Duration,
}

/// A health check that measures its own latency.
#[derive(Clone)]
pub struct TimedCheck {
    check: Arc<dyn Fn() -> CheckFuture + Send + Sync>,
}

/// Wrap a check so each call also measures elapsed wall time.
pub fn timed<F, Fut>(check: F) -> TimedCheck
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ServiceStatus, BoxError>> + Send + 'static,
{
    TimedCheck {
        check: Arc::new(move || check().boxed()),
    }
}

impl TimedCheck {
    /// Run the check once. Panics and an exceeded `deadline` become errors.
    pub async fn run(&self, deadline: Option<Duration>) -> Timed<Result<ServiceStatus, BoxError>> {
        let start = Instant::now();

        let value = match std::panic::catch_unwind(AssertUnwindSafe(|| (self.check)())) {
            Ok(fut) => {
                let guarded = AssertUnwindSafe(fut).catch_unwind();
                let outcome = match deadline {
                    Some(limit) => match time::timeout(limit, guarded).await {
                        Ok(outcome) => outcome,
                        Err(_) => Ok(Err(format!("check timed out after {:?}", limit).into())),
                    },
                    None => guarded.await,
                };
                outcome.unwrap_or_else(|panic| Err(panic_message(panic).into()))
            }
            Err(panic) => Err(panic_message(panic).into()),
        };

        Timed {
            value,
            elapsed: start.elapsed(),
        }
    }
}

impl fmt::Debug for TimedCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TimedCheck")
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    let detail = if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    };
    format!("check panicked: {}", detail)
}

/// Registry and evaluator of named health checks.
pub struct HealthMonitor {
    checks: RwLock<Vec<(String, TimedCheck)>>,
    check_timeout: Option<Duration>,
    reports: watch::Sender<Option<Arc<HealthReport>>>,
}

impl HealthMonitor {
    pub fn new() -> Self {
        let (reports, _) = watch::channel(None);
        Self {
            checks: RwLock::new(Vec::new()),
            check_timeout: None,
            reports,
        }
    }

    /// Treat any check running longer than `timeout` as unavailable.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.check_timeout = Some(timeout);
        self
    }

    /// Register a check under `name`, replacing any previous one.
    pub fn register<F, Fut>(&self, name: impl Into<String>, check: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ServiceStatus, BoxError>> + Send + 'static,
    {
        self.register_timed(name, timed(check));
    }

    /// Register an already wrapped check. A replacement keeps the original
    /// position in evaluation order.
    pub fn register_timed(&self, name: impl Into<String>, check: TimedCheck) {
        let name = name.into();
        let mut checks = self.checks.write();

        if let Some(slot) = checks.iter_mut().find(|(n, _)| *n == name) {
            tracing::debug!(check = %name, "Replacing health check");
            slot.1 = check;
        } else {
            tracing::debug!(check = %name, "Health check registered");
            checks.push((name, check));
        }
    }

    /// Check names in evaluation order.
    pub fn names(&self) -> Vec<String> {
        self.checks.read().iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.checks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.read().is_empty()
    }

    /// Run every registered check once and return one record per check,
    /// in registration order. Never fails.
    pub async fn evaluate_all(&self) -> Vec<ServiceHealth> {
        let checks = self.checks.read().clone();
        let deadline = self.check_timeout;

        let evaluations = checks.into_iter().map(|(name, check)| async move {
            let checked_at = SystemTime::now();
            let timed = check.run(deadline).await;

            let (status, error) = match timed.value {
                Ok(status) => (status, None),
                Err(e) => (ServiceStatus::Unavailable, Some(e.to_string())),
            };

            if let Some(err) = &error {
                tracing::warn!(check = %name, error = %err, "Health check failed");
            } else if status != ServiceStatus::Healthy {
                tracing::warn!(check = %name, status = %status, "Dependency not healthy");
            }
            metrics::record_health(&name, status, timed.elapsed);

            ServiceHealth {
                name,
                status,
                latency_ms: timed.elapsed.as_secs_f64() * 1000.0,
                checked_at,
                error,
            }
        });

        join_all(evaluations).await
    }

    /// Evaluate all checks and publish the resulting report.
    pub async fn evaluate(&self) -> Arc<HealthReport> {
        let report = Arc::new(HealthReport::from_services(self.evaluate_all().await));
        self.reports.send_replace(Some(report.clone()));
        report
    }

    /// Receive every published report.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<HealthReport>>> {
        self.reports.subscribe()
    }

    /// Most recently published report.
    pub fn latest(&self) -> Option<Arc<HealthReport>> {
        self.reports.borrow().clone()
    }

    /// Evaluate on every `interval` tick until shutdown.
    pub async fn run(&self, interval: Duration, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval = ?interval,
            checks = self.len(),
            "Health monitor starting"
        );

        let mut ticker = time::interval(interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = self.evaluate().await;
                    tracing::debug!(overall = %report.overall, services = report.services.len(), "Health evaluated");
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HealthMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HealthMonitor")
            .field("checks", &self.names())
            .field("check_timeout", &self.check_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Shutdown;

    fn healthy() -> impl Future<Output = Result<ServiceStatus, BoxError>> {
        async { Ok(ServiceStatus::Healthy) }
    }

    #[tokio::test]
    async fn test_broken_check_is_unavailable() {
        let monitor = HealthMonitor::new();
        monitor.register("broker", || async {
            Err::<ServiceStatus, BoxError>("connection refused".into())
        });
        monitor.register("feed", healthy);

        let records = monitor.evaluate_all().await;

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "broker");
        assert_eq!(records[0].status, ServiceStatus::Unavailable);
        assert_eq!(records[0].error.as_deref(), Some("connection refused"));
        assert_eq!(records[1].name, "feed");
        assert_eq!(records[1].status, ServiceStatus::Healthy);
        assert!(records[1].error.is_none());
        assert!(records.iter().all(|r| r.latency_ms >= 0.0));
    }

    #[tokio::test]
    async fn test_panicking_check_is_contained() {
        let monitor = HealthMonitor::new();
        monitor.register("llm", || async {
            if true {
                panic!("bad probe");
            }
            Ok::<_, BoxError>(ServiceStatus::Healthy)
        });
        monitor.register("feed", healthy);

        let records = monitor.evaluate_all().await;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].status, ServiceStatus::Unavailable);
        assert!(records[0].error.as_deref().unwrap().contains("bad probe"));
        assert_eq!(records[1].status, ServiceStatus::Healthy);
    }

    #[tokio::test(start_paused = true)]
    async fn test_checks_run_concurrently_and_are_timed() {
        let monitor = HealthMonitor::new();
        for name in ["a", "b", "c"] {
            monitor.register(name, || async {
                time::sleep(Duration::from_millis(100)).await;
                Ok::<_, BoxError>(ServiceStatus::Degraded)
            });
        }

        let start = Instant::now();
        let records = monitor.evaluate_all().await;

        assert_eq!(start.elapsed(), Duration::from_millis(100));
        assert_eq!(
            records.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(),
            vec!["a", "b", "c"]
        );
        for r in &records {
            assert_eq!(r.status, ServiceStatus::Degraded);
            assert!((r.latency_ms - 100.0).abs() < 1e-6);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_check_times_out() {
        let monitor = HealthMonitor::new().with_timeout(Duration::from_millis(50));
        monitor.register("slow", || async {
            time::sleep(Duration::from_secs(10)).await;
            Ok::<_, BoxError>(ServiceStatus::Healthy)
        });

        let records = monitor.evaluate_all().await;
        assert_eq!(records[0].status, ServiceStatus::Unavailable);
        assert!(records[0].error.as_deref().unwrap().contains("timed out"));
        assert!((records[0].latency_ms - 50.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_reregister_replaces_in_place() {
        let monitor = HealthMonitor::new();
        monitor.register("feed", healthy);
        monitor.register("llm", healthy);
        monitor.register("feed", || async { Ok::<_, BoxError>(ServiceStatus::Degraded) });

        assert_eq!(monitor.names(), vec!["feed".to_string(), "llm".to_string()]);
        let records = monitor.evaluate_all().await;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].status, ServiceStatus::Degraded);
    }

    #[tokio::test]
    async fn test_empty_monitor() {
        let monitor = HealthMonitor::default();
        assert!(monitor.is_empty());
        assert!(monitor.evaluate_all().await.is_empty());
        assert_eq!(monitor.evaluate().await.overall, ServiceStatus::Healthy);
    }

    #[tokio::test]
    async fn test_timed_wrapper() {
        let check = timed(healthy);
        let result = check.run(None).await;
        assert_eq!(result.value.unwrap(), ServiceStatus::Healthy);
        assert!(result.elapsed < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_run_publishes_until_shutdown() {
        let monitor = Arc::new(HealthMonitor::new());
        monitor.register("feed", healthy);
        assert!(monitor.latest().is_none());

        let shutdown = Shutdown::new();
        let mut reports = monitor.subscribe();
        let m = monitor.clone();
        let stop = shutdown.subscribe();
        let handle = tokio::spawn(async move { m.run(Duration::from_secs(60), stop).await });

        reports.changed().await.unwrap();
        let report = reports.borrow().clone().unwrap();
        assert_eq!(report.overall, ServiceStatus::Healthy);
        assert_eq!(report.services.len(), 1);

        shutdown.trigger();
        handle.await.unwrap();
        assert!(monitor.latest().is_some());
    }
}
