//! HTTP endpoint probes.
//!
//! # Responsibilities
//! - Build health checks that GET a URL
//! - Wire configured endpoints (and their breakers) into a `HealthMonitor`
//!
//! # Design Decisions
//! - 2xx within the latency budget is healthy, slower 2xx is degraded
//! - Non-2xx and transport errors fail the check (reported unavailable)
//! - The per-check timeout is enforced by the monitor, not here

use std::time::Duration;

use futures_util::FutureExt;
use tokio::time::Instant;

use crate::config::EndpointConfig;
use crate::health::active::{CheckFuture, HealthMonitor};
use crate::health::passive::breaker_check;
use crate::health::state::ServiceStatus;
use crate::resilience::CircuitBreakers;
use crate::BoxError;

/// A health check that GETs `url`.
pub fn http_check(
    client: reqwest::Client,
    url: String,
    degraded_after: Duration,
) -> impl Fn() -> CheckFuture + Send + Sync + 'static {
    move || probe(client.clone(), url.clone(), degraded_after).boxed()
}

async fn probe(
    client: reqwest::Client,
    url: String,
    degraded_after: Duration,
) -> Result<ServiceStatus, BoxError> {
    let start = Instant::now();
    let response = client
        .get(&url)
        .header("user-agent", "dependency-guard-health-check")
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(format!("{} returned {}", url, status).into());
    }

    let elapsed = start.elapsed();
    if elapsed > degraded_after {
        tracing::debug!(url = %url, elapsed = ?elapsed, "Endpoint responded slowly");
        Ok(ServiceStatus::Degraded)
    } else {
        Ok(ServiceStatus::Healthy)
    }
}

/// Register a probe per endpoint, plus a `breaker:<name>` check for every
/// endpoint that names a breaker.
pub fn register_endpoints(
    monitor: &HealthMonitor,
    endpoints: &[EndpointConfig],
    breakers: &CircuitBreakers,
    client: &reqwest::Client,
) {
    for endpoint in endpoints {
        monitor.register(
            endpoint.name.clone(),
            http_check(
                client.clone(),
                endpoint.url.clone(),
                Duration::from_millis(endpoint.degraded_latency_ms),
            ),
        );

        if let Some(name) = &endpoint.breaker {
            match breakers.get(name) {
                Some(breaker) => monitor.register(format!("breaker:{}", name), breaker_check(breaker)),
                None => tracing::warn!(endpoint = %endpoint.name, breaker = %name, "Unknown breaker referenced by endpoint"),
            }
        }
    }

    tracing::info!(checks = monitor.len(), "Health checks registered");
}
