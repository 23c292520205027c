//! Health records.
//!
//! # States
//! - Healthy: dependency serving normally
//! - Degraded: serving, but slow or on trial
//! - Unavailable: not serving, or the check itself failed
//!
//! Ordering is by severity, so the overall status of a report is the
//! maximum over its services.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize, Serializer};

/// Perceived status of a dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceStatus {
    Healthy,
    Degraded,
    Unavailable,
}

impl ServiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceStatus::Healthy => "healthy",
            ServiceStatus::Degraded => "degraded",
            ServiceStatus::Unavailable => "unavailable",
        }
    }

    /// Gauge value: 1 healthy, 0.5 degraded, 0 unavailable.
    pub fn as_gauge(&self) -> f64 {
        match self {
            ServiceStatus::Healthy => 1.0,
            ServiceStatus::Degraded => 0.5,
            ServiceStatus::Unavailable => 0.0,
        }
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one health check evaluation.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceHealth {
    pub name: String,
    pub status: ServiceStatus,
    /// Wall time of the check call.
    pub latency_ms: f64,
    #[serde(serialize_with = "unix_millis")]
    pub checked_at: SystemTime,
    /// Error raised by the check, if it failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ServiceHealth {
    pub fn is_healthy(&self) -> bool {
        self.status == ServiceStatus::Healthy
    }
}

/// System-wide health snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    /// Worst status among services; healthy when there are none.
    pub overall: ServiceStatus,
    pub services: Vec<ServiceHealth>,
    #[serde(serialize_with = "unix_millis")]
    pub generated_at: SystemTime,
}

impl HealthReport {
    pub fn from_services(services: Vec<ServiceHealth>) -> Self {
        let overall = services
            .iter()
            .map(|s| s.status)
            .max()
            .unwrap_or(ServiceStatus::Healthy);

        Self {
            overall,
            services,
            generated_at: SystemTime::now(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ServiceHealth> {
        self.services.iter().find(|s| s.name == name)
    }

    /// Services that are not healthy.
    pub fn unhealthy(&self) -> impl Iterator<Item = &ServiceHealth> {
        self.services.iter().filter(|s| !s.is_healthy())
    }
}

fn unix_millis<S: Serializer>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error> {
    let millis = time
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64;
    serializer.serialize_u64(millis)
}
