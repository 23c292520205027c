//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (endpoints reference existing breakers)
//! - Validate value ranges (thresholds > 0, delays ordered, URLs parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GuardConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;

use thiserror::Error;

use crate::config::schema::{CircuitBreakerConfig, GuardConfig};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("breaker name must not be empty")]
    EmptyBreakerName,

    #[error("duplicate breaker '{0}'")]
    DuplicateBreaker(String),

    #[error("breaker '{name}': {field} must be at least 1")]
    ZeroThreshold { name: String, field: &'static str },

    #[error("breaker '{name}': recovery_timeout_secs must be a finite non-negative number, got {value}")]
    InvalidRecoveryTimeout { name: String, value: f64 },

    #[error("retry.max_attempts must be at least 1")]
    ZeroAttempts,

    #[error("retry.base_delay_ms ({base}) exceeds retry.max_delay_ms ({max})")]
    DelayOrder { base: u64, max: u64 },

    #[error("health.interval_secs must be at least 1")]
    ZeroInterval,

    #[error("endpoint name must not be empty")]
    EmptyEndpointName,

    #[error("endpoint '{name}': invalid URL '{url}'")]
    InvalidUrl { name: String, url: String },

    #[error("endpoint '{endpoint}' references unknown breaker '{breaker}'")]
    UnknownBreaker { endpoint: String, breaker: String },
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GuardConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let mut names = HashSet::new();
    for breaker in &config.breakers {
        validate_breaker(breaker, &mut errors);
        if !breaker.name.is_empty() && !names.insert(breaker.name.as_str()) {
            errors.push(ValidationError::DuplicateBreaker(breaker.name.clone()));
        }
    }

    if config.retry.max_attempts == 0 {
        errors.push(ValidationError::ZeroAttempts);
    }
    if config.retry.base_delay_ms > config.retry.max_delay_ms {
        errors.push(ValidationError::DelayOrder {
            base: config.retry.base_delay_ms,
            max: config.retry.max_delay_ms,
        });
    }

    if config.health.interval_secs == 0 {
        errors.push(ValidationError::ZeroInterval);
    }

    for endpoint in &config.health.endpoints {
        if endpoint.name.is_empty() {
            errors.push(ValidationError::EmptyEndpointName);
        }
        if url::Url::parse(&endpoint.url).is_err() {
            errors.push(ValidationError::InvalidUrl {
                name: endpoint.name.clone(),
                url: endpoint.url.clone(),
            });
        }
        if let Some(breaker) = &endpoint.breaker {
            if !names.contains(breaker.as_str()) {
                errors.push(ValidationError::UnknownBreaker {
                    endpoint: endpoint.name.clone(),
                    breaker: breaker.clone(),
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_breaker(breaker: &CircuitBreakerConfig, errors: &mut Vec<ValidationError>) {
    if breaker.name.is_empty() {
        errors.push(ValidationError::EmptyBreakerName);
    }
    if breaker.failure_threshold == 0 {
        errors.push(ValidationError::ZeroThreshold {
            name: breaker.name.clone(),
            field: "failure_threshold",
        });
    }
    if breaker.half_open_max_successes == 0 {
        errors.push(ValidationError::ZeroThreshold {
            name: breaker.name.clone(),
            field: "half_open_max_successes",
        });
    }
    if !breaker.recovery_timeout_secs.is_finite() || breaker.recovery_timeout_secs < 0.0 {
        errors.push(ValidationError::InvalidRecoveryTimeout {
            name: breaker.name.clone(),
            value: breaker.recovery_timeout_secs,
        });
    }
}
