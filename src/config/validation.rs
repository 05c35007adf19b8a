//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check required fields per protocol (url for HTTP, host/port for SIP/TCP)
//! - Validate value ranges (intervals > 0, thresholds > 0, backoff bounds)
//! - Resolve targets and recovery actions into `ServiceSpec`s
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: MonitorConfig → Result<Vec<ServiceSpec>, Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

use crate::config::schema::{ActionKind, MonitorConfig, Protocol, ServiceConfig};
use crate::resilience::backoff::BackoffPolicy;
use crate::service::spec::{RecoveryAction, RecoveryPolicy, ServiceSpec, Target};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Validate `config` and resolve every service into a spec.
pub fn validate_config(config: &MonitorConfig) -> Result<Vec<ServiceSpec>, Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.check_interval_secs == 0 {
        errors.push(ValidationError::new("check_interval_secs", "must be greater than 0"));
    }
    if config.default_timeout_secs == 0 {
        errors.push(ValidationError::new("default_timeout_secs", "must be greater than 0"));
    }
    if config.incidents.enabled && config.incidents.path.trim().is_empty() {
        errors.push(ValidationError::new("incidents.path", "must not be empty"));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("invalid socket address '{}'", config.observability.metrics_address),
        ));
    }
    if config.services.is_empty() {
        errors.push(ValidationError::new("services", "at least one service is required"));
    }

    let mut seen = HashSet::new();
    let mut specs = Vec::with_capacity(config.services.len());
    for (i, service) in config.services.iter().enumerate() {
        let field = if service.name.is_empty() {
            format!("services[{}]", i)
        } else {
            format!("services.{}", service.name)
        };

        if service.name.trim().is_empty() {
            errors.push(ValidationError::new(&field, "name must not be empty"));
        } else if !seen.insert(service.name.as_str()) {
            errors.push(ValidationError::new(&field, "duplicate service name"));
        }

        if let Some(spec) = validate_service(config, service, &field, &mut errors) {
            specs.push(spec);
        }
    }

    if errors.is_empty() {
        Ok(specs)
    } else {
        Err(errors)
    }
}

fn validate_service(
    config: &MonitorConfig,
    service: &ServiceConfig,
    field: &str,
    errors: &mut Vec<ValidationError>,
) -> Option<ServiceSpec> {
    let before = errors.len();
    let interval = service.interval_secs.unwrap_or(config.check_interval_secs);
    let timeout = service.timeout_secs.unwrap_or(config.default_timeout_secs);

    if service.interval_secs == Some(0) {
        errors.push(ValidationError::new(format!("{}.interval_secs", field), "must be greater than 0"));
    }
    if service.timeout_secs == Some(0) {
        errors.push(ValidationError::new(format!("{}.timeout_secs", field), "must be greater than 0"));
    }

    let health = service.health;
    for (name, value) in [
        ("failure_threshold", health.failure_threshold),
        ("degraded_recovery_threshold", health.degraded_recovery_threshold),
        ("unhealthy_recovery_threshold", health.unhealthy_recovery_threshold),
    ] {
        if value == 0 {
            errors.push(ValidationError::new(format!("{}.health.{}", field, name), "must be greater than 0"));
        }
    }

    let recovery = &service.recovery;
    if recovery.base_delay_ms > recovery.max_delay_ms {
        errors.push(ValidationError::new(
            format!("{}.recovery.base_delay_ms", field),
            format!(
                "base delay {}ms exceeds max delay {}ms",
                recovery.base_delay_ms, recovery.max_delay_ms
            ),
        ));
    }
    if recovery.max_retries == 0 {
        errors.push(ValidationError::new(format!("{}.recovery.max_retries", field), "must be greater than 0"));
    }

    let target = resolve_target(service, field, errors);

    let action = match recovery.action {
        ActionKind::Restart => Some(RecoveryAction::Restart {
            command: recovery
                .command
                .clone()
                .unwrap_or_else(|| format!("systemctl restart {}", service.name)),
            grace_period: Duration::from_millis(recovery.grace_period_ms),
        }),
        ActionKind::Failover => match recovery.target.as_deref() {
            None => {
                errors.push(ValidationError::new(
                    format!("{}.recovery.target", field),
                    "failover requires a target",
                ));
                None
            }
            Some(raw) => match Target::parse(service.protocol, raw) {
                Ok(target) => Some(RecoveryAction::Failover { target }),
                Err(message) => {
                    errors.push(ValidationError::new(format!("{}.recovery.target", field), message));
                    None
                }
            },
        },
        ActionKind::Alert => Some(RecoveryAction::Alert {
            message: recovery
                .message
                .clone()
                .unwrap_or_else(|| format!("{} is down", service.name)),
        }),
    };

    if errors.len() > before {
        return None;
    }
    let (target, action) = (target?, action?);

    let policy = RecoveryPolicy {
        action,
        backoff: BackoffPolicy::new(
            Duration::from_millis(recovery.base_delay_ms),
            Duration::from_millis(recovery.max_delay_ms),
        ),
        max_retries: recovery.max_retries,
        cooldown: Duration::from_secs(recovery.cooldown_secs),
    };

    Some(
        ServiceSpec::new(service.name.clone(), service.protocol, target)
            .with_timing(Duration::from_secs(interval), Duration::from_secs(timeout))
            .with_health(health)
            .with_recovery(policy),
    )
}

fn resolve_target(service: &ServiceConfig, field: &str, errors: &mut Vec<ValidationError>) -> Option<Target> {
    match service.protocol {
        Protocol::Http => {
            let Some(url) = service.url.as_deref() else {
                errors.push(ValidationError::new(format!("{}.url", field), "required for http services"));
                return None;
            };
            Target::parse(Protocol::Http, url)
                .map_err(|message| errors.push(ValidationError::new(format!("{}.url", field), message)))
                .ok()
        }
        Protocol::Sip | Protocol::Tcp => {
            let host = service.host.as_deref().filter(|h| !h.trim().is_empty());
            if host.is_none() {
                errors.push(ValidationError::new(
                    format!("{}.host", field),
                    format!("required for {} services", service.protocol),
                ));
            }
            match service.port {
                None => errors.push(ValidationError::new(
                    format!("{}.port", field),
                    format!("required for {} services", service.protocol),
                )),
                Some(0) => errors.push(ValidationError::new(format!("{}.port", field), "must not be 0")),
                Some(_) => {}
            }
            Some(Target::socket(host?, service.port.filter(|p| *p != 0)?))
        }
    }
}
