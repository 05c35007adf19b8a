//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the monitor.
//! All types derive Serde traits for deserialization from config files.
//! Field aliases accept the older JSON layout (`check_interval`, `type`,
//! `timeout`) so existing service lists load unchanged.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Root configuration for the health monitor.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Default probe interval in seconds, used when a service sets none.
    #[serde(alias = "check_interval")]
    pub check_interval_secs: u64,

    /// Default probe timeout in seconds, used when a service sets none.
    pub default_timeout_secs: u64,

    /// How long shutdown waits for in-flight probes and actions.
    pub shutdown_timeout_secs: u64,

    /// Probe scheduling settings.
    pub scheduler: SchedulerConfig,

    /// Incident log settings.
    pub incidents: IncidentLogConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Monitored services.
    pub services: Vec<ServiceConfig>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: 30,
            default_timeout_secs: 5,
            shutdown_timeout_secs: 10,
            scheduler: SchedulerConfig::default(),
            incidents: IncidentLogConfig::default(),
            observability: ObservabilityConfig::default(),
            services: Vec::new(),
        }
    }
}

/// Probe protocol of a monitored service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Sip,
    Http,
    Tcp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Protocol::Sip => "sip",
            Protocol::Http => "http",
            Protocol::Tcp => "tcp",
        };
        f.write_str(name)
    }
}

/// A single monitored endpoint as written in the config file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    /// Unique service identifier.
    pub name: String,

    /// Probe protocol.
    #[serde(alias = "type")]
    pub protocol: Protocol,

    /// Probe URL (HTTP only).
    #[serde(default)]
    pub url: Option<String>,

    /// Probe host (SIP and TCP).
    #[serde(default)]
    pub host: Option<String>,

    /// Probe port (SIP and TCP).
    #[serde(default)]
    pub port: Option<u16>,

    /// Probe timeout in seconds, overriding `default_timeout_secs`.
    #[serde(default, alias = "timeout")]
    pub timeout_secs: Option<u64>,

    /// Probe interval in seconds, overriding `check_interval_secs`.
    #[serde(default, alias = "interval")]
    pub interval_secs: Option<u64>,

    /// Hysteresis thresholds.
    #[serde(default)]
    pub health: HealthPolicy,

    /// Recovery policy.
    #[serde(default)]
    pub recovery: RecoveryConfig,
}

/// Consecutive-result thresholds driving the health state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthPolicy {
    /// Consecutive failures before a service is Unhealthy.
    pub failure_threshold: u32,

    /// Consecutive successes to leave Degraded.
    pub degraded_recovery_threshold: u32,

    /// Consecutive successes to leave Unhealthy.
    pub unhealthy_recovery_threshold: u32,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            degraded_recovery_threshold: 1,
            unhealthy_recovery_threshold: 2,
        }
    }
}

/// Recovery action name as written in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Restart,
    Failover,
    Alert,
}

/// Recovery policy as written in the config file.
///
/// Action parameters are resolved into a closed variant during validation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Action to run when the service becomes Unhealthy.
    pub action: ActionKind,

    /// Restart command (restart only). Defaults to `systemctl restart <name>`.
    pub command: Option<String>,

    /// Wait after a restart before the verification probe, in milliseconds.
    pub grace_period_ms: u64,

    /// Failover target (failover only): URL for HTTP, `host:port` otherwise.
    pub target: Option<String>,

    /// Alert text (alert only). Defaults to `<name> is down`.
    pub message: Option<String>,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    /// Failed attempts before the circuit opens.
    pub max_retries: u32,

    /// How long an open circuit suppresses actions, in seconds.
    pub cooldown_secs: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            action: ActionKind::Alert,
            command: None,
            grace_period_ms: 2000,
            target: None,
            message: None,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            max_retries: 3,
            cooldown_secs: 60,
        }
    }
}

/// Probe scheduling configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Upper bound of the random delay before a service's first probe.
    pub start_jitter_ms: u64,
}

/// Line format of the incident log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IncidentFormat {
    Json,
    Text,
}

/// Incident log configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IncidentLogConfig {
    /// Append incidents to a file.
    pub enabled: bool,

    /// Incident log path.
    pub path: String,

    /// One JSON object per line, or human-oriented text lines.
    pub format: IncidentFormat,
}

impl Default for IncidentLogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "incidents.log".to_string(),
            format: IncidentFormat::Json,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON instead of pretty text.
    pub json_logs: bool,

    /// Enable the Prometheus scrape endpoint.
    pub metrics_enabled: bool,

    /// Prometheus endpoint bind address.
    pub metrics_address: String,

    /// Interval between periodic summaries, in seconds.
    pub summary_interval_secs: u64,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
            summary_interval_secs: 60,
        }
    }
}
