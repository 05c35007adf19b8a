//! Validated, immutable service definitions.
//!
//! A `ServiceSpec` is what the engine runs against: targets are parsed,
//! per-service overrides are merged with the global defaults and the
//! recovery action is a closed variant.

use std::fmt;
use std::time::Duration;
use url::Url;

use crate::config::schema::{HealthPolicy, Protocol};
use crate::resilience::backoff::BackoffPolicy;

/// Network location probed for a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// HTTP(S) endpoint.
    Url(Url),
    /// Host and port (SIP over UDP, TCP).
    Socket { host: String, port: u16 },
}

impl Target {
    /// Parse a target written as a single string for the given protocol.
    ///
    /// HTTP targets must be absolute `http`/`https` URLs; SIP and TCP targets
    /// are `host:port`.
    pub fn parse(protocol: Protocol, raw: &str) -> Result<Self, String> {
        match protocol {
            Protocol::Http => {
                let url = Url::parse(raw).map_err(|e| format!("invalid url '{}': {}", raw, e))?;
                match url.scheme() {
                    "http" | "https" => Ok(Target::Url(url)),
                    other => Err(format!("unsupported url scheme '{}'", other)),
                }
            }
            Protocol::Sip | Protocol::Tcp => {
                let (host, port) = raw
                    .rsplit_once(':')
                    .ok_or_else(|| format!("expected host:port, got '{}'", raw))?;
                let host = host.trim_start_matches('[').trim_end_matches(']');
                if host.is_empty() {
                    return Err(format!("missing host in '{}'", raw));
                }
                let port = port
                    .parse::<u16>()
                    .map_err(|_| format!("invalid port in '{}'", raw))?;
                Ok(Target::socket(host, port))
            }
        }
    }

    pub fn socket(host: impl Into<String>, port: u16) -> Self {
        Target::Socket {
            host: host.into(),
            port,
        }
    }

    /// `host:port` form used for socket connects.
    pub fn authority(&self) -> String {
        match self {
            Target::Url(url) => {
                let host = url.host_str().unwrap_or_default();
                let port = url.port_or_known_default().unwrap_or(80);
                format!("{}:{}", host, port)
            }
            Target::Socket { host, port } if host.contains(':') => format!("[{}]:{}", host, port),
            Target::Socket { host, port } => format!("{}:{}", host, port),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Url(url) => write!(f, "{}", url),
            Target::Socket { .. } => f.write_str(&self.authority()),
        }
    }
}

/// Recovery action resolved at load time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Run a restart command, wait, then re-probe.
    Restart {
        command: String,
        grace_period: Duration,
    },
    /// Switch probing to a backup target and re-probe it.
    Failover { target: Target },
    /// Emit an alert; the service itself is left alone.
    Alert { message: String },
}

impl RecoveryAction {
    pub fn kind(&self) -> &'static str {
        match self {
            RecoveryAction::Restart { .. } => "restart",
            RecoveryAction::Failover { .. } => "failover",
            RecoveryAction::Alert { .. } => "alert",
        }
    }
}

/// Backoff, retry budget and circuit cooldown for one service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryPolicy {
    pub action: RecoveryAction,
    pub backoff: BackoffPolicy,
    /// Failed attempts before the circuit opens.
    pub max_retries: u32,
    pub cooldown: Duration,
}

impl RecoveryPolicy {
    pub fn new(action: RecoveryAction) -> Self {
        Self {
            action,
            backoff: BackoffPolicy::default(),
            max_retries: 3,
            cooldown: Duration::from_secs(60),
        }
    }
}

/// A validated service definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSpec {
    pub name: String,
    pub protocol: Protocol,
    pub target: Target,
    pub timeout: Duration,
    pub interval: Duration,
    pub health: HealthPolicy,
    pub recovery: RecoveryPolicy,
}

impl ServiceSpec {
    /// Create a spec with default timing, thresholds and an alert policy.
    pub fn new(name: impl Into<String>, protocol: Protocol, target: Target) -> Self {
        let name = name.into();
        let message = format!("{} is down", name);
        Self {
            name,
            protocol,
            target,
            timeout: Duration::from_secs(5),
            interval: Duration::from_secs(30),
            health: HealthPolicy::default(),
            recovery: RecoveryPolicy::new(RecoveryAction::Alert { message }),
        }
    }

    pub fn with_timing(mut self, interval: Duration, timeout: Duration) -> Self {
        self.interval = interval;
        self.timeout = timeout;
        self
    }

    pub fn with_health(mut self, health: HealthPolicy) -> Self {
        self.health = health;
        self
    }

    pub fn with_recovery(mut self, recovery: RecoveryPolicy) -> Self {
        self.recovery = recovery;
        self
    }
}
