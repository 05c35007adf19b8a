//! Protocol probes.
//!
//! # Data Flow
//! ```text
//! Scheduler tick
//!     → Probe::check(target, timeout)
//!         - sip.rs  (UDP OPTIONS, any well-formed status line)
//!         - http.rs (GET, 2xx)
//!         - tcp.rs  (connect completes)
//!     → ProbeResult (success | error detail)
//! ```
//!
//! # Design Decisions
//! - One capability trait; the scheduler never sees a concrete probe
//! - Ordinary connectivity failures are results, not errors
//! - The caller enforces the deadline; probes also apply it to their own I/O

pub mod http;
pub mod sip;
pub mod tcp;

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::schema::Protocol;
use crate::service::spec::Target;

pub use self::http::HttpProbe;
pub use self::sip::SipProbe;
pub use self::tcp::TcpProbe;

/// Boxed future returned by object-safe async traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Reasons a single check failed.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("timeout")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(std::io::Error),

    #[error("io error: {0}")]
    Io(std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid target: {0}")]
    InvalidTarget(String),
}

/// Outcome of one check. The error detail is present iff the check failed.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResult {
    success: bool,
    latency: Duration,
    error: Option<String>,
    detail: Option<String>,
    timestamp: DateTime<Utc>,
}

impl ProbeResult {
    pub fn success(latency: Duration, detail: Option<String>) -> Self {
        Self {
            success: true,
            latency,
            error: None,
            detail,
            timestamp: Utc::now(),
        }
    }

    pub fn failure(latency: Duration, error: impl Into<String>) -> Self {
        Self {
            success: false,
            latency,
            error: Some(error.into()),
            detail: None,
            timestamp: Utc::now(),
        }
    }

    /// Failure produced when the caller's deadline expired.
    pub fn timeout(latency: Duration) -> Self {
        Self::failure(latency, ProbeError::Timeout.to_string())
    }

    /// Convert a probe's internal outcome into a result.
    pub fn from_outcome(latency: Duration, outcome: Result<Option<String>, ProbeError>) -> Self {
        match outcome {
            Ok(detail) => Self::success(latency, detail),
            Err(e) => Self::failure(latency, e.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn latency(&self) -> Duration {
        self.latency
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Protocol-specific health check capability.
pub trait Probe: Send + Sync {
    /// Check `target`, giving up after `timeout`. Never fails for ordinary
    /// connectivity problems; those are reported in the result.
    fn check<'a>(&'a self, target: &'a Target, timeout: Duration) -> BoxFuture<'a, ProbeResult>;
}

/// Probe implementations keyed by protocol.
#[derive(Clone)]
pub struct ProbeSet {
    probes: HashMap<Protocol, Arc<dyn Probe>>,
}

impl ProbeSet {
    /// Real network probes for every protocol.
    pub fn network() -> Result<Self, ProbeError> {
        let mut probes: HashMap<Protocol, Arc<dyn Probe>> = HashMap::new();
        probes.insert(Protocol::Sip, Arc::new(SipProbe::new()));
        probes.insert(Protocol::Http, Arc::new(HttpProbe::new()?));
        probes.insert(Protocol::Tcp, Arc::new(TcpProbe::new()));
        Ok(Self { probes })
    }

    /// An empty set; every protocol in use must be registered with `with`.
    pub fn empty() -> Self {
        Self {
            probes: HashMap::new(),
        }
    }

    /// Register (or replace) the probe for a protocol.
    pub fn with(mut self, protocol: Protocol, probe: Arc<dyn Probe>) -> Self {
        self.probes.insert(protocol, probe);
        self
    }

    pub fn get(&self, protocol: Protocol) -> Option<Arc<dyn Probe>> {
        self.probes.get(&protocol).cloned()
    }
}
