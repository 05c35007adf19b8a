//! Per-service mutable health state.
//!
//! # Responsibilities
//! - Hold identity and configuration for one monitored endpoint
//! - Track health, hysteresis counters and the recovery circuit
//! - Track the active target, which changes after a failover

use serde::Serialize;
use std::fmt;
use std::sync::Mutex;

use crate::probe::ProbeResult;
use crate::resilience::circuit_breaker::{CircuitBreaker, CircuitState};
use crate::service::spec::{ServiceSpec, Target};

/// Health status of a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Health {
    Healthy,
    /// Failing, but under the failure threshold. Observation only.
    Degraded,
    /// Failure threshold exceeded; eligible for recovery.
    Unhealthy,
}

impl fmt::Display for Health {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Health::Healthy => "HEALTHY",
            Health::Degraded => "DEGRADED",
            Health::Unhealthy => "UNHEALTHY",
        };
        f.write_str(name)
    }
}

/// Mutable state owned by the engine, one per configured service.
#[derive(Debug, Clone)]
pub struct ServiceState {
    pub health: Health,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    pub last_probe: Option<ProbeResult>,
    pub circuit: CircuitBreaker,
    pub active_target: Target,
}

impl ServiceState {
    pub fn new(target: Target) -> Self {
        Self {
            health: Health::Healthy,
            consecutive_failures: 0,
            consecutive_successes: 0,
            last_probe: None,
            circuit: CircuitBreaker::new(),
            active_target: target,
        }
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.circuit.state()
    }

    pub fn backoff_attempt(&self) -> u32 {
        self.circuit.backoff_attempt()
    }
}

/// A monitored service: immutable spec plus its state.
#[derive(Debug)]
pub struct ServiceRecord {
    spec: ServiceSpec,
    state: Mutex<ServiceState>,
}

impl ServiceRecord {
    pub fn new(spec: ServiceSpec) -> Self {
        let state = Mutex::new(ServiceState::new(spec.target.clone()));
        Self { spec, state }
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn spec(&self) -> &ServiceSpec {
        &self.spec
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> ServiceState {
        self.state.lock().expect("service state mutex poisoned").clone()
    }

    /// Mutate the state under the lock. The closure must not block.
    pub fn update<R>(&self, f: impl FnOnce(&mut ServiceState) -> R) -> R {
        let mut state = self.state.lock().expect("service state mutex poisoned");
        f(&mut state)
    }
}
