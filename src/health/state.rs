//! Service health state machine.
//!
//! # States
//! - Healthy: probes succeeding
//! - Degraded: failing, under the failure threshold (observation only)
//! - Unhealthy: threshold reached, eligible for recovery
//!
//! # State Transitions
//! ```text
//! Healthy   → Degraded:  first failure
//! Degraded  → Unhealthy: consecutive failures >= failure_threshold
//! Healthy   → Unhealthy: only when failure_threshold == 1
//! Degraded  → Healthy:   consecutive successes >= degraded_recovery_threshold
//! Unhealthy → Healthy:   consecutive successes >= unhealthy_recovery_threshold
//! Unhealthy → Unhealthy: failures reach another multiple of failure_threshold
//! ```
//!
//! Only transitions into Unhealthy trigger recovery. The repeated
//! Unhealthy → Unhealthy edge is how a persistently failing service asks for
//! its next recovery attempt.
//!
//! Reaching Healthy closes the recovery circuit and resets the backoff
//! attempt, whether the service came back through a recovery action or on
//! its own.

use serde::Serialize;
use std::fmt;

use crate::config::schema::HealthPolicy;
use crate::probe::ProbeResult;
use crate::service::record::{Health, ServiceState};

/// A health change for one service. Immutable once emitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthTransition {
    pub service: String,
    pub from: Health,
    pub to: Health,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    /// Error detail of the probe that caused the change, if it failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl HealthTransition {
    pub fn triggers_recovery(&self) -> bool {
        self.to == Health::Unhealthy
    }

    /// True for the repeated trigger of a service that stayed Unhealthy.
    pub fn is_persisting(&self) -> bool {
        self.from == Health::Unhealthy && self.to == Health::Unhealthy
    }
}

impl fmt::Display for HealthTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)?;
        if let Some(detail) = &self.detail {
            write!(f, " ({})", detail)?;
        }
        Ok(())
    }
}

/// Apply one probe result to `state`. Returns the transition it caused.
pub fn observe(
    service: &str,
    policy: &HealthPolicy,
    state: &mut ServiceState,
    result: &ProbeResult,
) -> Option<HealthTransition> {
    let from = state.health;
    state.last_probe = Some(result.clone());

    let to = if result.is_success() {
        state.consecutive_successes = state.consecutive_successes.saturating_add(1);
        state.consecutive_failures = 0;

        let threshold = match from {
            Health::Healthy => return None,
            Health::Degraded => policy.degraded_recovery_threshold,
            Health::Unhealthy => policy.unhealthy_recovery_threshold,
        };
        if state.consecutive_successes < threshold {
            return None;
        }
        Health::Healthy
    } else {
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        state.consecutive_successes = 0;

        let failures = state.consecutive_failures;
        let threshold = policy.failure_threshold.max(1);
        match from {
            Health::Unhealthy if failures % threshold == 0 => Health::Unhealthy,
            Health::Unhealthy => return None,
            _ if failures >= threshold => Health::Unhealthy,
            Health::Healthy => Health::Degraded,
            Health::Degraded => return None,
        }
    };

    state.health = to;
    if to == Health::Healthy {
        state.circuit.record_success();
    }
    Some(HealthTransition {
        service: service.to_string(),
        from,
        to,
        consecutive_failures: state.consecutive_failures,
        consecutive_successes: state.consecutive_successes,
        detail: result.error().map(str::to_string),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::spec::Target;
    use std::time::Duration;

    fn ok() -> ProbeResult {
        ProbeResult::success(Duration::from_millis(5), None)
    }

    fn fail() -> ProbeResult {
        ProbeResult::failure(Duration::from_millis(5), "connection refused")
    }

    fn state() -> ServiceState {
        ServiceState::new(Target::socket("127.0.0.1", 5060))
    }

    fn run(state: &mut ServiceState, policy: &HealthPolicy, results: &[ProbeResult]) -> Vec<HealthTransition> {
        results
            .iter()
            .filter_map(|r| {
                let t = observe("svc", policy, state, r);
                assert!(
                    state.consecutive_failures == 0 || state.consecutive_successes == 0,
                    "counters both nonzero"
                );
                t
            })
            .collect()
    }

    #[test]
    fn test_three_failures_emit_single_unhealthy() {
        let policy = HealthPolicy::default();
        let mut s = state();
        let transitions = run(&mut s, &policy, &[fail(), fail(), fail()]);

        assert_eq!(transitions.len(), 2);
        assert_eq!(transitions[0].to, Health::Degraded);
        assert!(!transitions[0].triggers_recovery());
        assert_eq!(transitions[1].from, Health::Degraded);
        assert_eq!(transitions[1].to, Health::Unhealthy);
        assert!(transitions[1].triggers_recovery());
        assert_eq!(transitions[1].detail.as_deref(), Some("connection refused"));
        assert_eq!(transitions.iter().filter(|t| t.triggers_recovery()).count(), 1);
    }

    #[test]
    fn test_degraded_recovers_without_trigger() {
        let policy = HealthPolicy::default();
        let mut s = state();
        let transitions = run(&mut s, &policy, &[fail(), fail(), ok()]);

        assert_eq!(transitions.len(), 2);
        assert_eq!(transitions[1].from, Health::Degraded);
        assert_eq!(transitions[1].to, Health::Healthy);
        assert!(transitions.iter().all(|t| !t.triggers_recovery()));
        assert_eq!(s.consecutive_failures, 0);
    }

    #[test]
    fn test_unhealthy_needs_two_successes() {
        let policy = HealthPolicy::default();
        let mut s = state();
        run(&mut s, &policy, &[fail(), fail(), fail()]);

        assert!(observe("svc", &policy, &mut s, &ok()).is_none());
        assert_eq!(s.health, Health::Unhealthy);
        let t = observe("svc", &policy, &mut s, &ok()).unwrap();
        assert_eq!(t.to, Health::Healthy);
        assert!(t.detail.is_none());
    }

    #[test]
    fn test_flapping_does_not_reach_unhealthy() {
        let policy = HealthPolicy::default();
        let mut s = state();
        let transitions = run(&mut s, &policy, &[fail(), fail(), ok(), fail(), fail(), ok()]);
        assert!(transitions.iter().all(|t| t.to != Health::Unhealthy));
    }

    #[test]
    fn test_persisting_failure_retriggers() {
        let policy = HealthPolicy::default();
        let mut s = state();
        let results: Vec<_> = (0..9).map(|_| fail()).collect();
        let triggers: Vec<_> = run(&mut s, &policy, &results)
            .into_iter()
            .filter(|t| t.triggers_recovery())
            .collect();

        assert_eq!(triggers.len(), 3);
        assert!(!triggers[0].is_persisting());
        assert!(triggers[1].is_persisting());
        assert_eq!(triggers[2].consecutive_failures, 9);
    }

    #[test]
    fn test_healthy_closes_open_circuit() {
        use crate::resilience::circuit_breaker::CircuitState;
        use tokio::time::Instant;

        let policy = HealthPolicy::default();
        let mut s = state();
        run(&mut s, &policy, &[fail(), fail(), fail()]);
        s.circuit.record_failure(Instant::now(), 1);
        assert_eq!(s.circuit_state(), CircuitState::Open);

        assert!(observe("svc", &policy, &mut s, &ok()).is_none());
        assert_eq!(s.circuit_state(), CircuitState::Open, "still unhealthy");
        observe("svc", &policy, &mut s, &ok()).unwrap();
        assert_eq!(s.circuit_state(), CircuitState::Closed);
        assert_eq!(s.backoff_attempt(), 0);
    }

    #[test]
    fn test_threshold_one_goes_straight_to_unhealthy() {
        let policy = HealthPolicy {
            failure_threshold: 1,
            ..HealthPolicy::default()
        };
        let mut s = state();
        let t = observe("svc", &policy, &mut s, &fail()).unwrap();
        assert_eq!(t.from, Health::Healthy);
        assert_eq!(t.to, Health::Unhealthy);
    }
}
