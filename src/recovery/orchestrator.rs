//! Recovery orchestration for a service that reached Unhealthy.
//!
//! # Attempt Flow
//! ```text
//! HealthTransition(→Unhealthy)
//!     → circuit gate (Open within cooldown: suppressed, recorded, done)
//!     → backoff sleep: min(base * 2^attempt, max)
//!     → ActionExecutor::execute
//!         restart:  wait out the grace period
//!         failover: switch the active target
//!         alert:    record the alert
//!     → verification probe of the active target under the service timeout
//!     → Success: close circuit, feed result to the state machine
//!       Failed:  bump attempt counter, maybe open circuit
//!     → RecoveryOutcome recorded + metrics
//! ```
//!
//! Attempts for one service are serialized by the caller (the service's
//! worker awaits `recover`). Nothing here holds a lock across an await.

use std::sync::Arc;
use tokio::time::{self, Instant};

use crate::health::scheduler::publish_transition;
use crate::health::state::{self, HealthTransition};
use crate::incidents::{IncidentEvent, IncidentRecorder};
use crate::observability::metrics::MetricsAggregator;
use crate::probe::Probe;
use crate::recovery::executor::ActionExecutor;
use crate::recovery::types::{RecoveryOutcome, RecoveryReport};
use crate::resilience::circuit_breaker::Gate;
use crate::resilience::timeouts::with_deadline;
use crate::service::record::ServiceRecord;
use crate::service::spec::RecoveryAction;

pub struct RecoveryOrchestrator {
    executor: Arc<dyn ActionExecutor>,
    recorder: Arc<IncidentRecorder>,
    metrics: Arc<MetricsAggregator>,
}

impl RecoveryOrchestrator {
    pub fn new(
        executor: Arc<dyn ActionExecutor>,
        recorder: Arc<IncidentRecorder>,
        metrics: Arc<MetricsAggregator>,
    ) -> Self {
        Self {
            executor,
            recorder,
            metrics,
        }
    }

    /// Run one recovery attempt for `record`.
    ///
    /// Returns `None` when the attempt was suppressed by an open circuit.
    pub async fn recover(
        &self,
        record: &ServiceRecord,
        probe: &dyn Probe,
        transition: &HealthTransition,
    ) -> Option<RecoveryReport> {
        let spec = record.spec();
        let policy = &spec.recovery;
        let name = record.name();

        let (gate, circuit, attempt) = record.update(|s| {
            let gate = s.circuit.try_acquire(Instant::now(), policy.cooldown);
            (gate, s.circuit_state(), s.backoff_attempt())
        });

        if let Gate::Suppressed { remaining } = gate {
            tracing::warn!(
                service = %name,
                circuit = %circuit,
                cooldown_remaining_ms = remaining.as_millis() as u64,
                "Recovery suppressed, circuit open"
            );
            self.recorder.record(
                name,
                IncidentEvent::RecoverySuppressed {
                    circuit,
                    cooldown_remaining_ms: remaining.as_millis() as u64,
                },
            );
            self.metrics.record_suppressed(name, circuit);
            return None;
        }

        let delay = policy.backoff.delay(attempt);
        tracing::info!(
            service = %name,
            action = policy.action.kind(),
            attempt = attempt + 1,
            circuit = %circuit,
            backoff_ms = delay.as_millis() as u64,
            failures = transition.consecutive_failures,
            "Starting recovery"
        );
        time::sleep(delay).await;

        let executed = self.executor.execute(name, &policy.action).await;

        let verification = match executed {
            Ok(detail) => {
                self.after_action(record, &policy.action, detail).await;
                let target = record.update(|s| s.active_target.clone());
                let result = with_deadline(spec.timeout, probe.check(&target, spec.timeout)).await;
                let health = record.update(|s| s.health);
                self.metrics.record_probe(name, &result, health);
                Ok((target, result))
            }
            Err(e) => Err(e),
        };

        let now = Instant::now();
        let report = match verification {
            Ok((target, result)) if result.is_success() => {
                let transition = record.update(|s| {
                    s.circuit.record_success();
                    state::observe(name, &spec.health, s, &result)
                });
                if let Some(t) = transition {
                    publish_transition(&self.recorder, &self.metrics, &t);
                }
                RecoveryReport {
                    service: name.to_string(),
                    action: policy.action.kind().to_string(),
                    attempt: attempt + 1,
                    outcome: RecoveryOutcome::Success,
                    backoff_ms: delay.as_millis() as u64,
                    target: target.to_string(),
                    detail: result.detail().map(str::to_string),
                    circuit: record.update(|s| s.circuit_state()),
                }
            }
            failed => {
                let (target, detail) = match failed {
                    Ok((target, result)) => (
                        target.to_string(),
                        format!("verification failed: {}", result.error().unwrap_or("unknown")),
                    ),
                    Err(e) => (
                        record.update(|s| s.active_target.to_string()),
                        e.to_string(),
                    ),
                };
                let (opened, circuit) = record.update(|s| {
                    let opened = s.circuit.record_failure(now, policy.max_retries);
                    (opened, s.circuit_state())
                });
                if opened {
                    tracing::error!(
                        service = %name,
                        max_retries = policy.max_retries,
                        cooldown_secs = policy.cooldown.as_secs(),
                        "Circuit opened, recovery paused"
                    );
                }
                RecoveryReport {
                    service: name.to_string(),
                    action: policy.action.kind().to_string(),
                    attempt: attempt + 1,
                    outcome: RecoveryOutcome::Failed,
                    backoff_ms: delay.as_millis() as u64,
                    target,
                    detail: Some(detail),
                    circuit,
                }
            }
        };

        match report.outcome {
            RecoveryOutcome::Success => tracing::info!(service = %name, "Recovery {}", report),
            RecoveryOutcome::Failed => tracing::warn!(service = %name, "Recovery {}", report),
        }

        self.recorder
            .record(name, IncidentEvent::RecoveryOutcome(report.clone()));
        let active = record.update(|s| s.active_target.to_string());
        self.metrics.record_recovery(&report, active);

        Some(report)
    }

    /// Per-action follow-up once the executor reported success.
    async fn after_action(&self, record: &ServiceRecord, action: &RecoveryAction, detail: Option<String>) {
        match action {
            RecoveryAction::Restart { grace_period, .. } => {
                tracing::debug!(
                    service = %record.name(),
                    grace_ms = grace_period.as_millis() as u64,
                    "Waiting for restart grace period"
                );
                time::sleep(*grace_period).await;
            }
            RecoveryAction::Failover { target } => {
                let previous = record.update(|s| std::mem::replace(&mut s.active_target, target.clone()));
                if previous != *target {
                    tracing::info!(
                        service = %record.name(),
                        from = %previous,
                        to = %target,
                        "Active target switched"
                    );
                }
            }
            RecoveryAction::Alert { message } => {
                let message = detail.unwrap_or_else(|| message.clone());
                self.recorder
                    .record(record.name(), IncidentEvent::Alert { message });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{HealthPolicy, Protocol};
    use crate::probe::{BoxFuture, ProbeResult};
    use crate::recovery::executor::ActionError;
    use crate::resilience::circuit_breaker::CircuitState;
    use crate::service::record::Health;
    use crate::service::registry::ServiceRegistry;
    use crate::service::spec::{RecoveryPolicy, ServiceSpec, Target};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct FixedProbe(bool);

    impl Probe for FixedProbe {
        fn check<'a>(&'a self, _target: &'a Target, _timeout: Duration) -> BoxFuture<'a, ProbeResult> {
            let ok = self.0;
            Box::pin(async move {
                if ok {
                    ProbeResult::success(Duration::from_millis(3), Some("200 OK".into()))
                } else {
                    ProbeResult::failure(Duration::from_millis(3), "connection refused")
                }
            })
        }
    }

    /// Healthy probe that records when it was called.
    #[derive(Default)]
    struct StampedProbe(std::sync::Mutex<Vec<Instant>>);

    impl Probe for StampedProbe {
        fn check<'a>(&'a self, _target: &'a Target, _timeout: Duration) -> BoxFuture<'a, ProbeResult> {
            self.0.lock().unwrap().push(Instant::now());
            Box::pin(async { ProbeResult::success(Duration::from_millis(4), Some("200 OK".into())) })
        }
    }

    #[derive(Default)]
    struct CountingExecutor {
        calls: AtomicU32,
        fail: bool,
    }

    impl ActionExecutor for CountingExecutor {
        fn execute<'a>(
            &'a self,
            _service: &'a str,
            _action: &'a RecoveryAction,
        ) -> BoxFuture<'a, Result<Option<String>, ActionError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let fail = self.fail;
            Box::pin(async move {
                if fail {
                    Err(ActionError::Rejected("executor down".into()))
                } else {
                    Ok(None)
                }
            })
        }
    }

    fn setup(
        action: RecoveryAction,
        max_retries: u32,
        executor: Arc<CountingExecutor>,
    ) -> (
        Arc<ServiceRecord>,
        RecoveryOrchestrator,
        Arc<IncidentRecorder>,
        Arc<MetricsAggregator>,
    ) {
        let mut recovery = RecoveryPolicy::new(action);
        recovery.max_retries = max_retries;
        let spec = ServiceSpec::new("pbx", Protocol::Tcp, Target::socket("10.0.0.1", 5060))
            .with_health(HealthPolicy::default())
            .with_recovery(recovery);
        let registry = ServiceRegistry::new(vec![spec]).unwrap();
        let record = registry.get("pbx").unwrap();
        let recorder = Arc::new(IncidentRecorder::new());
        let metrics = Arc::new(MetricsAggregator::new(&registry));
        let orchestrator = RecoveryOrchestrator::new(executor, recorder.clone(), metrics.clone());
        (record, orchestrator, recorder, metrics)
    }

    fn unhealthy(record: &ServiceRecord) -> HealthTransition {
        let fail = ProbeResult::failure(Duration::ZERO, "down");
        let mut last = None;
        for _ in 0..3 {
            last = record.update(|s| state::observe("pbx", &HealthPolicy::default(), s, &fail)).or(last);
        }
        last.unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_failover_success_switches_target_and_heals() {
        let backup = Target::socket("10.0.0.2", 5060);
        let executor = Arc::new(CountingExecutor::default());
        let (record, orchestrator, _, _) = setup(
            RecoveryAction::Failover { target: backup.clone() },
            3,
            executor.clone(),
        );
        let trigger = unhealthy(&record);

        let report = orchestrator
            .recover(&record, &FixedProbe(true), &trigger)
            .await
            .unwrap();

        assert_eq!(report.outcome, RecoveryOutcome::Success);
        assert_eq!(report.target, "10.0.0.2:5060");
        let state = record.snapshot();
        assert_eq!(state.active_target, backup);
        assert_eq!(state.circuit_state(), CircuitState::Closed);
        // one verifying success is not enough to leave Unhealthy
        assert_eq!(state.health, Health::Unhealthy);
        assert_eq!(state.consecutive_successes, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_grows_then_circuit_suppresses() {
        let executor = Arc::new(CountingExecutor::default());
        let (record, orchestrator, recorder, _) = setup(
            RecoveryAction::Alert { message: "pbx is down".into() },
            3,
            executor.clone(),
        );
        let trigger = unhealthy(&record);

        let mut delays = Vec::new();
        for _ in 0..3 {
            let report = orchestrator
                .recover(&record, &FixedProbe(false), &trigger)
                .await
                .unwrap();
            assert_eq!(report.outcome, RecoveryOutcome::Failed);
            delays.push(report.backoff_ms);
        }
        assert_eq!(delays, vec![1000, 2000, 4000]);
        assert_eq!(record.snapshot().circuit_state(), CircuitState::Open);

        assert!(orchestrator.recover(&record, &FixedProbe(false), &trigger).await.is_none());
        assert_eq!(executor.calls.load(Ordering::SeqCst), 3);
        assert_eq!(recorder.summary().suppressed_attempts, 1);
        assert_eq!(recorder.summary().alerts, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_action_error_counts_as_failed_attempt() {
        let executor = Arc::new(CountingExecutor {
            calls: AtomicU32::new(0),
            fail: true,
        });
        let (record, orchestrator, _, _) = setup(
            RecoveryAction::Restart {
                command: "false".into(),
                grace_period: Duration::from_secs(2),
            },
            3,
            executor,
        );
        let trigger = unhealthy(&record);

        let report = orchestrator
            .recover(&record, &FixedProbe(true), &trigger)
            .await
            .unwrap();
        assert_eq!(report.outcome, RecoveryOutcome::Failed);
        assert_eq!(report.detail.as_deref(), Some("action rejected: executor down"));
        assert_eq!(record.snapshot().backoff_attempt(), 1);
        assert_eq!(record.snapshot().consecutive_failures, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_trial_after_cooldown() {
        let executor = Arc::new(CountingExecutor::default());
        let (record, orchestrator, _, _) = setup(
            RecoveryAction::Alert { message: "pbx is down".into() },
            1,
            executor.clone(),
        );
        let trigger = unhealthy(&record);

        orchestrator.recover(&record, &FixedProbe(false), &trigger).await;
        assert_eq!(record.snapshot().circuit_state(), CircuitState::Open);

        time::advance(Duration::from_secs(61)).await;
        let report = orchestrator
            .recover(&record, &FixedProbe(true), &trigger)
            .await
            .unwrap();
        assert_eq!(report.outcome, RecoveryOutcome::Success);
        assert_eq!(report.circuit, CircuitState::Closed);
        assert_eq!(executor.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_verifies_after_grace_period() {
        let executor = Arc::new(CountingExecutor::default());
        let (record, orchestrator, _, metrics) = setup(
            RecoveryAction::Restart {
                command: "systemctl restart pbx".into(),
                grace_period: Duration::from_secs(2),
            },
            3,
            executor.clone(),
        );
        let trigger = unhealthy(&record);

        let failed = orchestrator
            .recover(&record, &FixedProbe(false), &trigger)
            .await
            .unwrap();
        assert_eq!(failed.outcome, RecoveryOutcome::Failed);
        assert_eq!(record.snapshot().backoff_attempt(), 1);

        let probe = StampedProbe::default();
        let start = Instant::now();
        let report = orchestrator.recover(&record, &probe, &trigger).await.unwrap();

        assert_eq!(report.outcome, RecoveryOutcome::Success);
        assert_eq!(report.backoff_ms, 2000);
        assert_eq!(report.detail.as_deref(), Some("200 OK"));
        // backoff, then the grace period, then exactly one verification
        let stamps = probe.0.lock().unwrap().clone();
        assert_eq!(stamps, vec![start + Duration::from_secs(2) + Duration::from_secs(2)]);
        assert_eq!(record.snapshot().backoff_attempt(), 0);
        assert_eq!(record.snapshot().circuit_state(), CircuitState::Closed);
        assert_eq!(executor.calls.load(Ordering::SeqCst), 2);

        let pbx = metrics.service("pbx").unwrap();
        assert_eq!(pbx.checks, 2, "both verification probes are counted");
        assert_eq!(pbx.failures, 1);
        assert!(pbx.last_error.is_none());
    }
}
